// Named Source Registry
// Explicit mapping from short names to parameter source constructors,
// consulted by the modular factory's expression evaluator

use crate::config::param::{ParamConfig, ParamValue};
use crate::expression::evaluator::format_number;
use crate::expression::Value;
use crate::params::basic::{ConstSource, CounterSource, LookupSource, RngSource, ValuesSource};
use crate::params::meta::{CrossSource, RepeatSource, ZipLongSource};
use crate::params::source::ParameterSource;
use crate::params::ParameterError;

use std::collections::BTreeMap;

/// Constructor for one named source type.
pub type SourceConstructor =
    fn(&ParamConfig, Vec<Value>) -> Result<Box<dyn ParameterSource>, ParameterError>;

/// Registry of named source constructors.
///
/// An explicit object rather than a process-wide map, so independent
/// trees (and tests) cannot interfere through shared registration.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    constructors: BTreeMap<String, SourceConstructor>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in source types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("const", make_const);
        registry.register("counter", make_counter);
        registry.register("rng", make_rng);
        registry.register("var", make_var);
        registry.register("lookup", make_lookup);
        registry.register("zip", make_zip);
        registry.register("cross", make_cross);
        registry.register("repeat", make_repeat);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, constructor: SourceConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    pub fn create(
        &self,
        name: &str,
        pconfig: &ParamConfig,
        args: Vec<Value>,
    ) -> Result<Box<dyn ParameterSource>, ParameterError> {
        let constructor =
            self.constructors
                .get(name)
                .ok_or_else(|| ParameterError::UnknownSource {
                    name: name.to_string(),
                    available: self.names().join(", "),
                })?;
        constructor(pconfig, args)
    }
}

fn create_failed(name: &str, message: impl Into<String>) -> ParameterError {
    ParameterError::CreateFailed {
        name: name.to_string(),
        message: message.into(),
    }
}

fn string_arg(name: &str, value: Value) -> Result<String, ParameterError> {
    match value {
        Value::Str(s) => Ok(s),
        Value::Number(n) => Ok(format_number(n)),
        other => Err(create_failed(
            name,
            format!("expected a string argument, got {}", other.type_name()),
        )),
    }
}

fn number_arg(name: &str, value: Value) -> Result<i64, ParameterError> {
    value
        .as_number()
        .map(|n| n as i64)
        .ok_or_else(|| create_failed(name, format!("expected a number, got {}", value.type_name())))
}

fn source_arg(name: &str, value: Value) -> Result<Box<dyn ParameterSource>, ParameterError> {
    match value {
        Value::Source(source) => Ok(source),
        other => Err(create_failed(
            name,
            format!("expected a parameter source, got {}", other.type_name()),
        )),
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), ParameterError> {
    if args.len() < min || args.len() > max {
        return Err(create_failed(
            name,
            format!("expected {} to {} arguments, got {}", min, max, args.len()),
        ));
    }
    Ok(())
}

/// const('NAME') reads the value from configuration; const('NAME', v)
/// uses the explicit value.
fn make_const(
    pconfig: &ParamConfig,
    args: Vec<Value>,
) -> Result<Box<dyn ParameterSource>, ParameterError> {
    arity("const", &args, 1, 2)?;
    let mut args = args.into_iter();
    let var = string_arg("const", args.next().unwrap_or(Value::Null))?;
    let value = match args.next() {
        Some(value) => string_arg("const", value)?,
        None => pconfig.get(&var, None, None)?,
    };
    Ok(Box::new(ConstSource::new(var.to_uppercase(), value)))
}

fn make_counter(
    _pconfig: &ParamConfig,
    args: Vec<Value>,
) -> Result<Box<dyn ParameterSource>, ParameterError> {
    arity("counter", &args, 2, 2)?;
    let mut args = args.into_iter();
    let var = string_arg("counter", args.next().unwrap_or(Value::Null))?;
    let base = number_arg("counter", args.next().unwrap_or(Value::Null))?;
    Ok(Box::new(CounterSource::new(var.to_uppercase(), base)))
}

fn make_rng(
    _pconfig: &ParamConfig,
    args: Vec<Value>,
) -> Result<Box<dyn ParameterSource>, ParameterError> {
    arity("rng", &args, 0, 1)?;
    let var = match args.into_iter().next() {
        Some(value) => string_arg("rng", value)?,
        None => "JOB_RANDOM".to_string(),
    };
    Ok(Box::new(RngSource::new(var.to_uppercase(), rand::random())))
}

/// var('NAME') builds a source from the variable's resolved value:
/// plain values give a bounded list, a dict gives a lookup keyed by
/// the variable's `lookup` option.
fn make_var(
    pconfig: &ParamConfig,
    args: Vec<Value>,
) -> Result<Box<dyn ParameterSource>, ParameterError> {
    arity("var", &args, 1, 1)?;
    let var = string_arg("var", args.into_iter().next().unwrap_or(Value::Null))?;
    match pconfig.get_parameter(&var)? {
        ParamValue::Values(values) => Ok(Box::new(ValuesSource::new(var.to_uppercase(), values))),
        ParamValue::Dict(table) => {
            let lookup_key = pconfig.get(&var, Some("lookup"), None)?;
            Ok(Box::new(LookupSource::new(
                var.to_uppercase(),
                lookup_key.to_uppercase(),
                table,
            )))
        }
        ParamValue::Format(_) => Err(create_failed(
            "var",
            format!("variable {var:?} resolves to a format marker"),
        )),
    }
}

fn make_lookup(
    pconfig: &ParamConfig,
    args: Vec<Value>,
) -> Result<Box<dyn ParameterSource>, ParameterError> {
    arity("lookup", &args, 2, 2)?;
    let mut args = args.into_iter();
    let var = string_arg("lookup", args.next().unwrap_or(Value::Null))?;
    let key = string_arg("lookup", args.next().unwrap_or(Value::Null))?;
    match pconfig.get_parameter(&var)? {
        ParamValue::Dict(table) => Ok(Box::new(LookupSource::new(
            var.to_uppercase(),
            key.to_uppercase(),
            table,
        ))),
        other => Err(create_failed(
            "lookup",
            format!("variable {var:?} is not a dict (got {other:?})"),
        )),
    }
}

fn make_zip(
    _pconfig: &ParamConfig,
    args: Vec<Value>,
) -> Result<Box<dyn ParameterSource>, ParameterError> {
    let children = args
        .into_iter()
        .map(|arg| source_arg("zip", arg))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Box::new(ZipLongSource::new(children)))
}

fn make_cross(
    _pconfig: &ParamConfig,
    args: Vec<Value>,
) -> Result<Box<dyn ParameterSource>, ParameterError> {
    let children = args
        .into_iter()
        .map(|arg| source_arg("cross", arg))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Box::new(CrossSource::new(children)?))
}

fn make_repeat(
    _pconfig: &ParamConfig,
    args: Vec<Value>,
) -> Result<Box<dyn ParameterSource>, ParameterError> {
    arity("repeat", &args, 2, 2)?;
    let mut args = args.into_iter();
    let child = source_arg("repeat", args.next().unwrap_or(Value::Null))?;
    let times = number_arg("repeat", args.next().unwrap_or(Value::Null))?;
    if times < 0 {
        return Err(create_failed("repeat", "repeat count must not be negative"));
    }
    Ok(Box::new(RepeatSource::new(child, times as u64)?))
}
