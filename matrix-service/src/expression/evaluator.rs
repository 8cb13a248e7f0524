// Combinator Expression Evaluator
// Evaluates the restricted AST in a value context (builtins only) or
// a source context (named constructors from a SourceRegistry)

use crate::config::param::ParamConfig;
use crate::expression::functions::BuiltinFunctions;
use crate::expression::parser::{BinaryOp, Expr, ExprParser, ParseExprError, UnaryOp};
use crate::params::registry::SourceRegistry;
use crate::params::source::ParameterSource;

use std::fmt;

/// Evaluation error
#[derive(Debug, Clone)]
pub struct EvalError {
    pub message: String,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evaluation error: {}", self.message)
    }
}

impl std::error::Error for EvalError {}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<ParseExprError> for EvalError {
    fn from(err: ParseExprError) -> Self {
        Self::new(err.to_string())
    }
}

/// Result of evaluating an expression
#[derive(Debug)]
pub enum Value {
    Null,
    Number(f64),
    Str(String),
    List(Vec<Value>),
    Source(Box<dyn ParameterSource>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Source(_) => "parameter source",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Expression evaluator.
///
/// With `with_sources` the evaluator resolves call names against the
/// registry's constructors first; this is the only way user
/// expressions can build parameter sources, there is no general code
/// evaluation.
pub struct Evaluator<'a> {
    sources: Option<(&'a SourceRegistry, &'a ParamConfig)>,
    builtins: BuiltinFunctions,
}

impl<'a> Evaluator<'a> {
    pub fn new() -> Self {
        Self {
            sources: None,
            builtins: BuiltinFunctions::new(),
        }
    }

    pub fn with_sources(registry: &'a SourceRegistry, pconfig: &'a ParamConfig) -> Self {
        Self {
            sources: Some((registry, pconfig)),
            builtins: BuiltinFunctions::new(),
        }
    }

    /// Parse and evaluate source text.
    pub fn eval_text(&self, text: &str) -> Result<Value, EvalError> {
        let expr = ExprParser::parse(text)?;
        self.eval(&expr)
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::List(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Unary { op, expr } => {
                let value = self.eval(expr)?;
                let number = value.as_number().ok_or_else(|| {
                    EvalError::new(format!("cannot negate {}", value.type_name()))
                })?;
                match op {
                    UnaryOp::Neg => Ok(Value::Number(-number)),
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
                    return Err(EvalError::new(format!(
                        "operator {} expects numbers, got {} and {}",
                        op,
                        left.type_name(),
                        right.type_name()
                    )));
                };
                let result = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => {
                        if b == 0.0 {
                            return Err(EvalError::new("division by zero"));
                        }
                        a / b
                    }
                    BinaryOp::Mod => {
                        if b == 0.0 {
                            return Err(EvalError::new("modulo by zero"));
                        }
                        a % b
                    }
                };
                Ok(Value::Number(result))
            }
            Expr::Call { name, args } => {
                let args: Vec<Value> = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<_, _>>()?;
                if let Some((registry, pconfig)) = self.sources {
                    if registry.contains(name) {
                        return registry
                            .create(name, pconfig, args)
                            .map(Value::Source)
                            .map_err(|err| EvalError::new(err.to_string()));
                    }
                }
                match self.builtins.call(name, args) {
                    Some(result) => result,
                    None => Err(EvalError::new(format!(
                        "unknown function {:?} (available: {})",
                        name,
                        self.available_names().join(", ")
                    ))),
                }
            }
        }
    }

    fn available_names(&self) -> Vec<String> {
        let mut names: Vec<String> = BuiltinFunctions::NAMES
            .iter()
            .map(|n| n.to_string())
            .collect();
        if let Some((registry, _)) = self.sources {
            names.extend(registry.names());
        }
        names.sort();
        names
    }
}

impl Default for Evaluator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate text in the value context and coerce the result to a list
/// of strings (the `expr` parameter type).
pub fn evaluate_values(text: &str) -> Result<Vec<String>, EvalError> {
    let value = Evaluator::new().eval_text(text)?;
    match value {
        Value::List(items) => items.iter().map(scalar_string).collect(),
        scalar => Ok(vec![scalar_string(&scalar)?]),
    }
}

fn scalar_string(value: &Value) -> Result<String, EvalError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Number(n) => Ok(format_number(*n)),
        Value::Str(s) => Ok(s.clone()),
        other => Err(EvalError::new(format!(
            "cannot use {} as a parameter value",
            other.type_name()
        ))),
    }
}

/// Stable numeric formatting: integers print without a fraction,
/// floats are rounded to 12 decimals to hide accumulation noise.
pub(crate) fn format_number(value: f64) -> String {
    let rounded = (value * 1e12).round() / 1e12;
    if rounded.fract() == 0.0 && rounded.abs() < 1e15 {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let value = Evaluator::new().eval_text("2 + 3 * 4").unwrap();
        assert_eq!(value.as_number(), Some(14.0));
    }

    #[test]
    fn test_evaluate_values_list() {
        assert_eq!(evaluate_values("[1, 2, 'x']").unwrap(), vec!["1", "2", "x"]);
        assert_eq!(evaluate_values("6 / 2").unwrap(), vec!["3"]);
        assert_eq!(evaluate_values("range(0, 3)").unwrap(), vec!["0", "1", "2"]);
    }

    #[test]
    fn test_unknown_function_lists_names() {
        let err = Evaluator::new().eval_text("bogus(1)").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("bogus"));
        assert!(message.contains("range"));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(Evaluator::new().eval_text("1 / 0").is_err());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(2.5), "2.5");
    }
}
