// Parameter Variable Resolution
// Resolves typed per-variable parsing options (delimiters, value
// types, tuple/binning layout) on top of a ConfigView

use crate::config::split::{parse_tuple, shell_split, split_advanced};
use crate::config::{ChangePolicy, ConfigError, ConfigView};
use crate::expression;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Canonical key for a parameter variable: either a plain variable or
/// a tuple group `(x, y, z)` whose members share one raw option.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum VarKey {
    Single(String),
    Group(Vec<String>),
}

impl VarKey {
    fn label(&self) -> String {
        match self {
            VarKey::Single(name) => name.clone(),
            VarKey::Group(members) => format!("({})", members.join(", ")),
        }
    }
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Deferred formatting marker produced by the `format` parameter type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRef {
    pub variable: String,
    pub template: String,
    pub source: String,
    pub default: String,
}

/// Ordered key -> values mapping parsed from `=>` marker text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParamDict {
    pub default: Vec<String>,
    pub entries: Vec<(String, Vec<String>)>,
}

impl ParamDict {
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }
}

/// Resolved value(s) of a parameter variable.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Values(Vec<String>),
    Format(FormatRef),
    Dict(ParamDict),
}

enum ScalarValue {
    List(Vec<String>),
    Format(FormatRef),
}

/// Typed view over the `[parameters]` options of a configuration.
///
/// The lookup table is built once from all option names; `"var"`,
/// `"var opt"` and tuple-group forms are indexed, with every tuple
/// member pointing at its group.
pub struct ParamConfig {
    view: Arc<dyn ConfigView>,
    static_mode: bool,
    var_map: BTreeMap<String, VarKey>,
    opt_map: BTreeMap<(VarKey, Option<String>), String>,
}

impl fmt::Debug for ParamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamConfig")
            .field("static_mode", &self.static_mode)
            .field("variables", &self.var_map.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ParamConfig {
    pub fn new(view: Arc<dyn ConfigView>, static_mode: bool) -> Self {
        let mut var_map = BTreeMap::new();
        let mut opt_map = BTreeMap::new();
        for raw in view.option_names() {
            let (key, opt) = parse_option_name(&raw);
            if opt.is_none() {
                match &key {
                    VarKey::Group(members) => {
                        for member in members {
                            var_map.insert(member.clone(), key.clone());
                        }
                    }
                    VarKey::Single(name) => {
                        var_map.insert(name.clone(), key.clone());
                    }
                }
            }
            opt_map.insert((key, opt), raw);
        }
        Self {
            view,
            static_mode,
            var_map,
            opt_map,
        }
    }

    fn policy(&self) -> ChangePolicy {
        if self.static_mode {
            ChangePolicy::Frozen
        } else {
            ChangePolicy::Allow
        }
    }

    fn option_name(&self, key: &VarKey, opt: Option<&str>) -> String {
        let lookup = (key.clone(), opt.map(str::to_string));
        if let Some(raw) = self.opt_map.get(&lookup) {
            return raw.clone();
        }
        match opt {
            Some(opt) => format!("{} {}", key.label(), opt),
            None => key.label(),
        }
    }

    fn raw_get(
        &self,
        key: &VarKey,
        opt: Option<&str>,
        default: Option<&str>,
    ) -> Result<String, ConfigError> {
        self.view
            .get(&self.option_name(key, opt), default, self.policy())
    }

    /// Raw string value for a variable/option pair.
    pub fn get(
        &self,
        var: &str,
        opt: Option<&str>,
        default: Option<&str>,
    ) -> Result<String, ConfigError> {
        let lower = var.to_lowercase();
        let key = self
            .var_map
            .get(&lower)
            .cloned()
            .unwrap_or(VarKey::Single(lower));
        self.raw_get(&key, opt, default)
    }

    /// Resolve a variable's final value(s).
    pub fn get_parameter(&self, var: &str) -> Result<ParamValue, ConfigError> {
        let lower = var.to_lowercase();
        let key = self
            .var_map
            .get(&lower)
            .cloned()
            .ok_or_else(|| ConfigError::UndefinedVariable(var.to_string()))?;

        match &key {
            VarKey::Group(members) => {
                let index = members
                    .iter()
                    .position(|m| *m == lower)
                    .ok_or_else(|| ConfigError::UndefinedVariable(var.to_string()))?;
                let tuple_value = self.raw_get(&key, None, Some(""))?;
                let tuple_type = self.raw_get(&key, Some("type"), Some("tuple"))?;
                let member = VarKey::Single(lower.clone());
                let var_type = self.raw_get(&member, Some("type"), Some("verbatim"))?;

                if tuple_value.contains("=>") {
                    let dict = self.parse_dict(&key, &tuple_value, |v| {
                        self.parse_tuple_slot(&key, &lower, v, &tuple_type, &var_type, index)
                    })?;
                    return Ok(ParamValue::Dict(dict));
                }
                Ok(ParamValue::Values(self.parse_tuple_slot(
                    &key,
                    &lower,
                    &tuple_value,
                    &tuple_type,
                    &var_type,
                    index,
                )?))
            }
            VarKey::Single(_) => {
                let value = self.raw_get(&key, None, Some(""))?;
                let var_type = self.raw_get(&key, Some("type"), Some("default"))?;

                if value.contains("=>") {
                    let parse_dict = match self.raw_get(&key, Some("parse dict"), Some("true"))? {
                        v if v.trim().eq_ignore_ascii_case("false") => false,
                        _ => true,
                    };
                    if parse_dict {
                        let dict = self.parse_dict(&key, &value, |v| {
                            self.parse_scalar_list(&lower, v, &var_type)
                        })?;
                        return Ok(ParamValue::Dict(dict));
                    }
                }
                match self.parse_scalar(&lower, &value, &var_type)? {
                    ScalarValue::List(values) => Ok(ParamValue::Values(values)),
                    ScalarValue::Format(fref) => Ok(ParamValue::Format(fref)),
                }
            }
        }
    }

    fn parse_scalar(
        &self,
        var: &str,
        value: &str,
        ptype: &str,
    ) -> Result<ScalarValue, ConfigError> {
        let key = VarKey::Single(var.to_string());
        match ptype {
            "verbatim" => Ok(ScalarValue::List(vec![value.to_string()])),
            "split" => {
                let delimiter = self.raw_get(&key, Some("delimeter"), Some(","))?;
                let delimiter = delimiter.chars().next().unwrap_or(',');
                Ok(ScalarValue::List(
                    value
                        .split(delimiter)
                        .map(|v| v.trim().to_string())
                        .collect(),
                ))
            }
            "lines" => Ok(ScalarValue::List(
                value.lines().map(str::to_string).collect(),
            )),
            "expr" | "eval" => Ok(ScalarValue::List(expression::evaluate_values(value)?)),
            "default" => Ok(ScalarValue::List(shell_split(value))),
            "format" => Ok(ScalarValue::Format(FormatRef {
                variable: var.to_string(),
                template: value.to_string(),
                source: self.raw_get(&key, Some("source"), None)?,
                default: self.raw_get(&key, Some("default"), Some(""))?,
            })),
            _ => Err(ConfigError::InvalidParameterType {
                variable: var.to_string(),
                ptype: ptype.to_string(),
            }),
        }
    }

    fn parse_scalar_list(
        &self,
        var: &str,
        value: &str,
        ptype: &str,
    ) -> Result<Vec<String>, ConfigError> {
        match self.parse_scalar(var, value, ptype)? {
            ScalarValue::List(values) => Ok(values),
            ScalarValue::Format(_) => Err(ConfigError::InvalidParameterType {
                variable: var.to_string(),
                ptype: "format".to_string(),
            }),
        }
    }

    /// Parse the group's raw text and extract one slot per tuple entry.
    fn parse_tuple_slot(
        &self,
        key: &VarKey,
        var: &str,
        text: &str,
        tuple_type: &str,
        var_type: &str,
        index: usize,
    ) -> Result<Vec<String>, ConfigError> {
        let entries: Vec<Vec<String>> = match tuple_type {
            "tuple" => {
                let delimiter = self.raw_get(key, Some("delimeter"), Some(","))?;
                let delimiter = delimiter.chars().next().unwrap_or(',');
                let pieces = split_advanced(text, |c| ")]}".contains(c), true)?;
                pieces
                    .iter()
                    .map(|p| parse_tuple(p, delimiter))
                    .collect::<Result<_, _>>()?
            }
            "binning" => {
                let bounds: Vec<&str> = text.split_whitespace().collect();
                bounds
                    .windows(2)
                    .map(|w| vec![w[0].to_string(), w[1].to_string()])
                    .collect()
            }
            _ => {
                return Err(ConfigError::InvalidParameterType {
                    variable: var.to_string(),
                    ptype: tuple_type.to_string(),
                })
            }
        };

        let mut result = Vec::new();
        for entry in entries {
            let raw_entry = entry.join(", ");
            let slot = entry.get(index).ok_or_else(|| ConfigError::UnparsableTuple {
                text: raw_entry.clone(),
            })?;
            let parsed = self
                .parse_scalar_list(var, slot, var_type)
                .map_err(|_| ConfigError::UnparsableTuple {
                    text: raw_entry.clone(),
                })?;
            if parsed.len() != 1 {
                return Err(ConfigError::TupleExpansion {
                    variable: var.to_string(),
                    entry: slot.clone(),
                    count: parsed.len(),
                });
            }
            result.push(parsed.into_iter().next().unwrap());
        }
        Ok(result)
    }

    fn parse_dict(
        &self,
        key: &VarKey,
        raw: &str,
        value_parser: impl Fn(&str) -> Result<Vec<String>, ConfigError>,
    ) -> Result<ParamDict, ConfigError> {
        let key_delimiter = self.raw_get(key, Some("key delimeter"), Some(","))?;
        let key_delimiter = key_delimiter.chars().next().unwrap_or(',');

        let mut dict = ParamDict::default();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once("=>") {
                Some((keys, value)) => {
                    let value = value_parser(value.trim())?;
                    for entry_key in parse_tuple(keys.trim(), key_delimiter)? {
                        dict.entries.push((entry_key, value.clone()));
                    }
                }
                None => dict.default.extend(value_parser(line)?),
            }
        }
        Ok(dict)
    }
}

/// Split a raw option name into its canonical variable key and
/// optional sub-option, e.g. `"(x, y) type"` -> group + `type`.
fn parse_option_name(raw: &str) -> (VarKey, Option<String>) {
    let lower = raw.to_lowercase();
    let pieces = match split_advanced(&lower, |c| ")]}".contains(c), true) {
        Ok(pieces) => pieces,
        Err(_) => vec![lower.clone()],
    };
    let pieces: Vec<String> = pieces.iter().map(|p| p.trim().to_string()).collect();

    if pieces.first().is_some_and(|p| p.contains('(')) {
        let members = identifier_runs(&pieces[0]);
        let opt = pieces.get(1).filter(|p| !p.is_empty()).cloned();
        return (VarKey::Group(members), opt);
    }
    let text = pieces.first().cloned().unwrap_or_default();
    match text.split_once(' ') {
        Some((var, opt)) => (
            VarKey::Single(var.trim().to_string()),
            Some(opt.trim().to_string()).filter(|o| !o.is_empty()),
        ),
        None => (VarKey::Single(text), None),
    }
}

fn identifier_runs(text: &str) -> Vec<String> {
    let mut runs = Vec::new();
    let mut buffer = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            buffer.push(ch);
        } else if !buffer.is_empty() {
            runs.push(std::mem::take(&mut buffer));
        }
    }
    if !buffer.is_empty() {
        runs.push(buffer);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;

    fn pconfig(options: &[(&str, &str)]) -> ParamConfig {
        let mut config = MemoryConfig::new();
        for (option, value) in options {
            config = config.with_option(*option, *value);
        }
        ParamConfig::new(Arc::new(config), false)
    }

    #[test]
    fn test_option_name_forms() {
        assert_eq!(
            parse_option_name("alpha"),
            (VarKey::Single("alpha".to_string()), None)
        );
        assert_eq!(
            parse_option_name("alpha type"),
            (VarKey::Single("alpha".to_string()), Some("type".to_string()))
        );
        assert_eq!(
            parse_option_name("(X, Y) type"),
            (
                VarKey::Group(vec!["x".to_string(), "y".to_string()]),
                Some("type".to_string())
            )
        );
    }

    #[test]
    fn test_scalar_default_type() {
        let config = pconfig(&[("alpha", "a b 'c d'")]);
        assert_eq!(
            config.get_parameter("ALPHA").unwrap(),
            ParamValue::Values(vec!["a".to_string(), "b".to_string(), "c d".to_string()])
        );
    }

    #[test]
    fn test_scalar_split_type() {
        let config = pconfig(&[
            ("alpha", "1; 2; 3"),
            ("alpha type", "split"),
            ("alpha delimeter", ";"),
        ]);
        assert_eq!(
            config.get_parameter("alpha").unwrap(),
            ParamValue::Values(vec!["1".to_string(), "2".to_string(), "3".to_string()])
        );
    }

    #[test]
    fn test_scalar_lines_and_verbatim() {
        let config = pconfig(&[
            ("alpha", "one\ntwo"),
            ("alpha type", "lines"),
            ("beta", "x y z"),
            ("beta type", "verbatim"),
        ]);
        assert_eq!(
            config.get_parameter("alpha").unwrap(),
            ParamValue::Values(vec!["one".to_string(), "two".to_string()])
        );
        assert_eq!(
            config.get_parameter("beta").unwrap(),
            ParamValue::Values(vec!["x y z".to_string()])
        );
    }

    #[test]
    fn test_expr_type() {
        let config = pconfig(&[("alpha", "range(1, 4)"), ("alpha type", "expr")]);
        assert_eq!(
            config.get_parameter("alpha").unwrap(),
            ParamValue::Values(vec!["1".to_string(), "2".to_string(), "3".to_string()])
        );
    }

    #[test]
    fn test_tuple_group() {
        let config = pconfig(&[("(x, y)", "(1, 2) (3, 4)")]);
        assert_eq!(
            config.get_parameter("x").unwrap(),
            ParamValue::Values(vec!["1".to_string(), "3".to_string()])
        );
        assert_eq!(
            config.get_parameter("Y").unwrap(),
            ParamValue::Values(vec!["2".to_string(), "4".to_string()])
        );
    }

    #[test]
    fn test_binning_group() {
        let config = pconfig(&[("(lo, hi)", "0 10 20 30"), ("(lo, hi) type", "binning")]);
        assert_eq!(
            config.get_parameter("lo").unwrap(),
            ParamValue::Values(vec!["0".to_string(), "10".to_string(), "20".to_string()])
        );
        assert_eq!(
            config.get_parameter("hi").unwrap(),
            ParamValue::Values(vec!["10".to_string(), "20".to_string(), "30".to_string()])
        );
    }

    #[test]
    fn test_dict_value() {
        let config = pconfig(&[("alpha", "fallback\nkey1 => a b\nkey2 => c")]);
        let value = config.get_parameter("alpha").unwrap();
        let ParamValue::Dict(dict) = value else {
            panic!("expected dict, got {value:?}");
        };
        assert_eq!(dict.default, vec!["fallback"]);
        assert_eq!(dict.get("key1").unwrap(), ["a", "b"]);
        assert_eq!(dict.get("key2").unwrap(), ["c"]);
    }

    #[test]
    fn test_dict_parsing_disabled() {
        let config = pconfig(&[
            ("alpha", "key => value"),
            ("alpha parse dict", "false"),
            ("alpha type", "verbatim"),
        ]);
        assert_eq!(
            config.get_parameter("alpha").unwrap(),
            ParamValue::Values(vec!["key => value".to_string()])
        );
    }

    #[test]
    fn test_undefined_variable() {
        let config = pconfig(&[]);
        let err = config.get_parameter("ghost").unwrap_err();
        assert!(matches!(err, ConfigError::UndefinedVariable(_)));
    }

    #[test]
    fn test_unknown_type_names_variable() {
        let config = pconfig(&[("alpha", "1"), ("alpha type", "csv")]);
        let err = config.get_parameter("alpha").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("alpha") && message.contains("csv"), "{message}");
    }

    #[test]
    fn test_unparsable_tuple_reports_text() {
        let config = pconfig(&[("(x, y)", "(1, 2) (3)")]);
        let err = config.get_parameter("y").unwrap_err();
        assert!(matches!(err, ConfigError::UnparsableTuple { .. }));
    }

    #[test]
    fn test_format_marker() {
        let config = pconfig(&[
            ("alpha", "%s.dat"),
            ("alpha type", "format"),
            ("alpha source", "beta"),
        ]);
        let ParamValue::Format(fref) = config.get_parameter("alpha").unwrap() else {
            panic!("expected format marker");
        };
        assert_eq!(fref.source, "beta");
        assert_eq!(fref.template, "%s.dat");
        assert_eq!(fref.default, "");
    }
}
