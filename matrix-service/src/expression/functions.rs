// Built-in Value Functions
// Numeric sequence helpers available in the value context

use crate::expression::evaluator::{format_number, EvalError, Value};

/// Registry of built-in functions
pub struct BuiltinFunctions;

impl BuiltinFunctions {
    pub const NAMES: &'static [&'static str] = &["frange", "range"];

    pub fn new() -> Self {
        Self
    }

    /// Call a built-in function; `None` when the name is not a builtin.
    pub fn call(&self, name: &str, args: Vec<Value>) -> Option<Result<Value, EvalError>> {
        match name {
            "range" => Some(self.fn_range(args)),
            "frange" => Some(self.fn_frange(args)),
            _ => None,
        }
    }

    /// range(end), range(start, end) or range(start, end, step);
    /// integers, end exclusive.
    fn fn_range(&self, args: Vec<Value>) -> Result<Value, EvalError> {
        let numbers = numeric_args("range", &args, 1, 3)?;
        let (start, end, step) = match numbers.as_slice() {
            [end] => (0.0, *end, 1.0),
            [start, end] => (*start, *end, 1.0),
            [start, end, step] => (*start, *end, *step),
            _ => unreachable!(),
        };
        if step == 0.0 {
            return Err(EvalError::new("range: step must not be zero"));
        }
        let mut values = Vec::new();
        let mut current = start;
        while (step > 0.0 && current < end) || (step < 0.0 && current > end) {
            values.push(Value::Number(current));
            current += step;
        }
        Ok(Value::List(values))
    }

    /// frange(start, end, num, steps) with `null` for omitted
    /// arguments; produces formatted boundary values.
    fn fn_frange(&self, args: Vec<Value>) -> Result<Value, EvalError> {
        if args.is_empty() || args.len() > 4 {
            return Err(EvalError::new("frange: expected 1 to 4 arguments"));
        }
        let mut numbers = [None, None, None, None];
        for (slot, arg) in numbers.iter_mut().zip(&args) {
            *slot = match arg {
                Value::Null => None,
                other => Some(other.as_number().ok_or_else(|| {
                    EvalError::new(format!("frange: expected number, got {}", other.type_name()))
                })?),
            };
        }
        let start = numbers[0].ok_or_else(|| EvalError::new("frange: start is required"))?;
        let (end, num, steps) = (numbers[1], numbers[2], numbers[3]);

        if end.is_none() && num.is_none() {
            return Err(EvalError::new("frange: no exit condition"));
        }
        if end.is_some() && num.is_some() && steps.is_some() {
            return Err(EvalError::new("frange: overdetermined parameters"));
        }

        let mut values = Vec::new();
        match (end, num) {
            (Some(end), Some(num)) => {
                // Inclusive subdivision into num points.
                let count = num as i64;
                let step = (end - start) / (num - 1.0);
                for i in 0..count - 1 {
                    values.push(start + step * i as f64);
                }
                values.push(end);
            }
            (Some(end), None) => {
                let step = steps.unwrap_or(1.0);
                let mut current = start;
                while current <= end + f64::EPSILON {
                    values.push(current);
                    current += step;
                }
            }
            (None, Some(num)) => {
                let step = steps.unwrap_or(1.0);
                for i in 0..num as i64 {
                    values.push(start + step * i as f64);
                }
            }
            (None, None) => unreachable!(),
        }
        Ok(Value::List(
            values
                .into_iter()
                .map(|v| Value::Str(format_number(v)))
                .collect(),
        ))
    }
}

impl Default for BuiltinFunctions {
    fn default() -> Self {
        Self::new()
    }
}

fn numeric_args(
    name: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<Vec<f64>, EvalError> {
    if args.len() < min || args.len() > max {
        return Err(EvalError::new(format!(
            "{}: expected {} to {} arguments, got {}",
            name,
            min,
            max,
            args.len()
        )));
    }
    args.iter()
        .map(|arg| {
            arg.as_number().ok_or_else(|| {
                EvalError::new(format!("{}: expected number, got {}", name, arg.type_name()))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_strings(value: Value) -> Vec<String> {
        let Value::List(items) = value else {
            panic!("expected list");
        };
        items
            .into_iter()
            .map(|item| match item {
                Value::Number(n) => format_number(n),
                Value::Str(s) => s,
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_range() {
        let functions = BuiltinFunctions::new();
        let result = functions
            .call("range", vec![Value::Number(1.0), Value::Number(4.0)])
            .unwrap()
            .unwrap();
        assert_eq!(as_strings(result), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_frange_num_points() {
        let functions = BuiltinFunctions::new();
        let result = functions
            .call(
                "frange",
                vec![Value::Number(0.0), Value::Number(10.0), Value::Number(5.0)],
            )
            .unwrap()
            .unwrap();
        assert_eq!(as_strings(result), vec!["0", "2.5", "5", "7.5", "10"]);
    }

    #[test]
    fn test_frange_steps() {
        let functions = BuiltinFunctions::new();
        let result = functions
            .call(
                "frange",
                vec![
                    Value::Number(0.0),
                    Value::Number(6.0),
                    Value::Null,
                    Value::Number(2.0),
                ],
            )
            .unwrap()
            .unwrap();
        assert_eq!(as_strings(result), vec!["0", "2", "4", "6"]);
    }

    #[test]
    fn test_frange_no_exit_condition() {
        let functions = BuiltinFunctions::new();
        let err = functions
            .call("frange", vec![Value::Number(0.0)])
            .unwrap()
            .unwrap_err();
        assert!(err.to_string().contains("exit condition"));
    }

    #[test]
    fn test_frange_overdetermined() {
        let functions = BuiltinFunctions::new();
        let err = functions
            .call(
                "frange",
                vec![
                    Value::Number(0.0),
                    Value::Number(10.0),
                    Value::Number(5.0),
                    Value::Number(2.0),
                ],
            )
            .unwrap()
            .unwrap_err();
        assert!(err.to_string().contains("overdetermined"));
    }
}
