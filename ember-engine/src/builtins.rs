//! Built-in functions, the preloaded module table, and print capture.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::EvalError;
use crate::value::{Builtin, Value, compare_values};

/// Collects `print(...)` output for the duration of one execution.
#[derive(Clone, Default)]
pub struct OutputSink {
    buffer: Arc<Mutex<String>>,
}

impl OutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&self, line: &str) {
        let mut buffer = self.lock();
        buffer.push_str(line);
        buffer.push('\n');
    }

    pub fn snapshot(&self) -> String {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Names injected into every fresh execution environment.
pub fn default_bindings() -> HashMap<String, Value> {
    let mut bindings = HashMap::new();

    for builtin in [
        Builtin::Print,
        Builtin::Len,
        Builtin::Str,
        Builtin::Int,
        Builtin::Float,
        Builtin::Repr,
        Builtin::Bool,
        Builtin::Abs,
        Builtin::Min,
        Builtin::Max,
        Builtin::Sum,
        Builtin::Sorted,
        Builtin::Range,
        Builtin::Type,
    ] {
        bindings.insert(builtin.name().to_owned(), Value::Builtin(builtin));
    }

    bindings.insert("math".to_owned(), Value::Module("math"));

    bindings
}

/// Resolve a preloaded module by name.
pub fn module(name: &str) -> Option<Value> {
    match name {
        "math" => Some(Value::Module("math")),
        _ => None,
    }
}

/// Resolve an attribute of a preloaded module.
pub fn module_attr(module: &str, attr: &str) -> Option<Value> {
    match (module, attr) {
        ("math", "pi") => Some(Value::Float(std::f64::consts::PI)),
        ("math", "e") => Some(Value::Float(std::f64::consts::E)),
        ("math", "sqrt") => Some(Value::Builtin(Builtin::MathSqrt)),
        ("math", "floor") => Some(Value::Builtin(Builtin::MathFloor)),
        ("math", "ceil") => Some(Value::Builtin(Builtin::MathCeil)),
        ("math", "fabs") => Some(Value::Builtin(Builtin::MathFabs)),
        ("math", "pow") => Some(Value::Builtin(Builtin::MathPow)),
        _ => None,
    }
}

pub fn call(builtin: Builtin, args: Vec<Value>, stdout: &OutputSink) -> Result<Value, EvalError> {
    match builtin {
        Builtin::Print => {
            let parts: Vec<String> = args.iter().map(Value::display_str).collect();
            stdout.push_line(&parts.join(" "));
            Ok(Value::None)
        }
        Builtin::Len => {
            let [value] = one_arg("len", args)?;
            match value {
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                Value::List(items) => Ok(Value::Int(items.len() as i64)),
                Value::Dict(map) => Ok(Value::Int(map.len() as i64)),
                other => Err(EvalError::Type(format!(
                    "object of type '{}' has no len()",
                    other.type_name()
                ))),
            }
        }
        Builtin::Str => {
            let [value] = one_arg("str", args)?;
            Ok(Value::Str(value.display_str()))
        }
        Builtin::Repr => {
            let [value] = one_arg("repr", args)?;
            Ok(Value::Str(value.repr_str()))
        }
        Builtin::Bool => {
            let [value] = one_arg("bool", args)?;
            Ok(Value::Bool(value.truthy()))
        }
        Builtin::Int => {
            let [value] = one_arg("int", args)?;
            match value {
                Value::Int(i) => Ok(Value::Int(i)),
                Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                Value::Float(f) => Ok(Value::Int(f.trunc() as i64)),
                Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                    EvalError::Value(format!(
                        "invalid literal for int() with base 10: '{s}'"
                    ))
                }),
                other => Err(EvalError::Type(format!(
                    "int() argument must be a string or a number, not '{}'",
                    other.type_name()
                ))),
            }
        }
        Builtin::Float => {
            let [value] = one_arg("float", args)?;
            match value {
                Value::Float(f) => Ok(Value::Float(f)),
                Value::Int(i) => Ok(Value::Float(i as f64)),
                Value::Bool(b) => Ok(Value::Float(f64::from(b))),
                Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                    EvalError::Value(format!("could not convert string to float: '{s}'"))
                }),
                other => Err(EvalError::Type(format!(
                    "float() argument must be a string or a number, not '{}'",
                    other.type_name()
                ))),
            }
        }
        Builtin::Abs => {
            let [value] = one_arg("abs", args)?;
            match value {
                Value::Int(i) => Ok(Value::Int(i.abs())),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                other => Err(EvalError::Type(format!(
                    "bad operand type for abs(): '{}'",
                    other.type_name()
                ))),
            }
        }
        Builtin::Min => extremum("min", args, std::cmp::Ordering::Less),
        Builtin::Max => extremum("max", args, std::cmp::Ordering::Greater),
        Builtin::Sum => {
            let [value] = one_arg("sum", args)?;
            let items = match value {
                Value::List(items) => items,
                other => {
                    return Err(EvalError::Type(format!(
                        "'{}' object is not iterable",
                        other.type_name()
                    )));
                }
            };

            let mut total = Value::Int(0);
            for item in items {
                total = numeric_add(total, item)?;
            }
            Ok(total)
        }
        Builtin::Sorted => {
            let [value] = one_arg("sorted", args)?;
            let mut items = match value {
                Value::List(items) => items,
                Value::Str(s) => s.chars().map(|ch| Value::Str(ch.to_string())).collect(),
                other => {
                    return Err(EvalError::Type(format!(
                        "'{}' object is not iterable",
                        other.type_name()
                    )));
                }
            };

            let mut failure = None;
            items.sort_by(|a, b| match compare_values(a, b) {
                Ok(ordering) => ordering,
                Err(err) => {
                    failure.get_or_insert(err);
                    std::cmp::Ordering::Equal
                }
            });

            match failure {
                Some(err) => Err(err),
                None => Ok(Value::List(items)),
            }
        }
        Builtin::Range => {
            let ints: Vec<i64> = args
                .iter()
                .map(|arg| match arg {
                    Value::Int(i) => Ok(*i),
                    other => Err(EvalError::Type(format!(
                        "'{}' object cannot be interpreted as an integer",
                        other.type_name()
                    ))),
                })
                .collect::<Result<_, _>>()?;

            let (start, stop, step) = match ints.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                _ => {
                    return Err(EvalError::Type(
                        "range expected 1 to 3 arguments".to_owned(),
                    ));
                }
            };

            if step == 0 {
                return Err(EvalError::Value("range() arg 3 must not be zero".to_owned()));
            }

            let mut items = Vec::new();
            let mut current = start;
            while (step > 0 && current < stop) || (step < 0 && current > stop) {
                items.push(Value::Int(current));
                current += step;
            }
            Ok(Value::List(items))
        }
        Builtin::Type => {
            let [value] = one_arg("type", args)?;
            Ok(Value::Str(format!("<class '{}'>", value.type_name())))
        }
        Builtin::MathSqrt => {
            let value = one_number("sqrt", args)?;
            if value < 0.0 {
                return Err(EvalError::Value("math domain error".to_owned()));
            }
            Ok(Value::Float(value.sqrt()))
        }
        Builtin::MathFloor => {
            let value = one_number("floor", args)?;
            Ok(Value::Int(value.floor() as i64))
        }
        Builtin::MathCeil => {
            let value = one_number("ceil", args)?;
            Ok(Value::Int(value.ceil() as i64))
        }
        Builtin::MathFabs => {
            let value = one_number("fabs", args)?;
            Ok(Value::Float(value.abs()))
        }
        Builtin::MathPow => {
            let [base, exponent] = two_args("pow", args)?;
            match (base.as_f64(), exponent.as_f64()) {
                (Some(base), Some(exponent)) => Ok(Value::Float(base.powf(exponent))),
                _ => Err(EvalError::Type("pow() expects numbers".to_owned())),
            }
        }
    }
}

fn one_arg(name: &str, args: Vec<Value>) -> Result<[Value; 1], EvalError> {
    <[Value; 1]>::try_from(args)
        .map_err(|args| arity_error(name, 1, args.len()))
}

fn two_args(name: &str, args: Vec<Value>) -> Result<[Value; 2], EvalError> {
    <[Value; 2]>::try_from(args)
        .map_err(|args| arity_error(name, 2, args.len()))
}

fn arity_error(name: &str, expected: usize, got: usize) -> EvalError {
    EvalError::Type(format!(
        "{name}() takes {expected} argument{} ({got} given)",
        if expected == 1 { "" } else { "s" }
    ))
}

fn one_number(name: &str, args: Vec<Value>) -> Result<f64, EvalError> {
    let [value] = one_arg(name, args)?;
    value
        .as_f64()
        .ok_or_else(|| EvalError::Type(format!("{name}() expects a number")))
}

fn numeric_add(left: Value, right: Value) -> Result<Value, EvalError> {
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(a + b)),
            _ => Err(EvalError::Type(format!(
                "unsupported operand type(s) for +: '{}' and '{}'",
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

fn extremum(
    name: &str,
    args: Vec<Value>,
    keep: std::cmp::Ordering,
) -> Result<Value, EvalError> {
    let items = match args.len() {
        0 => {
            return Err(EvalError::Type(format!(
                "{name} expected at least 1 argument, got 0"
            )));
        }
        1 => match args.into_iter().next() {
            Some(Value::List(items)) => items,
            Some(other) => {
                return Err(EvalError::Type(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                )));
            }
            None => unreachable!(),
        },
        _ => args,
    };

    let mut iter = items.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(EvalError::Value(format!("{name}() arg is an empty sequence")));
    };

    for item in iter {
        if compare_values(&item, &best)? == keep {
            best = item;
        }
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> OutputSink {
        OutputSink::new()
    }

    #[test]
    fn print_collects_lines() {
        let stdout = sink();
        call(
            Builtin::Print,
            vec![Value::Int(1), Value::Str("two".to_owned())],
            &stdout,
        )
        .unwrap();

        assert_eq!(stdout.snapshot(), "1 two\n");
    }

    #[test]
    fn range_produces_int_lists() {
        let result = call(Builtin::Range, vec![Value::Int(3)], &sink()).unwrap();
        assert_eq!(
            result,
            Value::List(vec![Value::Int(0), Value::Int(1), Value::Int(2)])
        );

        let reversed = call(
            Builtin::Range,
            vec![Value::Int(3), Value::Int(0), Value::Int(-1)],
            &sink(),
        )
        .unwrap();
        assert_eq!(
            reversed,
            Value::List(vec![Value::Int(3), Value::Int(2), Value::Int(1)])
        );
    }

    #[test]
    fn min_accepts_list_or_varargs() {
        let from_list = call(
            Builtin::Min,
            vec![Value::List(vec![Value::Int(4), Value::Int(2), Value::Int(9)])],
            &sink(),
        )
        .unwrap();
        assert_eq!(from_list, Value::Int(2));

        let from_args = call(
            Builtin::Min,
            vec![Value::Int(4), Value::Int(2)],
            &sink(),
        )
        .unwrap();
        assert_eq!(from_args, Value::Int(2));
    }

    #[test]
    fn sum_promotes_to_float_when_needed() {
        let result = call(
            Builtin::Sum,
            vec![Value::List(vec![Value::Int(1), Value::Float(0.5)])],
            &sink(),
        )
        .unwrap();

        assert_eq!(result, Value::Float(1.5));
    }

    #[test]
    fn math_module_exposes_constants_and_functions() {
        assert!(matches!(module_attr("math", "pi"), Some(Value::Float(_))));
        assert!(matches!(
            module_attr("math", "sqrt"),
            Some(Value::Builtin(Builtin::MathSqrt))
        ));
        assert_eq!(module_attr("math", "missing"), None);
    }
}
