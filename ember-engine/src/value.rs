//! Runtime values produced and consumed by snippet evaluation.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use rustpython_parser::ast;

use crate::error::EvalError;

/// A value in the snippet language. Tuples fold into lists.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(BTreeMap<String, Value>),
    Func(FuncDef),
    Builtin(Builtin),
    Module(&'static str),
}

/// A user function defined with `def`.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<ast::Stmt>,
}

/// Built-in callables, including the preloaded `math` functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Len,
    Str,
    Int,
    Float,
    Repr,
    Bool,
    Abs,
    Min,
    Max,
    Sum,
    Sorted,
    Range,
    Type,
    MathSqrt,
    MathFloor,
    MathCeil,
    MathFabs,
    MathPow,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Repr => "repr",
            Builtin::Bool => "bool",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Sum => "sum",
            Builtin::Sorted => "sorted",
            Builtin::Range => "range",
            Builtin::Type => "type",
            Builtin::MathSqrt => "sqrt",
            Builtin::MathFloor => "floor",
            Builtin::MathCeil => "ceil",
            Builtin::MathFabs => "fabs",
            Builtin::MathPow => "pow",
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Func(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Module(_) => "module",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dict(map) => !map.is_empty(),
            Value::Func(_) | Value::Builtin(_) | Value::Module(_) => true,
        }
    }

    /// `str()`-style rendering: strings bare, everything else like its repr.
    pub fn display_str(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.repr_str(),
        }
    }

    /// `repr()`-style rendering: strings quoted.
    pub fn repr_str(&self) -> String {
        match self {
            Value::None => "None".to_owned(),
            Value::Bool(true) => "True".to_owned(),
            Value::Bool(false) => "False".to_owned(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => quote_str(s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr_str).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Dict(map) => {
                let parts: Vec<String> = map
                    .iter()
                    .map(|(key, value)| format!("{}: {}", quote_str(key), value.repr_str()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Func(func) => format!("<function {}>", func.name),
            Value::Builtin(builtin) => format!("<built-in function {}>", builtin.name()),
            Value::Module(name) => format!("<module '{name}'>"),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(f64::from(*b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_str())
    }
}

/// Equality with Python's numeric cross-type behavior (`1 == 1.0`).
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

/// Ordering for comparisons, `min`/`max`, and `sorted`.
pub fn compare_values(left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return a.partial_cmp(&b).ok_or_else(|| {
            EvalError::Value("cannot order NaN".to_owned())
        });
    }

    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => Err(EvalError::Type(format!(
            "'<' not supported between instances of '{}' and '{}'",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn quote_str(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n");
    format!("'{escaped}'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_quotes_strings_and_display_does_not() {
        let value = Value::Str("hi".to_owned());

        assert_eq!(value.repr_str(), "'hi'");
        assert_eq!(value.display_str(), "hi");
    }

    #[test]
    fn floats_render_with_a_decimal_point() {
        assert_eq!(Value::Float(1.0).repr_str(), "1.0");
        assert_eq!(Value::Float(2.5).repr_str(), "2.5");
    }

    #[test]
    fn collections_render_recursively() {
        let value = Value::List(vec![
            Value::Int(1),
            Value::Str("two".to_owned()),
            Value::None,
        ]);

        assert_eq!(value.repr_str(), "[1, 'two', None]");
    }

    #[test]
    fn numeric_equality_crosses_types() {
        assert!(values_equal(&Value::Int(1), &Value::Float(1.0)));
        assert!(!values_equal(&Value::Int(1), &Value::Str("1".to_owned())));
    }

    #[test]
    fn ordering_rejects_mixed_types() {
        let err = compare_values(&Value::Int(1), &Value::Str("a".to_owned())).unwrap_err();
        assert!(matches!(err, EvalError::Type(_)));
    }
}
