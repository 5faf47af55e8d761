//! Leaf payloads of an entity tree.
//!
//! A [`Value`] is either empty, a scalar or a (possibly nested) array of
//! scalars. Arithmetic and comparison operate elementwise with scalar
//! broadcasting, mirroring how numerical arrays behave in the data producers'
//! own tooling.

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("unsupported operand types for {op}: {lhs} and {rhs}")]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("operands could not be broadcast together: lengths {lhs} and {rhs}")]
    ShapeMismatch { lhs: usize, rhs: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("operation {0} on an empty value")]
    EmptyOperand(&'static str),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOp::And => "&",
            LogicalOp::Or => "|",
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Empty => "empty",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
        }
    }

    /// False for empty values, empty arrays and empty strings.
    pub fn has_value(&self) -> bool {
        match self {
            Value::Empty => false,
            Value::Str(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        }
    }

    /// Truthiness; an array is truthy when every element is.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Empty => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(items) => items.iter().all(Value::truthy),
        }
    }

    /// Number of elements along the first axis (1 for scalars, 0 for empty).
    pub fn len(&self) -> usize {
        match self {
            Value::Empty => 0,
            Value::Array(items) => items.len(),
            Value::Str(s) => s.chars().count(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ndim(&self) -> usize {
        match self {
            Value::Array(items) => 1 + items.first().map(Value::ndim).unwrap_or(0),
            _ => 0,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Convert a JSON leaf. Objects are not leaves and map to `None`.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        Some(match json {
            serde_json::Value::Null => Value::Empty,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64()?),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(Value::from_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            serde_json::Value::Object(_) => return None,
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Empty => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    // ── Elementwise operations ────────────────────────────────

    pub fn arith(&self, op: BinaryOp, rhs: &Value) -> Result<Value, ValueError> {
        broadcast(self, rhs, op.symbol(), &|a, b| scalar_arith(op, a, b))
    }

    pub fn compare(&self, op: CompareOp, rhs: &Value) -> Result<Value, ValueError> {
        broadcast(self, rhs, op.symbol(), &|a, b| scalar_compare(op, a, b))
    }

    /// Non-short-circuit elementwise logical operation on truthiness.
    pub fn logical(&self, op: LogicalOp, rhs: &Value) -> Result<Value, ValueError> {
        broadcast(self, rhs, op.symbol(), &|a, b| {
            Ok(Value::Bool(match op {
                LogicalOp::And => a.truthy() && b.truthy(),
                LogicalOp::Or => a.truthy() || b.truthy(),
            }))
        })
    }

    pub fn neg(&self) -> Result<Value, ValueError> {
        map_scalars(self, "unary -", &|v| match v {
            Value::Int(i) => Ok(i.checked_neg().map(Value::Int).unwrap_or(Value::Float(-(*i as f64)))),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Bool(b) => Ok(Value::Int(-(*b as i64))),
            other => Err(unary_mismatch("unary -", other)),
        })
    }

    pub fn not(&self) -> Result<Value, ValueError> {
        map_scalars(self, "not", &|v| Ok(Value::Bool(!v.truthy())))
    }

    pub fn abs(&self) -> Result<Value, ValueError> {
        map_scalars(self, "abs", &|v| match v {
            Value::Int(i) => Ok(i.checked_abs().map(Value::Int).unwrap_or(Value::Float((*i as f64).abs()))),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            other => Err(unary_mismatch("abs", other)),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => write!(f, "<empty>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

// ── Helpers ───────────────────────────────────────────────────

type ScalarFn<'a> = dyn Fn(&Value, &Value) -> Result<Value, ValueError> + 'a;

fn broadcast(lhs: &Value, rhs: &Value, op: &'static str, f: &ScalarFn<'_>) -> Result<Value, ValueError> {
    match (lhs, rhs) {
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return Err(ValueError::ShapeMismatch {
                    lhs: a.len(),
                    rhs: b.len(),
                });
            }
            a.iter()
                .zip(b)
                .map(|(x, y)| broadcast(x, y, op, f))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        (Value::Array(a), scalar) => a
            .iter()
            .map(|x| broadcast(x, scalar, op, f))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (scalar, Value::Array(b)) => b
            .iter()
            .map(|y| broadcast(scalar, y, op, f))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (a, b) => f(a, b),
    }
}

fn map_scalars(
    v: &Value,
    op: &'static str,
    f: &dyn Fn(&Value) -> Result<Value, ValueError>,
) -> Result<Value, ValueError> {
    match v {
        Value::Empty => Err(ValueError::EmptyOperand(op)),
        Value::Array(items) => items
            .iter()
            .map(|x| map_scalars(x, op, f))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        scalar => f(scalar),
    }
}

fn unary_mismatch(op: &'static str, v: &Value) -> ValueError {
    ValueError::TypeMismatch {
        op,
        lhs: v.type_name(),
        rhs: "()",
    }
}

fn mismatch(op: &'static str, a: &Value, b: &Value) -> ValueError {
    ValueError::TypeMismatch {
        op,
        lhs: a.type_name(),
        rhs: b.type_name(),
    }
}

fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Bool(b) => Some(*b as i64),
        Value::Int(i) => Some(*i),
        _ => None,
    }
}

fn scalar_arith(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, ValueError> {
    let sym = op.symbol();
    if matches!(a, Value::Empty) || matches!(b, Value::Empty) {
        return Err(ValueError::EmptyOperand(sym));
    }
    if let (Value::Str(x), Value::Str(y), BinaryOp::Add) = (a, b, op) {
        return Ok(Value::Str(format!("{x}{y}")));
    }

    if let (Some(x), Some(y)) = (as_int(a), as_int(b)) {
        let checked = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Div => {
                if y == 0 {
                    return Err(ValueError::DivisionByZero);
                }
                return Ok(Value::Float(x as f64 / y as f64));
            }
            BinaryOp::Rem => {
                if y == 0 {
                    return Err(ValueError::DivisionByZero);
                }
                x.checked_rem_euclid(y)
            }
            BinaryOp::Pow => u32::try_from(y).ok().and_then(|e| x.checked_pow(e)),
        };
        if let Some(v) = checked {
            return Ok(Value::Int(v));
        }
    }

    let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
        return Err(mismatch(sym, a, b));
    };
    let out = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => {
            if y == 0.0 {
                return Err(ValueError::DivisionByZero);
            }
            x / y
        }
        BinaryOp::Rem => {
            if y == 0.0 {
                return Err(ValueError::DivisionByZero);
            }
            x.rem_euclid(y)
        }
        BinaryOp::Pow => x.powf(y),
    };
    Ok(Value::Float(out))
}

fn scalar_compare(op: CompareOp, a: &Value, b: &Value) -> Result<Value, ValueError> {
    let ordering = match (a, b) {
        (Value::Empty, Value::Empty) => Some(std::cmp::Ordering::Equal),
        (Value::Empty, _) | (_, Value::Empty) => None,
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::Str(_), _) | (_, Value::Str(_)) => None,
        _ => match (as_int(a), as_int(b)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => {
                let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
                    return Err(mismatch(op.symbol(), a, b));
                };
                // NaN compares unequal and unordered.
                match x.partial_cmp(&y) {
                    Some(ord) => Some(ord),
                    None => {
                        return Ok(Value::Bool(op == CompareOp::Ne));
                    }
                }
            }
        },
    };

    match (op, ordering) {
        (CompareOp::Eq, ord) => Ok(Value::Bool(ord == Some(std::cmp::Ordering::Equal))),
        (CompareOp::Ne, ord) => Ok(Value::Bool(ord != Some(std::cmp::Ordering::Equal))),
        (_, None) => {
            if matches!(a, Value::Empty) || matches!(b, Value::Empty) {
                Err(ValueError::EmptyOperand(op.symbol()))
            } else {
                Err(mismatch(op.symbol(), a, b))
            }
        }
        (CompareOp::Lt, Some(ord)) => Ok(Value::Bool(ord.is_lt())),
        (CompareOp::Le, Some(ord)) => Ok(Value::Bool(ord.is_le())),
        (CompareOp::Gt, Some(ord)) => Ok(Value::Bool(ord.is_gt())),
        (CompareOp::Ge, Some(ord)) => Ok(Value::Bool(ord.is_ge())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_value_distinguishes_empty_payloads() {
        assert!(!Value::Empty.has_value());
        assert!(!Value::Array(vec![]).has_value());
        assert!(!Value::Str(String::new()).has_value());
        assert!(Value::Int(0).has_value());
        assert!(Value::from(vec![0.0]).has_value());
    }

    #[test]
    fn array_truthiness_is_conjunction() {
        assert!(Value::from(vec![true, true]).truthy());
        assert!(!Value::from(vec![true, false]).truthy());
        assert!(Value::Array(vec![]).truthy());
        assert!(!Value::Empty.truthy());
    }

    #[test]
    fn comparison_broadcasts_scalars() {
        let arr = Value::from(vec![1.0, 2.0, 3.0]);
        let out = arr.compare(CompareOp::Gt, &Value::Int(1)).unwrap();
        assert_eq!(out, Value::from(vec![false, true, true]));
        assert!(!out.truthy());

        let out = Value::Int(0).compare(CompareOp::Lt, &arr).unwrap();
        assert!(out.truthy());
    }

    #[test]
    fn arithmetic_is_elementwise() {
        let a = Value::from(vec![1_i64, 2, 3]);
        let b = Value::from(vec![10_i64, 20, 30]);
        assert_eq!(a.arith(BinaryOp::Add, &b).unwrap(), Value::from(vec![11_i64, 22, 33]));
        assert_eq!(
            a.arith(BinaryOp::Mul, &Value::Float(0.5)).unwrap(),
            Value::from(vec![0.5, 1.0, 1.5])
        );
        assert_eq!(Value::Int(7).arith(BinaryOp::Div, &Value::Int(2)).unwrap(), Value::Float(3.5));
        assert_eq!(Value::Int(2).arith(BinaryOp::Pow, &Value::Int(10)).unwrap(), Value::Int(1024));
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let a = Value::from(vec![1_i64, 2]);
        let b = Value::from(vec![1_i64, 2, 3]);
        assert_eq!(
            a.arith(BinaryOp::Sub, &b),
            Err(ValueError::ShapeMismatch { lhs: 2, rhs: 3 })
        );
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(
            Value::Int(1).arith(BinaryOp::Div, &Value::Int(0)),
            Err(ValueError::DivisionByZero)
        );
        assert_eq!(
            Value::Float(1.0).arith(BinaryOp::Rem, &Value::Float(0.0)),
            Err(ValueError::DivisionByZero)
        );
    }

    #[test]
    fn mixed_type_equality_is_false_but_ordering_fails() {
        let s = Value::from("abc");
        assert_eq!(s.compare(CompareOp::Eq, &Value::Int(1)).unwrap(), Value::Bool(false));
        assert_eq!(s.compare(CompareOp::Ne, &Value::Int(1)).unwrap(), Value::Bool(true));
        assert!(matches!(
            s.compare(CompareOp::Lt, &Value::Int(1)),
            Err(ValueError::TypeMismatch { .. })
        ));
        assert_eq!(
            Value::Empty.compare(CompareOp::Gt, &Value::Int(1)),
            Err(ValueError::EmptyOperand(">"))
        );
    }

    #[test]
    fn unary_operations() {
        assert_eq!(Value::from(vec![-1.5, 2.0]).abs().unwrap(), Value::from(vec![1.5, 2.0]));
        assert_eq!(Value::Int(3).neg().unwrap(), Value::Int(-3));
        assert_eq!(Value::from(vec![true, false]).not().unwrap(), Value::from(vec![false, true]));
        assert!(Value::Empty.abs().is_err());
    }

    #[test]
    fn logical_ops_do_not_short_circuit_arrays() {
        let a = Value::from(vec![true, false]);
        let b = Value::from(vec![true, true]);
        assert_eq!(a.logical(LogicalOp::And, &b).unwrap(), Value::from(vec![true, false]));
        assert_eq!(a.logical(LogicalOp::Or, &b).unwrap(), Value::from(vec![true, true]));
    }

    #[test]
    fn json_conversion() {
        let json = serde_json::json!([1, 2.5, null, "x", [true]]);
        let v = Value::from_json(&json).unwrap();
        assert_eq!(v.len(), 5);
        assert_eq!(v.ndim(), 1);
        assert_eq!(v.to_json(), json);
        assert!(Value::from_json(&serde_json::json!({"a": 1})).is_none());
    }
}
