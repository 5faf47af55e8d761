//! Read-only query helpers available to rule bodies.

use std::collections::BTreeSet;

use ids_core::{strip_indices, BinaryOp, CompareOp, Value};
use regex::Regex;

use super::{FieldRef, Observed, Operand, ProxyError};

#[derive(Debug, Clone, Copy)]
pub struct SelectOptions {
    /// Skip nodes without a value.
    pub has_value: bool,
    /// Only return leaves, not structures or arrays of structures.
    pub leaf_only: bool,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            has_value: true,
            leaf_only: true,
        }
    }
}

/// Descendants of `root` whose index-free relative path matches `pattern`
/// (regex search, e.g. `(^|/)time$`), in depth-first order.
pub fn select(root: &Observed, pattern: &str, options: SelectOptions) -> Result<Vec<Observed>, ProxyError> {
    let re = Regex::new(pattern).map_err(|e| ProxyError::InvalidPattern(e.to_string()))?;
    let mut out = Vec::new();
    for (relative, node) in root.descendants()? {
        if options.leaf_only && !node.is_leaf() {
            continue;
        }
        let filled = node.node().is_some_and(|n| n.has_value());
        if options.has_value && !filled {
            continue;
        }
        if re.is_match(&strip_indices(&relative)) {
            out.push(node);
        }
    }
    Ok(out)
}

/// Strictly increasing 1-D numeric array.
pub fn increasing(operand: &Operand) -> Result<Observed, ProxyError> {
    monotonic(operand, "increasing", |a, b| a < b)
}

/// Strictly decreasing 1-D numeric array.
pub fn decreasing(operand: &Operand) -> Result<Observed, ProxyError> {
    monotonic(operand, "decreasing", |a, b| a > b)
}

fn monotonic(operand: &Operand, function: &'static str, ordered: fn(f64, f64) -> bool) -> Result<Observed, ProxyError> {
    let (value, provenance) = operand.read()?;
    let numbers = numeric_vector(&value, function)?;
    let ok = numbers.windows(2).all(|w| ordered(w[0], w[1]));
    Ok(Observed::derived(Value::Bool(ok), provenance))
}

fn numeric_vector(value: &Value, function: &'static str) -> Result<Vec<f64>, ProxyError> {
    let unsupported = || ProxyError::Unsupported {
        function,
        expected: "a 1-D numeric array",
        got: value.type_name().to_string(),
    };
    let items = value.as_array().ok_or_else(unsupported)?;
    items.iter().map(|v| v.as_f64().ok_or_else(unsupported)).collect()
}

/// Elementwise `|a - b| <= atol + rtol * |b|`.
pub fn approx(a: &Operand, b: &Operand, rtol: f64, atol: f64) -> Result<Observed, ProxyError> {
    let (x, mut provenance) = a.read()?;
    let (y, rhs_provenance) = b.read()?;
    provenance.extend(rhs_provenance);

    let diff = x.arith(BinaryOp::Sub, &y)?.abs()?;
    let tolerance = y
        .abs()?
        .arith(BinaryOp::Mul, &Value::Float(rtol))?
        .arith(BinaryOp::Add, &Value::Float(atol))?;
    let close = diff.compare(CompareOp::Le, &tolerance)?;
    Ok(Observed::derived(close, provenance))
}

/// Whether the node holds a value; the node counts as touched.
pub fn exists(node: &Observed) -> Observed {
    let filled = node.has_value();
    Observed::derived(Value::Bool(filled), node.provenance())
}

/// Conjunction over every element (vacuously true when empty).
pub fn all(operand: &Operand) -> Result<Observed, ProxyError> {
    reduce(operand, Value::truthy)
}

/// Disjunction over every scalar element; a scalar is its own truthiness.
pub fn any(operand: &Operand) -> Result<Observed, ProxyError> {
    reduce(operand, any_scalar)
}

fn any_scalar(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().any(any_scalar),
        other => other.truthy(),
    }
}

fn reduce(operand: &Operand, f: impl Fn(&Value) -> bool) -> Result<Observed, ProxyError> {
    let (value, provenance): (Value, BTreeSet<FieldRef>) = operand.read()?;
    Ok(Observed::derived(Value::Bool(f(&value)), provenance))
}
