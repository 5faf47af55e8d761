use std::collections::BTreeSet;

use ids_core::{BinaryOp, CompareOp, LogicalOp, Value};

use super::{FieldRef, Observed, ProxyError};

/// Either side of an operator: an observed handle or a plain scalar.
#[derive(Debug, Clone)]
pub enum Operand {
    Node(Observed),
    Scalar(Value),
}

impl Operand {
    /// Unwrap to a raw value plus the leaves it came from. Tree leaves are
    /// logged as touched.
    pub fn read(&self) -> Result<(Value, BTreeSet<FieldRef>), ProxyError> {
        match self {
            Operand::Node(observed) => observed.read(),
            Operand::Scalar(value) => Ok((value.clone(), BTreeSet::new())),
        }
    }

    /// Promote to a handle; scalars become derived values with no provenance.
    pub fn into_observed(self) -> Observed {
        match self {
            Operand::Node(observed) => observed,
            Operand::Scalar(value) => Observed::derived(value, BTreeSet::new()),
        }
    }
}

impl From<Observed> for Operand {
    fn from(o: Observed) -> Self {
        Operand::Node(o)
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Scalar(v)
    }
}

impl From<i64> for Operand {
    fn from(i: i64) -> Self {
        Operand::Scalar(Value::Int(i))
    }
}

impl From<f64> for Operand {
    fn from(x: f64) -> Self {
        Operand::Scalar(Value::Float(x))
    }
}

impl From<bool> for Operand {
    fn from(b: bool) -> Self {
        Operand::Scalar(Value::Bool(b))
    }
}

fn binary(
    lhs: &Operand,
    rhs: &Operand,
    apply: impl FnOnce(&Value, &Value) -> Result<Value, ids_core::ValueError>,
) -> Result<Observed, ProxyError> {
    let (a, mut provenance) = lhs.read()?;
    let (b, rhs_provenance) = rhs.read()?;
    let value = apply(&a, &b)?;
    provenance.extend(rhs_provenance);
    Ok(Observed::derived(value, provenance))
}

fn unary(
    operand: &Operand,
    apply: impl FnOnce(&Value) -> Result<Value, ids_core::ValueError>,
) -> Result<Observed, ProxyError> {
    let (value, provenance) = operand.read()?;
    Ok(Observed::derived(apply(&value)?, provenance))
}

pub fn compare(lhs: &Operand, op: CompareOp, rhs: &Operand) -> Result<Observed, ProxyError> {
    binary(lhs, rhs, |a, b| a.compare(op, b))
}

pub fn arith(lhs: &Operand, op: BinaryOp, rhs: &Operand) -> Result<Observed, ProxyError> {
    binary(lhs, rhs, |a, b| a.arith(op, b))
}

/// Non-short-circuit `&` / `|`: both sides are always read.
pub fn logical(lhs: &Operand, op: LogicalOp, rhs: &Operand) -> Result<Observed, ProxyError> {
    binary(lhs, rhs, |a, b| a.logical(op, b))
}

pub fn negate(operand: &Operand) -> Result<Observed, ProxyError> {
    unary(operand, Value::neg)
}

pub fn absolute(operand: &Operand) -> Result<Observed, ProxyError> {
    unary(operand, Value::abs)
}

pub fn not(operand: &Operand) -> Result<Observed, ProxyError> {
    unary(operand, Value::not)
}

/// Wrap a plain value. Wrapping an already observed value is refused.
pub fn observe(operand: Operand) -> Result<Observed, ProxyError> {
    match operand {
        Operand::Node(_) => Err(ProxyError::AlreadyWrapped),
        Operand::Scalar(value) => Ok(Observed::derived(value, BTreeSet::new())),
    }
}
