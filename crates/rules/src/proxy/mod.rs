//! Observing access to entity trees.
//!
//! Rule bodies never see a raw [`Node`](ids_core::Node). They get an
//! [`Observed`] handle that navigates the tree and records every leaf it
//! reads in a touch log shared by all handles derived from the same root.
//! Operators are free functions over [`Operand`]s and return derived
//! handles carrying the merged provenance of their inputs.

mod helpers;
mod observed;
mod ops;


pub use self::helpers::{all, any, approx, decreasing, exists, increasing, select, SelectOptions};
pub use self::observed::{FieldRef, Observed, TouchLog};
pub use self::ops::{absolute, arith, compare, logical, negate, not, observe, Operand};

use ids_core::ValueError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProxyError {
    #[error("value is already observed; observe() only wraps plain values")]
    AlreadyWrapped,

    #[error("'{path}' has no field '{name}'")]
    MissingField { path: String, name: String },

    #[error("'{path}' is a {kind}, not a structure")]
    NotAStructure { path: String, kind: &'static str },

    #[error("'{path}' cannot be indexed")]
    NotIndexable { path: String },

    #[error("index {index} out of range for '{path}' of length {len}")]
    IndexOutOfRange { path: String, index: i64, len: usize },

    #[error("'{path}' is a {kind}; only leaf values can be read")]
    NotALeaf { path: String, kind: &'static str },

    #[error("cannot go up {levels} level(s) from '{path}'")]
    NoParent { path: String, levels: usize },

    #[error("'{path}' is not part of an entity tree")]
    Detached { path: String },

    #[error("{function} expects {expected}, got {got}")]
    Unsupported {
        function: &'static str,
        expected: &'static str,
        got: String,
    },

    #[error("invalid selection pattern: {0}")]
    InvalidPattern(String),

    #[error(transparent)]
    Value(#[from] ValueError),
}
