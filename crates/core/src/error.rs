use thiserror::Error;

use crate::value::ValueError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid store URI: {0}")]
    InvalidUri(String),

    #[error("Store not found: {0}")]
    StoreNotFound(String),

    #[error("Malformed entity {name}/{occurrence}: {reason}")]
    MalformedEntity {
        name: String,
        occurrence: u32,
        reason: String,
    },

    #[error("Malformed tree at '{path}': {reason}")]
    MalformedTree { path: String, reason: String },

    #[error("Value error: {0}")]
    Value(#[from] ValueError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
