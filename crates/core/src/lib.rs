//! Shared data model for the validator: configuration, leaf values, the
//! navigable entity tree and the backing-store contract.

pub mod config;
pub mod entity;
pub mod error;
pub mod node;
pub mod store;
pub mod value;

pub use config::Config;
pub use entity::*;
pub use error::*;
pub use node::*;
pub use store::*;
pub use value::*;
