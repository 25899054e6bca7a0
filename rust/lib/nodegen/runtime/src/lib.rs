//! Reference interpreter for resolved node models.
//!
//! A [`Tree`] holds node instances of a [`ResolvedModel`](nodegen_ir::ResolvedModel)
//! and enforces its contracts dynamically: construction signatures, set-once
//! deferred fields, traversal order and the per-field clone steps. Emitted
//! code is expected to behave the same way.

pub mod error;
pub mod tree;
pub mod value;

pub use error::{Result, RuntimeError};
pub use tree::{ExternalCopier, Tree};
pub use value::{ExternalRef, NodeId, Value};
