//! nodegen Intermediate Representation (IR)
//!
//! Plain data structures shared between:
//! - schema front-ends (`.nodes` DSL and JSON)
//! - resolver (hierarchy flattening + policy derivation)
//! - emitters and the reference interpreter
//!
//! Two layers:
//! 1. Schema:   what the author declares (node descriptors, fields, policies)
//! 2. Resolved: the per-class contract handed to renderers

pub mod types;
pub mod node;
pub mod schema;
pub mod resolved;

pub use types::*;
pub use node::*;
pub use schema::*;
pub use resolved::*;
