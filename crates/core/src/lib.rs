//! # domaineval core
//!
//! Value, context and identity types for the domain expression engine.
//! This crate has **no engine logic**. It defines the data that expressions
//! are evaluated against and the seam through which the acting user is
//! supplied.

pub mod context;
pub mod error;
pub mod identity;
pub mod value;

// Re-export key types at crate root for ergonomics
pub use context::{Context, Scope, USER_KEY};
pub use error::{Error, IdentityError, Result};
pub use identity::{
    Anonymous, IdentitySource, Role, SessionIdentity, StaticIdentity, UserContext, UserSource,
};
pub use value::{LabelKey, Value};
