//! Core types for team contacts.
//!
//! This module provides type-safe wrappers for the identity and contact
//! concepts the resolution layer reasons about.

pub mod email;
pub mod id;
pub mod role;
pub mod scope;

pub use email::{Email, EmailError};
pub use id::*;
pub use role::UserRole;
pub use scope::{Access, ContactScope};
