//! Team Contacts - shared address book resolution for multi-tenant contacts.
//!
//! Every tenant owns exactly one team address book holding one contact per
//! tenant user. This crate decides which of those contacts a user sees,
//! whether they may change them, and how list queries merge them with the
//! user's personal contacts.
//!
//! # Layout
//!
//! - [`services`] - The [`TeamContacts`] facade: locator, visibility
//!   resolver, access gate, query federator, lifecycle synchronizer
//! - [`hooks`] - Typed extension points the host platform calls into
//! - [`store`] - The [`store::SharedContactStore`] seam and the in-memory backend
//! - [`db`] - `PostgreSQL` backends for the unified and card store schemas
//! - [`identity`] - The identity oracle seam, session context and elevation
//! - [`query`] - Composable contact predicates and paging
//!
//! # Security
//!
//! The access gate only governs writes on team book contacts. Tenant-level
//! read visibility is the identity oracle's job and is checked before any
//! team book is located.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod hooks;
pub mod identity;
pub mod models;
pub mod query;
pub mod services;
pub mod store;

pub use config::{BackendKind, TeamContactsConfig, TeamPolicy};
pub use error::TeamContactsError;
pub use services::TeamContacts;
