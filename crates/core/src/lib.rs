//! Team Contacts Core - Shared types library.
//!
//! This crate provides the types shared by every part of the team contacts
//! resolution layer:
//! - `team` - Visibility, access control, federation and lifecycle services
//! - `cli` - Migrations and backfill tooling
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access. The
//! `postgres` feature adds sqlx encode/decode impls for the id and email
//! newtypes so adapters can bind them directly.
//!
//! # Modules
//!
//! - [`types`] - Typed ids, e-mail addresses, platform roles and contact scopes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
