//! Meridian Core - Shared types library.
//!
//! This crate provides common types used across all Meridian components:
//! - `portal` - Client library behind the patient/provider portal screens
//! - `integration-tests` - End-to-end scenarios over an in-memory platform
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no platform
//! access. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, role/status enums, and user preferences

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
