//! Meridian Portal - Client core for the patient/provider health portal.
//!
//! The portal screens are CRUD views over a managed backend platform that
//! supplies authentication, a relational row store with row-level access
//! policy, and a real-time change feed. This crate owns the client-side state
//! that sits between those screens and the platform:
//!
//! - [`services::session`] - who is logged in, derived from the platform's
//!   session plus its ordered auth-event stream
//! - [`services::notifications`] - the per-user notification list and unread
//!   counter, kept consistent across loads, user mutations, and pushed inserts
//! - [`services::messaging`] - conversation summaries with per-conversation
//!   unread counts
//! - [`services::appointments`] / [`services::health`] - the remaining CRUD
//!   surfaces
//!
//! # Architecture
//!
//! Platform access goes through the contracts in [`platform`]; the REST
//! implementations in [`platform::rest`] speak the platform's HTTP API.
//! Services take `Arc<dyn …>` handles so tests can substitute in-memory
//! doubles, and every piece of observable state fans out through a
//! `tokio::sync::watch` channel rather than living in a global.
//!
//! Teardown is explicit: managers that spawn event pumps expose `shutdown()`,
//! which cancels the pump and releases platform subscriptions. In-flight
//! requests are not forcibly cancelled; their results are discarded once the
//! owning manager has shut down.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod platform;
pub mod services;
pub mod state;

pub use config::{ConfigError, PortalConfig};
pub use error::{PortalError, Result};
pub use state::AppState;
