//! Mirth Migrator web service client
//!
//! Transport, session handling and wire models of the migrator API.

pub mod client;
pub mod endpoints;
pub mod models;
pub mod session;
pub mod version;

pub use client::{HttpTransport, Transport};
pub use endpoints::Endpoint;
pub use session::{ApiCall, BusyIndicator, CallOutcome, LoginPrompt, ServerFailure, SessionGuard};
