//! Core types for chatwire.
//!
//! This crate holds the identifiers shared by the client library and the CLI:
//!
//! - **Identifiers**: UUID-backed `ConversationId` and `MessageId`
//! - **Errors**: `IdError` for malformed identifier strings
//!
//! # Example
//!
//! ```
//! use chatwire_core::ConversationId;
//!
//! let id: ConversationId = "9f1b2c3d-4e5f-4a6b-8c7d-0e1f2a3b4c5d".parse().unwrap();
//! assert_eq!(id.to_string(), "9f1b2c3d-4e5f-4a6b-8c7d-0e1f2a3b4c5d");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;

pub use ids::{ConversationId, IdError, MessageId};
