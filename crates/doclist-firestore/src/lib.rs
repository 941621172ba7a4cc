//! Firestore REST collection lister.
//!
//! This crate provides:
//! - `FirestoreClient::list_all`, which follows continuation tokens until a
//!   collection is exhausted and returns every document
//! - Typed decoding of document fields through serde
//! - Static bearer tokens or service account authentication via gcp_auth
//! - Tracing spans and metrics for every request

pub mod auth;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod fields;
pub mod list;
pub mod metrics;
pub mod types;


pub use auth::{Credentials, GcpTokenSource, MintedToken, TokenCache, TokenSource};
pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use fields::{extract_fields, TypedDocument};
pub use list::{ListArg, ListArgs, ListOptions};
pub use types::{Document, FromFirestoreValue, ListDocumentsResponse, Value};
