//! HTTP surface of the backend.
//!
//! - `documents`: registration, generation triggers and status of documents.
//! - `health`: availability of the service and of the generation worker.

pub mod documents;
pub mod health;
