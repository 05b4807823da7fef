//! Types shared between the backend service and its clients.
//!
//! Everything that crosses the HTTP boundary lives here so both sides agree on
//! the wire format: artifact kinds and statuses, the typed payloads, the
//! per-document artifact record and the request/response bodies.

pub mod jobs;
pub mod model;
pub mod requests;
