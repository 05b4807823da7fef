//! Client side of the document generation service.
//!
//! `source` talks to the backend over HTTP, `poller` turns repeated status
//! reads into a converging per-artifact view for UIs and command-line tools.

pub mod error;
pub mod poller;
pub mod source;
