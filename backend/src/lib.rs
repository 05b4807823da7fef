//! Document content generation service.
//!
//! The backend keeps one artifact record per uploaded document and fans out
//! generation of its summary, quiz and flashcard deck to an external worker.
//! Each artifact moves through its own status machine and is persisted as soon
//! as its task finishes, so clients polling `GET /api/documents/{id}/status`
//! observe partial progress.

pub mod config;
pub mod error;
pub mod job_controller;
pub mod services;
pub mod store;
pub mod worker;
