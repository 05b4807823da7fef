//! # Document Service Module
//!
//! Routes every request under `/api/documents` to its handler. Handlers stay
//! thin: they translate HTTP into calls on the `Orchestrator` held by
//! `AppState` and map its errors back to status codes.
//!
//! ## Sub-modules:
//! - `register`: records a freshly uploaded document and optionally starts generation.
//! - `generate`: starts generation of some or all artifacts, optionally waiting for them.
//! - `regenerate`: forces a new generation attempt of a single artifact.
//! - `get_status`: returns the stored state of a document's artifacts.

mod generate;
mod get_status;
mod regenerate;
mod register;

use crate::error::OrchestratorError;
use actix_web::web::{get, post, scope};
use actix_web::{HttpResponse, Scope};
use log::error;

/// The base path for all document-related API endpoints.
const API_PATH: &str = "/api/documents";

/// Configures and returns the Actix `Scope` for all document-related routes.
///
/// # Registered Routes:
///
/// *   **`POST /`**: `register::process`. Creates the artifact record of an
///     uploaded document. `201 Created`, or `409 Conflict` for a known id.
///
/// *   **`POST /{document_id}/generate`**: `generate::process`. Starts the
///     requested artifacts. `202 Accepted` with per-artifact acknowledgements,
///     or `200 OK` with the final state when the body asks to wait.
///
/// *   **`POST /{document_id}/regenerate/{artifact}`**: `regenerate::process`.
///     `202 Accepted`, or `400 Bad Request` for an unknown artifact name.
///
/// *   **`GET /{document_id}/status`**: `get_status::process`.
///
/// Unknown documents answer `404 Not Found` everywhere.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", post().to(register::process))
        .route("/{document_id}/generate", post().to(generate::process))
        .route(
            "/{document_id}/regenerate/{artifact}",
            post().to(regenerate::process),
        )
        .route("/{document_id}/status", get().to(get_status::process))
}

fn error_response(err: OrchestratorError) -> HttpResponse {
    match err {
        OrchestratorError::DocumentNotFound(id) => {
            HttpResponse::NotFound().body(format!("Document not found: {}", id))
        }
        OrchestratorError::AlreadyExists(id) => {
            HttpResponse::Conflict().body(format!("Document already exists: {}", id))
        }
        OrchestratorError::Store(e) => {
            error!("Artifact store failure: {}", e);
            HttpResponse::ServiceUnavailable().body(format!("Artifact store error: {}", e))
        }
    }
}
