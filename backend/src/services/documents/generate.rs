//! # Generation Trigger Service
//!
//! Backs `POST /api/documents/{document_id}/generate`.
//!
//! ## Modes:
//!
//! - **Asynchronous** (default): starts every requested artifact that is not
//!   ready or already running and answers `202 Accepted` immediately with one
//!   acknowledgement per artifact. Clients poll the status endpoint afterwards.
//!
//! - **Synchronous** (`"wait": true`): additionally waits for the started tasks
//!   under the aggregate deadline and answers `200 OK` with the resulting
//!   record. Artifacts still running when the deadline fired are listed in
//!   `pending` and finish in the background.
//!
//! An absent body is the same as `{}`: all artifacts, asynchronous.

use super::error_response;
use crate::job_controller::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use common::requests::{GenerateRequest, GenerateResponse};

pub(crate) async fn process(
    state: web::Data<AppState>,
    document_id: web::Path<String>,
    request: Option<web::Json<GenerateRequest>>,
) -> impl Responder {
    let document_id = document_id.into_inner();
    let request = request.map(web::Json::into_inner).unwrap_or_default();
    let kinds = request.requested();
    let orchestrator = &state.orchestrator;

    let launch = match orchestrator.generate(&document_id, &kinds).await {
        Ok(launch) => launch,
        Err(e) => return error_response(e),
    };

    if !request.wait {
        return HttpResponse::Accepted().json(GenerateResponse {
            document_id,
            acknowledgements: launch.acknowledgements.clone(),
            overall_status: launch.overall_status,
            artifacts: None,
            pending: Vec::new(),
            timed_out: false,
        });
    }

    match orchestrator.wait(launch).await {
        Ok(outcome) => HttpResponse::Ok().json(GenerateResponse {
            document_id,
            acknowledgements: outcome.acknowledgements,
            overall_status: outcome.snapshot.overall_status,
            artifacts: Some(outcome.snapshot),
            pending: outcome.pending,
            timed_out: outcome.timed_out,
        }),
        Err(e) => error_response(e),
    }
}
