//! Backs `POST /api/documents/{document_id}/regenerate/{artifact}`: forces a new
//! attempt of one artifact regardless of its status.

use super::error_response;
use crate::job_controller::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use common::model::artifact::ArtifactKind;
use common::requests::GenerateResponse;

pub(crate) async fn process(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (document_id, artifact) = path.into_inner();
    let kind: ArtifactKind = match artifact.parse() {
        Ok(kind) => kind,
        Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
    };

    match state.orchestrator.regenerate(&document_id, kind).await {
        Ok(launch) => HttpResponse::Accepted().json(GenerateResponse {
            document_id,
            acknowledgements: launch.acknowledgements.clone(),
            overall_status: launch.overall_status,
            artifacts: None,
            pending: Vec::new(),
            timed_out: false,
        }),
        Err(e) => error_response(e),
    }
}
