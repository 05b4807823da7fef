//! # Document Registration Service
//!
//! Backs `POST /api/documents`. The upload layer stores the document bytes as
//! `{uploads_dir}/{document_id}_{document_name}` and then registers the
//! document here, which creates its artifact record with every artifact
//! `UPLOADED`.
//!
//! Unless the request or the configuration says otherwise, generation of all
//! three artifacts starts right away in the background; the response then
//! already shows them as `PROCESSING`.

use super::error_response;
use crate::job_controller::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use common::requests::RegisterDocumentRequest;
use uuid::Uuid;

pub(crate) async fn process(
    state: web::Data<AppState>,
    request: web::Json<RegisterDocumentRequest>,
) -> impl Responder {
    let RegisterDocumentRequest {
        document_id,
        document_name,
        auto_generate,
    } = request.into_inner();

    if document_name.trim().is_empty() {
        return HttpResponse::BadRequest().body("document_name must not be empty");
    }
    let document_id = document_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let auto_generate = auto_generate.unwrap_or(state.auto_generate);

    match state
        .orchestrator
        .register(&document_id, &document_name, auto_generate)
        .await
    {
        Ok(record) => HttpResponse::Created().json(record),
        Err(e) => error_response(e),
    }
}
