use super::error_response;
use crate::job_controller::state::AppState;
use actix_web::{web, HttpResponse, Responder};

pub(crate) async fn process(
    document_id: web::Path<String>,
    state: web::Data<AppState>,
) -> impl Responder {
    match state.orchestrator.status(&document_id).await {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(e) => error_response(e),
    }
}
