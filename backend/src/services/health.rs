//! Backs `GET /api/health`. The service itself is up whenever it answers; the
//! status is `degraded` while the generation worker does not report healthy.

use crate::job_controller::state::AppState;
use actix_web::web::{get, scope};
use actix_web::{web, HttpResponse, Responder, Scope};
use serde::Serialize;

const API_PATH: &str = "/api/health";

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    worker: bool,
}

pub fn configure_routes() -> Scope {
    scope(API_PATH).route("", get().to(process))
}

async fn process(state: web::Data<AppState>) -> impl Responder {
    let worker = state.orchestrator.worker().health().await;
    HttpResponse::Ok().json(HealthReport {
        status: if worker { "healthy" } else { "degraded" },
        worker,
    })
}
