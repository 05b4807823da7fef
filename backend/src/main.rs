use actix_web::{web, App, HttpServer};
use backend::config::Config;
use backend::job_controller::orchestrator::Orchestrator;
use backend::job_controller::state::AppState;
use backend::services;
use backend::store::ArtifactStore;
use backend::worker::HttpGenerationWorker;
use env_logger::Env;
use log::{info, warn};
use std::io;
use std::sync::Arc;

fn startup_error<E: std::fmt::Display>(context: &str, err: E) -> io::Error {
    io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| startup_error("invalid configuration", e))?;
    tokio::fs::create_dir_all(&config.uploads_dir).await?;

    let store = ArtifactStore::open(&config.db_path)
        .map_err(|e| startup_error("cannot open artifact store", e))?;
    let worker = HttpGenerationWorker::new(&config.worker_url, config.worker_timeout)
        .map_err(|e| startup_error("cannot create worker client", e))?;

    let orchestrator = Orchestrator::new(
        Arc::new(store),
        Arc::new(worker),
        config.uploads_dir.clone(),
        config.aggregate_timeout,
    );
    if !orchestrator.worker().health().await {
        warn!(
            "Generation worker at {} is not healthy; artifacts will fail until it is",
            config.worker_url
        );
    }

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        auto_generate: config.auto_generate,
    };

    info!(
        "Server running at http://{}:{} (database {}, worker {})",
        config.host,
        config.port,
        config.db_path.display(),
        config.worker_url
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(services::documents::configure_routes())
            .service(services::health::configure_routes())
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
