use clap::{Parser, Subcommand};
use client::error::ClientError;
use client::poller::{ArtifactView, PollerConfig, ReadinessPoller};
use client::source::HttpStatusSource;
use common::model::artifact::ArtifactKind;
use common::requests::{GenerateRequest, GenerateResponse};
use env_logger::Env;
use log::error;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Trigger artifact generation and watch documents until their artifacts are ready.
#[derive(Parser, Debug)]
#[command(name = "studydeck-watch", version, about)]
struct Cli {
    /// Base URL of the backend.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Seconds between two status checks of the same artifact.
    #[arg(long, global = true, default_value_t = 30)]
    interval_secs: u64,

    /// Status checks per artifact before giving up.
    #[arg(long, global = true, default_value_t = 30)]
    max_attempts: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start generation of some or all artifacts of a document.
    Generate {
        document_id: String,
        /// Artifact to generate (repeatable). Defaults to all.
        #[arg(long = "artifact")]
        artifacts: Vec<ArtifactKind>,
        /// Block until the server reports the final state.
        #[arg(long)]
        wait: bool,
    },
    /// Force a new attempt of one artifact.
    Regenerate {
        document_id: String,
        artifact: ArtifactKind,
    },
    /// Poll documents until every watched artifact is ready or failed.
    Watch {
        #[arg(required = true)]
        document_ids: Vec<String>,
        /// Artifact to watch (repeatable). Defaults to all.
        #[arg(long = "artifact")]
        artifacts: Vec<ArtifactKind>,
    },
}

fn selected(artifacts: Vec<ArtifactKind>) -> Vec<ArtifactKind> {
    if artifacts.is_empty() {
        ArtifactKind::ALL.to_vec()
    } else {
        artifacts
    }
}

fn print_response(response: &GenerateResponse) {
    for (kind, ack) in &response.acknowledgements {
        println!("{:<10} {:?}", kind, ack);
    }
    if let Some(record) = &response.artifacts {
        for kind in ArtifactKind::ALL {
            let state = record.artifact(kind);
            match &state.error {
                Some(reason) => println!("{:<10} {} ({})", kind, state.status, reason),
                None => println!("{:<10} {}", kind, state.status),
            }
        }
    }
    if response.timed_out {
        println!("still processing: {:?}", response.pending);
    }
    println!("overall    {}", response.overall_status);
}

async fn run(cli: Cli) -> Result<bool, ClientError> {
    let source = Arc::new(HttpStatusSource::new(&cli.server)?);

    match cli.command {
        Command::Generate {
            document_id,
            artifacts,
            wait,
        } => {
            let request = GenerateRequest {
                artifacts: Some(selected(artifacts)),
                wait,
            };
            let response = source.generate(&document_id, &request).await?;
            print_response(&response);
            Ok(true)
        }
        Command::Regenerate {
            document_id,
            artifact,
        } => {
            let response = source.regenerate(&document_id, artifact).await?;
            print_response(&response);
            Ok(true)
        }
        Command::Watch {
            document_ids,
            artifacts,
        } => {
            let config = PollerConfig {
                interval: Duration::from_secs(cli.interval_secs),
                max_attempts: cli.max_attempts,
            };
            let (tx, mut rx) = mpsc::channel(100);
            let poller = ReadinessPoller::new(source, config).with_updates(tx);
            let handles = poller.observe(document_ids, &selected(artifacts));
            let printer = tokio::spawn(async move {
                while let Some(update) = rx.recv().await {
                    println!(
                        "{} {:<10} {}",
                        update.key.document_id, update.key.kind, update.view
                    );
                }
            });

            let mut all_ready = true;
            for handle in handles {
                if let Err(e) = handle.await {
                    error!("Poll loop failed: {}", e);
                    all_ready = false;
                }
            }
            let views = poller.views().await;
            drop(poller);
            if let Err(e) = printer.await {
                error!("Update printer failed: {}", e);
            }

            for (key, view) in &views {
                if !view.is_terminal() {
                    println!("{} {:<10} not started", key.document_id, key.kind);
                }
            }
            Ok(all_ready && views.values().all(|view| matches!(view, ArtifactView::Ready(_))))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
