mod support;

use async_trait::async_trait;
use backend::error::OrchestratorError;
use backend::job_controller::orchestrator::Orchestrator;
use backend::job_controller::state::TaskOutcome;
use backend::store::ArtifactStore;
use backend::worker::{GenerationInput, GenerationWorker, WorkerError};
use common::jobs::LaunchAck;
use common::model::artifact::{ArtifactKind, ArtifactPayload, ArtifactStatus, OverallStatus};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use support::{
    default_payload, flashcards, orchestrator, quiz, settle, summary, Reply, ScriptedWorker,
};

const DEADLINE: Duration = Duration::from_secs(600);

fn all() -> BTreeSet<ArtifactKind> {
    ArtifactKind::ALL.into_iter().collect()
}

fn only(kind: ArtifactKind) -> BTreeSet<ArtifactKind> {
    BTreeSet::from([kind])
}

/// Fails `failing` after `fail_after` while its siblings succeed after `succeed_after`.
async fn assert_failure_is_isolated(
    failing: ArtifactKind,
    fail_after: Duration,
    succeed_after: Duration,
) {
    let mut worker =
        ScriptedWorker::new().script(failing, Reply::fail("model overloaded").after(fail_after));
    for kind in ArtifactKind::ALL.into_iter().filter(|kind| *kind != failing) {
        worker = worker.script(kind, Reply::ok(default_payload(kind)).after(succeed_after));
    }
    let orchestrator = orchestrator(Arc::new(worker), DEADLINE);

    let outcome = orchestrator.generate_and_wait("d1", &all()).await.unwrap();
    assert!(!outcome.timed_out);
    assert!(outcome.pending.is_empty());

    for kind in ArtifactKind::ALL {
        let state = outcome.snapshot.artifact(kind);
        if kind == failing {
            assert_eq!(state.status, ArtifactStatus::Error);
            assert!(state.payload.is_none());
            assert!(state.error.as_deref().unwrap().contains("model overloaded"));
        } else {
            assert_eq!(state.status, ArtifactStatus::Ready, "{} should be ready", kind);
            assert!(state.payload.is_some());
        }
    }
    assert_eq!(outcome.snapshot.overall_status, OverallStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn late_failure_leaves_siblings_ready() {
    for failing in ArtifactKind::ALL {
        assert_failure_is_isolated(failing, Duration::from_secs(5), Duration::ZERO).await;
    }
}

#[tokio::test(start_paused = true)]
async fn early_failure_leaves_slower_siblings_ready() {
    for failing in ArtifactKind::ALL {
        assert_failure_is_isolated(failing, Duration::ZERO, Duration::from_secs(5)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn generate_while_processing_does_not_start_a_second_task() {
    let worker = Arc::new(ScriptedWorker::new().script(
        ArtifactKind::Summary,
        Reply::ok(summary("Cells are the unit of life.")).after(Duration::from_secs(30)),
    ));
    let orchestrator = orchestrator(Arc::clone(&worker), DEADLINE);

    let first = orchestrator
        .generate("d1", &only(ArtifactKind::Summary))
        .await
        .unwrap();
    assert_eq!(first.acknowledgements[&ArtifactKind::Summary], LaunchAck::Launched);
    assert_eq!(first.overall_status, OverallStatus::Processing);

    let second = orchestrator
        .generate("d1", &only(ArtifactKind::Summary))
        .await
        .unwrap();
    assert_eq!(
        second.acknowledgements[&ArtifactKind::Summary],
        LaunchAck::AlreadyProcessing
    );
    assert_eq!(second.launched(), 0);

    let outcome = orchestrator.wait(first).await.unwrap();
    assert_eq!(outcome.snapshot.summary.status, ArtifactStatus::Ready);
    assert_eq!(worker.calls(ArtifactKind::Summary), 1);

    let third = orchestrator
        .generate("d1", &only(ArtifactKind::Summary))
        .await
        .unwrap();
    assert_eq!(
        third.acknowledgements[&ArtifactKind::Summary],
        LaunchAck::AlreadyReady
    );
    settle().await;
    assert_eq!(worker.calls(ArtifactKind::Summary), 1);
}

#[tokio::test(start_paused = true)]
async fn regenerate_replaces_a_ready_payload() {
    let worker = Arc::new(
        ScriptedWorker::new()
            .script(ArtifactKind::Quiz, Reply::ok(quiz(2)))
            .script(ArtifactKind::Quiz, Reply::ok(quiz(5))),
    );
    let orchestrator = orchestrator(Arc::clone(&worker), DEADLINE);

    let outcome = orchestrator
        .generate_and_wait("d1", &only(ArtifactKind::Quiz))
        .await
        .unwrap();
    assert_eq!(outcome.snapshot.quiz.payload, Some(quiz(2)));

    let launch = orchestrator.regenerate("d1", ArtifactKind::Quiz).await.unwrap();
    assert_eq!(launch.acknowledgements[&ArtifactKind::Quiz], LaunchAck::Launched);
    let snapshot = orchestrator.status("d1").await.unwrap();
    assert_eq!(snapshot.quiz.status, ArtifactStatus::Processing);
    assert!(snapshot.quiz.payload.is_none());

    let outcome = orchestrator.wait(launch).await.unwrap();
    assert_eq!(outcome.snapshot.quiz.status, ArtifactStatus::Ready);
    assert_eq!(outcome.snapshot.quiz.payload, Some(quiz(5)));
    assert_eq!(outcome.snapshot.quiz.epoch, 2);
    assert_eq!(worker.calls(ArtifactKind::Quiz), 2);
}

#[tokio::test(start_paused = true)]
async fn empty_quiz_is_an_error() {
    let worker = Arc::new(ScriptedWorker::new().script(ArtifactKind::Quiz, Reply::ok(quiz(0))));
    let orchestrator = orchestrator(worker, DEADLINE);

    let outcome = orchestrator
        .generate_and_wait("d1", &only(ArtifactKind::Quiz))
        .await
        .unwrap();
    assert_eq!(outcome.snapshot.quiz.status, ArtifactStatus::Error);
    assert!(outcome.snapshot.quiz.payload.is_none());
    assert!(outcome.snapshot.quiz.error.as_deref().unwrap().contains("empty"));
    assert!(matches!(
        outcome.completions[0].outcome,
        TaskOutcome::Failed(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn empty_flashcard_deck_makes_the_document_error_while_others_stay_ready() {
    let worker = Arc::new(
        ScriptedWorker::new()
            .script(
                ArtifactKind::Summary,
                Reply::ok(summary("Mitochondria produce ATP.")).after(Duration::from_secs(3)),
            )
            .script(ArtifactKind::Quiz, Reply::ok(quiz(2)).after(Duration::from_secs(7)))
            .script(ArtifactKind::Flashcards, Reply::ok(flashcards(0))),
    );
    let orchestrator = orchestrator(worker, DEADLINE);

    let outcome = orchestrator.generate_and_wait("d1", &all()).await.unwrap();
    let record = &outcome.snapshot;
    assert_eq!(record.summary.status, ArtifactStatus::Ready);
    assert_eq!(
        record.summary.payload,
        Some(summary("Mitochondria produce ATP."))
    );
    assert_eq!(record.quiz.status, ArtifactStatus::Ready);
    assert_eq!(record.quiz.payload.as_ref().map(ArtifactPayload::len), Some(2));
    assert_eq!(record.flashcards.status, ArtifactStatus::Error);
    assert_eq!(record.overall_status, OverallStatus::Error);
    assert_eq!(outcome.completions.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn aggregate_timeout_reports_pending_and_task_still_persists() {
    let worker = Arc::new(ScriptedWorker::new().script(
        ArtifactKind::Flashcards,
        Reply::ok(flashcards(6)).after(Duration::from_secs(900)),
    ));
    let orchestrator = orchestrator(worker, DEADLINE);

    let outcome = orchestrator.generate_and_wait("d1", &all()).await.unwrap();
    assert!(outcome.timed_out);
    assert_eq!(outcome.pending, vec![ArtifactKind::Flashcards]);
    assert_eq!(outcome.snapshot.summary.status, ArtifactStatus::Ready);
    assert_eq!(outcome.snapshot.quiz.status, ArtifactStatus::Ready);
    assert_eq!(outcome.snapshot.flashcards.status, ArtifactStatus::Processing);
    assert_eq!(outcome.snapshot.overall_status, OverallStatus::Processing);

    tokio::time::sleep(Duration::from_secs(400)).await;

    let record = orchestrator.status("d1").await.unwrap();
    assert_eq!(record.flashcards.status, ArtifactStatus::Ready);
    assert_eq!(record.flashcards.payload, Some(flashcards(6)));
    assert_eq!(record.overall_status, OverallStatus::Processed);
}

#[tokio::test(start_paused = true)]
async fn result_of_a_superseded_attempt_is_discarded() {
    let worker = Arc::new(
        ScriptedWorker::new()
            .script(
                ArtifactKind::Summary,
                Reply::ok(summary("outdated")).after(Duration::from_secs(100)),
            )
            .script(ArtifactKind::Summary, Reply::ok(summary("current"))),
    );
    let orchestrator = orchestrator(worker, DEADLINE);

    let old = orchestrator
        .generate("d1", &only(ArtifactKind::Summary))
        .await
        .unwrap();
    settle().await;
    let new = orchestrator
        .regenerate("d1", ArtifactKind::Summary)
        .await
        .unwrap();

    let outcome = orchestrator.wait(new).await.unwrap();
    assert_eq!(outcome.snapshot.summary.payload, Some(summary("current")));

    let outcome = orchestrator.wait(old).await.unwrap();
    assert!(!outcome.timed_out);
    assert_eq!(outcome.completions[0].epoch, 1);
    assert_eq!(outcome.completions[0].outcome, TaskOutcome::Superseded);
    assert_eq!(outcome.snapshot.summary.status, ArtifactStatus::Ready);
    assert_eq!(outcome.snapshot.summary.payload, Some(summary("current")));
    assert_eq!(outcome.snapshot.summary.epoch, 2);
}

#[tokio::test(start_paused = true)]
async fn unknown_document_is_a_hard_error() {
    let orchestrator = orchestrator(Arc::new(ScriptedWorker::new()), DEADLINE);

    assert!(matches!(
        orchestrator.generate("missing", &all()).await,
        Err(OrchestratorError::DocumentNotFound(id)) if id == "missing"
    ));
    assert!(matches!(
        orchestrator.regenerate("missing", ArtifactKind::Quiz).await,
        Err(OrchestratorError::DocumentNotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn registering_with_auto_generate_starts_every_artifact() {
    let worker = Arc::new(ScriptedWorker::new());
    let orchestrator = orchestrator(Arc::clone(&worker), DEADLINE);

    let record = orchestrator.register("d2", "chemistry.pdf", true).await.unwrap();
    assert_eq!(record.statuses(), [ArtifactStatus::Processing; 3]);
    assert_eq!(record.overall_status, OverallStatus::Processing);

    settle().await;
    let record = orchestrator.status("d2").await.unwrap();
    assert_eq!(record.overall_status, OverallStatus::Processed);
    for kind in ArtifactKind::ALL {
        assert_eq!(worker.calls(kind), 1);
    }

    let manual = orchestrator.register("d3", "physics.pdf", false).await.unwrap();
    assert_eq!(manual.overall_status, OverallStatus::Uploaded);

    assert!(matches!(
        orchestrator.register("d3", "physics.pdf", false).await,
        Err(OrchestratorError::AlreadyExists(_))
    ));
}

struct PanickingWorker;

#[async_trait]
impl GenerationWorker for PanickingWorker {
    async fn generate(
        &self,
        _input: &GenerationInput,
        _kind: ArtifactKind,
    ) -> Result<ArtifactPayload, WorkerError> {
        panic!("worker crashed");
    }

    async fn health(&self) -> bool {
        false
    }
}

#[tokio::test(start_paused = true)]
async fn panicking_worker_call_ends_as_error() {
    let store = ArtifactStore::open_in_memory().unwrap();
    store.create("d1", "notes.txt").unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(store),
        Arc::new(PanickingWorker),
        "/tmp".into(),
        DEADLINE,
    );

    let outcome = orchestrator
        .generate_and_wait("d1", &only(ArtifactKind::Summary))
        .await
        .unwrap();
    assert_eq!(outcome.snapshot.summary.status, ArtifactStatus::Error);
    assert!(outcome
        .snapshot
        .summary
        .error
        .as_deref()
        .unwrap()
        .contains("aborted"));
}

#[tokio::test]
async fn store_failure_while_completing_still_ends_the_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("artifacts.sqlite");
    let store = ArtifactStore::open(&path).unwrap();
    store.create("d1", "notes.txt").unwrap();
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER reject_ready BEFORE UPDATE OF status ON artifacts
             WHEN NEW.status = 'READY'
             BEGIN SELECT RAISE(ABORT, 'disk quota exceeded'); END;",
        )
        .unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(store),
        Arc::new(ScriptedWorker::new()),
        dir.path().to_path_buf(),
        DEADLINE,
    );

    let outcome = orchestrator
        .generate_and_wait("d1", &only(ArtifactKind::Summary))
        .await
        .unwrap();
    assert_eq!(outcome.snapshot.summary.status, ArtifactStatus::Error);
    assert!(outcome
        .snapshot
        .summary
        .error
        .as_deref()
        .unwrap()
        .contains("disk quota exceeded"));
    assert!(matches!(
        outcome.completions[0].outcome,
        TaskOutcome::Failed(_)
    ));

    let retry = orchestrator
        .generate("d1", &only(ArtifactKind::Summary))
        .await
        .unwrap();
    assert_eq!(retry.acknowledgements[&ArtifactKind::Summary], LaunchAck::Launched);
}
