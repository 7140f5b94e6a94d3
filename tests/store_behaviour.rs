// One behavioural suite, run against every datastore implementation

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use runbook::{
    Datastore, Execution, ExecutionId, HistoryKind, ManualClock, MemoryStore, NewHistoryItem,
    ProcessDefinition, ProcessId, ProcessIdentity, Revision, RevisionId, Step, StoreError,
    Tracker, TrackerError, UserId,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn user(name: &str) -> UserId {
    UserId::new(name)
}

fn identity(at: DateTime<Utc>) -> ProcessIdentity {
    ProcessIdentity {
        id: ProcessId::new(),
        created_by: user("alice"),
        created_at: at,
    }
}

fn revision(identity: &ProcessIdentity, title: &str, at: DateTime<Utc>) -> Revision {
    Revision {
        revision: RevisionId::new(),
        process: identity.id,
        title: title.to_string(),
        created_by: user("alice"),
        created_at: at,
        steps: vec![
            Step::section("Prepare"),
            Step::step("Build").with_description("cargo build --release"),
            Step::step("Test").starting_with_previous(),
        ],
    }
}

fn mark(kind: HistoryKind, step_idx: usize, at: DateTime<Utc>) -> NewHistoryItem {
    NewHistoryItem {
        kind,
        step_idx,
        at,
        by: user("bob"),
    }
}

async fn revisions_round_trip(store: Arc<dyn Datastore>) {
    let id = identity(t0());
    let first = revision(&id, "Release", t0());
    store.insert_process(&id, &first).await.unwrap();

    assert_eq!(store.get_identity(id.id).await.unwrap(), Some(id.clone()));
    assert_eq!(store.get_revision(first.revision).await.unwrap(), Some(first.clone()));
    assert_eq!(store.latest_revision(id.id).await.unwrap(), Some(first.clone()));

    let second = revision(&id, "Release v2", t0() + Duration::minutes(5));
    store.insert_revision(&second).await.unwrap();
    assert_eq!(store.latest_revision(id.id).await.unwrap(), Some(second.clone()));

    let all = store.list_revisions(id.id).await.unwrap();
    assert_eq!(all, vec![second, first]);
}

async fn equal_timestamps_prefer_latest_insert(store: Arc<dyn Datastore>) {
    let id = identity(t0());
    let first = revision(&id, "first", t0());
    let second = revision(&id, "second", t0());
    store.insert_process(&id, &first).await.unwrap();
    store.insert_revision(&second).await.unwrap();

    let latest = store.latest_revision(id.id).await.unwrap().unwrap();
    assert_eq!(latest.title, "second");
}

async fn revision_for_unknown_identity_is_rejected(store: Arc<dyn Datastore>) {
    let orphan = revision(&identity(t0()), "orphan", t0());
    let err = store.insert_revision(&orphan).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert_eq!(store.get_revision(orphan.revision).await.unwrap(), None);
}

async fn latest_listing_follows_identity_creation(store: Arc<dyn Datastore>) {
    let older = identity(t0());
    let newer = identity(t0() + Duration::hours(1));
    store
        .insert_process(&newer, &revision(&newer, "newer", newer.created_at))
        .await
        .unwrap();
    store
        .insert_process(&older, &revision(&older, "older", older.created_at))
        .await
        .unwrap();
    store
        .insert_revision(&revision(&older, "older v2", t0() + Duration::hours(2)))
        .await
        .unwrap();

    let titles: Vec<String> = store
        .list_latest_revisions()
        .await
        .unwrap()
        .into_iter()
        .map(|(_, revision)| revision.title)
        .collect();
    assert_eq!(titles, vec!["older v2", "newer"]);
}

async fn history_is_appended_in_order(store: Arc<dyn Datastore>) {
    let id = identity(t0());
    let rev = revision(&id, "Release", t0());
    store.insert_process(&id, &rev).await.unwrap();

    let execution = Execution {
        id: ExecutionId::new(),
        revision: rev.revision,
        initiated_by: user("bob"),
        initiated_at: t0(),
    };
    let initial = store
        .insert_execution(&execution, &[mark(HistoryKind::StepStarted, 1, t0())])
        .await
        .unwrap();
    assert_eq!(initial.len(), 1);
    assert_eq!(store.get_execution(execution.id).await.unwrap(), Some(execution.clone()));

    let later = t0() + Duration::seconds(30);
    let appended = store
        .append_history(
            execution.id,
            &[
                mark(HistoryKind::StepDone, 1, later),
                mark(HistoryKind::StepStarted, 2, later),
            ],
        )
        .await
        .unwrap();
    assert!(appended[0].seq > initial[0].seq);
    assert!(appended[1].seq > appended[0].seq);

    let history = store.history(execution.id).await.unwrap();
    let steps: Vec<(HistoryKind, usize)> = history.iter().map(|h| (h.kind, h.step_idx)).collect();
    assert_eq!(
        steps,
        vec![
            (HistoryKind::StepStarted, 1),
            (HistoryKind::StepDone, 1),
            (HistoryKind::StepStarted, 2),
        ]
    );
    assert!(history.iter().all(|h| h.execution == execution.id));
}

async fn append_to_unknown_execution_fails(store: Arc<dyn Datastore>) {
    let missing = ExecutionId::new();
    let err = store
        .append_history(missing, &[mark(HistoryKind::StepDone, 1, t0())])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert!(store.history(missing).await.unwrap().is_empty());
}

async fn executions_listed_newest_first_across_revisions(store: Arc<dyn Datastore>) {
    let id = identity(t0());
    let first = revision(&id, "v1", t0());
    let second = revision(&id, "v2", t0() + Duration::minutes(1));
    store.insert_process(&id, &first).await.unwrap();
    store.insert_revision(&second).await.unwrap();

    let early = Execution {
        id: ExecutionId::new(),
        revision: first.revision,
        initiated_by: user("bob"),
        initiated_at: t0() + Duration::minutes(2),
    };
    let late = Execution {
        id: ExecutionId::new(),
        revision: second.revision,
        initiated_by: user("bob"),
        initiated_at: t0() + Duration::minutes(3),
    };
    store.insert_execution(&early, &[]).await.unwrap();
    store.insert_execution(&late, &[]).await.unwrap();

    let listed = store.list_executions(id.id).await.unwrap();
    assert_eq!(listed, vec![late, early]);
}

async fn tracker_walkthrough(store: Arc<dyn Datastore>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let tracker = Tracker::with_clock(store, clock.clone());
    let definition = ProcessDefinition::new(
        "Release",
        vec![
            Step::section("Prepare"),
            Step::step("Build"),
            Step::step("Test").starting_with_previous(),
        ],
    );
    let created = tracker.create_process(definition, &user("alice")).await.unwrap();

    clock.advance(Duration::seconds(10));
    let execution = tracker
        .start_execution(created.meta.id, &user("bob"))
        .await
        .unwrap();

    clock.advance(Duration::seconds(10));
    let view = tracker
        .mark_step(execution.id, 1, HistoryKind::StepDone, &user("bob"))
        .await
        .unwrap();
    let test_step = view.step(2).unwrap();
    assert_eq!(test_step.info.started_at, Some(t0() + Duration::seconds(20)));

    let err = tracker
        .mark_step(execution.id, 0, HistoryKind::StepStarted, &user("bob"))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::InvalidArgument { .. }));

    let reread = tracker.get_execution(execution.id).await.unwrap();
    assert_eq!(reread, view);
}

async fn concurrent_marks_are_all_recorded(store: Arc<dyn Datastore>) {
    const WRITERS: usize = 20;

    let tracker = Tracker::new(store);
    let created = tracker
        .create_process(
            ProcessDefinition::new("Incident", vec![Step::step("Page on-call")]),
            &user("alice"),
        )
        .await
        .unwrap();
    let execution_id = tracker
        .start_execution(created.meta.id, &user("alice"))
        .await
        .unwrap()
        .id;

    let mut handles = Vec::with_capacity(WRITERS);
    for n in 0..WRITERS {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            tracker
                .mark_step(
                    execution_id,
                    0,
                    HistoryKind::StepStarted,
                    &UserId::new(format!("responder-{n}")),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let history = tracker.store().history(execution_id).await.unwrap();
    assert_eq!(history.len(), WRITERS);
    assert!(history.iter().all(|h| h.kind == HistoryKind::StepStarted && h.step_idx == 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_marks_on_memory_store() {
    concurrent_marks_are_all_recorded(Arc::new(MemoryStore::new())).await;
}

#[cfg(feature = "database")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_marks_on_file_backed_sqlite() {
    let dir = tempfile::TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("runbook.db").display());
    let store = runbook::SqliteStore::connect(&url, 5, true).await.unwrap();
    concurrent_marks_are_all_recorded(Arc::new(store)).await;
}

macro_rules! store_suite {
    ($module:ident, $make:expr) => {
        mod $module {
            use super::*;

            #[tokio::test]
            async fn revisions_round_trip() {
                super::revisions_round_trip($make).await;
            }

            #[tokio::test]
            async fn equal_timestamps_prefer_latest_insert() {
                super::equal_timestamps_prefer_latest_insert($make).await;
            }

            #[tokio::test]
            async fn revision_for_unknown_identity_is_rejected() {
                super::revision_for_unknown_identity_is_rejected($make).await;
            }

            #[tokio::test]
            async fn latest_listing_follows_identity_creation() {
                super::latest_listing_follows_identity_creation($make).await;
            }

            #[tokio::test]
            async fn history_is_appended_in_order() {
                super::history_is_appended_in_order($make).await;
            }

            #[tokio::test]
            async fn append_to_unknown_execution_fails() {
                super::append_to_unknown_execution_fails($make).await;
            }

            #[tokio::test]
            async fn executions_listed_newest_first_across_revisions() {
                super::executions_listed_newest_first_across_revisions($make).await;
            }

            #[tokio::test]
            async fn tracker_walkthrough() {
                super::tracker_walkthrough($make).await;
            }
        }
    };
}

store_suite!(memory, Arc::new(MemoryStore::new()) as Arc<dyn Datastore>);

#[cfg(feature = "database")]
store_suite!(
    sqlite,
    Arc::new(
        runbook::SqliteStore::connect("sqlite::memory:", 1, true)
            .await
            .unwrap()
    ) as Arc<dyn Datastore>
);
