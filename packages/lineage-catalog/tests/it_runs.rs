//! Run lifecycle: transition legality and pointer/log consistency

mod common;

use chrono::{Duration, Utc};
use common::*;
use lineage_catalog::{
    CatalogError, JobMeta, JobType, MetadataCatalog, MetadataStore, RunMeta, RunState,
    DEFAULT_LIMIT,
};
use uuid::Uuid;

async fn seeded_job(catalog: &MetadataCatalog) {
    catalog
        .jobs()
        .create_or_update(
            &ns(),
            &job("etl"),
            &JobMeta::new(JobType::Batch, vec![], vec![], "git://etl"),
        )
        .await
        .unwrap();
}

/// Current pointer must agree with the newest log row
async fn assert_consistent(catalog: &MetadataCatalog, run_id: Uuid, backend: &str) {
    let pointer = catalog.runs().get_current_state(run_id).await.unwrap();
    let latest = catalog
        .store()
        .find_latest_run_state(run_id)
        .await
        .unwrap()
        .expect("run has states");
    assert_eq!(pointer, latest.state, "{}", backend);
}

#[tokio::test]
async fn test_happy_path_new_running_completed() {
    for (backend, catalog) in seeded_backends().await {
        seeded_job(&catalog).await;
        let runs = catalog.runs();

        let run = runs
            .create_run(&ns(), &job("etl"), &RunMeta::default())
            .await
            .unwrap();
        assert_eq!(run.state, RunState::New, "{}", backend);
        assert_consistent(&catalog, run.id, backend).await;

        let running = runs.mark_running(run.id).await.unwrap();
        assert_eq!(running.state, RunState::Running);
        assert_eq!(running.run_uuid, run.id);
        assert_consistent(&catalog, run.id, backend).await;

        let completed = runs.mark_completed(run.id).await.unwrap();
        assert_eq!(completed.state, RunState::Completed);
        assert!(completed.transitioned_at >= running.transitioned_at);
        assert_consistent(&catalog, run.id, backend).await;

        let history: Vec<_> = runs
            .history(run.id)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.state)
            .collect();
        assert_eq!(
            history,
            [RunState::New, RunState::Running, RunState::Completed],
            "{}",
            backend
        );
    }
}

#[tokio::test]
async fn test_illegal_transitions_leave_pointer_unchanged() {
    for (backend, catalog) in seeded_backends().await {
        seeded_job(&catalog).await;
        let runs = catalog.runs();
        let run = runs
            .create_run(&ns(), &job("etl"), &RunMeta::default())
            .await
            .unwrap();

        // NEW -> COMPLETED skips RUNNING
        let err = runs.mark_completed(run.id).await.unwrap_err();
        assert!(
            matches!(err, CatalogError::InvalidStateTransition { .. }),
            "{}: {:?}",
            backend,
            err
        );
        assert_eq!(runs.get_current_state(run.id).await.unwrap(), RunState::New);

        // RUNNING -> RUNNING
        runs.mark_running(run.id).await.unwrap();
        assert!(matches!(
            runs.mark_running(run.id).await,
            Err(CatalogError::InvalidStateTransition { .. })
        ));
        assert_eq!(runs.get_current_state(run.id).await.unwrap(), RunState::Running);

        // nothing leaves a terminal state
        runs.mark_aborted(run.id).await.unwrap();
        for target in RunState::ALL {
            assert!(
                matches!(
                    runs.transition(run.id, target).await,
                    Err(CatalogError::InvalidStateTransition { .. })
                ),
                "{}: ABORTED -> {}",
                backend,
                target
            );
        }
        assert_eq!(runs.get_current_state(run.id).await.unwrap(), RunState::Aborted);
        assert_eq!(runs.history(run.id).await.unwrap().len(), 3, "{}", backend);
        assert_consistent(&catalog, run.id, backend).await;
    }
}

#[tokio::test]
async fn test_run_args_are_deduplicated_and_round_trip() {
    for (backend, catalog) in seeded_backends().await {
        seeded_job(&catalog).await;
        let runs = catalog.runs();
        let start = Utc::now();
        let meta = RunMeta::default()
            .with_arg("date", "2024-01-01")
            .with_arg("mode", "full")
            .with_nominal_window(start, start + Duration::hours(1));

        let a = runs.create_run(&ns(), &job("etl"), &meta).await.unwrap();
        let b = runs.create_run(&ns(), &job("etl"), &meta).await.unwrap();
        assert_ne!(a.id, b.id, "{}", backend);

        let stored_a = catalog.store().find_run(a.id).await.unwrap().unwrap();
        let stored_b = catalog.store().find_run(b.id).await.unwrap().unwrap();
        assert_eq!(stored_a.args.uuid, stored_b.args.uuid, "{}", backend);

        let fetched = runs.get(a.id).await.unwrap().unwrap();
        assert_eq!(fetched.args, meta.args, "{}", backend);
        assert_eq!(
            fetched.nominal_start_time.map(|t| t.timestamp_millis()),
            Some(start.timestamp_millis())
        );
    }
}

#[tokio::test]
async fn test_latest_run_follows_job_version() {
    for (backend, catalog) in seeded_backends().await {
        seeded_job(&catalog).await;
        let runs = catalog.runs();

        let first = runs
            .create_run(&ns(), &job("etl"), &RunMeta::default())
            .await
            .unwrap();
        let second = runs
            .create_run(&ns(), &job("etl"), &RunMeta::default())
            .await
            .unwrap();

        let current = catalog.jobs().get(&ns(), &job("etl")).await.unwrap().unwrap();
        assert_eq!(current.latest_run, Some(second.id), "{}", backend);
        assert_eq!(first.job_version, current.current_version);

        let listed: Vec<_> = runs
            .list(&ns(), &job("etl"), DEFAULT_LIMIT, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(listed, [first.id, second.id], "{}", backend);
    }
}

#[tokio::test]
async fn test_unknown_job_and_run() {
    for (backend, catalog) in seeded_backends().await {
        let runs = catalog.runs();
        assert!(matches!(
            runs.create_run(&ns(), &job("missing"), &RunMeta::default()).await,
            Err(CatalogError::JobNotFound(_))
        ));
        assert!(matches!(
            runs.list(&ns(), &job("missing"), DEFAULT_LIMIT, 0).await,
            Err(CatalogError::JobNotFound(_))
        ));

        let id = Uuid::new_v4();
        assert!(!runs.run_exists(id).await.unwrap(), "{}", backend);
        assert!(runs.get(id).await.unwrap().is_none());
        assert!(matches!(
            runs.mark_running(id).await,
            Err(CatalogError::RunNotFound(_))
        ));
    }
}
