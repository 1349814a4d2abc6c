//! Job versioning and lineage pinning

mod common;

use common::*;
use lineage_catalog::{CatalogError, JobMeta, JobType, DEFAULT_LIMIT};

fn etl(inputs: &[&str], outputs: &[&str], location: &str) -> JobMeta {
    JobMeta::new(
        JobType::Batch,
        inputs.iter().map(|n| dataset_id(n)).collect(),
        outputs.iter().map(|n| dataset_id(n)).collect(),
        location,
    )
}

async fn seed_datasets(catalog: &lineage_catalog::MetadataCatalog, names: &[&str]) {
    for name in names {
        catalog
            .datasets()
            .create_or_update(&ns(), &dataset(name), &table(name))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_job_identity_ignores_io_order_and_duplicates() {
    for (backend, catalog) in seeded_backends().await {
        seed_datasets(&catalog, &["raw", "users", "clean"]).await;
        let jobs = catalog.jobs();

        let first = jobs
            .create_or_update(&ns(), &job("etl"), &etl(&["raw", "users"], &["clean"], "git://etl"))
            .await
            .unwrap();
        let shuffled = jobs
            .create_or_update(
                &ns(),
                &job("etl"),
                &etl(&["users", "raw", "users"], &["clean"], "git://etl"),
            )
            .await
            .unwrap();

        assert_eq!(first.current_version, shuffled.current_version, "{}", backend);
        assert_eq!(jobs.list_versions(&ns(), &job("etl")).await.unwrap().len(), 1);
        assert_eq!(shuffled.inputs.len(), 2, "{}", backend);
    }
}

#[tokio::test]
async fn test_location_change_creates_version() {
    for (backend, catalog) in seeded_backends().await {
        seed_datasets(&catalog, &["raw"]).await;
        let jobs = catalog.jobs();

        let v1 = jobs
            .create_or_update(&ns(), &job("etl"), &etl(&["raw"], &[], "git://etl@1"))
            .await
            .unwrap();
        let v2 = jobs
            .create_or_update(&ns(), &job("etl"), &etl(&["raw"], &[], "git://etl@2"))
            .await
            .unwrap();

        assert_ne!(v1.current_version, v2.current_version, "{}", backend);
        assert_eq!(v2.location, "git://etl@2");

        let history = jobs.list_versions(&ns(), &job("etl")).await.unwrap();
        assert_eq!(history.len(), 2, "{}", backend);
        assert_eq!(history[0].location, "git://etl@1");
        assert_eq!(
            jobs.get_version(v1.current_version)
                .await
                .unwrap()
                .unwrap()
                .location,
            "git://etl@1"
        );
    }
}

#[tokio::test]
async fn test_job_version_pins_current_dataset_versions() {
    for (backend, catalog) in seeded_backends().await {
        seed_datasets(&catalog, &["raw"]).await;
        let raw_v1 = catalog
            .datasets()
            .get(&ns(), &dataset("raw"))
            .await
            .unwrap()
            .unwrap()
            .current_version;

        let job_v1 = catalog
            .jobs()
            .create_or_update(&ns(), &job("etl"), &etl(&["raw"], &[], "git://etl@1"))
            .await
            .unwrap();

        // the dataset moves on; the old job version keeps its pin
        let raw_v2 = catalog
            .datasets()
            .create_or_update(&ns(), &dataset("raw"), &table("raw_v2"))
            .await
            .unwrap()
            .current_version;
        let job_v2 = catalog
            .jobs()
            .create_or_update(&ns(), &job("etl"), &etl(&["raw"], &[], "git://etl@2"))
            .await
            .unwrap();

        let pinned_v1 = catalog
            .jobs()
            .get_version(job_v1.current_version)
            .await
            .unwrap()
            .unwrap();
        let pinned_v2 = catalog
            .jobs()
            .get_version(job_v2.current_version)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pinned_v1.inputs[0].version, raw_v1, "{}", backend);
        assert_eq!(pinned_v2.inputs[0].version, raw_v2, "{}", backend);
    }
}

#[tokio::test]
async fn test_job_errors() {
    for (backend, catalog) in seeded_backends().await {
        let jobs = catalog.jobs();

        let err = jobs
            .create_or_update(&ns(), &job("etl"), &etl(&["missing"], &[], "git://etl"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::DatasetNotFound(_)), "{}", backend);
        assert!(!jobs.exists(&ns(), &job("etl")).await.unwrap());

        assert!(matches!(
            jobs.list_versions(&ns(), &job("etl")).await,
            Err(CatalogError::JobNotFound(_))
        ));
        assert!(jobs.get_all(&ns(), DEFAULT_LIMIT, 0).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_get_all_jobs() {
    for (backend, catalog) in seeded_backends().await {
        let jobs = catalog.jobs();
        for name in ["ingest", "transform", "publish"] {
            jobs.create_or_update(&ns(), &job(name), &etl(&[], &[], name))
                .await
                .unwrap();
        }

        let all = jobs.get_all(&ns(), DEFAULT_LIMIT, 0).await.unwrap();
        let names: Vec<_> = all.iter().map(|j| j.id.name.as_str().to_string()).collect();
        assert_eq!(names, ["ingest", "transform", "publish"], "{}", backend);
        assert_eq!(jobs.get_all(&ns(), 1, 2).await.unwrap().len(), 1);
    }
}
