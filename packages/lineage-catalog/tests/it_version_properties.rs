//! Property-based tests for version resolution
//!
//! Invariants that should hold for ALL identity tuples:
//! - Determinism: resolve(x) == resolve(x)
//! - Discrimination: x != y  =>  resolve(x) != resolve(y)
//! - Set semantics: job inputs/outputs are order- and duplicate-insensitive

use lineage_catalog::version::{DatasetIdentity, JobIdentity};
use lineage_catalog::{
    DatasetId, DatasetKind, DatasetName, JobName, NamespaceName, SourceName, VersionResolver,
};
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct DatasetTuple {
    namespace: NamespaceName,
    name: DatasetName,
    physical_name: DatasetName,
    source_name: SourceName,
    kind: DatasetKind,
}

impl DatasetTuple {
    fn resolve(&self) -> lineage_catalog::VersionId {
        VersionResolver::dataset(DatasetIdentity {
            namespace: &self.namespace,
            name: &self.name,
            physical_name: &self.physical_name,
            source_name: &self.source_name,
            kind: &self.kind,
        })
    }
}

fn token() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_.]{0,12}"
}

fn kind() -> impl Strategy<Value = DatasetKind> {
    prop_oneof![
        Just(DatasetKind::DbTable),
        token().prop_map(|s| DatasetKind::Stream {
            schema_location: format!("http://schemas/{}", s)
        }),
    ]
}

fn dataset_tuple() -> impl Strategy<Value = DatasetTuple> {
    (token(), token(), token(), token(), kind()).prop_map(|(ns, name, physical, source, kind)| {
        DatasetTuple {
            namespace: NamespaceName::new(ns).unwrap(),
            name: DatasetName::new(name).unwrap(),
            physical_name: DatasetName::new(physical).unwrap(),
            source_name: SourceName::new(source).unwrap(),
            kind,
        }
    })
}

fn dataset_ids() -> impl Strategy<Value = Vec<DatasetId>> {
    prop::collection::vec((token(), token()), 0..6).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(ns, name)| {
                DatasetId::new(NamespaceName::new(ns).unwrap(), DatasetName::new(name).unwrap())
            })
            .collect()
    })
}

fn resolve_job(name: &str, inputs: &[DatasetId], outputs: &[DatasetId], location: &str) -> lineage_catalog::VersionId {
    VersionResolver::job(JobIdentity {
        namespace: &NamespaceName::new("warehouse").unwrap(),
        name: &JobName::new(name).unwrap(),
        inputs,
        outputs,
        location,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn prop_dataset_resolution_is_deterministic(tuple in dataset_tuple()) {
        prop_assert_eq!(tuple.resolve(), tuple.clone().resolve());
    }

    #[test]
    fn prop_distinct_dataset_tuples_get_distinct_versions(
        a in dataset_tuple(),
        b in dataset_tuple(),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(a.resolve(), b.resolve());
    }

    #[test]
    fn prop_single_field_change_moves_version(tuple in dataset_tuple(), suffix in "[a-z]{1,4}") {
        let mut moved = tuple.clone();
        moved.physical_name =
            DatasetName::new(format!("{}{}", tuple.physical_name.as_str(), suffix)).unwrap();
        prop_assert_ne!(tuple.resolve(), moved.resolve());
    }

    #[test]
    fn prop_job_io_is_a_set(inputs in dataset_ids(), outputs in dataset_ids()) {
        let mut shuffled = inputs.clone();
        shuffled.reverse();
        shuffled.extend(inputs.iter().cloned());

        prop_assert_eq!(
            resolve_job("etl", &inputs, &outputs, "git://etl"),
            resolve_job("etl", &shuffled, &outputs, "git://etl")
        );
    }

    #[test]
    fn prop_inputs_and_outputs_are_not_interchangeable(ids in dataset_ids()) {
        prop_assume!(!ids.is_empty());
        prop_assert_ne!(
            resolve_job("etl", &ids, &[], "git://etl"),
            resolve_job("etl", &[], &ids, "git://etl")
        );
    }
}
