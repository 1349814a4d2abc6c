//! Version resolution
//!
//! Derives stable version ids from identity fields using SHA-256.
//! Each field is length-prefixed so distinct field tuples never share a byte
//! stream, and every digest starts with a domain tag so a dataset and a job
//! with identical fields still resolve to different ids.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{
    DatasetId, DatasetKind, DatasetName, JobName, NamespaceName, SourceName, VersionId,
};

const DATASET_TAG: &[u8] = b"lineage-catalog:dataset:v1";
const JOB_TAG: &[u8] = b"lineage-catalog:job:v1";

/// Identity fields of a dataset version
#[derive(Debug, Clone, Copy)]
pub struct DatasetIdentity<'a> {
    pub namespace: &'a NamespaceName,
    pub name: &'a DatasetName,
    pub physical_name: &'a DatasetName,
    pub source_name: &'a SourceName,
    pub kind: &'a DatasetKind,
}

/// Identity fields of a job version
#[derive(Debug, Clone, Copy)]
pub struct JobIdentity<'a> {
    pub namespace: &'a NamespaceName,
    pub name: &'a JobName,
    pub inputs: &'a [DatasetId],
    pub outputs: &'a [DatasetId],
    pub location: &'a str,
}

/// Pure identity → version function
pub struct VersionResolver;

impl VersionResolver {
    /// Resolve a dataset version.
    ///
    /// Description, owner and producing run are not identity fields.
    pub fn dataset(identity: DatasetIdentity<'_>) -> VersionId {
        let mut hasher = FieldHasher::new(DATASET_TAG);
        hasher.field(identity.namespace.as_str());
        hasher.field(identity.name.as_str());
        hasher.field(identity.physical_name.as_str());
        hasher.field(identity.source_name.as_str());
        hasher.field(identity.kind.dataset_type().as_str());
        hasher.optional(identity.kind.schema_location());
        hasher.finish()
    }

    /// Resolve a job version.
    ///
    /// Inputs and outputs are treated as sets; description and job type are
    /// not identity fields.
    pub fn job(identity: JobIdentity<'_>) -> VersionId {
        let mut hasher = FieldHasher::new(JOB_TAG);
        hasher.field(identity.namespace.as_str());
        hasher.field(identity.name.as_str());
        hasher.dataset_set(identity.inputs);
        hasher.dataset_set(identity.outputs);
        hasher.field(identity.location);
        hasher.finish()
    }
}

/// Sort and dedupe dataset identities
pub fn canonical_dataset_set(ids: &[DatasetId]) -> Vec<DatasetId> {
    let mut set = ids.to_vec();
    set.sort();
    set.dedup();
    set
}

struct FieldHasher(Sha256);

impl FieldHasher {
    fn new(tag: &[u8]) -> Self {
        let mut hasher = Self(Sha256::new());
        hasher.bytes(tag);
        hasher
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.0.update((bytes.len() as u64).to_be_bytes());
        self.0.update(bytes);
    }

    fn field(&mut self, value: &str) {
        self.bytes(value.as_bytes());
    }

    fn optional(&mut self, value: Option<&str>) {
        match value {
            Some(value) => {
                self.0.update([1u8]);
                self.field(value);
            }
            None => self.0.update([0u8]),
        }
    }

    fn dataset_set(&mut self, ids: &[DatasetId]) {
        let set = canonical_dataset_set(ids);
        self.0.update((set.len() as u64).to_be_bytes());
        for id in &set {
            self.field(id.namespace.as_str());
            self.field(id.name.as_str());
        }
    }

    fn finish(self) -> VersionId {
        let digest = self.0.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        VersionId::from_uuid(Uuid::from_bytes(bytes))
    }
}
