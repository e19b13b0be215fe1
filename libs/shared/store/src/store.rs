// libs/shared/store/src/store.rs
use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// A stored document together with the version observed when it was read.
/// Versions are opaque monotonic tokens; equality is the only meaningful
/// comparison.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub data: Value,
    pub version: u64,
}

/// What a transaction observed about a document before deciding its writes.
#[derive(Debug, Clone)]
pub enum ReadStamp {
    Version {
        collection: String,
        id: String,
        version: u64,
    },
    Absent {
        collection: String,
        id: String,
    },
}

#[derive(Debug, Clone)]
pub enum WriteOp {
    Create {
        collection: String,
        id: String,
        data: Value,
    },
    /// Full-document replacement.
    Update {
        collection: String,
        id: String,
        data: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// A multi-entity read-modify-write unit. Callers record every document they
/// based a decision on (`observe` / `observe_absent`) and stage the writes;
/// `AtomicStore::commit` applies all writes only if every stamped document is
/// unchanged at commit time.
#[derive(Debug, Default)]
pub struct Transaction {
    pub(crate) reads: Vec<ReadStamp>,
    pub(crate) writes: Vec<WriteOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, collection: &str, doc: &Document) {
        self.reads.push(ReadStamp::Version {
            collection: collection.to_string(),
            id: doc.id.clone(),
            version: doc.version,
        });
    }

    pub fn observe_absent(&mut self, collection: &str, id: &str) {
        self.reads.push(ReadStamp::Absent {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }

    pub fn create(&mut self, collection: &str, id: &str, data: Value) {
        self.writes.push(WriteOp::Create {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
    }

    pub fn update(&mut self, collection: &str, id: &str, data: Value) {
        self.writes.push(WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
    }

    pub fn delete(&mut self, collection: &str, id: &str) {
        self.writes.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Key-addressed document store with single-entity reads and an atomic
/// multi-entity compare-and-swap commit. Implementations must make `commit`
/// linearizable against other commits touching the same documents.
///
/// Injected as `Arc<dyn AtomicStore>` everywhere; components never reach for
/// a process-wide handle.
#[async_trait]
pub trait AtomicStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Commit all staged writes, or fail with `VersionConflict` if any
    /// stamped document changed (or any observed-absent document appeared)
    /// since it was read. On conflict nothing is applied.
    async fn commit(&self, tx: Transaction) -> Result<(), StoreError>;
}
