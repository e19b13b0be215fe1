// libs/shared/store/src/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::store::{AtomicStore, Document, ReadStamp, Transaction, WriteOp};

#[derive(Debug, Clone)]
struct StoredDoc {
    data: Value,
    version: u64,
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<String, HashMap<String, StoredDoc>>,
    // Store-global so a deleted-and-recreated document never reuses a
    // version an old read stamp could still match.
    version_counter: u64,
}

impl Inner {
    fn next_version(&mut self) -> u64 {
        self.version_counter += 1;
        self.version_counter
    }

    fn doc(&self, collection: &str, id: &str) -> Option<&StoredDoc> {
        self.collections.get(collection).and_then(|c| c.get(id))
    }

    fn stamp_still_valid(&self, stamp: &ReadStamp) -> bool {
        match stamp {
            ReadStamp::Version {
                collection,
                id,
                version,
            } => self
                .doc(collection, id)
                .map(|d| d.version == *version)
                .unwrap_or(false),
            ReadStamp::Absent { collection, id } => self.doc(collection, id).is_none(),
        }
    }
}

/// In-process `AtomicStore` backed by a versioned map. Commits take the
/// write lock for their whole validate-and-apply step, which makes them
/// linearizable against each other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AtomicStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.doc(collection, id).map(|d| Document {
            id: id.to_string(),
            data: d.data.clone(),
            version: d.version,
        }))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.read().await;
        let docs = inner
            .collections
            .get(collection)
            .map(|c| {
                c.iter()
                    .map(|(id, d)| Document {
                        id: id.clone(),
                        data: d.data.clone(),
                        version: d.version,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(docs)
    }

    async fn commit(&self, tx: Transaction) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        for stamp in &tx.reads {
            if !inner.stamp_still_valid(stamp) {
                debug!("Transaction aborted on stale read stamp: {:?}", stamp);
                return Err(StoreError::VersionConflict);
            }
        }

        // Writes must also not clobber documents the caller never observed.
        for write in &tx.writes {
            match write {
                WriteOp::Create { collection, id, .. } => {
                    if inner.doc(collection, id).is_some() {
                        return Err(StoreError::VersionConflict);
                    }
                }
                WriteOp::Update { collection, id, .. } | WriteOp::Delete { collection, id } => {
                    if inner.doc(collection, id).is_none() {
                        return Err(StoreError::VersionConflict);
                    }
                }
            }
        }

        for write in tx.writes {
            match write {
                WriteOp::Create {
                    collection,
                    id,
                    data,
                }
                | WriteOp::Update {
                    collection,
                    id,
                    data,
                } => {
                    let version = inner.next_version();
                    inner
                        .collections
                        .entry(collection)
                        .or_default()
                        .insert(id, StoredDoc { data, version });
                }
                WriteOp::Delete { collection, id } => {
                    if let Some(c) = inner.collections.get_mut(&collection) {
                        c.remove(&id);
                    }
                }
            }
        }

        Ok(())
    }
}
