//! In-process ledger storage.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::entry::LedgerEntry;
use crate::store::{LedgerError, LedgerStore};

#[derive(Default)]
struct State {
    entries: BTreeMap<String, LedgerEntry>,
    reject_writes: Option<String>,
}

/// Ledger kept in memory, for tests and dry runs.
#[derive(Default)]
pub struct MemoryLedgerStore {
    state: Mutex<State>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `upsert` fail with `message`.
    pub async fn reject_writes(&self, message: &str) {
        self.state.lock().await.reject_writes = Some(message.to_string());
    }

    pub async fn accept_writes(&self) {
        self.state.lock().await.reject_writes = None;
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, table_name: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        Ok(self.state.lock().await.entries.get(table_name).cloned())
    }

    async fn upsert(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        if let Some(message) = &state.reject_writes {
            return Err(LedgerError::Rejected(message.clone()));
        }
        let merged = entry.clone().merged_over(state.entries.get(&entry.table_name));
        state.entries.insert(entry.table_name.clone(), merged);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.state.lock().await.entries.values().cloned().collect())
    }
}
