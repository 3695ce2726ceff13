//! Local transaction history: every transaction the session submitted, newest first.

use alloy_primitives::{Address, B256};
use anyhow::{Context, Result};
use async_trait::async_trait;
use dd_api_types::{TxRecord, TxStatus};
use rocksdb::{DB, IteratorMode, Options};
use std::cmp::Reverse;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Oldest records are dropped beyond this many.
pub const MAX_HISTORY: usize = 100;

const TX_PREFIX: &str = "tx:";

#[async_trait]
pub trait TxHistory: Send + Sync {
    /// Inserts a record, replacing any existing record with the same hash.
    async fn add(&self, record: TxRecord) -> Result<()>;
    async fn update_status(
        &self,
        hash: B256,
        status: TxStatus,
        block_number: Option<u64>,
    ) -> Result<Option<TxRecord>>;
    async fn get_by_hash(&self, hash: B256) -> Result<Option<TxRecord>>;
    /// Records sent from or to `account`.
    async fn list_by_account(&self, account: Address) -> Result<Vec<TxRecord>>;
    async fn list_all(&self) -> Result<Vec<TxRecord>>;
    async fn clear(&self) -> Result<()>;
}

fn involves(record: &TxRecord, account: Address) -> bool {
    record.from == account || record.to == Some(account)
}

fn newest_first(records: &mut [TxRecord]) {
    records.sort_by(|a, b| b.timestamp_epoch_ms.cmp(&a.timestamp_epoch_ms));
}

#[derive(Default)]
pub struct InMemoryTxHistory {
    records: RwLock<Vec<TxRecord>>,
}

#[async_trait]
impl TxHistory for InMemoryTxHistory {
    async fn add(&self, record: TxRecord) -> Result<()> {
        let mut guard = self.records.write().await;
        guard.retain(|existing| existing.hash != record.hash);
        // Ahead of older records with the same timestamp, so the cap evicts those first.
        guard.insert(0, record);
        newest_first(&mut guard);
        guard.truncate(MAX_HISTORY);
        Ok(())
    }

    async fn update_status(
        &self,
        hash: B256,
        status: TxStatus,
        block_number: Option<u64>,
    ) -> Result<Option<TxRecord>> {
        let mut guard = self.records.write().await;
        let Some(record) = guard.iter_mut().find(|record| record.hash == hash) else {
            return Ok(None);
        };
        record.status = status;
        if block_number.is_some() {
            record.block_number = block_number;
        }
        Ok(Some(record.clone()))
    }

    async fn get_by_hash(&self, hash: B256) -> Result<Option<TxRecord>> {
        let guard = self.records.read().await;
        Ok(guard.iter().find(|record| record.hash == hash).cloned())
    }

    async fn list_by_account(&self, account: Address) -> Result<Vec<TxRecord>> {
        let guard = self.records.read().await;
        Ok(guard
            .iter()
            .filter(|record| involves(record, account))
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<TxRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }
}

pub struct RocksDbTxHistory {
    db: Arc<DB>,
}

impl RocksDbTxHistory {
    pub fn open_default(path: &str) -> Result<Self> {
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = DB::open(&options, path).with_context(|| format!("open history db at {path}"))?;
        Ok(Self { db: Arc::new(db) })
    }

    fn key_for_tx(hash: &B256) -> String {
        format!("{TX_PREFIX}{hash}")
    }

    fn load_all(&self) -> Result<Vec<TxRecord>> {
        let mut records = Vec::new();
        for entry in self.db.iterator(IteratorMode::Start) {
            let (key, value) = entry?;
            if !key.as_ref().starts_with(TX_PREFIX.as_bytes()) {
                continue;
            }
            records.push(serde_json::from_slice::<TxRecord>(&value)?);
        }
        newest_first(&mut records);
        Ok(records)
    }

    fn put(&self, record: &TxRecord) -> Result<()> {
        let key = Self::key_for_tx(&record.hash);
        let value = serde_json::to_vec(record)?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }
}

#[async_trait]
impl TxHistory for RocksDbTxHistory {
    async fn add(&self, record: TxRecord) -> Result<()> {
        self.put(&record)?;

        let mut records = self.load_all()?;
        records.sort_by_key(|existing| (Reverse(existing.timestamp_epoch_ms), existing.hash != record.hash));
        for stale in records.iter().skip(MAX_HISTORY) {
            debug!(hash = %stale.hash, "evicting transaction from history");
            self.db.delete(Self::key_for_tx(&stale.hash).as_bytes())?;
        }
        Ok(())
    }

    async fn update_status(
        &self,
        hash: B256,
        status: TxStatus,
        block_number: Option<u64>,
    ) -> Result<Option<TxRecord>> {
        let Some(mut record) = self.get_by_hash(hash).await? else {
            return Ok(None);
        };
        record.status = status;
        if block_number.is_some() {
            record.block_number = block_number;
        }
        self.put(&record)?;
        Ok(Some(record))
    }

    async fn get_by_hash(&self, hash: B256) -> Result<Option<TxRecord>> {
        let key = Self::key_for_tx(&hash);
        match self.db.get(key.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice::<TxRecord>(&raw)?)),
            None => Ok(None),
        }
    }

    async fn list_by_account(&self, account: Address) -> Result<Vec<TxRecord>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|record| involves(record, account))
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<TxRecord>> {
        self.load_all()
    }

    async fn clear(&self) -> Result<()> {
        for record in self.load_all()? {
            self.db.delete(Self::key_for_tx(&record.hash).as_bytes())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dd_api_types::TxKind;

    fn record(seed: u8, from: Address, timestamp_epoch_ms: u128) -> TxRecord {
        TxRecord {
            hash: B256::repeat_byte(seed),
            from,
            to: Some(Address::repeat_byte(0xee)),
            value: "0.1".to_owned(),
            chain_id: Some(11_155_111),
            kind: TxKind::Transfer,
            status: TxStatus::Pending,
            block_number: None,
            timestamp_epoch_ms,
        }
    }

    async fn exercise(history: &dyn TxHistory) -> Result<()> {
        let alice = Address::repeat_byte(0xaa);
        let bob = Address::repeat_byte(0xbb);

        history.add(record(1, alice, 1_000)).await?;
        history.add(record(2, bob, 2_000)).await?;
        history.add(record(3, alice, 3_000)).await?;

        let all = history.list_all().await?;
        let order: Vec<_> = all.iter().map(|r| r.timestamp_epoch_ms).collect();
        assert_eq!(order, vec![3_000, 2_000, 1_000]);

        assert_eq!(history.list_by_account(alice).await?.len(), 2);
        // Every record was sent to 0xee..ee.
        assert_eq!(history.list_by_account(Address::repeat_byte(0xee)).await?.len(), 3);

        let updated = history
            .update_status(B256::repeat_byte(2), TxStatus::Confirmed, Some(42))
            .await?
            .expect("record exists");
        assert_eq!(updated.status, TxStatus::Confirmed);
        assert_eq!(
            history.get_by_hash(B256::repeat_byte(2)).await?.unwrap().block_number,
            Some(42)
        );
        assert!(
            history
                .update_status(B256::repeat_byte(9), TxStatus::Failed, None)
                .await?
                .is_none()
        );

        history.clear().await?;
        assert!(history.list_all().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn in_memory_history_orders_filters_and_updates() -> Result<()> {
        exercise(&InMemoryTxHistory::default()).await
    }

    #[tokio::test]
    async fn rocksdb_history_orders_filters_and_updates() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let history = RocksDbTxHistory::open_default(dir.path().to_str().unwrap())?;
        exercise(&history).await
    }

    #[tokio::test]
    async fn history_is_capped_at_newest_entries() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let durable = RocksDbTxHistory::open_default(dir.path().to_str().unwrap())?;
        let memory = InMemoryTxHistory::default();
        let from = Address::repeat_byte(0xaa);

        for seed in 0..=MAX_HISTORY as u8 {
            let entry = record(seed, from, u128::from(seed) + 1);
            memory.add(entry.clone()).await?;
            durable.add(entry).await?;
        }

        let histories: [&dyn TxHistory; 2] = [&memory, &durable];
        for history in histories {
            let all = history.list_all().await?;
            assert_eq!(all.len(), MAX_HISTORY);
            assert!(history.get_by_hash(B256::repeat_byte(0)).await?.is_none());
        }
        Ok(())
    }

    #[tokio::test]
    async fn newest_record_survives_the_cap_on_timestamp_ties() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let durable = RocksDbTxHistory::open_default(dir.path().to_str().unwrap())?;
        let memory = InMemoryTxHistory::default();
        let from = Address::repeat_byte(0xaa);

        for seed in 0..MAX_HISTORY as u8 {
            let entry = record(seed, from, 7);
            memory.add(entry.clone()).await?;
            durable.add(entry).await?;
        }
        let latest = record(0xff, from, 7);
        memory.add(latest.clone()).await?;
        durable.add(latest).await?;

        let histories: [&dyn TxHistory; 2] = [&memory, &durable];
        for history in histories {
            assert_eq!(history.list_all().await?.len(), MAX_HISTORY);
            assert!(history.get_by_hash(B256::repeat_byte(0xff)).await?.is_some());
        }
        Ok(())
    }

    #[tokio::test]
    async fn re_adding_a_hash_replaces_the_record() -> Result<()> {
        let history = InMemoryTxHistory::default();
        let from = Address::repeat_byte(0xaa);
        history.add(record(1, from, 1)).await?;
        let mut again = record(1, from, 5);
        again.status = TxStatus::Failed;
        history.add(again).await?;

        let all = history.list_all().await?;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, TxStatus::Failed);
        Ok(())
    }
}
