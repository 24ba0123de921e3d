// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bon::Builder;
use tokio::task::yield_now;
use tracing::debug;

use crate::{
    error::{RecordLockError, Result},
    model::{Record, RecordSummary, Zone, ZoneSummary},
    providers::Provider,
};

type ZoneRecords = BTreeMap<(String, String), Record>;

/// In-process record store.
///
/// Clones share the same state, so several [RecordMutex](crate::RecordMutex)
/// instances standing in for separate processes can contend on one store.
/// Every call yields to the runtime once to model a network round trip.
#[derive(Builder, Debug, Clone)]
pub struct MemoryProvider {
    /// Reject creation of a token that already exists.
    #[builder(default = true)]
    exclusive: bool,

    #[builder(skip)]
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    zones: BTreeMap<String, ZoneRecords>,
    token_creates: usize,
    token_deletes: usize,
    replaces: usize,
    fail_replace: bool,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MemoryProvider {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_zone(&self, zone: impl Into<String>) {
        self.state().zones.entry(zone.into()).or_default();
    }

    /// Store `record`, creating its zone when missing.
    pub fn insert_record(&self, record: Record) {
        let key = (record.domain.clone(), record.kind.clone());
        self.state()
            .zones
            .entry(record.zone.clone())
            .or_default()
            .insert(key, record);
    }

    pub fn record(&self, zone: &str, domain: &str, kind: &str) -> Option<Record> {
        self.state()
            .zones
            .get(zone)?
            .get(&(domain.to_string(), kind.to_string()))
            .cloned()
    }

    pub fn contains(&self, zone: &str, domain: &str, kind: &str) -> bool {
        self.record(zone, domain, kind).is_some()
    }

    pub fn token_creates(&self) -> usize {
        self.state().token_creates
    }

    pub fn token_deletes(&self) -> usize {
        self.state().token_deletes
    }

    pub fn replaces(&self) -> usize {
        self.state().replaces
    }

    /// Make the next [Provider::replace_record] call fail.
    pub fn fail_next_replace(&self) {
        self.state().fail_replace = true;
    }
}

impl Provider for MemoryProvider {
    fn exclusive_create(&self) -> bool {
        self.exclusive
    }

    async fn list_zones(&self) -> Result<Vec<ZoneSummary>> {
        yield_now().await;
        Ok(self
            .state()
            .zones
            .keys()
            .map(|zone| ZoneSummary { zone: zone.clone() })
            .collect())
    }

    async fn get_zone(&self, zone: &str) -> Result<Zone> {
        yield_now().await;
        let state = self.state();
        let records = state
            .zones
            .get(zone)
            .ok_or_else(|| RecordLockError::provider(format!("zone not found: {zone}")))?;
        Ok(Zone {
            zone: zone.to_string(),
            records: records
                .keys()
                .map(|(domain, kind)| RecordSummary {
                    domain: domain.clone(),
                    kind: kind.clone(),
                })
                .collect(),
        })
    }

    async fn get_record(&self, zone: &str, domain: &str, kind: &str) -> Result<Record> {
        yield_now().await;
        self.record(zone, domain, kind).ok_or_else(|| {
            RecordLockError::provider(format!("record not found: {zone}/{domain}/{kind}"))
        })
    }

    async fn replace_record(&self, record: &Record) -> Result<Record> {
        yield_now().await;
        let mut state = self.state();
        if std::mem::take(&mut state.fail_replace) {
            return Err(RecordLockError::provider("injected replace failure"));
        }
        let stored = state
            .zones
            .get_mut(&record.zone)
            .and_then(|records| records.get_mut(&(record.domain.clone(), record.kind.clone())))
            .ok_or_else(|| {
                RecordLockError::provider(format!(
                    "record not found: {}/{}/{}",
                    record.zone, record.domain, record.kind
                ))
            })?;
        *stored = record.clone();
        state.replaces += 1;
        Ok(record.clone())
    }

    async fn create_token(&self, zone: &str, token: &str, kind: &str) -> Result<()> {
        yield_now().await;
        let exclusive = self.exclusive;
        let mut state = self.state();
        let records = state
            .zones
            .get_mut(zone)
            .ok_or_else(|| RecordLockError::provider(format!("zone not found: {zone}")))?;
        let key = (token.to_string(), kind.to_string());
        if exclusive && records.contains_key(&key) {
            debug!("Token {} already exists", token);
            return Err(RecordLockError::AlreadyAcquired(token.to_string()));
        }
        records.insert(key, Record::new(zone, token, kind));
        state.token_creates += 1;
        Ok(())
    }

    async fn delete_token(&self, zone: &str, token: &str, kind: &str) -> Result<()> {
        yield_now().await;
        let mut state = self.state();
        state
            .zones
            .get_mut(zone)
            .and_then(|records| records.remove(&(token.to_string(), kind.to_string())))
            .ok_or_else(|| RecordLockError::provider(format!("token not found: {zone}/{token}")))?;
        state.token_deletes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exclusive_create_rejects_duplicates() {
        let provider = MemoryProvider::default();
        provider.add_zone("example.com");

        provider
            .create_token("example.com", "1.example.com", "TXT")
            .await
            .expect("first create should succeed");
        let err = provider
            .create_token("example.com", "1.example.com", "TXT")
            .await
            .expect_err("second create should fail");
        assert!(matches!(err, RecordLockError::AlreadyAcquired(ref t) if t == "1.example.com"));
        assert_eq!(provider.token_creates(), 1);
    }

    #[tokio::test]
    async fn advisory_create_overwrites() {
        let provider = MemoryProvider::builder().exclusive(false).build();
        provider.add_zone("example.com");
        assert!(!provider.exclusive_create());

        provider.create_token("example.com", "1.example.com", "TXT").await.unwrap();
        provider.create_token("example.com", "1.example.com", "TXT").await.unwrap();
        assert_eq!(provider.token_creates(), 2);
    }

    #[tokio::test]
    async fn tokens_are_listed_as_records() {
        let provider = MemoryProvider::default();
        provider.insert_record(Record::new("example.com", "a.example.com", "A"));
        provider.create_token("example.com", "7.example.com", "TXT").await.unwrap();

        let zone = provider.get_zone("example.com").await.unwrap();
        assert_eq!(zone.records.len(), 2);

        provider.delete_token("example.com", "7.example.com", "TXT").await.unwrap();
        assert!(!provider.contains("example.com", "7.example.com", "TXT"));
        provider
            .delete_token("example.com", "7.example.com", "TXT")
            .await
            .expect_err("token is gone");
    }

    #[tokio::test]
    async fn injected_replace_failure_is_one_shot() {
        let provider = MemoryProvider::default();
        let record = Record::new("example.com", "a.example.com", "A");
        provider.insert_record(record.clone());

        provider.fail_next_replace();
        provider.replace_record(&record).await.expect_err("should fail once");
        provider.replace_record(&record).await.expect("should succeed");
        assert_eq!(provider.replaces(), 1);
    }
}
