// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

//! Cross-process record lock built on tokens in the remote store.
//!
//! Holding the lock for a record means a token named after the record exists in
//! the record's zone. Within one process, holders of the same record share the
//! token: the first holder creates it, later holders are only counted, and the
//! last release deletes it. Across processes the store's exclusive create is the
//! only arbiter.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::{
    error::{RecordLockError, Result},
    identity::{HolderId, TOKEN_KIND, token_name},
    providers::Provider,
};

/// Table of named in-process mutexes.
///
/// Entries are never removed, so the table grows by one entry per distinct
/// name for as long as it lives.
#[derive(Debug, Default)]
struct KeyedMutex {
    keys: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedMutex {
    async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = Arc::clone(self.keys.lock().await.entry(key.to_string()).or_default());
        mutex.lock_owned().await
    }
}

/// Process-wide coordinator for record locks.
///
/// Construct one per process and share it (usually behind an [Arc]) with
/// every [Reconciler](crate::Reconciler). Calls for the same holder must be
/// paired: a holder that locks and never unlocks leaves its token behind, and
/// no process can lock that record again until the token is cleared with
/// [RecordMutex::force_unlock].
#[derive(Debug, Default)]
pub struct RecordMutex {
    tokens: KeyedMutex,
    records: KeyedMutex,
    writers: KeyedMutex,
    holders: Mutex<HashMap<String, Vec<HolderId>>>,
}

impl RecordMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock on `record` for `holder`.
    ///
    /// Locking again for a holder that already holds the record succeeds
    /// without touching the store. A different local holder joins the existing
    /// token. Otherwise the token is created and any failure to do so, most
    /// likely [AlreadyAcquired](RecordLockError::AlreadyAcquired) because
    /// another process holds it, is returned.
    pub async fn lock<P: Provider>(
        &self,
        provider: &P,
        record: &str,
        zone: &str,
        holder: HolderId,
    ) -> Result<()> {
        if !provider.exclusive_create() {
            return Err(RecordLockError::NonExclusiveProvider);
        }

        debug!("Locking record {:?} for {}", record, holder);
        let token = token_name(record, zone);
        let _token = self.tokens.lock(&token).await;
        let _record = self.records.lock(record).await;

        {
            let mut holders = self.holders.lock().await;
            if let Some(current) = holders.get_mut(record) {
                if current.contains(&holder) {
                    debug!("Record {:?} already locked by {}", record, holder);
                } else {
                    current.push(holder);
                    debug!(
                        "Record {:?} joined by {}, {} local holders",
                        record,
                        holder,
                        current.len()
                    );
                }
                return Ok(());
            }
        }

        provider.create_token(zone, &token, TOKEN_KIND).await?;
        self.holders
            .lock()
            .await
            .entry(record.to_string())
            .or_default()
            .push(holder);

        debug!("Locked record {:?} with token {:?}", record, token);
        Ok(())
    }

    /// Release `holder`'s lock on `record`.
    ///
    /// The holder is removed locally before anything else. When it was the
    /// last local holder the token is deleted and the store's error, if any,
    /// is returned. Releasing a holder that is not registered is a no-op.
    pub async fn unlock<P: Provider>(
        &self,
        provider: &P,
        record: &str,
        zone: &str,
        holder: HolderId,
    ) -> Result<()> {
        debug!("Unlocking record {:?} for {}", record, holder);
        let token = token_name(record, zone);
        let _record = self.records.lock(record).await;

        let last = {
            let mut holders = self.holders.lock().await;
            let Some(current) = holders.get_mut(record) else {
                debug!("Record {:?} is not locked by this process", record);
                return Ok(());
            };
            let before = current.len();
            current.retain(|h| *h != holder);
            let removed = current.len() != before;
            if current.is_empty() {
                holders.remove(record);
            }
            removed && !holders.contains_key(record)
        };

        if last {
            provider.delete_token(zone, &token, TOKEN_KIND).await?;
            debug!("Unlocked record {:?}, deleted token {:?}", record, token);
        }
        Ok(())
    }

    /// Run `f` while holding the lock on `record` under a fresh holder.
    ///
    /// The lock is released whatever `f` returns. When both `f` and the
    /// release fail, the error from `f` is returned.
    pub async fn with<P, R>(
        &self,
        provider: &P,
        record: &str,
        zone: &str,
        f: impl AsyncFnOnce(HolderId) -> Result<R>,
    ) -> Result<R>
    where
        P: Provider,
    {
        let holder = HolderId::new();
        self.lock(provider, record, zone, holder).await?;
        let result = f(holder).await;
        let released = self.unlock(provider, record, zone, holder).await;
        settle(record, result, released)
    }

    /// Drop every local holder of `record` and delete its token.
    ///
    /// This is the manual recovery path for a token left behind by a holder
    /// that never released it.
    pub async fn force_unlock<P: Provider>(&self, provider: &P, record: &str, zone: &str) -> Result<()> {
        let token = token_name(record, zone);
        let _token = self.tokens.lock(&token).await;
        let _record = self.records.lock(record).await;

        let dropped = self
            .holders
            .lock()
            .await
            .remove(record)
            .map_or(0, |holders| holders.len());
        warn!(
            "Force unlocking record {:?}, deleting token {:?} and {} local holders",
            record, token, dropped
        );
        provider.delete_token(zone, &token, TOKEN_KIND).await
    }

    /// Serialize read-modify-write cycles on `record` within this process.
    ///
    /// Holders sharing a token do not exclude each other, so a writer takes
    /// this guard before locking and keeps it until after unlocking.
    pub(crate) async fn writer(&self, record: &str) -> OwnedMutexGuard<()> {
        self.writers.lock(record).await
    }

    /// Number of local holders of `record`.
    pub async fn holders(&self, record: &str) -> usize {
        self.holders.lock().await.get(record).map_or(0, Vec::len)
    }
}

/// Combine the outcome of a locked body with the outcome of its release.
pub(crate) fn settle<R>(record: &str, result: Result<R>, released: Result<()>) -> Result<R> {
    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(error)) => Err(error),
        (Err(error), Ok(())) => Err(error),
        (Err(error), Err(release)) => {
            warn!("Releasing record {:?} failed after error: {}", record, release);
            Err(error)
        }
    }
}
