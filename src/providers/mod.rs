// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use crate::{
    error::Result,
    model::{Record, Zone, ZoneSummary},
};

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "ns1")]
pub mod ns1;

/// `Provider` is a trait that abstracts the backend specific details of the
/// remote record store.
///
/// The store only offers whole-record reads and replacements. Lock tokens are
/// plain objects in the same store whose existence is the lock.
pub trait Provider {
    /// Whether [Provider::create_token] fails atomically when the token
    /// already exists. Without it, locking is only advisory and
    /// [RecordMutex](crate::RecordMutex) refuses to operate.
    fn exclusive_create(&self) -> bool;

    #[allow(async_fn_in_trait)]
    async fn list_zones(&self) -> Result<Vec<ZoneSummary>>;

    #[allow(async_fn_in_trait)]
    async fn get_zone(&self, zone: &str) -> Result<Zone>;

    #[allow(async_fn_in_trait)]
    async fn get_record(&self, zone: &str, domain: &str, kind: &str) -> Result<Record>;

    /// Overwrite the whole record.
    #[allow(async_fn_in_trait)]
    async fn replace_record(&self, record: &Record) -> Result<Record>;

    /// Create a lock token, failing with
    /// [AlreadyAcquired](crate::RecordLockError::AlreadyAcquired) when it exists.
    #[allow(async_fn_in_trait)]
    async fn create_token(&self, zone: &str, token: &str, kind: &str) -> Result<()>;

    #[allow(async_fn_in_trait)]
    async fn delete_token(&self, zone: &str, token: &str, kind: &str) -> Result<()>;
}
