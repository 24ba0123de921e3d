// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

//! Lock, refetch, mutate, replace, unlock.
//!
//! A [Reconciler] applies one change to one sub-element of a record. The store
//! has no partial update, so every change rewrites the whole record; the lock
//! keeps two processes from rewriting the same record from stale copies.

use std::{fmt, marker::PhantomData, sync::Arc};

use bon::Builder;
use tracing::debug;

use crate::{
    error::{RecordLockError, Result},
    identity::HolderId,
    model::Record,
    mutex::{RecordMutex, settle},
    providers::Provider,
};

pub mod answer;
pub mod region;

/// How one kind of sub-element is built, compared and stored in a record.
pub trait SubElementKind {
    /// Used in log lines and errors.
    const NAME: &'static str;
    /// Prefix of external identifiers.
    const ID_PREFIX: &'static str;

    /// Caller-supplied description of an element.
    type Fields: Clone + fmt::Debug + Send + Sync;
    /// The element as stored in the record.
    type Element: Clone + fmt::Debug + PartialEq + Send + Sync;

    /// Build an element from `fields`. `record` is the freshly fetched parent,
    /// whose kind may change how fields are interpreted.
    fn build(record: &Record, fields: &Self::Fields) -> Self::Element;

    /// Check fields that are about to be written.
    fn validate(fields: &Self::Fields) -> Result<()>;

    /// Fields describing `element`.
    fn fields(element: &Self::Element) -> Self::Fields;

    /// Fields holding only the primary value `key`.
    fn seed(key: &str) -> Self::Fields;

    /// Whether `fields` carry anything beyond the primary value.
    fn has_auxiliary(fields: &Self::Fields) -> bool;

    /// Structural equality: primary value, label and metadata.
    fn matches(a: &Self::Element, b: &Self::Element) -> bool;

    fn same_primary(a: &Self::Element, b: &Self::Element) -> bool;

    fn id(record: &str, element: &Self::Element) -> String;

    fn elements(record: &Record) -> Vec<Self::Element>;

    fn insert(record: &mut Record, element: Self::Element);

    /// Replace the entry matching `old` in place.
    fn replace(record: &mut Record, old: &Self::Element, new: Self::Element) -> Result<()>;

    /// Remove every entry matching `target`, returning how many were removed.
    fn remove(record: &mut Record, target: &Self::Element) -> usize;
}

/// A change to one sub-element.
#[derive(Debug, Clone)]
pub enum Operation<F> {
    Create(F),
    /// `old` locates the element, `new` replaces it.
    Update { old: F, new: F },
    /// Fields of the element as currently persisted.
    Delete(F),
}

impl<F> Operation<F> {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Create(_) => "create",
            Operation::Update { .. } => "update",
            Operation::Delete(_) => "delete",
        }
    }
}

/// Observed state of a sub-element after a read or a write.
#[derive(Debug, Clone)]
pub struct Observed<K: SubElementKind> {
    pub id: String,
    pub record: String,
    pub fields: K::Fields,
    pub element: K::Element,
}

impl<K: SubElementKind> Observed<K> {
    fn new(record: &str, element: K::Element) -> Self {
        Self {
            id: K::id(record, &element),
            record: record.to_string(),
            fields: K::fields(&element),
            element,
        }
    }
}

/// Starting point for adopting existing remote state, parsed from
/// `"<record>/<key>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSeed {
    pub record: String,
    pub key: String,
}

impl ImportSeed {
    pub fn parse(specifier: &str) -> Result<Self> {
        match specifier.split_once('/') {
            Some((record, key)) if !key.contains('/') => Ok(Self {
                record: record.to_string(),
                key: key.to_string(),
            }),
            _ => Err(RecordLockError::InvalidImport(specifier.matches('/').count())),
        }
    }
}

/// Find the record named `domain` in any zone.
///
/// The store can only fetch a record through its zone, so every zone is
/// scanned in listing order and the first match wins.
pub async fn find_record<P: Provider>(provider: &P, domain: &str) -> Result<Record> {
    for summary in provider.list_zones().await? {
        let zone = provider.get_zone(&summary.zone).await?;
        if let Some(found) = zone.records.iter().find(|r| r.domain == domain) {
            debug!("Resolved record {:?} in zone {:?}", domain, zone.zone);
            return provider.get_record(&zone.zone, &found.domain, &found.kind).await;
        }
    }
    Err(RecordLockError::RecordNotFound(domain.to_string()))
}

fn locate<K: SubElementKind>(record: &Record, target: &K::Element, loose: bool) -> Option<K::Element> {
    K::elements(record).into_iter().find(|element| {
        if loose {
            K::same_primary(element, target)
        } else {
            K::matches(element, target)
        }
    })
}

/// Applies changes of one sub-element kind to records.
#[derive(Builder, Debug)]
pub struct Reconciler<P, K>
where
    P: Provider,
    K: SubElementKind,
{
    provider: P,
    mutex: Arc<RecordMutex>,

    #[builder(skip)]
    kind: PhantomData<fn() -> K>,
}

impl<P, K> Reconciler<P, K>
where
    P: Provider,
    K: SubElementKind,
{
    pub fn new(provider: P, mutex: Arc<RecordMutex>) -> Self {
        Self {
            provider,
            mutex,
            kind: PhantomData,
        }
    }

    /// Apply `operation` to the sub-elements of `record_name`.
    ///
    /// The record is resolved to learn its zone, locked, and resolved again so
    /// the change is made against the latest copy. Changes to one record made
    /// through the same [RecordMutex] run one at a time. The lock is released
    /// whether or not the change succeeds. Returns the written element for
    /// create and update, and `None` after a delete.
    pub async fn apply(
        &self,
        record_name: &str,
        operation: Operation<K::Fields>,
    ) -> Result<Option<Observed<K>>> {
        let zone = find_record(&self.provider, record_name).await?.zone;

        let _writer = self.mutex.writer(record_name).await;
        let holder = HolderId::new();
        self.mutex
            .lock(&self.provider, record_name, &zone, holder)
            .await?;
        debug!(
            "Locked record {:?} to {} {}",
            record_name,
            operation.name(),
            K::NAME
        );

        let result = self.mutate(record_name, &operation).await;
        let released = self
            .mutex
            .unlock(&self.provider, record_name, &zone, holder)
            .await;
        let observed = settle(record_name, result, released)?;

        debug!(
            "Finished {} of {} on record {:?}",
            operation.name(),
            K::NAME,
            record_name
        );
        Ok(observed.map(|element| Observed::new(record_name, element)))
    }

    async fn mutate(
        &self,
        record_name: &str,
        operation: &Operation<K::Fields>,
    ) -> Result<Option<K::Element>> {
        let mut record = find_record(&self.provider, record_name).await?;

        let written = match operation {
            Operation::Create(fields) => {
                K::validate(fields)?;
                let candidate = K::build(&record, fields);
                K::insert(&mut record, candidate.clone());
                Some(candidate)
            }
            Operation::Update { old, new } => {
                K::validate(new)?;
                let candidate = K::build(&record, new);
                let previous = self.require(&record, &K::build(&record, old))?;
                K::replace(&mut record, &previous, candidate.clone())?;
                Some(candidate)
            }
            Operation::Delete(current) => {
                let target = K::build(&record, current);
                self.require(&record, &target)?;
                let removed = K::remove(&mut record, &target);
                debug!("Removed {} {} from record {:?}", removed, K::NAME, record_name);
                None
            }
        };

        self.provider.replace_record(&record).await?;
        Ok(written)
    }

    fn require(&self, record: &Record, target: &K::Element) -> Result<K::Element> {
        locate::<K>(record, target, false).ok_or_else(|| RecordLockError::ElementNotFound {
            kind: K::NAME,
            record: record.domain.clone(),
        })
    }

    /// Read the element described by `fields` without locking.
    ///
    /// A missing record is reported as a missing element. When `fields` hold
    /// only the primary value, only the primary value is compared.
    pub async fn find_current(
        &self,
        record_name: &str,
        fields: &K::Fields,
    ) -> Result<Option<Observed<K>>> {
        let record = match find_record(&self.provider, record_name).await {
            Ok(record) => record,
            Err(RecordLockError::RecordNotFound(_)) => {
                debug!("Record {:?} is gone", record_name);
                return Ok(None);
            }
            Err(error) => return Err(error),
        };

        let target = K::build(&record, fields);
        let loose = !K::has_auxiliary(fields);
        Ok(locate::<K>(&record, &target, loose).map(|element| Observed::new(record_name, element)))
    }

    /// Adopt an existing element from a `"<record>/<key>"` specifier.
    pub async fn import(&self, specifier: &str) -> Result<Option<Observed<K>>> {
        let seed = ImportSeed::parse(specifier)?;
        self.find_current(&seed.record, &K::seed(&seed.key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_seed_splits_on_single_slash() {
        let seed = ImportSeed::parse("a.example.com/1.2.3.4").unwrap();
        assert_eq!(seed.record, "a.example.com");
        assert_eq!(seed.key, "1.2.3.4");
    }

    #[test]
    fn import_seed_rejects_wrong_separator_count() {
        assert!(matches!(
            ImportSeed::parse("a.example.com"),
            Err(RecordLockError::InvalidImport(0))
        ));
        assert!(matches!(
            ImportSeed::parse("a.example.com/1.2.3.4/x"),
            Err(RecordLockError::InvalidImport(2))
        ));
        assert!(matches!(
            ImportSeed::parse("a/b/c/d"),
            Err(RecordLockError::InvalidImport(3))
        ));
    }

    #[test]
    fn operation_names() {
        assert_eq!(Operation::Create(()).name(), "create");
        assert_eq!(Operation::Update { old: (), new: () }.name(), "update");
        assert_eq!(Operation::Delete(()).name(), "delete");
    }
}
