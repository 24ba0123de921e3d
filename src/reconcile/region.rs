// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use bon::Builder;
use tracing::debug;

use crate::{
    error::{RecordLockError, Result, ValidationErrors},
    identity::element_id,
    meta::Meta,
    model::{Record, Region, RegionEntry},
    reconcile::{Reconciler, SubElementKind},
};

/// Regions of a record, keyed by name.
#[derive(Debug, Clone, Copy)]
pub struct Regions;

pub type RegionReconciler<P> = Reconciler<P, Regions>;

#[derive(Builder, Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionFields {
    #[builder(into)]
    pub name: String,
    #[builder(default, into)]
    pub meta: Meta,
}

impl SubElementKind for Regions {
    const NAME: &'static str = "region";
    const ID_PREFIX: &'static str = "reg";

    type Fields = RegionFields;
    type Element = RegionEntry;

    fn build(_record: &Record, fields: &RegionFields) -> RegionEntry {
        RegionEntry {
            name: fields.name.clone(),
            meta: fields.meta.clone(),
        }
    }

    fn validate(fields: &RegionFields) -> Result<()> {
        let errors = fields.meta.validate();
        if !errors.is_empty() {
            return Err(RecordLockError::Validation(ValidationErrors::new(
                "region metadata",
                errors,
            )));
        }
        Ok(())
    }

    fn fields(entry: &RegionEntry) -> RegionFields {
        RegionFields {
            name: entry.name.clone(),
            meta: entry.meta.clone(),
        }
    }

    fn seed(key: &str) -> RegionFields {
        RegionFields {
            name: key.to_string(),
            meta: Meta::new(),
        }
    }

    fn has_auxiliary(fields: &RegionFields) -> bool {
        !fields.meta.is_empty()
    }

    fn matches(a: &RegionEntry, b: &RegionEntry) -> bool {
        a.name == b.name && a.meta == b.meta
    }

    fn same_primary(a: &RegionEntry, b: &RegionEntry) -> bool {
        a.name == b.name
    }

    fn id(record: &str, entry: &RegionEntry) -> String {
        element_id(Self::ID_PREFIX, record, &entry.name, None, &entry.meta)
    }

    fn elements(record: &Record) -> Vec<RegionEntry> {
        record
            .regions
            .iter()
            .map(|(name, region)| RegionEntry {
                name: name.clone(),
                meta: region.meta.clone(),
            })
            .collect()
    }

    fn insert(record: &mut Record, entry: RegionEntry) {
        if record.regions.contains_key(&entry.name) {
            debug!("Overwriting region {:?} of record {:?}", entry.name, record.domain);
        }
        record.regions.insert(entry.name, Region { meta: entry.meta });
    }

    /// Renaming onto another existing region is refused.
    fn replace(record: &mut Record, old: &RegionEntry, new: RegionEntry) -> Result<()> {
        if new.name != old.name && record.regions.contains_key(&new.name) {
            return Err(RecordLockError::ElementExists {
                kind: Self::NAME,
                key: new.name,
                record: record.domain.clone(),
            });
        }
        record.regions.remove(&old.name);
        Self::insert(record, new);
        Ok(())
    }

    fn remove(record: &mut Record, target: &RegionEntry) -> usize {
        let matched = record
            .regions
            .get(&target.name)
            .is_some_and(|region| region.meta == target.meta);
        if matched {
            record.regions.remove(&target.name);
        }
        usize::from(matched)
    }
}
