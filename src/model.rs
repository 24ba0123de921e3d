// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

//! Remote zone and record representations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::meta::Meta;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ZoneSummary {
    pub zone: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Zone {
    pub zone: String,
    #[serde(default)]
    pub records: Vec<RecordSummary>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RecordSummary {
    pub domain: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A whole record, the unit of replacement in the remote store.
///
/// Fields not modelled here are kept in `extra` and written back unchanged.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub zone: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub regions: BTreeMap<String, Region>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn new(zone: impl Into<String>, domain: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            domain: domain.into(),
            kind: kind.into(),
            answers: Vec::new(),
            regions: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    /// Whether answers of this record hold their value as a single field.
    pub fn is_text(&self) -> bool {
        matches!(self.kind.as_str(), "TXT" | "SPF")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Answer {
    #[serde(rename = "answer")]
    pub rdata: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
    /// Remote fields such as the answer id, kept for write-back.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Answer {
    /// Answer whose value is split into positional fields on single spaces.
    pub fn new(value: &str) -> Self {
        Self::from_rdata(value.split(' ').map(str::to_string).collect())
    }

    /// Answer whose whole value is one field.
    pub fn text(value: &str) -> Self {
        Self::from_rdata(vec![value.to_string()])
    }

    fn from_rdata(rdata: Vec<String>) -> Self {
        Self {
            rdata,
            region: None,
            meta: Meta::new(),
            extra: Map::new(),
        }
    }

    /// Value reassembled from its positional fields.
    pub fn value(&self) -> String {
        self.rdata.join(" ")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Region {
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

/// One entry of a record's name-keyed region collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionEntry {
    pub name: String,
    pub meta: Meta,
}
