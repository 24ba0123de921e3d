// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

//! Names and identifiers derived from record and sub-element contents.

use std::fmt;

use uuid::Uuid;

use crate::meta::Meta;

/// Record kind used for lock tokens.
pub const TOKEN_KIND: &str = "TXT";

/// Non-negative CRC-32 (IEEE) of `s`.
pub fn hashcode(s: &str) -> u32 {
    crc32fast::hash(s.as_bytes())
}

/// Name of the token guarding `record` inside `zone`.
///
/// Only the record name is hashed, so every lookup path that resolves the same
/// record targets the same token.
pub fn token_name(record: &str, zone: &str) -> String {
    format!("{}.{}", hashcode(record), zone)
}

/// External identifier for a reconciled sub-element, e.g. `ans-1234567`.
///
/// Recomputed from contents on every read, never parsed.
pub fn element_id(prefix: &str, record: &str, key: &str, label: Option<&str>, meta: &Meta) -> String {
    let mut buf = format!("{record}-{key}-");
    if let Some(label) = label {
        buf.push_str(label);
        buf.push('-');
    }
    for (k, v) in meta.iter() {
        buf.push_str(k);
        buf.push('-');
        buf.push_str(&v);
        buf.push('-');
    }
    format!("{prefix}-{}", hashcode(&buf))
}

/// Identity of one logical lock holder within this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HolderId(Uuid);

impl HolderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HolderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
