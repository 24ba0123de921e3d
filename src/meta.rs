// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

//! Free-form metadata attached to answers and regions.
//!
//! Values are kept exactly as the remote store sent them, so a record written
//! back is unchanged. Comparison and validation use each value's text form:
//! strings as-is, lists joined with commas, anything else as JSON. Order of
//! insertion never matters.

use std::{
    borrow::Cow,
    collections::{BTreeMap, btree_map},
    net::IpAddr,
};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

const GEOREGIONS: &[&str] = &[
    "US-EAST",
    "US-CENTRAL",
    "US-WEST",
    "EUROPE",
    "ASIAPAC",
    "SOUTH-AMERICA",
    "AFRICA",
];

const NOTE_MAX_LEN: usize = 256;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Meta(BTreeMap<String, Value>);

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Text form of the value under `key`.
    pub fn get(&self, key: &str) -> Option<Cow<'_, str>> {
        self.0.get(key).map(text)
    }

    /// Value under `key` as stored.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Entries in key order, values in text form.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Cow<'_, str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), text(v)))
    }

    /// Check every entry, returning one message per problem found.
    pub fn validate(&self) -> Vec<String> {
        self.iter()
            .filter_map(|(key, value)| validate_field(key, &value).err())
            .collect()
    }
}

impl PartialEq for Meta {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.iter().eq(other.iter())
    }
}

impl Eq for Meta {}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Meta {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Meta {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'de> Deserialize<'de> for Meta {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?;
        Ok(Self(raw.unwrap_or_default()))
    }
}

fn text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Array(items) => Cow::Owned(
            items
                .iter()
                .map(|item| text(item).into_owned())
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Cow::Owned(other.to_string()),
    }
}

fn validate_field(key: &str, value: &str) -> Result<(), String> {
    let ok = match key {
        "up" => matches!(value, "true" | "false" | "1" | "0"),
        "weight" | "loadavg" | "low_watermark" | "high_watermark" => value
            .parse::<f64>()
            .is_ok_and(|v| v.is_finite() && v >= 0.0),
        "priority" | "connections" | "requests" => value.parse::<u64>().is_ok(),
        "latitude" => value
            .parse::<f64>()
            .is_ok_and(|v| (-90.0..=90.0).contains(&v)),
        "longitude" => value
            .parse::<f64>()
            .is_ok_and(|v| (-180.0..=180.0).contains(&v)),
        "georegion" => list(value).all(|r| GEOREGIONS.contains(&r)),
        "country" | "us_state" | "ca_province" => list(value)
            .all(|c| c.len() == 2 && c.chars().all(|ch| ch.is_ascii_uppercase())),
        "ip_prefixes" => list(value).all(is_cidr),
        "asn" => list(value).all(|a| a.parse::<u32>().is_ok()),
        "note" => value.chars().count() <= NOTE_MAX_LEN,
        "pulsar" => true,
        _ => return Err(format!("{key}: unknown metadata field")),
    };

    if ok {
        Ok(())
    } else {
        Err(format!("{key}: invalid value {value:?}"))
    }
}

fn list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim)
}

fn is_cidr(value: &str) -> bool {
    let Some((addr, len)) = value.split_once('/') else {
        return false;
    };
    let (Ok(addr), Ok(len)) = (addr.parse::<IpAddr>(), len.parse::<u8>()) else {
        return false;
    };
    match addr {
        IpAddr::V4(_) => len <= 32,
        IpAddr::V6(_) => len <= 128,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_insertion_order() {
        let a = Meta::from_iter([("up", "true"), ("weight", "1")]);
        let mut b = Meta::new();
        b.insert("weight", "1");
        b.insert("up", "true");
        assert_eq!(a, b);
    }

    #[test]
    fn valid_meta_has_no_errors() {
        let meta = Meta::from_iter([
            ("up", "true"),
            ("weight", "2.5"),
            ("priority", "1"),
            ("latitude", "-33.8"),
            ("longitude", "151.2"),
            ("georegion", "US-EAST,EUROPE"),
            ("country", "US,CA"),
            ("ip_prefixes", "10.0.0.0/8, 2001:db8::/32"),
            ("asn", "64512"),
            ("note", "primary"),
        ]);
        assert!(meta.validate().is_empty());
    }

    #[test]
    fn every_invalid_field_is_reported() {
        let meta = Meta::from_iter([
            ("up", "maybe"),
            ("latitude", "91"),
            ("ip_prefixes", "10.0.0.0/33"),
            ("colour", "blue"),
        ]);
        let errors = meta.validate();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&"colour: unknown metadata field".to_string()));
        assert!(errors.contains(&"up: invalid value \"maybe\"".to_string()));
    }

    #[test]
    fn values_compare_by_text_form() {
        let wire: Meta =
            serde_json::from_str(r#"{"up": true, "weight": 3, "georegion": ["US-EAST", "EUROPE"]}"#)
                .unwrap();
        let typed = Meta::from_iter([("up", "true"), ("weight", "3"), ("georegion", "US-EAST,EUROPE")]);
        assert_eq!(wire, typed);
        assert_eq!(wire.get("up").as_deref(), Some("true"));
        assert!(wire.validate().is_empty());

        assert_ne!(wire, Meta::from_iter([("up", "true"), ("weight", "3")]));
    }

    #[test]
    fn serialize_keeps_wire_values() {
        let json = serde_json::json!({"up": true, "weight": {"feed": "f1"}, "note": "x"});
        let meta: Meta = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(meta.get_value("up"), Some(&Value::Bool(true)));
        assert_eq!(serde_json::to_value(&meta).unwrap(), json);

        let meta: Meta = serde_json::from_str("null").unwrap();
        assert!(meta.is_empty());
    }
}
