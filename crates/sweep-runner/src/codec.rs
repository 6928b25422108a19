//! Canonical, reversible filenames for persisted results.
//!
//! A descriptor encodes to `output_<key=value>,...<key=value>.txt` with keys
//! in lexicographic order. Sorted-key serialization is injective as long as
//! no value contains a separator character, which `encode` enforces.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};

use crate::descriptor::{Descriptor, FieldValue, Ratio};

pub const PREFIX: &str = "output_";
pub const SUFFIX: &str = ".txt";

const SEP_TUPLE: char = ',';
const SEP_KV: char = '=';

/// Declared value kind per key. Decoding re-parses the raw substring per
/// this table and asserts the round trip to catch formatting drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Int,
    Float,
    Flag,
    Str,
}

const KEY_KINDS: &[(&str, Kind)] = &[
    ("alg", Kind::Str),
    ("backoff", Kind::Float),
    ("bench", Kind::Str),
    ("gc_interval", Kind::Int),
    ("no_newest_version", Kind::Flag),
    ("no_pre_validation", Kind::Flag),
    ("no_write_sort", Kind::Flag),
    ("read_ratio", Kind::Float),
    ("req_per_query", Kind::Int),
    ("scale_factor", Kind::Int),
    ("scan_length", Kind::Int),
    ("seq", Kind::Int),
    ("tag", Kind::Str),
    ("thread_count", Kind::Int),
    ("total_count", Kind::Int),
    ("warehouse_count", Kind::Int),
    ("zipf_theta", Kind::Float),
];

pub fn key_kind(key: &str) -> Option<Kind> {
    KEY_KINDS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, kind)| *kind)
}

pub fn encode(descriptor: &Descriptor) -> Result<String> {
    let mut parts = Vec::new();
    for (key, value) in descriptor.fields() {
        if key_kind(key).is_none() {
            bail!("descriptor key {} is not in the codec table", key);
        }
        let rendered = value.to_string();
        if rendered.contains(SEP_TUPLE) || rendered.contains(SEP_KV) {
            bail!(
                "value {:?} for key {} contains a filename separator",
                rendered,
                key
            );
        }
        parts.push(format!("{}{}{}", key, SEP_KV, rendered));
    }
    Ok(format!(
        "{}{}{}",
        PREFIX,
        parts.join(&SEP_TUPLE.to_string()),
        SUFFIX
    ))
}

pub fn decode(name: &str) -> Result<Descriptor> {
    let body = name
        .strip_prefix(PREFIX)
        .and_then(|s| s.strip_suffix(SUFFIX))
        .ok_or_else(|| anyhow!("not a canonical result filename: {}", name))?;

    let mut fields: BTreeMap<String, FieldValue> = BTreeMap::new();
    let mut prev_key: Option<String> = None;
    for tuple in body.split(SEP_TUPLE) {
        let (key, raw) = tuple
            .split_once(SEP_KV)
            .ok_or_else(|| anyhow!("malformed tuple {:?} in {}", tuple, name))?;
        let kind = key_kind(key)
            .ok_or_else(|| anyhow!("unknown descriptor key {} in {}", key, name))?;
        if let Some(prev) = &prev_key {
            if prev.as_str() >= key {
                bail!("keys out of canonical order in {}", name);
            }
        }
        prev_key = Some(key.to_string());

        let value = match kind {
            Kind::Int => {
                let parsed: u64 = raw
                    .parse()
                    .map_err(|_| anyhow!("key {} has non-integer value {:?} in {}", key, raw, name))?;
                if parsed.to_string() != raw {
                    bail!("non-canonical integer {:?} for key {} in {}", raw, key, name);
                }
                FieldValue::Int(parsed)
            }
            Kind::Float => {
                let parsed: Ratio = raw
                    .parse()
                    .map_err(|_| anyhow!("key {} has non-ratio value {:?} in {}", key, raw, name))?;
                if parsed.to_string() != raw {
                    bail!("non-canonical ratio {:?} for key {} in {}", raw, key, name);
                }
                FieldValue::Float(parsed)
            }
            Kind::Flag => {
                if raw != "1" {
                    bail!("flag key {} must encode as 1, got {:?} in {}", key, raw, name);
                }
                FieldValue::Flag
            }
            Kind::Str => FieldValue::Str(raw.to_string()),
        };
        fields.insert(key.to_string(), value);
    }

    Descriptor::from_fields(&fields)
}
