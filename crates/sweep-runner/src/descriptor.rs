use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

/// Concurrency-control schemes the benchmark binary can be built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    Mica,
    MicaFull,
    SiloOrg,
    Tictoc,
    Hekaton,
    NoWait,
}

impl Scheme {
    pub const ALL: [Scheme; 6] = [
        Scheme::Mica,
        Scheme::MicaFull,
        Scheme::SiloOrg,
        Scheme::Tictoc,
        Scheme::Hekaton,
        Scheme::NoWait,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Mica => "MICA",
            Scheme::MicaFull => "MICA-FULL",
            Scheme::SiloOrg => "SILO-ORG",
            Scheme::Tictoc => "TICTOC",
            Scheme::Hekaton => "HEKATON",
            Scheme::NoWait => "NO-WAIT",
        }
    }

    pub fn parse(s: &str) -> Result<Scheme> {
        Scheme::ALL
            .into_iter()
            .find(|scheme| scheme.as_str() == s)
            .ok_or_else(|| anyhow!("unknown concurrency-control scheme: {}", s))
    }

    /// Token substituted into the CC_ALG definition.
    pub fn cc_token(self) -> &'static str {
        match self {
            Scheme::Mica | Scheme::MicaFull => "MICA",
            Scheme::SiloOrg => "SILO",
            Scheme::Tictoc => "TICTOC",
            Scheme::Hekaton => "HEKATON",
            Scheme::NoWait => "NO_WAIT",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Benchmark workload families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bench {
    Ycsb,
    Tpcc,
    TpccFull,
    Tatp,
}

impl Bench {
    pub const ALL: [Bench; 4] = [Bench::Ycsb, Bench::Tpcc, Bench::TpccFull, Bench::Tatp];

    pub fn as_str(self) -> &'static str {
        match self {
            Bench::Ycsb => "YCSB",
            Bench::Tpcc => "TPCC",
            Bench::TpccFull => "TPCC-FULL",
            Bench::Tatp => "TATP",
        }
    }

    pub fn parse(s: &str) -> Result<Bench> {
        Bench::ALL
            .into_iter()
            .find(|bench| bench.as_str() == s)
            .ok_or_else(|| anyhow!("unknown benchmark workload: {}", s))
    }
}

impl fmt::Display for Bench {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sweep groups partitioning the enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SweepTag {
    Macro,
    Backoff,
    Factor,
    Gc,
    Scan,
}

impl SweepTag {
    pub const ALL: [SweepTag; 5] = [
        SweepTag::Macro,
        SweepTag::Backoff,
        SweepTag::Factor,
        SweepTag::Gc,
        SweepTag::Scan,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SweepTag::Macro => "macro",
            SweepTag::Backoff => "backoff",
            SweepTag::Factor => "factor",
            SweepTag::Gc => "gc",
            SweepTag::Scan => "scan",
        }
    }

    pub fn parse(s: &str) -> Result<SweepTag> {
        SweepTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| anyhow!("unknown sweep tag: {}", s))
    }
}

impl fmt::Display for SweepTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed two-decimal fraction used for float-valued axes (read ratio, skew,
/// backoff constant). Stored as hundredths so equality and the filename
/// round trip are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ratio(u32);

impl Ratio {
    pub const fn from_hundredths(hundredths: u32) -> Ratio {
        Ratio(hundredths)
    }

    pub fn hundredths(self) -> u32 {
        self.0
    }

    /// `1 - self`, valid for ratios in [0, 1].
    pub fn complement(self) -> Ratio {
        Ratio(100u32.saturating_sub(self.0))
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Ratio {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Ratio> {
        let (whole, frac) = s
            .split_once('.')
            .ok_or_else(|| anyhow!("ratio must be a two-decimal literal: {}", s))?;
        if frac.len() != 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            bail!("ratio must have exactly two decimal places: {}", s);
        }
        let whole: u32 = whole
            .parse()
            .map_err(|_| anyhow!("invalid ratio literal: {}", s))?;
        let frac: u32 = frac.parse().map_err(|_| anyhow!("invalid ratio literal: {}", s))?;
        Ok(Ratio(whole * 100 + frac))
    }
}

/// Workload-specific parameters, one variant per benchmark family. Axes
/// that do not apply to a family are not representable for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Workload {
    Ycsb {
        total_count: u64,
        req_per_query: u32,
        read_ratio: Ratio,
        zipf_theta: Ratio,
        scan_length: Option<u32>,
    },
    Tpcc {
        warehouse_count: u32,
    },
    TpccFull {
        warehouse_count: u32,
    },
    Tatp {
        scale_factor: u32,
    },
}

impl Workload {
    pub fn bench(&self) -> Bench {
        match self {
            Workload::Ycsb { .. } => Bench::Ycsb,
            Workload::Tpcc { .. } => Bench::Tpcc,
            Workload::TpccFull { .. } => Bench::TpccFull,
            Workload::Tatp { .. } => Bench::Tatp,
        }
    }
}

/// A single value in a descriptor's field view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(u64),
    Float(Ratio),
    Str(String),
    /// Presence-only boolean; encoded as `1`, absent when false.
    Flag,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(r) => write!(f, "{}", r),
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Flag => f.write_str("1"),
        }
    }
}

/// One fully specified experiment point. Equality is structural and is the
/// dedup key; the encoded field view (see [`Descriptor::fields`]) is the
/// persistence key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    pub seq: u32,
    pub tag: SweepTag,
    pub alg: Scheme,
    pub thread_count: u32,
    pub workload: Workload,
    /// Backoff constant knob; only the backoff sweep sets it.
    pub backoff: Option<Ratio>,
    /// Garbage-collection interval in microseconds; only the gc sweep sets it.
    pub gc_interval: Option<u64>,
    pub no_pre_validation: bool,
    pub no_write_sort: bool,
    pub no_newest_version: bool,
}

impl Descriptor {
    pub fn new(seq: u32, tag: SweepTag, alg: Scheme, thread_count: u32, workload: Workload) -> Descriptor {
        Descriptor {
            seq,
            tag,
            alg,
            thread_count,
            workload,
            backoff: None,
            gc_interval: None,
            no_pre_validation: false,
            no_write_sort: false,
            no_newest_version: false,
        }
    }

    pub fn bench(&self) -> Bench {
        self.workload.bench()
    }

    /// Flat field view: every present parameter under its canonical key.
    /// Irrelevant axes are simply absent.
    pub fn fields(&self) -> BTreeMap<&'static str, FieldValue> {
        let mut map = BTreeMap::new();
        map.insert("seq", FieldValue::Int(u64::from(self.seq)));
        map.insert("tag", FieldValue::Str(self.tag.as_str().to_string()));
        map.insert("alg", FieldValue::Str(self.alg.as_str().to_string()));
        map.insert("thread_count", FieldValue::Int(u64::from(self.thread_count)));
        map.insert("bench", FieldValue::Str(self.bench().as_str().to_string()));
        match &self.workload {
            Workload::Ycsb {
                total_count,
                req_per_query,
                read_ratio,
                zipf_theta,
                scan_length,
            } => {
                map.insert("total_count", FieldValue::Int(*total_count));
                map.insert("req_per_query", FieldValue::Int(u64::from(*req_per_query)));
                map.insert("read_ratio", FieldValue::Float(*read_ratio));
                map.insert("zipf_theta", FieldValue::Float(*zipf_theta));
                if let Some(len) = scan_length {
                    map.insert("scan_length", FieldValue::Int(u64::from(*len)));
                }
            }
            Workload::Tpcc { warehouse_count } | Workload::TpccFull { warehouse_count } => {
                map.insert("warehouse_count", FieldValue::Int(u64::from(*warehouse_count)));
            }
            Workload::Tatp { scale_factor } => {
                map.insert("scale_factor", FieldValue::Int(u64::from(*scale_factor)));
            }
        }
        if let Some(backoff) = self.backoff {
            map.insert("backoff", FieldValue::Float(backoff));
        }
        if let Some(gc) = self.gc_interval {
            map.insert("gc_interval", FieldValue::Int(gc));
        }
        if self.no_pre_validation {
            map.insert("no_pre_validation", FieldValue::Flag);
        }
        if self.no_write_sort {
            map.insert("no_write_sort", FieldValue::Flag);
        }
        if self.no_newest_version {
            map.insert("no_newest_version", FieldValue::Flag);
        }
        map
    }

    /// Rebuilds a descriptor from a decoded field map. The map must carry
    /// exactly the keys the tagged representation requires; anything left
    /// over is an error, as is anything missing.
    pub fn from_fields(fields: &BTreeMap<String, FieldValue>) -> Result<Descriptor> {
        let mut map = fields.clone();

        let seq = take_int(&mut map, "seq")?;
        let seq = u32::try_from(seq).map_err(|_| anyhow!("seq out of range: {}", seq))?;
        let tag = SweepTag::parse(&take_str(&mut map, "tag")?)?;
        let alg = Scheme::parse(&take_str(&mut map, "alg")?)?;
        let thread_count = take_int(&mut map, "thread_count")?;
        if thread_count < 1 {
            bail!("thread_count must be >= 1");
        }
        let thread_count = u32::try_from(thread_count)
            .map_err(|_| anyhow!("thread_count out of range: {}", thread_count))?;
        let bench = Bench::parse(&take_str(&mut map, "bench")?)?;

        let workload = match bench {
            Bench::Ycsb => Workload::Ycsb {
                total_count: take_int(&mut map, "total_count")?,
                req_per_query: take_u32(&mut map, "req_per_query")?,
                read_ratio: take_float(&mut map, "read_ratio")?,
                zipf_theta: take_float(&mut map, "zipf_theta")?,
                scan_length: take_opt_u32(&mut map, "scan_length")?,
            },
            Bench::Tpcc => Workload::Tpcc {
                warehouse_count: take_u32(&mut map, "warehouse_count")?,
            },
            Bench::TpccFull => Workload::TpccFull {
                warehouse_count: take_u32(&mut map, "warehouse_count")?,
            },
            Bench::Tatp => Workload::Tatp {
                scale_factor: take_u32(&mut map, "scale_factor")?,
            },
        };

        let backoff = take_opt_float(&mut map, "backoff")?;
        let gc_interval = take_opt_int(&mut map, "gc_interval")?;
        let no_pre_validation = take_flag(&mut map, "no_pre_validation")?;
        let no_write_sort = take_flag(&mut map, "no_write_sort")?;
        let no_newest_version = take_flag(&mut map, "no_newest_version")?;

        if !map.is_empty() {
            let leftover: Vec<&str> = map.keys().map(String::as_str).collect();
            bail!(
                "keys {:?} do not apply to bench {}",
                leftover,
                bench.as_str()
            );
        }

        Ok(Descriptor {
            seq,
            tag,
            alg,
            thread_count,
            workload,
            backoff,
            gc_interval,
            no_pre_validation,
            no_write_sort,
            no_newest_version,
        })
    }
}

fn take_str(map: &mut BTreeMap<String, FieldValue>, key: &str) -> Result<String> {
    match map.remove(key) {
        Some(FieldValue::Str(s)) => Ok(s),
        Some(other) => bail!("key {} must be a string, got {}", key, other),
        None => bail!("missing required key: {}", key),
    }
}

fn take_int(map: &mut BTreeMap<String, FieldValue>, key: &str) -> Result<u64> {
    match map.remove(key) {
        Some(FieldValue::Int(v)) => Ok(v),
        Some(other) => bail!("key {} must be an integer, got {}", key, other),
        None => bail!("missing required key: {}", key),
    }
}

fn take_u32(map: &mut BTreeMap<String, FieldValue>, key: &str) -> Result<u32> {
    let v = take_int(map, key)?;
    u32::try_from(v).map_err(|_| anyhow!("key {} out of range: {}", key, v))
}

fn take_opt_int(map: &mut BTreeMap<String, FieldValue>, key: &str) -> Result<Option<u64>> {
    match map.remove(key) {
        Some(FieldValue::Int(v)) => Ok(Some(v)),
        Some(other) => bail!("key {} must be an integer, got {}", key, other),
        None => Ok(None),
    }
}

fn take_opt_u32(map: &mut BTreeMap<String, FieldValue>, key: &str) -> Result<Option<u32>> {
    match take_opt_int(map, key)? {
        Some(v) => Ok(Some(
            u32::try_from(v).map_err(|_| anyhow!("key {} out of range: {}", key, v))?,
        )),
        None => Ok(None),
    }
}

fn take_float(map: &mut BTreeMap<String, FieldValue>, key: &str) -> Result<Ratio> {
    match map.remove(key) {
        Some(FieldValue::Float(r)) => Ok(r),
        Some(other) => bail!("key {} must be a ratio, got {}", key, other),
        None => bail!("missing required key: {}", key),
    }
}

fn take_opt_float(map: &mut BTreeMap<String, FieldValue>, key: &str) -> Result<Option<Ratio>> {
    match map.remove(key) {
        Some(FieldValue::Float(r)) => Ok(Some(r)),
        Some(other) => bail!("key {} must be a ratio, got {}", key, other),
        None => Ok(None),
    }
}

fn take_flag(map: &mut BTreeMap<String, FieldValue>, key: &str) -> Result<bool> {
    match map.remove(key) {
        Some(FieldValue::Flag) => Ok(true),
        Some(other) => bail!("key {} must be a presence flag, got {}", key, other),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ycsb_point() -> Descriptor {
        Descriptor::new(
            0,
            SweepTag::Macro,
            Scheme::Mica,
            4,
            Workload::Ycsb {
                total_count: 10_000_000,
                req_per_query: 16,
                read_ratio: Ratio::from_hundredths(50),
                zipf_theta: Ratio::from_hundredths(99),
                scan_length: None,
            },
        )
    }

    #[test]
    fn ratio_formats_with_two_decimals() {
        assert_eq!(Ratio::from_hundredths(0).to_string(), "0.00");
        assert_eq!(Ratio::from_hundredths(50).to_string(), "0.50");
        assert_eq!(Ratio::from_hundredths(99).to_string(), "0.99");
        assert_eq!(Ratio::from_hundredths(800).to_string(), "8.00");
    }

    #[test]
    fn ratio_parse_is_strict() {
        assert_eq!("0.50".parse::<Ratio>().expect("parse"), Ratio::from_hundredths(50));
        assert_eq!("8.00".parse::<Ratio>().expect("parse"), Ratio::from_hundredths(800));
        assert!("0.5".parse::<Ratio>().is_err());
        assert!(".50".parse::<Ratio>().is_err());
        assert!("1".parse::<Ratio>().is_err());
        assert!("0.505".parse::<Ratio>().is_err());
    }

    #[test]
    fn ratio_complement() {
        assert_eq!(
            Ratio::from_hundredths(95).complement(),
            Ratio::from_hundredths(5)
        );
        assert_eq!(
            Ratio::from_hundredths(100).complement(),
            Ratio::from_hundredths(0)
        );
    }

    #[test]
    fn fields_round_trip_through_from_fields() {
        let d = ycsb_point();
        let fields: BTreeMap<String, FieldValue> = d
            .fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let rebuilt = Descriptor::from_fields(&fields).expect("rebuild");
        assert_eq!(rebuilt, d);
    }

    #[test]
    fn from_fields_rejects_missing_workload_key() {
        let d = ycsb_point();
        let mut fields: BTreeMap<String, FieldValue> = d
            .fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        fields.remove("zipf_theta");
        let err = Descriptor::from_fields(&fields).expect_err("must fail");
        assert!(err.to_string().contains("zipf_theta"), "got: {}", err);
    }

    #[test]
    fn from_fields_rejects_keys_foreign_to_bench() {
        let d = Descriptor::new(
            1,
            SweepTag::Macro,
            Scheme::Tictoc,
            28,
            Workload::Tpcc { warehouse_count: 28 },
        );
        let mut fields: BTreeMap<String, FieldValue> = d
            .fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        fields.insert(
            "zipf_theta".to_string(),
            FieldValue::Float(Ratio::from_hundredths(99)),
        );
        let err = Descriptor::from_fields(&fields).expect_err("must fail");
        assert!(err.to_string().contains("zipf_theta"), "got: {}", err);
    }

    #[test]
    fn from_fields_rejects_zero_threads() {
        let d = ycsb_point();
        let mut fields: BTreeMap<String, FieldValue> = d
            .fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        fields.insert("thread_count".to_string(), FieldValue::Int(0));
        assert!(Descriptor::from_fields(&fields).is_err());
    }

    #[test]
    fn scheme_strings_avoid_codec_separators() {
        for scheme in Scheme::ALL {
            assert!(!scheme.as_str().contains('='));
            assert!(!scheme.as_str().contains(','));
            assert!(!scheme.as_str().contains('_'));
        }
    }
}
