//! Configuration-template materialization.
//!
//! The template is a text of `#define NAME value` lines. Every substitution
//! must match exactly one line; zero or multiple matches mean the template
//! has drifted and the whole sweep must stop rather than silently no-op a
//! parameter.

use anyhow::{bail, Result};

use crate::descriptor::{Descriptor, Scheme, Workload};

pub fn replace_def(conf: &str, name: &str, value: &str) -> Result<String> {
    let mut out = String::with_capacity(conf.len());
    let mut replaced = 0;
    for line in conf.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next() == Some("#define") && tokens.next() == Some(name) {
            replaced += 1;
            out.push_str("#define ");
            out.push_str(name);
            out.push(' ');
            out.push_str(value);
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    if replaced != 1 {
        bail!(
            "expected exactly one '#define {}' line in template, found {}",
            name,
            replaced
        );
    }
    Ok(out)
}

fn set_scheme(conf: String, alg: Scheme) -> Result<String> {
    let conf = replace_def(&conf, "CC_ALG", alg.cc_token())?;
    let conf = replace_def(&conf, "ISOLATION_LEVEL", "SERIALIZABLE")?;

    let (validation_lock, pre_abort) = if alg == Scheme::SiloOrg {
        ("\"waiting\"", "\"false\"")
    } else {
        ("\"no-wait\"", "\"true\"")
    };
    let conf = replace_def(&conf, "VALIDATION_LOCK", validation_lock)?;
    let conf = replace_def(&conf, "PRE_ABORT", pre_abort)?;

    let index_struct = if alg == Scheme::MicaFull {
        "IDX_MICA"
    } else {
        "IDX_HASH"
    };
    replace_def(&conf, "INDEX_STRUCT", index_struct)
}

fn set_workload(conf: String, workload: &Workload) -> Result<String> {
    match workload {
        Workload::Ycsb {
            total_count,
            req_per_query,
            read_ratio,
            zipf_theta,
            scan_length,
        } => {
            let conf = replace_def(&conf, "WORKLOAD", "YCSB")?;
            // Single-record transactions finish fast enough for a larger
            // measured count.
            let txn_count = if *req_per_query <= 2 { "1000000" } else { "100000" };
            let conf = replace_def(&conf, "WARMUP", txn_count)?;
            let conf = replace_def(&conf, "MAX_TXN_PER_PART", txn_count)?;
            let conf = replace_def(&conf, "INIT_PARALLELISM", "2")?;
            let conf = replace_def(&conf, "MAX_TUPLE_SIZE", "100")?;
            let conf = replace_def(&conf, "SYNTH_TABLE_SIZE", &total_count.to_string())?;
            let conf = replace_def(&conf, "REQ_PER_QUERY", &req_per_query.to_string())?;
            let conf = replace_def(&conf, "ZIPF_THETA", &zipf_theta.to_string())?;
            match scan_length {
                Some(len) => {
                    // Scans take the read share of the mix.
                    let conf = replace_def(&conf, "READ_PERC", "0.00")?;
                    let conf = replace_def(&conf, "SCAN_PERC", &read_ratio.to_string())?;
                    let conf =
                        replace_def(&conf, "WRITE_PERC", &read_ratio.complement().to_string())?;
                    replace_def(&conf, "MAX_SCAN_LEN", &len.to_string())
                }
                None => {
                    let conf = replace_def(&conf, "READ_PERC", &read_ratio.to_string())?;
                    let conf =
                        replace_def(&conf, "WRITE_PERC", &read_ratio.complement().to_string())?;
                    replace_def(&conf, "SCAN_PERC", "0")
                }
            }
        }
        Workload::Tpcc { warehouse_count } | Workload::TpccFull { warehouse_count } => {
            let conf = replace_def(&conf, "WORKLOAD", "TPCC")?;
            let conf = replace_def(&conf, "WARMUP", "100000")?;
            let conf = replace_def(&conf, "MAX_TXN_PER_PART", "100000")?;
            let conf = replace_def(&conf, "MAX_TUPLE_SIZE", "704")?;
            let conf = replace_def(&conf, "NUM_WH", &warehouse_count.to_string())?;
            let full = if matches!(workload, Workload::TpccFull { .. }) {
                "true"
            } else {
                "false"
            };
            replace_def(&conf, "TPCC_FULL", full)
        }
        Workload::Tatp { scale_factor } => {
            let conf = replace_def(&conf, "WORKLOAD", "TATP")?;
            let conf = replace_def(&conf, "WARMUP", "100000")?;
            let conf = replace_def(&conf, "MAX_TXN_PER_PART", "100000")?;
            let conf = replace_def(&conf, "MAX_TUPLE_SIZE", "64")?;
            replace_def(&conf, "TATP_SCALE_FACTOR", &scale_factor.to_string())
        }
    }
}

/// Knob definitions are opt-in: a line is only rewritten when the
/// descriptor carries the corresponding key, never defaulted.
fn set_knobs(conf: String, descriptor: &Descriptor) -> Result<String> {
    let mut conf = conf;
    if let Some(backoff) = descriptor.backoff {
        conf = replace_def(&conf, "MICA_MAX_BACKOFF", &backoff.to_string())?;
    }
    if let Some(gc) = descriptor.gc_interval {
        conf = replace_def(&conf, "MICA_GC_INTERVAL_US", &gc.to_string())?;
    }
    if descriptor.no_pre_validation {
        conf = replace_def(&conf, "MICA_NO_PRE_VALIDATION", "true")?;
    }
    if descriptor.no_write_sort {
        conf = replace_def(&conf, "MICA_NO_WRITE_SORT", "true")?;
    }
    if descriptor.no_newest_version {
        conf = replace_def(&conf, "MICA_NO_NEWEST_VERSION", "true")?;
    }
    Ok(conf)
}

/// Rewrites the template for one experiment point.
pub fn materialize(template: &str, descriptor: &Descriptor) -> Result<String> {
    let conf = set_scheme(template.to_string(), descriptor.alg)?;
    let conf = replace_def(&conf, "THREAD_CNT", &descriptor.thread_count.to_string())?;
    let conf = set_workload(conf, &descriptor.workload)?;
    set_knobs(conf, descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Ratio, SweepTag};

    const TEST_TEMPLATE: &str = "\
#define CC_ALG SILO
#define ISOLATION_LEVEL SNAPSHOT
#define VALIDATION_LOCK \"waiting\"
#define PRE_ABORT \"false\"
#define INDEX_STRUCT IDX_BTREE
#define THREAD_CNT 1
#define WORKLOAD TPCC
#define WARMUP 0
#define MAX_TXN_PER_PART 0
#define INIT_PARALLELISM 1
#define MAX_TUPLE_SIZE 0
#define SYNTH_TABLE_SIZE 0
#define REQ_PER_QUERY 0
#define READ_PERC 0.9
#define WRITE_PERC 0.1
#define SCAN_PERC 0
#define ZIPF_THETA 0.6
#define MAX_SCAN_LEN 20
#define NUM_WH 1
#define TPCC_FULL false
#define TATP_SCALE_FACTOR 1
#define MICA_MAX_BACKOFF 1.00
#define MICA_GC_INTERVAL_US 100
#define MICA_NO_PRE_VALIDATION false
#define MICA_NO_WRITE_SORT false
#define MICA_NO_NEWEST_VERSION false
";

    fn has_line(conf: &str, line: &str) -> bool {
        conf.lines().any(|l| l == line)
    }

    fn ycsb_baseline() -> Descriptor {
        Descriptor::new(
            0,
            SweepTag::Macro,
            Scheme::Mica,
            4,
            Workload::Ycsb {
                total_count: 10_000_000,
                req_per_query: 16,
                read_ratio: Ratio::from_hundredths(50),
                zipf_theta: Ratio::from_hundredths(0),
                scan_length: None,
            },
        )
    }

    #[test]
    fn ycsb_baseline_materializes_every_required_definition() {
        let conf = materialize(TEST_TEMPLATE, &ycsb_baseline()).expect("materialize");
        assert!(has_line(&conf, "#define WORKLOAD YCSB"));
        assert!(has_line(&conf, "#define THREAD_CNT 4"));
        assert!(has_line(&conf, "#define READ_PERC 0.50"));
        assert!(has_line(&conf, "#define WRITE_PERC 0.50"));
        assert!(has_line(&conf, "#define SCAN_PERC 0"));
        assert!(has_line(&conf, "#define ZIPF_THETA 0.00"));
        assert!(has_line(&conf, "#define SYNTH_TABLE_SIZE 10000000"));
        assert!(has_line(&conf, "#define REQ_PER_QUERY 16"));
        assert!(has_line(&conf, "#define WARMUP 100000"));
        assert!(has_line(&conf, "#define CC_ALG MICA"));
        assert!(has_line(&conf, "#define ISOLATION_LEVEL SERIALIZABLE"));
        assert!(has_line(&conf, "#define INDEX_STRUCT IDX_HASH"));
    }

    #[test]
    fn single_request_ycsb_uses_the_larger_transaction_count() {
        let mut d = ycsb_baseline();
        d.workload = Workload::Ycsb {
            total_count: 10_000_000,
            req_per_query: 1,
            read_ratio: Ratio::from_hundredths(95),
            zipf_theta: Ratio::from_hundredths(99),
            scan_length: None,
        };
        let conf = materialize(TEST_TEMPLATE, &d).expect("materialize");
        assert!(has_line(&conf, "#define WARMUP 1000000"));
        assert!(has_line(&conf, "#define MAX_TXN_PER_PART 1000000"));
    }

    #[test]
    fn scheme_branches_select_validation_and_index() {
        let mut d = ycsb_baseline();
        d.alg = Scheme::SiloOrg;
        let conf = materialize(TEST_TEMPLATE, &d).expect("materialize");
        assert!(has_line(&conf, "#define CC_ALG SILO"));
        assert!(has_line(&conf, "#define VALIDATION_LOCK \"waiting\""));
        assert!(has_line(&conf, "#define PRE_ABORT \"false\""));

        d.alg = Scheme::MicaFull;
        let conf = materialize(TEST_TEMPLATE, &d).expect("materialize");
        assert!(has_line(&conf, "#define INDEX_STRUCT IDX_MICA"));
        assert!(has_line(&conf, "#define VALIDATION_LOCK \"no-wait\""));
    }

    #[test]
    fn tpcc_full_toggles_the_full_mix() {
        let d = Descriptor::new(
            0,
            SweepTag::Macro,
            Scheme::Tictoc,
            28,
            Workload::TpccFull { warehouse_count: 28 },
        );
        let conf = materialize(TEST_TEMPLATE, &d).expect("materialize");
        assert!(has_line(&conf, "#define WORKLOAD TPCC"));
        assert!(has_line(&conf, "#define TPCC_FULL true"));
        assert!(has_line(&conf, "#define NUM_WH 28"));
        assert!(has_line(&conf, "#define MAX_TUPLE_SIZE 704"));
    }

    #[test]
    fn scan_points_move_the_read_share_to_scans() {
        let d = Descriptor::new(
            0,
            SweepTag::Scan,
            Scheme::Mica,
            28,
            Workload::Ycsb {
                total_count: 10_000_000,
                req_per_query: 1,
                read_ratio: Ratio::from_hundredths(100),
                zipf_theta: Ratio::from_hundredths(0),
                scan_length: Some(100),
            },
        );
        let conf = materialize(TEST_TEMPLATE, &d).expect("materialize");
        assert!(has_line(&conf, "#define READ_PERC 0.00"));
        assert!(has_line(&conf, "#define SCAN_PERC 1.00"));
        assert!(has_line(&conf, "#define WRITE_PERC 0.00"));
        assert!(has_line(&conf, "#define MAX_SCAN_LEN 100"));
    }

    #[test]
    fn knobs_are_only_written_when_present() {
        let mut d = ycsb_baseline();
        let conf = materialize(TEST_TEMPLATE, &d).expect("materialize");
        // Untouched template defaults survive.
        assert!(has_line(&conf, "#define MICA_MAX_BACKOFF 1.00"));
        assert!(has_line(&conf, "#define MICA_NO_WRITE_SORT false"));

        d.backoff = Some(Ratio::from_hundredths(400));
        d.no_write_sort = true;
        let conf = materialize(TEST_TEMPLATE, &d).expect("materialize");
        assert!(has_line(&conf, "#define MICA_MAX_BACKOFF 4.00"));
        assert!(has_line(&conf, "#define MICA_NO_WRITE_SORT true"));
        assert!(has_line(&conf, "#define MICA_NO_PRE_VALIDATION false"));
    }

    #[test]
    fn missing_definition_is_fatal() {
        let template = TEST_TEMPLATE.replace("#define THREAD_CNT 1\n", "");
        let err = materialize(&template, &ycsb_baseline()).expect_err("must fail");
        assert!(err.to_string().contains("THREAD_CNT"), "got: {}", err);
    }

    #[test]
    fn duplicate_definition_is_fatal() {
        let template = format!("{}#define THREAD_CNT 2\n", TEST_TEMPLATE);
        let err = materialize(&template, &ycsb_baseline()).expect_err("must fail");
        assert!(err.to_string().contains("found 2"), "got: {}", err);
    }

    #[test]
    fn replace_def_matches_whole_tokens_only() {
        let template = "#define WARMUP_EXTRA 5\n#define WARMUP 0\n";
        let conf = replace_def(template, "WARMUP", "7").expect("replace");
        assert!(has_line(&conf, "#define WARMUP_EXTRA 5"));
        assert!(has_line(&conf, "#define WARMUP 7"));
    }
}
