//! Combinatorial enumeration of the experiment space.
//!
//! One sub-generator per sweep group; the composition for a given `seq` is
//! deterministic, so re-invoking with the same `seq` yields the same
//! sequence in the same order.

use std::collections::HashSet;

use anyhow::Result;

use crate::codec;
use crate::descriptor::{Descriptor, Ratio, Scheme, SweepTag, Workload};

pub const THREAD_COUNTS: [u32; 6] = [1, 4, 16, 28, 42, 56];
pub const MAX_THREAD_COUNTS: [u32; 2] = [28, 56];
pub const YCSB_TABLE_SIZE: u64 = 10_000_000;

const KNOB_THREADS: u32 = 28;

fn ycsb(req_per_query: u32, read_hundredths: u32, theta_hundredths: u32) -> Workload {
    Workload::Ycsb {
        total_count: YCSB_TABLE_SIZE,
        req_per_query,
        read_ratio: Ratio::from_hundredths(read_hundredths),
        zipf_theta: Ratio::from_hundredths(theta_hundredths),
        scan_length: None,
    }
}

/// Contended point shared by the backoff, factor, and gc sweeps.
fn contended_ycsb() -> Workload {
    ycsb(16, 50, 99)
}

/// Lock-wait schemes cannot sustain the extreme-skew points.
fn skips_extreme_skew(alg: Scheme) -> bool {
    matches!(alg, Scheme::Hekaton | Scheme::NoWait)
}

/// Every descriptor for one repetition index, across all sweep groups.
pub fn enumerate_seq(seq: u32) -> Vec<Descriptor> {
    let mut out = Vec::new();
    macro_group(seq, &mut out);
    backoff_group(seq, &mut out);
    factor_group(seq, &mut out);
    gc_group(seq, &mut out);
    scan_group(seq, &mut out);
    out
}

/// The full enumeration over all repetitions, in repetition order.
pub fn enumerate_all(total_seqs: u32) -> Vec<Descriptor> {
    let mut out = Vec::new();
    for seq in 0..total_seqs {
        out.extend(enumerate_seq(seq));
    }
    out
}

fn macro_group(seq: u32, out: &mut Vec<Descriptor>) {
    let point = |alg, tc, workload| Descriptor::new(seq, SweepTag::Macro, alg, tc, workload);

    for alg in Scheme::ALL {
        for tc in THREAD_COUNTS {
            // YCSB, 16 requests per transaction.
            for read in [95, 50] {
                out.push(point(alg, tc, ycsb(16, read, 0)));
                if !skips_extreme_skew(alg) {
                    out.push(point(alg, tc, ycsb(16, read, 99)));
                }
            }
            if MAX_THREAD_COUNTS.contains(&tc) {
                for theta in [40, 60, 80, 90] {
                    for read in [95, 50] {
                        out.push(point(alg, tc, ycsb(16, read, theta)));
                    }
                }
                if !skips_extreme_skew(alg) {
                    for read in [95, 50] {
                        out.push(point(alg, tc, ycsb(16, read, 95)));
                    }
                }
            }

            // YCSB, single-request transactions.
            for read in [95, 50] {
                for theta in [0, 99] {
                    out.push(point(alg, tc, ycsb(1, read, theta)));
                }
            }

            // TPCC (new-order/payment mix).
            out.push(point(alg, tc, Workload::Tpcc { warehouse_count: tc }));
            if MAX_THREAD_COUNTS.contains(&tc) {
                for wh in [1, 4, 16] {
                    out.push(point(alg, tc, Workload::Tpcc { warehouse_count: wh }));
                }
            }

            // TPCC full mix; HEKATON cannot run it.
            if MAX_THREAD_COUNTS.contains(&tc) && alg != Scheme::Hekaton {
                out.push(point(alg, tc, Workload::TpccFull { warehouse_count: tc }));
            }

            // TATP.
            out.push(point(alg, tc, Workload::Tatp { scale_factor: 1 }));
        }
    }
}

const BACKOFF_HUNDREDTHS: [u32; 6] = [25, 50, 100, 200, 400, 800];

fn backoff_group(seq: u32, out: &mut Vec<Descriptor>) {
    for backoff in BACKOFF_HUNDREDTHS {
        let mut d = Descriptor::new(
            seq,
            SweepTag::Backoff,
            Scheme::Mica,
            KNOB_THREADS,
            contended_ycsb(),
        );
        d.backoff = Some(Ratio::from_hundredths(backoff));
        out.push(d);

        let mut d = Descriptor::new(
            seq,
            SweepTag::Backoff,
            Scheme::Mica,
            KNOB_THREADS,
            Workload::Tpcc { warehouse_count: 1 },
        );
        d.backoff = Some(Ratio::from_hundredths(backoff));
        out.push(d);
    }
}

fn factor_group(seq: u32, out: &mut Vec<Descriptor>) {
    let base = || {
        Descriptor::new(
            seq,
            SweepTag::Factor,
            Scheme::Mica,
            KNOB_THREADS,
            contended_ycsb(),
        )
    };

    let mut d = base();
    d.no_pre_validation = true;
    out.push(d);

    let mut d = base();
    d.no_write_sort = true;
    out.push(d);

    let mut d = base();
    d.no_newest_version = true;
    out.push(d);

    let mut d = base();
    d.no_pre_validation = true;
    d.no_write_sort = true;
    d.no_newest_version = true;
    out.push(d);
}

const GC_INTERVALS_US: [u64; 5] = [1, 10, 100, 1000, 10_000];

fn gc_group(seq: u32, out: &mut Vec<Descriptor>) {
    for gc in GC_INTERVALS_US {
        let mut d = Descriptor::new(
            seq,
            SweepTag::Gc,
            Scheme::Mica,
            KNOB_THREADS,
            contended_ycsb(),
        );
        d.gc_interval = Some(gc);
        out.push(d);
    }
}

const SCAN_LENGTHS: [u32; 4] = [1, 10, 100, 1000];

fn scan_group(seq: u32, out: &mut Vec<Descriptor>) {
    for alg in [Scheme::Mica, Scheme::MicaFull] {
        for len in SCAN_LENGTHS {
            let workload = Workload::Ycsb {
                total_count: YCSB_TABLE_SIZE,
                req_per_query: 1,
                read_ratio: Ratio::from_hundredths(100),
                zipf_theta: Ratio::from_hundredths(0),
                scan_length: Some(len),
            };
            out.push(Descriptor::new(seq, SweepTag::Scan, alg, KNOB_THREADS, workload));
        }
    }
}

/// First occurrences only, order preserved. Sub-generators may emit the
/// same baseline point independently.
pub fn dedup_descriptors(descriptors: Vec<Descriptor>) -> Vec<Descriptor> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(descriptors.len());
    for d in descriptors {
        if seen.insert(d.clone()) {
            out.push(d);
        }
    }
    out
}

/// Canonical filenames for everything the current enumeration produces.
/// The reconciler archives any persisted result outside this set.
pub fn valid_name_set(total_seqs: u32) -> Result<HashSet<String>> {
    let mut names = HashSet::new();
    for d in enumerate_all(total_seqs) {
        names.insert(codec::encode(&d)?);
    }
    Ok(names)
}
