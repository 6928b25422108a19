//! Priority ordering for sweep execution.
//!
//! Repetition index is the primary key; a negative "interestingness" score
//! is the secondary key so an interrupted sweep has already captured the
//! highest-value and cheapest points. The sort is stable: equal keys keep
//! their enumeration order.

use serde::{Deserialize, Serialize};

use crate::descriptor::{Descriptor, Ratio, Scheme, Workload};

/// Score decrements. The mechanism (score tuple + stable sort) is fixed;
/// the weights reflect experimenter priorities and are configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    pub fast_scheme: i32,
    pub medium_scheme: i32,
    pub max_threads: i32,
    pub write_heavy: i32,
    pub standard_skew: i32,
    pub matched_warehouses: i32,
    pub standard_warehouses: i32,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        PriorityWeights {
            fast_scheme: -2,
            medium_scheme: -1,
            max_threads: -1,
            write_heavy: -1,
            standard_skew: -1,
            matched_warehouses: -1,
            standard_warehouses: -1,
        }
    }
}

pub fn score(d: &Descriptor, w: &PriorityWeights) -> i32 {
    let mut pri = 0;

    match d.alg {
        Scheme::Mica | Scheme::MicaFull => pri += w.fast_scheme,
        Scheme::SiloOrg | Scheme::Tictoc => pri += w.medium_scheme,
        Scheme::Hekaton | Scheme::NoWait => {}
    }

    if matches!(d.thread_count, 28 | 56) {
        pri += w.max_threads;
    }

    match &d.workload {
        Workload::Ycsb {
            read_ratio,
            zipf_theta,
            ..
        } => {
            if *read_ratio == Ratio::from_hundredths(50) {
                pri += w.write_heavy;
            }
            if *zipf_theta == Ratio::from_hundredths(0)
                || *zipf_theta == Ratio::from_hundredths(99)
            {
                pri += w.standard_skew;
            }
        }
        Workload::Tpcc { warehouse_count } | Workload::TpccFull { warehouse_count } => {
            if *warehouse_count == d.thread_count {
                pri += w.matched_warehouses;
            }
            if matches!(*warehouse_count, 1 | 4 | 16 | 28 | 56) {
                pri += w.standard_warehouses;
            }
        }
        Workload::Tatp { .. } => {}
    }

    pri
}

/// Stable sort by `(seq, score)`. All of repetition 0 is attempted before
/// repetition 1, and so on.
pub fn sort_descriptors(descriptors: &mut [Descriptor], weights: &PriorityWeights) {
    descriptors.sort_by_key(|d| (d.seq, score(d, weights)));
}
