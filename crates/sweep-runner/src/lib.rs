//! Experiment-sweep orchestration for a concurrency-control benchmark.
//!
//! Enumerates the parameter space, skips already-recorded points, orders
//! the rest by priority, and drives each one through materialize → env →
//! build → execute → validate → record against a persisted result store.

pub mod codec;
pub mod config;
pub mod descriptor;
pub mod driver;
pub mod enumerate;
pub mod materialize;
pub mod process;
pub mod schedule;
pub mod store;

pub use codec::{decode, encode};
pub use config::SweepConfig;
pub use descriptor::{Bench, Descriptor, FieldValue, Ratio, Scheme, SweepTag, Workload};
pub use driver::{Mode, Pattern, PointStatus, RunDriver, SweepReport};
pub use enumerate::{dedup_descriptors, enumerate_all, enumerate_seq, valid_name_set};
pub use process::{ProcessOutput, ProcessRunner, SystemRunner};
pub use schedule::PriorityWeights;
pub use store::ResultStore;
