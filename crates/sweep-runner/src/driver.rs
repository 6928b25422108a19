//! The run driver: materialize, stage the host environment, rebuild,
//! execute, validate, record. One point at a time, strictly sequential.

use std::collections::BTreeMap;
use std::fs;
use std::time::Instant;

use anyhow::{anyhow, bail, Result};
use chrono::Utc;

use crate::codec;
use crate::config::SweepConfig;
use crate::descriptor::{Descriptor, Scheme, SweepTag};
use crate::enumerate::{dedup_descriptors, enumerate_all, valid_name_set};
use crate::process::{ProcessOutput, ProcessRunner};
use crate::schedule::sort_descriptors;
use crate::store::ResultStore;

pub const PRIMARY_MARKER: &str = "[summary] tput=";
pub const NATIVE_MARKER: &str = "[native] tput=";

/// Hugepage reservation the setup collaborator applies, pages per NUMA node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HugepageProfile {
    pub pages_node0: u32,
    pub pages_node1: u32,
}

/// Static per-scheme resource table. The MICA schemes preallocate 64 GiB of
/// hugepages; everything else releases them.
pub fn resource_profile(alg: Scheme) -> HugepageProfile {
    match alg {
        Scheme::Mica | Scheme::MicaFull => HugepageProfile {
            pages_node0: 16384,
            pages_node1: 16384,
        },
        _ => HugepageProfile {
            pages_node0: 0,
            pages_node1: 0,
        },
    }
}

/// The scan group runs on the native microbenchmark harness; everything
/// else runs the primary binary.
pub fn uses_native_harness(descriptor: &Descriptor) -> bool {
    descriptor.tag == SweepTag::Scan
}

pub fn success_marker(descriptor: &Descriptor) -> &'static str {
    if uses_native_harness(descriptor) {
        NATIVE_MARKER
    } else {
        PRIMARY_MARKER
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Run,
    /// Stage configuration and host environment only; skip build and
    /// execution, and ignore existing records when selecting points.
    Prepare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointStatus {
    Success,
    /// Benchmark exited nonzero.
    ExecFailed,
    /// Exit zero but the success marker was missing from the output.
    ValidationFailed,
    Prepared,
}

/// A caller-supplied `key=value` restriction on the points to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub key: String,
    pub value: String,
}

impl Pattern {
    pub fn parse(raw: &str) -> Result<Pattern> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid pattern {:?}: expected key=value", raw))?;
        if codec::key_kind(key).is_none() {
            bail!("pattern references unknown descriptor key: {}", key);
        }
        if value.is_empty() {
            bail!("invalid pattern {:?}: empty value", raw);
        }
        Ok(Pattern {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// A descriptor lacking the key does not match.
    pub fn matches(&self, descriptor: &Descriptor) -> bool {
        descriptor
            .fields()
            .get(self.key.as_str())
            .map(|v| v.to_string() == self.value)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub total: usize,
    pub skipped: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub archived: Vec<String>,
}

/// The deduplicated enumeration narrowed to what this invocation should
/// touch: unrecorded points (unless preparing) matching every pattern.
pub fn pending_descriptors(
    config: &SweepConfig,
    store: &ResultStore,
    patterns: &[Pattern],
    mode: Mode,
) -> Result<Vec<Descriptor>> {
    let all = dedup_descriptors(enumerate_all(config.total_seqs));
    let mut pending = Vec::new();
    for d in all {
        if mode == Mode::Run && store.has_record(&codec::encode(&d)?) {
            continue;
        }
        if !patterns.iter().all(|p| p.matches(&d)) {
            continue;
        }
        pending.push(d);
    }
    Ok(pending)
}

/// Per-tag point counts for the current enumeration, for reporting.
pub fn tag_counts(total_seqs: u32) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for d in dedup_descriptors(enumerate_all(total_seqs)) {
        *counts.entry(d.tag.as_str()).or_insert(0) += 1;
    }
    counts
}

pub struct RunDriver<R: ProcessRunner> {
    config: SweepConfig,
    runner: R,
    store: ResultStore,
    last_profile: Option<HugepageProfile>,
}

impl<R: ProcessRunner> RunDriver<R> {
    pub fn new(config: SweepConfig, runner: R) -> RunDriver<R> {
        let store = ResultStore::new(config.result_dir.clone());
        RunDriver {
            config,
            runner,
            store,
            last_profile: None,
        }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn invoke(&mut self, command: &[String], extra_args: &[String]) -> Result<ProcessOutput> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("empty external command"))?;
        let mut all = args.to_vec();
        all.extend_from_slice(extra_args);
        self.runner.run(program, &all)
    }

    /// Drives one point through the state machine. Errors are fatal to the
    /// whole sweep; per-point benchmark failures come back as a status.
    pub fn run_point(&mut self, descriptor: &Descriptor, mode: Mode) -> Result<PointStatus> {
        let name = codec::encode(descriptor)?;

        // CONFIGURED
        let template = fs::read_to_string(&self.config.template_path).map_err(|e| {
            anyhow!(
                "cannot read template {}: {}",
                self.config.template_path.display(),
                e
            )
        })?;
        let conf = crate::materialize::materialize(&template, descriptor)
            .map_err(|e| anyhow!("materialization failed for {}: {}", name, e))?;
        fs::write(&self.config.config_path, conf).map_err(|e| {
            anyhow!(
                "cannot write config {}: {}",
                self.config.config_path.display(),
                e
            )
        })?;

        // ENV_READY: the setup call is expensive, so skip it when the
        // last-applied profile already matches. Its exit code is not
        // inspected, only launch failures are.
        let profile = resource_profile(descriptor.alg);
        if self.last_profile != Some(profile) {
            let args = [
                profile.pages_node0.to_string(),
                profile.pages_node1.to_string(),
            ];
            let setup = self.config.setup_command.clone();
            self.invoke(&setup, &args)?;
            self.last_profile = Some(profile);
        }

        if mode == Mode::Prepare {
            return Ok(PointStatus::Prepared);
        }

        // BUILT: a broken build means a broken template or toolchain, which
        // no later point would survive either.
        let clean = self.config.clean_command.clone();
        self.invoke(&clean, &[])?;
        let build_command = self.config.build_command.clone();
        let build = self.invoke(&build_command, &[])?;
        if !build.success() {
            bail!(
                "build failed (exit {}) for {}:\n{}",
                build.exit_code,
                name,
                build.output
            );
        }

        // EXECUTED
        let command = if uses_native_harness(descriptor) {
            self.config.native_command.clone()
        } else {
            self.config.bench_command.clone()
        };
        let run = self.invoke(&command, &[])?;

        // Validation routes to exactly one record.
        if !run.success() {
            self.store.record_failure(&name, &run.output)?;
            return Ok(PointStatus::ExecFailed);
        }
        if !run.output.contains(success_marker(descriptor)) {
            self.store.record_failure(&name, &run.output)?;
            return Ok(PointStatus::ValidationFailed);
        }
        self.store.record_success(&name, &run.output)?;
        Ok(PointStatus::Success)
    }

    /// One full invocation: reconcile stale results, select and order the
    /// pending points, then drive each one. Per-point failures are printed
    /// and counted but never abort the sweep.
    pub fn run_sweep(&mut self, patterns: &[Pattern], mode: Mode) -> Result<SweepReport> {
        self.config.validate()?;

        let valid = valid_name_set(self.config.total_seqs)?;
        let archived = self.store.archive_stale(&valid)?;
        for name in &archived {
            println!("stale result archived: {}", name);
        }

        let total = dedup_descriptors(enumerate_all(self.config.total_seqs)).len();
        let mut pending = pending_descriptors(&self.config, &self.store, patterns, mode)?;
        let skipped = total - pending.len();
        let weights = self.config.weights.clone();
        sort_descriptors(&mut pending, &weights);

        println!("total {} points", total);
        println!("{} points skipped", skipped);
        println!("total {} points to run", pending.len());
        println!("sweep started at {}", Utc::now().to_rfc3339());
        println!();

        let mut report = SweepReport {
            total,
            skipped,
            archived,
            ..SweepReport::default()
        };

        let first = Instant::now();
        let count = pending.len();
        for (i, descriptor) in pending.iter().enumerate() {
            let name = codec::encode(descriptor)?;
            println!("point {}/{}: {}", i + 1, count, name);

            let start = Instant::now();
            let status = self.run_point(descriptor, mode)?;
            report.attempted += 1;
            match status {
                PointStatus::Success => report.succeeded += 1,
                PointStatus::ExecFailed => {
                    report.failed += 1;
                    println!("failed to run point {}", name);
                }
                PointStatus::ValidationFailed => {
                    report.failed += 1;
                    println!("validation failed for point {}", name);
                }
                PointStatus::Prepared => {}
            }

            let elapsed = start.elapsed().as_secs_f64();
            let average = first.elapsed().as_secs_f64() / (i + 1) as f64;
            let remaining = average * (count - i - 1) as f64 / 3600.0;
            println!("elapsed = {:.2} seconds", elapsed);
            println!("remaining = {:.2} hours", remaining);
            println!();
        }

        Ok(report)
    }
}
