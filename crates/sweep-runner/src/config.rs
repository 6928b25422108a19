//! Sweep configuration.
//!
//! Defaults mirror the benchmark repository layout this tool drives: the
//! template and rebuilt binary live in the working directory and results
//! are written alongside them.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::schedule::PriorityWeights;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Pristine configuration template; never written to.
    pub template_path: PathBuf,
    /// Materialized configuration the build reads.
    pub config_path: PathBuf,
    pub result_dir: PathBuf,
    /// Number of repetitions of every parameter point.
    pub total_seqs: u32,
    pub clean_command: Vec<String>,
    pub build_command: Vec<String>,
    /// Hugepage setup script; invoked with two page-count arguments.
    pub setup_command: Vec<String>,
    pub bench_command: Vec<String>,
    /// Microbenchmark harness used by the scan group.
    pub native_command: Vec<String>,
    pub weights: PriorityWeights,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            template_path: PathBuf::from("config-std.h"),
            config_path: PathBuf::from("config.h"),
            result_dir: PathBuf::from("."),
            total_seqs: 3,
            clean_command: vec!["make".into(), "clean".into()],
            build_command: vec!["make".into(), "-j".into()],
            setup_command: vec!["../script/setup.sh".into()],
            bench_command: vec!["./rundb".into()],
            native_command: vec!["./runnative".into()],
            weights: PriorityWeights::default(),
        }
    }
}

impl SweepConfig {
    pub fn load(path: &Path) -> Result<SweepConfig> {
        let raw = fs::read_to_string(path)
            .map_err(|e| anyhow!("cannot read config {}: {}", path.display(), e))?;
        let config: SweepConfig = serde_yaml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_seqs < 1 {
            bail!("total_seqs must be >= 1");
        }
        for (label, command) in [
            ("clean_command", &self.clean_command),
            ("build_command", &self.build_command),
            ("setup_command", &self.setup_command),
            ("bench_command", &self.bench_command),
            ("native_command", &self.native_command),
        ] {
            if command.is_empty() {
                bail!("{} must not be empty", label);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_benchmark_layout() {
        let config = SweepConfig::default();
        assert_eq!(config.template_path, PathBuf::from("config-std.h"));
        assert_eq!(config.config_path, PathBuf::from("config.h"));
        assert_eq!(config.total_seqs, 3);
        assert_eq!(config.build_command, vec!["make", "-j"]);
        assert_eq!(config.bench_command, vec!["./rundb"]);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let yaml = "result_dir: results\ntotal_seqs: 1\n";
        let config: SweepConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.result_dir, PathBuf::from("results"));
        assert_eq!(config.total_seqs, 1);
        assert_eq!(config.template_path, PathBuf::from("config-std.h"));
        assert_eq!(config.weights, PriorityWeights::default());
    }

    #[test]
    fn empty_commands_are_rejected() {
        let config = SweepConfig {
            build_command: vec![],
            ..SweepConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_seqs_are_rejected() {
        let config = SweepConfig {
            total_seqs: 0,
            ..SweepConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
