//! Persisted result store.
//!
//! A flat directory of files named by the filename codec. Three suffix
//! classes: none (success), `.failed` (execution or validation failure),
//! `.old` (archived by the reconciler). A record's existence is the sole
//! resume signal; records are written once and never overwritten.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use chrono::Utc;

use crate::codec::{PREFIX, SUFFIX};

pub const FAILED_SUFFIX: &str = ".failed";
pub const ARCHIVE_SUFFIX: &str = ".old";

pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> ResultStore {
        ResultStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True when the point was already attempted: a success record or a
    /// `.failed` record exists. Failed points are never silently retried;
    /// clearing the `.failed` file is an explicit operator action.
    pub fn has_record(&self, name: &str) -> bool {
        self.dir.join(name).exists() || self.dir.join(format!("{}{}", name, FAILED_SUFFIX)).exists()
    }

    pub fn record_success(&self, name: &str, output: &str) -> Result<()> {
        self.write_record(name, output)
    }

    pub fn record_failure(&self, name: &str, output: &str) -> Result<()> {
        self.write_record(&format!("{}{}", name, FAILED_SUFFIX), output)
    }

    // Write to a dot-prefixed temp name, then rename, so a crash mid-write
    // never leaves a file the resume filter would mistake for a record.
    fn write_record(&self, final_name: &str, output: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| anyhow!("cannot create result dir {}: {}", self.dir.display(), e))?;
        let tmp = self.dir.join(format!(
            ".{}.tmp.{}.{}",
            final_name,
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        fs::write(&tmp, output)
            .map_err(|e| anyhow!("cannot write {}: {}", tmp.display(), e))?;
        let target = self.dir.join(final_name);
        fs::rename(&tmp, &target)
            .map_err(|e| anyhow!("cannot finalize {}: {}", target.display(), e))?;
        Ok(())
    }

    /// Moves every persisted, non-archival result whose base name is not in
    /// `valid` to an `.old`-suffixed archive name. Returns the names moved.
    pub fn archive_stale(&self, valid: &HashSet<String>) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(Vec::new()),
        };

        let mut archived = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if !name.starts_with(PREFIX) || name.ends_with(ARCHIVE_SUFFIX) {
                continue;
            }
            let base = name.strip_suffix(FAILED_SUFFIX).unwrap_or(&name);
            if !base.ends_with(SUFFIX) {
                continue;
            }
            if valid.contains(base) {
                continue;
            }
            let target = self.dir.join(format!("{}{}", name, ARCHIVE_SUFFIX));
            fs::rename(entry.path(), &target)
                .map_err(|e| anyhow!("cannot archive {}: {}", name, e))?;
            archived.push(name);
        }
        archived.sort();
        Ok(archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> ResultStore {
        let dir = std::env::temp_dir().join(format!(
            "ccsweep_store_{}_{}_{}",
            tag,
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        fs::create_dir_all(&dir).expect("temp dir");
        ResultStore::new(dir)
    }

    #[test]
    fn records_are_visible_to_the_resume_check() {
        let store = temp_store("records");
        let name = "output_alg=MICA,bench=TATP,scale_factor=1,seq=0,tag=macro,thread_count=4.txt";
        assert!(!store.has_record(name));

        store.record_success(name, "[summary] tput=1.0").expect("write");
        assert!(store.has_record(name));
        let body = fs::read_to_string(store.dir().join(name)).expect("read back");
        assert_eq!(body, "[summary] tput=1.0");

        let failed = "output_alg=MICA,bench=TATP,scale_factor=1,seq=1,tag=macro,thread_count=4.txt";
        store.record_failure(failed, "segfault").expect("write");
        assert!(store.has_record(failed));
        assert!(!store.dir().join(failed).exists());
        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn no_temp_files_survive_a_record() {
        let store = temp_store("tmp");
        store.record_success("output_a=1.txt", "x").expect("write");
        let leftovers: Vec<String> = fs::read_dir(store.dir())
            .expect("read dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .filter(|n| n.contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {:?}", leftovers);
        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn archive_moves_only_stale_results() {
        let store = temp_store("archive");
        let live = "output_alg=MICA,bench=TATP,scale_factor=1,seq=0,tag=macro,thread_count=4.txt";
        let stale = "output_alg=MICA,bench=TATP,scale_factor=9,seq=0,tag=macro,thread_count=4.txt";
        let stale_failed =
            "output_alg=MICA,bench=TATP,scale_factor=8,seq=0,tag=macro,thread_count=4.txt";
        store.record_success(live, "ok").expect("write");
        store.record_success(stale, "ok").expect("write");
        store.record_failure(stale_failed, "crash").expect("write");
        fs::write(store.dir().join("notes.md"), "unrelated").expect("write");

        let mut valid = HashSet::new();
        valid.insert(live.to_string());
        let archived = store.archive_stale(&valid).expect("archive");

        assert_eq!(archived.len(), 2);
        assert!(store.dir().join(live).exists());
        assert!(!store.dir().join(stale).exists());
        assert!(store.dir().join(format!("{}{}", stale, ARCHIVE_SUFFIX)).exists());
        assert!(store
            .dir()
            .join(format!("{}{}{}", stale_failed, FAILED_SUFFIX, ARCHIVE_SUFFIX))
            .exists());
        assert!(store.dir().join("notes.md").exists());

        // Already-archived files are left alone on the next pass.
        let again = store.archive_stale(&valid).expect("archive");
        assert!(again.is_empty());
        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn archive_of_a_missing_dir_is_a_no_op() {
        let store = ResultStore::new(std::env::temp_dir().join("ccsweep_store_never_created"));
        let archived = store.archive_stale(&HashSet::new()).expect("archive");
        assert!(archived.is_empty());
    }
}
