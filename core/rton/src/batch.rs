//! Parallel conversion of many files with per-path mutual exclusion.
//!
//! Every path named by any pair gets its own lock before the pool starts. A
//! job holds the locks of its source and destination while it runs, taking
//! them in path order so two jobs sharing both paths cannot deadlock.

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};

use crate::crypto::CipherKey;
use crate::de::DecodeOptions;
use crate::error::{Error, Result};
use crate::process;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPair {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl PathPair {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Converts `[[src, dst], ...]` lists, rejecting entries that are not
    /// exactly two paths long.
    pub fn from_lists(lists: Vec<Vec<PathBuf>>) -> Result<Vec<PathPair>> {
        lists
            .into_iter()
            .enumerate()
            .map(|(index, list)| match <[PathBuf; 2]>::try_from(list) {
                Ok([source, destination]) => Ok(PathPair {
                    source,
                    destination,
                }),
                Err(list) => Err(Error::InvalidPathPair {
                    index,
                    len: list.len(),
                }),
            })
            .collect()
    }
}

/// Reads a JSON pair list file.
pub fn load_pairs(path: &Path) -> Result<Vec<PathPair>> {
    #[derive(Deserialize)]
    #[serde(transparent)]
    struct PairList(Vec<Vec<PathBuf>>);

    let content = fs::read_to_string(path)?;
    let PairList(lists) = serde_json::from_str(&content)?;
    PathPair::from_lists(lists)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// RTON -> JSON
    Decode,
    /// JSON -> RTON
    Encode,
}

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub mode: BatchMode,
    pub key: Option<CipherKey>,
    pub options: DecodeOptions,
}

impl BatchJob {
    pub fn decode(key: Option<CipherKey>, options: DecodeOptions) -> Self {
        Self {
            mode: BatchMode::Decode,
            key,
            options,
        }
    }

    pub fn encode(key: Option<CipherKey>) -> Self {
        Self {
            mode: BatchMode::Encode,
            key,
            options: DecodeOptions::default(),
        }
    }

    fn execute(&self, pair: &PathPair) -> Result<()> {
        let key = self.key.as_ref();
        match self.mode {
            BatchMode::Decode => {
                process::decode_file(&pair.source, Some(&pair.destination), key, &self.options)?
            }
            BatchMode::Encode => process::encode_file(&pair.source, Some(&pair.destination), key)?,
        };
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchConfig {
    /// Worker count; `None` uses rayon's default.
    pub threads: Option<usize>,
}

#[derive(Debug)]
pub struct JobOutcome {
    pub pair: PathPair,
    pub result: Result<()>,
}

/// Per-pair results, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

struct PathLocks {
    locks: BTreeMap<PathBuf, Mutex<()>>,
}

impl PathLocks {
    fn new(pairs: &[PathPair]) -> Self {
        let locks = pairs
            .iter()
            .flat_map(|pair| [&pair.source, &pair.destination])
            .map(|path| (path.clone(), Mutex::new(())))
            .collect();
        Self { locks }
    }

    fn len(&self) -> usize {
        self.locks.len()
    }

    /// Locks the distinct paths of `pair` in lexicographic order.
    fn acquire(&self, pair: &PathPair) -> Vec<MutexGuard<'_, ()>> {
        let paths: BTreeSet<&PathBuf> = [&pair.source, &pair.destination].into_iter().collect();
        paths
            .into_iter()
            .filter_map(|path| self.locks.get(path))
            // a panicking job cannot leave the unit payload inconsistent
            .map(|lock| lock.lock().unwrap_or_else(|e| e.into_inner()))
            .collect()
    }
}

/// Runs `job` over every pair. Only pool construction fails the whole call;
/// each conversion failure is recorded in the report and siblings continue.
pub fn run(pairs: &[PathPair], job: &BatchJob, config: &BatchConfig) -> Result<BatchReport> {
    let locks = PathLocks::new(pairs);
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.threads.unwrap_or(0))
        .build()?;
    debug!(
        jobs = pairs.len(),
        paths = locks.len(),
        threads = pool.current_num_threads(),
        "starting batch"
    );

    let outcomes: Vec<JobOutcome> = pool.install(|| {
        pairs
            .par_iter()
            .map(|pair| {
                let result = {
                    let _guards = locks.acquire(pair);
                    job.execute(pair)
                };
                if let Err(e) = &result {
                    error!(
                        source = %pair.source.display(),
                        destination = %pair.destination.display(),
                        "batch job failed: {}",
                        e
                    );
                }
                JobOutcome {
                    pair: pair.clone(),
                    result,
                }
            })
            .collect()
    });

    let report = BatchReport { outcomes };
    info!(
        succeeded = report.succeeded(),
        failed = pairs.len() - report.succeeded(),
        "batch finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn test_from_lists() {
        let pairs = PathPair::from_lists(vec![
            vec!["a.rton".into(), "a.json".into()],
            vec!["b.rton".into(), "b.json".into()],
        ])
        .unwrap();
        assert_eq!(pairs[1], PathPair::new("b.rton", "b.json"));

        let err = PathPair::from_lists(vec![
            vec!["a.rton".into(), "a.json".into()],
            vec!["lonely.rton".into()],
        ])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPathPair { index: 1, len: 1 }));
        assert_eq!(err.kind(), ErrorKind::Json);
    }

    #[test]
    fn test_load_pairs() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("pairs.json");
        fs::write(&list, r#"[["in.json", "out.rton"]]"#).unwrap();
        assert_eq!(
            load_pairs(&list).unwrap(),
            vec![PathPair::new("in.json", "out.rton")]
        );

        fs::write(&list, r#"{"in.json": "out.rton"}"#).unwrap();
        assert_eq!(load_pairs(&list).unwrap_err().kind(), ErrorKind::Json);
    }

    #[test]
    fn test_lock_table_covers_distinct_paths() {
        let pairs = vec![
            PathPair::new("a", "b"),
            PathPair::new("b", "c"),
            PathPair::new("same", "same"),
        ];
        let locks = PathLocks::new(&pairs);
        assert_eq!(locks.len(), 4);
        assert_eq!(locks.acquire(&pairs[0]).len(), 2);
        assert_eq!(locks.acquire(&pairs[2]).len(), 1);
    }

    #[test]
    fn test_failures_are_isolated() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.json");
        fs::write(&good, r#"{"a": 1}"#).unwrap();
        let bad = dir.path().join("bad.json");
        fs::write(&bad, "[1, 2]").unwrap();

        let pairs = vec![
            PathPair::new(&bad, dir.path().join("bad.rton")),
            PathPair::new(&good, dir.path().join("good.rton")),
            PathPair::new(dir.path().join("missing.json"), dir.path().join("m.rton")),
        ];
        let report = run(
            &pairs,
            &BatchJob::encode(None),
            &BatchConfig { threads: Some(2) },
        )
        .unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.succeeded(), 1);
        assert!(!report.is_success());
        assert!(matches!(
            report.outcomes[0].result,
            Err(Error::RootNotObject)
        ));
        assert!(report.outcomes[1].result.is_ok());
        assert_eq!(
            report.outcomes[2].result.as_ref().unwrap_err().kind(),
            ErrorKind::Io
        );
        assert!(dir.path().join("good.rton").exists());
        assert_eq!(report.failures().count(), 2);
    }
}
