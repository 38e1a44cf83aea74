//! Append-only progress ledgers that make a migration resumable.
//!
//! Two newline-delimited files:
//! - the completion ledger, one migrated source path per line;
//! - the redirect ledger, one `{"from": ..., "to": ...}` JSON object per line.
//!
//! Every record is written with a single `write_all` of the whole line and
//! synced before the call returns. Files are only ever appended to.
//!
//! A crash after a post is published but before its line is appended means
//! that post is published again on the next run: delivery to the platform is
//! at-least-once.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::LedgerPaths;
use crate::error::LedgerError;

/// Suffix appended to live ledger file names for dry runs.
pub const DRY_RUN_SUFFIX: &str = ".dry-run";

/// Maps a post's old URL to its new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRecord {
    pub from: String,
    pub to: String,
}

pub struct Ledger {
    paths: LedgerPaths,
    completed: HashSet<PathBuf>,
    completed_file: File,
    redirects_file: File,
}

impl Ledger {
    /// Open (creating if needed) both ledgers and load the completed set.
    pub fn open(paths: LedgerPaths) -> Result<Self, LedgerError> {
        let completed = load_completed(&paths.completed)?;
        let completed_file = open_append(&paths.completed)?;
        let redirects_file = open_append(&paths.redirects)?;
        info!(
            completed_ledger = %paths.completed.display(),
            redirect_ledger = %paths.redirects.display(),
            completed = completed.len(),
            "[LEDGER] Opened ledgers"
        );
        Ok(Self {
            paths,
            completed,
            completed_file,
            redirects_file,
        })
    }

    /// Open disposable copies of the live ledgers, seeded with their current contents.
    pub fn open_dry_run(live: &LedgerPaths) -> Result<Self, LedgerError> {
        let paths = dry_run_paths(live);
        seed(&live.completed, &paths.completed)?;
        seed(&live.redirects, &paths.redirects)?;
        info!(
            completed_ledger = %paths.completed.display(),
            redirect_ledger = %paths.redirects.display(),
            "[LEDGER][DRY-RUN] Seeded disposable ledgers"
        );
        Self::open(paths)
    }

    pub fn paths(&self) -> &LedgerPaths {
        &self.paths
    }

    pub fn completed(&self) -> &HashSet<PathBuf> {
        &self.completed
    }

    pub fn is_completed(&self, path: &Path) -> bool {
        self.completed.contains(path)
    }

    /// Candidates not yet in the completion ledger, order preserved.
    pub fn pending_files(&self, candidates: &[PathBuf]) -> Vec<PathBuf> {
        pending_files(candidates, &self.completed)
    }

    /// Append `path` to the completion ledger.
    pub fn record_completion(&mut self, path: &Path) -> Result<(), LedgerError> {
        let line = format!("{}\n", path.display());
        append_line(&mut self.completed_file, &self.paths.completed, &line)?;
        self.completed.insert(path.to_path_buf());
        debug!(path = %path.display(), "[LEDGER] Recorded completion");
        Ok(())
    }

    /// Append one redirect record.
    pub fn record_redirect(&mut self, from: &str, to: &str) -> Result<(), LedgerError> {
        let record = RedirectRecord {
            from: from.to_string(),
            to: to.to_string(),
        };
        let line = format!("{}\n", serde_json::to_string(&record)?);
        append_line(&mut self.redirects_file, &self.paths.redirects, &line)?;
        debug!(from, to, "[LEDGER] Recorded redirect");
        Ok(())
    }

    /// Both ledgers as text, for printing at the end of a dry run.
    pub fn contents(&self) -> Result<String, LedgerError> {
        let completed = read_or_empty(&self.paths.completed)?;
        let redirects = read_or_empty(&self.paths.redirects)?;
        Ok(format!(
            "== {} ==\n{}== {} ==\n{}",
            self.paths.completed.display(),
            completed,
            self.paths.redirects.display(),
            redirects
        ))
    }

    /// Close and delete both ledger files.
    pub fn discard(self) -> Result<(), LedgerError> {
        let Ledger {
            paths,
            completed_file,
            redirects_file,
            ..
        } = self;
        drop(completed_file);
        drop(redirects_file);
        for path in [&paths.completed, &paths.redirects] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(LedgerError::Io {
                        path: path.clone(),
                        source,
                    })
                }
            }
        }
        info!("[LEDGER] Discarded ledgers");
        Ok(())
    }

    /// Dump both ledgers, then delete them even if the dump failed.
    pub fn dump_and_discard(self) -> Result<String, LedgerError> {
        let dumped = self.contents();
        let discarded = self.discard();
        let dumped = dumped?;
        discarded?;
        Ok(dumped)
    }
}

/// Set difference `candidates - completed`, keeping candidate order.
pub fn pending_files(candidates: &[PathBuf], completed: &HashSet<PathBuf>) -> Vec<PathBuf> {
    candidates
        .iter()
        .filter(|c| !completed.contains(*c))
        .cloned()
        .collect()
}

/// Read the completion ledger; a missing file is an empty ledger.
pub fn load_completed(path: &Path) -> Result<HashSet<PathBuf>, LedgerError> {
    Ok(read_or_empty(path)?
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Read the redirect ledger, skipping (with a warning) any line that is not a record.
pub fn read_redirects(path: &Path) -> Result<Vec<RedirectRecord>, LedgerError> {
    let text = read_or_empty(path)?;
    let mut records = Vec::new();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RedirectRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(path = %path.display(), line = number + 1, error = %e, "[LEDGER] Skipping unreadable redirect line")
            }
        }
    }
    Ok(records)
}

/// `<file name>.dry-run` next to each live ledger.
pub fn dry_run_paths(live: &LedgerPaths) -> LedgerPaths {
    let with_suffix = |p: &Path| {
        let mut name = p.as_os_str().to_os_string();
        name.push(DRY_RUN_SUFFIX);
        PathBuf::from(name)
    };
    LedgerPaths {
        completed: with_suffix(&live.completed),
        redirects: with_suffix(&live.redirects),
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> LedgerError + '_ {
    move |source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_or_empty(path: &Path) -> Result<String, LedgerError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(io_err(path)(e)),
    }
}

fn open_append(path: &Path) -> Result<File, LedgerError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err(path))
}

fn append_line(file: &mut File, path: &Path, line: &str) -> Result<(), LedgerError> {
    file.write_all(line.as_bytes()).map_err(io_err(path))?;
    file.sync_data().map_err(io_err(path))
}

/// Replace `target` with a copy of `source`, or with nothing if `source` does not exist.
fn seed(source: &Path, target: &Path) -> Result<(), LedgerError> {
    match fs::remove_file(target) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(target)(e)),
    }
    if source.exists() {
        fs::copy(source, target).map_err(io_err(target))?;
    }
    Ok(())
}
