use std::error::Error as _;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use juno_types::TestId;

pub const THIN_RULE: &str = "----------------------------------------------------------------------";

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to open log file {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write log file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read rerun manifest {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SinkError {
    /// Logs the error with its cause; sink failures never stop a run.
    pub fn warn(&self) {
        match self.source() {
            Some(source) => log::warn!("{self}: {source}"),
            None => log::warn!("{self}"),
        }
    }
}

#[derive(Debug)]
struct LogFile {
    path: PathBuf,
    file: File,
}

impl LogFile {
    fn open(path: &Path, truncate: bool) -> Result<Self, SinkError> {
        let mut options = OpenOptions::new();
        options.create(true);
        if truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        let file = options.open(path).map_err(|source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    fn append(&mut self, text: &str) -> Result<(), SinkError> {
        self.file
            .write_all(text.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|source| SinkError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

/// The rerun manifest and the error-detail log for one run.
#[derive(Debug, Default)]
pub struct LogSink {
    rerun: Option<LogFile>,
    failures: Option<LogFile>,
}

impl LogSink {
    /// Opens both files. Existing content is discarded only when `truncate`
    /// is set, i.e. for the reporter that observes the first test of the
    /// process; later shards append.
    ///
    /// Each file is opened on its own: one that cannot be opened is warned
    /// about and left closed while the other keeps recording.
    #[must_use]
    pub fn open(rerun_path: &Path, failure_path: &Path, truncate: bool) -> Self {
        Self {
            rerun: open_or_warn(rerun_path, truncate),
            failures: open_or_warn(failure_path, truncate),
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.rerun.is_some() || self.failures.is_some()
    }

    /// Appends the test's dotted identifier to the rerun manifest. Tests
    /// that never resolved to a method get a note in the error-detail log
    /// instead.
    pub fn append_rerun_entry(&mut self, test: &TestId) -> Result<(), SinkError> {
        match test.dotted() {
            Some(dotted) => match &mut self.rerun {
                Some(file) => file.append(&format!("{dotted}\n")),
                None => Ok(()),
            },
            None => match &mut self.failures {
                Some(file) => file.append(&format!(
                    "{} could not be loaded; there is no single test to re-run\n{THIN_RULE}\n",
                    test.module_path
                )),
                None => Ok(()),
            },
        }
    }

    /// Appends `{description}\n{trace}\n{rule}\n` to the error-detail log.
    pub fn append_failure_detail(
        &mut self,
        description: &str,
        formatted_trace: &str,
    ) -> Result<(), SinkError> {
        match &mut self.failures {
            Some(file) => file.append(&format!("{description}\n{formatted_trace}\n{THIN_RULE}\n")),
            None => Ok(()),
        }
    }

    pub fn close(&mut self) {
        if let Some(file) = self.rerun.take() {
            log::debug!("closed {}", file.path.display());
        }
        if let Some(file) = self.failures.take() {
            log::debug!("closed {}", file.path.display());
        }
    }
}

fn open_or_warn(path: &Path, truncate: bool) -> Option<LogFile> {
    match LogFile::open(path, truncate) {
        Ok(file) => {
            log::debug!("opened {} (truncate: {truncate})", path.display());
            Some(file)
        }
        Err(err) => {
            err.warn();
            None
        }
    }
}

/// Reads the non-empty lines of a rerun manifest.
pub fn read_rerun_manifest(path: &Path) -> Result<Vec<String>, SinkError> {
    let text = fs::read_to_string(path).map_err(|source| SinkError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}
