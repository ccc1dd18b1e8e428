// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Picking a file to write the report to.
//!
//! The preferred destination isn't always writable (e.g. on devices with restricted storage),
//! so destinations are tried in order:
//!
//! 1. The explicitly configured result file, creating its parent directory if necessary.
//! 2. Each fallback path, in order.
//! 3. A fresh `<prefix>-<n>.xml` in the report directory. Existing reports are never
//!    overwritten, so runs that are split across several processes each get their own file.

use crate::{
    config::ReportConfig,
    errors::{OutputAttempt, ResolveOutputError},
};
use camino::{Utf8Path, Utf8PathBuf};
use fs_err::{File, OpenOptions};
use std::io;
use tracing::{debug, warn};

/// Resolves the destination file for a report.
#[derive(Clone, Debug)]
pub struct OutputResolver {
    result_file: Option<Utf8PathBuf>,
    fallback_paths: Vec<Utf8PathBuf>,
    report_dir: Utf8PathBuf,
    file_prefix: String,
}

impl OutputResolver {
    /// Creates a new resolver that writes unique files into `report_dir`, with no result file or
    /// fallbacks.
    pub fn new(report_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            result_file: None,
            fallback_paths: Vec::new(),
            report_dir: report_dir.into(),
            file_prefix: "report".to_owned(),
        }
    }

    /// Creates a new resolver from config.
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            result_file: config.result_file.clone(),
            fallback_paths: config.fallback_paths.clone(),
            report_dir: config.dir.clone(),
            file_prefix: config.file_prefix.clone(),
        }
    }

    /// Sets the preferred result file.
    pub fn set_result_file(&mut self, result_file: impl Into<Utf8PathBuf>) -> &mut Self {
        self.result_file = Some(result_file.into());
        self
    }

    /// Adds a fallback path, tried after the result file.
    pub fn add_fallback_path(&mut self, path: impl Into<Utf8PathBuf>) -> &mut Self {
        self.fallback_paths.push(path.into());
        self
    }

    /// Sets the prefix used for unique file names in the report directory.
    pub fn set_file_prefix(&mut self, file_prefix: impl Into<String>) -> &mut Self {
        self.file_prefix = file_prefix.into();
        self
    }

    /// Opens the first usable destination for writing.
    pub fn resolve(&self) -> Result<ReportFile, ResolveOutputError> {
        let mut attempts = Vec::new();

        if let Some(result_file) = &self.result_file {
            match create_with_parent(result_file) {
                Ok(file) => return Ok(ReportFile::new(result_file.clone(), file)),
                Err(error) => {
                    warn!("cannot write report to result file {result_file}: {error}");
                    attempts.push(OutputAttempt {
                        path: result_file.clone(),
                        error,
                    });
                }
            }
        }

        for path in &self.fallback_paths {
            match File::create(path.as_std_path()) {
                Ok(file) => {
                    debug!("writing report to fallback path {path}");
                    return Ok(ReportFile::new(path.clone(), file));
                }
                Err(error) => {
                    debug!("cannot use fallback path {path}: {error}");
                    attempts.push(OutputAttempt {
                        path: path.clone(),
                        error,
                    });
                }
            }
        }

        match self.create_unique() {
            Ok((path, file)) => {
                debug!("writing report to {path}");
                Ok(ReportFile::new(path, file))
            }
            Err(attempt) => {
                attempts.push(attempt);
                Err(ResolveOutputError::new(attempts))
            }
        }
    }

    fn create_unique(&self) -> Result<(Utf8PathBuf, File), OutputAttempt> {
        if let Err(error) = fs_err::create_dir_all(&self.report_dir) {
            return Err(OutputAttempt {
                path: self.report_dir.clone(),
                error,
            });
        }

        let mut index: u32 = 0;
        loop {
            let path = self
                .report_dir
                .join(format!("{}-{index}.xml", self.file_prefix));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {}
                Err(error) => return Err(OutputAttempt { path, error }),
            }
            index = match index.checked_add(1) {
                Some(index) => index,
                None => {
                    return Err(OutputAttempt {
                        path: self.report_dir.clone(),
                        error: io::Error::other("exhausted unique report file names"),
                    });
                }
            };
        }
    }
}

fn create_with_parent(path: &Utf8Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }
    File::create(path.as_std_path())
}

/// An open destination for a report.
///
/// The file is closed when this is dropped.
#[derive(Debug)]
pub struct ReportFile {
    path: Utf8PathBuf,
    file: File,
}

impl ReportFile {
    fn new(path: Utf8PathBuf, file: File) -> Self {
        Self { path, file }
    }

    /// Returns the path to this file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns a writer for this file.
    pub fn writer(&mut self) -> &mut File {
        &mut self.file
    }

    /// Consumes self, returning the path.
    pub fn into_path(self) -> Utf8PathBuf {
        self.path
    }
}
