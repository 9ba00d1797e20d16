use crate::types::TargetId;

use itertools::Itertools;
use log::{error, warn};
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::iter;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Exclusive claim of a target by one process, removed on drop
///
/// The claim is the file `<output_dir>/<target>.lock` created with `create_new`, so two processes
/// sharing an output directory never fit the same target at the same time.
#[derive(Debug)]
pub struct TargetLock {
    path: PathBuf,
}

impl TargetLock {
    pub fn lock_path(output_dir: &Path, target: TargetId) -> PathBuf {
        output_dir.join(format!("{target}.lock"))
    }

    /// Returns `None` if the target is locked already
    pub fn acquire(output_dir: &Path, target: TargetId) -> io::Result<Option<Self>> {
        let path = Self::lock_path(output_dir, target);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
            Err(err) => return Err(err),
        };
        let lock = Self { path };
        file.write_all(b"locked")?;
        Ok(Some(lock))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!("cannot remove lock file {}: {err}", self.path.display());
        }
    }
}

/// Append-only log of failed targets shared by the workers of a batch
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    guard: Mutex<()>,
}

impl ErrorLog {
    pub const FILE_NAME: &'static str = "errors.txt";

    pub fn new(output_dir: &Path) -> Self {
        Self {
            path: output_dir.join(Self::FILE_NAME),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry with the target input, the whole source chain of `err` and the panic
    /// backtrace if there is one
    pub fn append(
        &self,
        target: TargetId,
        input: &serde_json::Value,
        err: &(dyn Error + 'static),
        backtrace: Option<&Backtrace>,
    ) -> io::Result<()> {
        let entry = Self::entry(target, input, err, backtrace);
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(entry.as_bytes())
    }

    /// Like [ErrorLog::append] but a failure to write is only logged
    pub fn record(
        &self,
        target: TargetId,
        input: &serde_json::Value,
        err: &(dyn Error + 'static),
        backtrace: Option<&Backtrace>,
    ) {
        let causes = error_chain(err).map(ToString::to_string).join(": ");
        error!("{target} failed with error: {causes}");
        if let Err(io_err) = self.append(target, input, err, backtrace) {
            error!("cannot write {}: {io_err}", self.path.display());
        }
    }

    fn entry(
        target: TargetId,
        input: &serde_json::Value,
        err: &(dyn Error + 'static),
        backtrace: Option<&Backtrace>,
    ) -> String {
        // Writing into a String cannot fail
        let mut entry = format!("{target} failed with error:\n");
        for (i, cause) in error_chain(err).enumerate() {
            let prefix = if i == 0 { "" } else { "caused by: " };
            let _ = writeln!(entry, "    {prefix}{cause}");
        }
        let _ = writeln!(entry, "  input:\n    {input}");
        if let Some(backtrace) = backtrace {
            entry.push_str("  backtrace:\n");
            for line in backtrace.to_string().lines() {
                let _ = writeln!(entry, "    {line}");
            }
        }
        entry
    }
}

/// `err` followed by its sources
fn error_chain<'a>(
    err: &'a (dyn Error + 'static),
) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    iter::successors(Some(err), |&err| err.source())
}
