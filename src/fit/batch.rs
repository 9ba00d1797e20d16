use crate::catalog::StellarCatalog;
use crate::error::FitError;
use crate::executor::Executor;
use crate::fit::driver::{FitSummary, Fitter};
use crate::fit::init::{CandidateGroup, TargetInit};
use crate::fit::lock::{ErrorLog, TargetLock};
use crate::source::LightCurveSource;
use crate::store::ChainReader;
use crate::types::TargetId;

use log::info;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use std::sync::atomic::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Another worker or process holds the target lock
    Locked,
    /// The chain file of the target has all its steps
    AlreadyComplete,
}

/// What happened to one target of a batch
#[derive(Debug)]
pub enum TargetOutcome {
    Completed(FitSummary),
    Skipped { kicid: TargetId, reason: SkipReason },
    /// Failure recorded in the error log, quiet mode only
    Failed { kicid: TargetId, error: FitError },
}

impl TargetOutcome {
    pub fn kicid(&self) -> TargetId {
        match self {
            Self::Completed(summary) => summary.kicid,
            Self::Skipped { kicid, .. } | Self::Failed { kicid, .. } => *kicid,
        }
    }
}

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

/// Chain a panic hook that keeps the backtrace of the last panic of the current thread
fn capture_panic_backtraces() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            PANIC_BACKTRACE.with(|slot| slot.replace(Some(Backtrace::force_capture())));
            previous(info);
        }));
    });
}

fn take_panic_backtrace() -> Option<Backtrace> {
    PANIC_BACKTRACE.with(RefCell::take)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

impl<C, S> Fitter<C, S>
where
    C: StellarCatalog,
    S: LightCurveSource,
{
    /// Fit every group through `executor`, outcomes are in input order
    ///
    /// In quiet mode errors and panics of a target are written to the error log and reported as
    /// [TargetOutcome::Failed]. Otherwise the first failure cancels the remaining fits and is
    /// returned.
    pub fn run_batch(
        &self,
        groups: &[CandidateGroup],
        executor: &Executor,
    ) -> Result<Vec<TargetOutcome>, FitError> {
        let output_dir = &self.config.output_dir;
        fs::create_dir_all(output_dir).map_err(FitError::io(output_dir))?;
        let error_log = ErrorLog::new(output_dir);
        // A failure of a previous batch must not cancel this one
        self.cancel.store(false, Ordering::Relaxed);
        if self.config.quiet {
            capture_panic_backtraces();
        }
        info!(
            "fitting {} targets with {} workers",
            groups.len(),
            executor.threads()
        );
        let results = executor.map(groups.iter().collect(), |group| {
            self.run_target(group, &error_log)
        });

        let mut outcomes = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                // A cancellation caused by another failure is not the error to report
                Err(FitError::Cancelled { .. }) if first_error.is_some() => {}
                Err(err @ FitError::Cancelled { .. }) => first_error = Some(err),
                Err(err) => {
                    if matches!(first_error, None | Some(FitError::Cancelled { .. })) {
                        first_error = Some(err);
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(outcomes),
        }
    }

    fn run_target(
        &self,
        group: &CandidateGroup,
        error_log: &ErrorLog,
    ) -> Result<TargetOutcome, FitError> {
        let kicid = group.kicid;
        let output_dir = &self.config.output_dir;
        if self.cancel.load(Ordering::Relaxed) {
            return Err(FitError::Cancelled {
                target: kicid,
                steps: 0,
            });
        }
        let skipped = |reason: SkipReason| -> Result<TargetOutcome, FitError> {
            info!("{kicid}: skipped, {reason:?}");
            Ok(TargetOutcome::Skipped { kicid, reason })
        };
        if let Ok(reader) = ChainReader::open(self.chain_path(kicid)) {
            if reader.is_complete() {
                return skipped(SkipReason::AlreadyComplete);
            }
        }
        let lock = match TargetLock::acquire(output_dir, kicid) {
            Ok(Some(lock)) => lock,
            Ok(None) => return skipped(SkipReason::Locked),
            Err(source) => {
                let err = FitError::Io {
                    path: TargetLock::lock_path(output_dir, kicid),
                    source,
                };
                return self.failed(group, err, None, error_log);
            }
        };

        let mut backtrace = None;
        let result = if self.config.quiet {
            take_panic_backtrace();
            panic::catch_unwind(AssertUnwindSafe(|| self.fit_group(group))).unwrap_or_else(
                |payload| {
                    backtrace = take_panic_backtrace();
                    Err(FitError::Panic {
                        target: kicid,
                        message: panic_message(payload.as_ref()),
                    })
                },
            )
        } else {
            self.fit_group(group)
        };
        drop(lock);

        match result {
            Ok(summary) => Ok(TargetOutcome::Completed(summary)),
            Err(err) => self.failed(group, err, backtrace, error_log),
        }
    }

    /// Candidate rows of the target and its initial parameters when they can be derived
    fn failure_input(&self, group: &CandidateGroup) -> serde_json::Value {
        let init = self
            .catalog
            .star(group.kicid)
            .ok()
            .and_then(|star| TargetInit::new(group, &star).ok());
        serde_json::json!({
            "kicid": group.kicid,
            "candidates": group.candidates,
            "init": init,
        })
    }

    fn failed(
        &self,
        group: &CandidateGroup,
        err: FitError,
        backtrace: Option<Backtrace>,
        error_log: &ErrorLog,
    ) -> Result<TargetOutcome, FitError> {
        let kicid = group.kicid;
        if self.config.quiet {
            let input = self.failure_input(group);
            error_log.record(kicid, &input, &err, backtrace.as_ref());
            Ok(TargetOutcome::Failed { kicid, error: err })
        } else {
            self.cancel.store(true, Ordering::Relaxed);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages() {
        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload = panic::catch_unwind(|| panic!("formatted {}", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 1");
    }

    #[test]
    fn panic_backtrace_is_taken_once() {
        capture_panic_backtraces();
        take_panic_backtrace();
        let result = panic::catch_unwind(|| panic!("kept"));
        assert!(result.is_err());
        assert!(take_panic_backtrace().is_some());
        assert!(take_panic_backtrace().is_none());
    }
}
