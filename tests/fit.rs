use ndarray::{Array1, Array2};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tempfile::TempDir;
use transit_fit::catalog::read_candidates;
use transit_fit::fit::{CandidateGroup, SkipReason, TargetLock, select_targets};
use transit_fit::{
    Blob, ChainReader, ChainWriter, CsvLightCurveSource, CsvStellarCatalog, Executor, FitConfig,
    FitError, Fitter, LightCurveError, SamplerError, SamplerSettings, StoreError, TargetId,
    TargetOutcome,
};
use transit_fit_test_util::{
    CandidateRow, Injection, StarRow, SyntheticLightCurve, injected_system, write_candidates,
    write_light_curve, write_stars,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const NSTEPS: usize = 4;

struct Workspace {
    dir: TempDir,
    groups: Vec<CandidateGroup>,
}

impl Workspace {
    /// Candidates, stars and light curves of `targets`, the light curve is missing for `missing`
    fn new(targets: &[TargetId], missing: &[TargetId]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let candidates = targets
            .iter()
            .flat_map(|&kicid| {
                [
                    CandidateRow::accepted(kicid, 5.0),
                    CandidateRow::accepted(kicid, 15.0),
                ]
            })
            .collect::<Vec<_>>();
        write_candidates(dir.path().join("candidates.csv"), &candidates).unwrap();
        let stars = targets.iter().map(|&kicid| StarRow::sun(kicid)).collect::<Vec<_>>();
        write_stars(dir.path().join("stars.csv"), &stars).unwrap();
        let light_curves = dir.path().join("lc");
        fs::create_dir(&light_curves).unwrap();
        let system = injected_system(&Injection::default());
        for (i, &kicid) in targets.iter().enumerate() {
            if missing.contains(&kicid) {
                continue;
            }
            let light_curve = SyntheticLightCurve {
                seed: i as u64,
                ..SyntheticLightCurve::default()
            };
            write_light_curve(&light_curves, kicid, &light_curve.segments(&system)).unwrap();
        }
        let candidates = read_candidates(dir.path().join("candidates.csv")).unwrap();
        let groups = select_targets(&candidates, &[], false, 10.0);
        assert_eq!(groups.len(), targets.len());
        Self { dir, groups }
    }

    fn output_dir(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    fn config(&self, quiet: bool) -> FitConfig {
        FitConfig {
            output_dir: self.output_dir(),
            quiet,
            sampler: SamplerSettings {
                nwalkers: 20,
                nburn: 3,
                burniter: 2,
                nsteps: NSTEPS,
                seed: Some(1),
                ..SamplerSettings::default()
            },
            ..FitConfig::default()
        }
    }

    fn fitter(&self, quiet: bool) -> Fitter<CsvStellarCatalog, CsvLightCurveSource> {
        let catalog = CsvStellarCatalog::from_path(self.dir.path().join("stars.csv")).unwrap();
        let source = CsvLightCurveSource::new(self.dir.path().join("lc"));
        Fitter::new(catalog, source, self.config(quiet))
    }

    fn error_log(&self) -> String {
        fs::read_to_string(self.output_dir().join("errors.txt")).unwrap_or_default()
    }
}

fn chain_is_complete(path: &Path) -> bool {
    ChainReader::open(path).is_ok_and(|reader| reader.is_complete())
}

#[test]
fn every_production_step_is_written_once() {
    init_logger();
    let workspace = Workspace::new(&[7], &[]);
    let fitter = workspace.fitter(false);
    let summary = fitter.fit_group(&workspace.groups[0]).unwrap();
    // 11 transit parameters and 3 noise parameters of the single fit segment
    assert_eq!(summary.parameter_names.len(), 14);
    assert_eq!(summary.nwalkers, 28);
    assert_eq!((summary.fit_segments, summary.other_segments), (1, 1));
    assert!(summary.best_ln_prob.is_finite());

    let mut reader = ChainReader::open(&summary.chain_path).unwrap();
    assert!(reader.is_complete());
    assert_eq!(reader.schema().columns, summary.parameter_names);
    let chain = reader.chain().unwrap();
    assert_eq!(chain.dim(), (NSTEPS, 28, 14));
    assert!(chain.iter().all(|x| x.is_finite()));
    let ln_prob = reader.ln_prob().unwrap();
    assert_eq!(ln_prob.dim(), (NSTEPS, 28));
    assert!(ln_prob.iter().all(|x| x.is_finite()));
    let params = reader.params().unwrap();
    assert!(params.iter().all(|p| p.period > 9.0 && p.period < 11.0));
    let predictions = reader.predictions().unwrap();
    assert_eq!(predictions.dim(), (NSTEPS, 28, 2, 100));
    assert!(predictions.iter().all(|x| x.is_finite()));

    // One data row per loaded cadence, in load order
    let loaded = SyntheticLightCurve::default().segments(&injected_system(&Injection::default()));
    let data = reader.data().unwrap();
    assert_eq!(data.len(), 200);
    let expected = loaded
        .iter()
        .enumerate()
        .flat_map(|(chunk, lc)| {
            lc.time()
                .iter()
                .zip(lc.flux())
                .map(|(&t, &f)| (chunk as i64, t, f))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let actual = data
        .iter()
        .map(|row| (row.chunk, row.time, row.flux))
        .collect::<Vec<_>>();
    assert_eq!(actual, expected);

    let mut writer = ChainWriter::open(&summary.chain_path).unwrap();
    let err = writer
        .append_step(
            0,
            Array2::zeros((28, 14)).view(),
            Array1::zeros(28).view(),
            &vec![Blob::default(); 28],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::StepNotWritable {
            step: 0,
            next: NSTEPS
        }
    ));
}

#[test]
fn quiet_batch_isolates_failures() {
    init_logger();
    let workspace = Workspace::new(&[101, 102, 103], &[102]);
    let fitter = workspace.fitter(true);
    let executor = Executor::thread_pool(2).unwrap();
    let outcomes = fitter.run_batch(&workspace.groups, &executor).unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(matches!(outcomes[0], TargetOutcome::Completed(_)));
    assert!(matches!(
        outcomes[1],
        TargetOutcome::Failed {
            kicid: 102,
            error: FitError::LightCurve(LightCurveError::NotFound(102))
        }
    ));
    assert!(matches!(outcomes[2], TargetOutcome::Completed(_)));

    let log = workspace.error_log();
    assert_eq!(log.matches("failed with error").count(), 1);
    assert!(log.starts_with("102 failed with error:"));
    assert!(chain_is_complete(&fitter.chain_path(101)));
    assert!(chain_is_complete(&fitter.chain_path(103)));
    assert!(!fitter.chain_path(102).exists());
    for kicid in [101, 102, 103] {
        assert!(!TargetLock::lock_path(&workspace.output_dir(), kicid).exists());
    }

    // Completed targets are not fitted again
    let outcomes = fitter.run_batch(&workspace.groups, &executor).unwrap();
    for i in [0, 2] {
        assert!(matches!(
            outcomes[i],
            TargetOutcome::Skipped {
                reason: SkipReason::AlreadyComplete,
                ..
            }
        ));
    }
}

#[test]
fn error_log_records_input_and_causes() {
    init_logger();
    let workspace = Workspace::new(&[201, 202], &[202]);
    fs::write(
        workspace.dir.path().join("lc").join("202.csv"),
        "not,a,light,curve\n1,2,3,4\n",
    )
    .unwrap();
    let fitter = workspace.fitter(true);
    let outcomes = fitter
        .run_batch(&workspace.groups, &Executor::sequential())
        .unwrap();
    assert!(matches!(outcomes[0], TargetOutcome::Completed(_)));
    assert!(matches!(
        outcomes[1],
        TargetOutcome::Failed {
            kicid: 202,
            error: FitError::LightCurve(LightCurveError::Csv { .. })
        }
    ));

    let log = workspace.error_log();
    assert_eq!(log.matches("failed with error").count(), 1);
    assert!(log.starts_with("202 failed with error:\n    failed to parse "));
    assert_eq!(log.matches("failed to parse").count(), 1);
    assert_eq!(log.matches("202.csv").count(), 1);
    assert!(log.contains("\n    caused by: "));

    let input = log
        .lines()
        .skip_while(|line| *line != "  input:")
        .nth(1)
        .unwrap();
    let input: serde_json::Value = serde_json::from_str(input.trim()).unwrap();
    assert_eq!(input["kicid"], 202);
    assert_eq!(input["candidates"].as_array().unwrap().len(), 2);
    assert_eq!(input["init"]["period"], 10.0);
    assert_eq!(input["init"]["t0"], 5.0);
}

#[test]
fn failed_batch_does_not_cancel_the_next_one() {
    init_logger();
    let workspace = Workspace::new(&[11, 12], &[11]);
    let fitter = workspace.fitter(false);
    let executor = Executor::sequential();
    assert!(fitter.run_batch(&workspace.groups, &executor).is_err());
    assert!(fitter.cancel_flag().load(Ordering::Relaxed));

    let system = injected_system(&Injection::default());
    write_light_curve(
        &workspace.dir.path().join("lc"),
        11,
        &SyntheticLightCurve::default().segments(&system),
    )
    .unwrap();
    let outcomes = fitter.run_batch(&workspace.groups, &executor).unwrap();
    assert!(
        outcomes
            .iter()
            .all(|outcome| matches!(outcome, TargetOutcome::Completed(_)))
    );
    assert!(!fitter.cancel_flag().load(Ordering::Relaxed));
    assert!(chain_is_complete(&fitter.chain_path(11)));
    assert!(chain_is_complete(&fitter.chain_path(12)));
}

#[test]
fn stretch_scale_comes_from_the_config() {
    init_logger();
    let workspace = Workspace::new(&[21], &[]);
    let mut config = workspace.config(false);
    config.sampler.stretch_scale = 1.0;
    let catalog = CsvStellarCatalog::from_path(workspace.dir.path().join("stars.csv")).unwrap();
    let source = CsvLightCurveSource::new(workspace.dir.path().join("lc"));
    let fitter = Fitter::new(catalog, source, config);
    let err = fitter.fit_group(&workspace.groups[0]).unwrap_err();
    assert!(matches!(err, FitError::Sampler(SamplerError::StretchScale)));
    assert!(!fitter.chain_path(21).exists());
}

#[test]
fn locked_target_is_skipped() {
    init_logger();
    let workspace = Workspace::new(&[5], &[]);
    let output_dir = workspace.output_dir();
    fs::create_dir_all(&output_dir).unwrap();
    let lock = TargetLock::acquire(&output_dir, 5).unwrap().unwrap();
    let fitter = workspace.fitter(false);
    let outcomes = fitter
        .run_batch(&workspace.groups, &Executor::sequential())
        .unwrap();
    assert!(matches!(
        outcomes[0],
        TargetOutcome::Skipped {
            kicid: 5,
            reason: SkipReason::Locked
        }
    ));
    assert!(lock.path().exists());
    assert!(!fitter.chain_path(5).exists());
}

#[test]
fn interactive_batch_propagates_failure() {
    init_logger();
    let workspace = Workspace::new(&[1, 2], &[1]);
    let fitter = workspace.fitter(false);
    let err = fitter
        .run_batch(&workspace.groups, &Executor::sequential())
        .unwrap_err();
    assert!(matches!(err, FitError::LightCurve(LightCurveError::NotFound(1))));
    assert!(workspace.error_log().is_empty());
    // The failure cancels the rest of the batch
    assert!(fitter.cancel_flag().load(Ordering::Relaxed));
    assert!(!fitter.chain_path(2).exists());
}

#[test]
fn cancelled_fit_keeps_committed_steps() {
    init_logger();
    let workspace = Workspace::new(&[9], &[]);
    let fitter = workspace.fitter(false);
    fitter.cancel_flag().store(true, Ordering::Relaxed);
    let err = fitter.fit_group(&workspace.groups[0]).unwrap_err();
    assert!(matches!(err, FitError::Cancelled { target: 9, steps: 1 }));
    let mut reader = ChainReader::open(fitter.chain_path(9)).unwrap();
    assert_eq!(reader.committed(), 1);
    assert!(!reader.is_complete());
    assert_eq!(reader.chain().unwrap().dim(), (1, 28, 14));
}
