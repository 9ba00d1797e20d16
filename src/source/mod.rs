//! Light-curve loading

use crate::data::LightCurveSegment;
use crate::error::LightCurveError;
use crate::types::TargetId;

use itertools::{Itertools, process_results};
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Mask transits of other cataloged planets of the target
    pub remove_known_transits: bool,
    /// Remove intermediate files created while loading
    pub delete_temporary: bool,
}

/// Loading details reported next to the segments
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LightCurveMeta {
    pub path: Option<PathBuf>,
    /// Cadences masked as known transits
    pub removed_cadences: usize,
    /// Segments left empty after masking
    pub removed_segments: usize,
}

/// Provider of the light-curve segments of a target, in a stable load order
pub trait LightCurveSource: Send + Sync {
    fn load(
        &self,
        target: TargetId,
        options: LoadOptions,
    ) -> Result<(Vec<LightCurveSegment>, LightCurveMeta), LightCurveError>;
}

/// Periodic transit of an already cataloged planet
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct KnownTransit {
    pub kicid: TargetId,
    pub period: f64,
    pub t0: f64,
    pub duration: f64,
}

impl KnownTransit {
    /// Whether `t` is within one duration of a mid-transit time
    pub fn covers(&self, t: f64) -> bool {
        let half_period = 0.5 * self.period;
        let phase = (t - self.t0 + half_period).rem_euclid(self.period) - half_period;
        phase.abs() < self.duration
    }
}

pub fn read_known_transits(path: impl AsRef<Path>) -> Result<Vec<KnownTransit>, LightCurveError> {
    let path = path.as_ref();
    let csv_error = |source| LightCurveError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|source| LightCurveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);
    process_results(reader.deserialize::<KnownTransit>(), |iter| iter.collect()).map_err(csv_error)
}

#[derive(Debug, Deserialize)]
struct CadenceRecord {
    chunk: i64,
    time: f64,
    flux: f64,
    flux_err: f64,
    texp: f64,
}

/// Split CSV rows into segments by their `chunk` column
///
/// Segments are ordered by chunk index, rows keep their file order within a chunk.
pub fn segments_from_reader<R: Read>(reader: R) -> Result<Vec<LightCurveSegment>, LightCurveError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let rows: Vec<CadenceRecord> =
        process_results(csv_reader.deserialize::<CadenceRecord>(), |iter| {
            iter.sorted_by_key(|row| row.chunk).collect()
        })
        .map_err(|source| LightCurveError::Csv {
            path: PathBuf::new(),
            source,
        })?;
    rows.into_iter()
        .chunk_by(|row| row.chunk)
        .into_iter()
        .map(|(_, rows)| {
            let rows = rows.collect_vec();
            let texp = rows[0].texp;
            let (time, flux, flux_err): (Vec<_>, Vec<_>, Vec<_>) = rows
                .into_iter()
                .map(|row| (row.time, row.flux, row.flux_err))
                .multiunzip();
            LightCurveSegment::new(time, flux, flux_err, texp)
        })
        .collect()
}

/// Reads `<directory>/<target>.csv` with columns `chunk, time, flux, flux_err, texp`
#[derive(Clone, Debug)]
pub struct CsvLightCurveSource {
    directory: PathBuf,
    known_transits: HashMap<TargetId, Vec<KnownTransit>>,
}

impl CsvLightCurveSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            known_transits: HashMap::new(),
        }
    }

    pub fn with_known_transits(mut self, known: impl IntoIterator<Item = KnownTransit>) -> Self {
        for transit in known {
            self.known_transits
                .entry(transit.kicid)
                .or_default()
                .push(transit);
        }
        self
    }

    pub fn path(&self, target: TargetId) -> PathBuf {
        self.directory.join(format!("{target}.csv"))
    }
}

impl LightCurveSource for CsvLightCurveSource {
    fn load(
        &self,
        target: TargetId,
        options: LoadOptions,
    ) -> Result<(Vec<LightCurveSegment>, LightCurveMeta), LightCurveError> {
        let path = self.path(target);
        if !path.exists() {
            return Err(LightCurveError::NotFound(target));
        }
        let file = File::open(&path).map_err(|source| LightCurveError::Io {
            path: path.clone(),
            source,
        })?;
        let mut segments = segments_from_reader(file).map_err(|err| match err {
            LightCurveError::Csv { source, .. } => LightCurveError::Csv {
                path: path.clone(),
                source,
            },
            err => err,
        })?;

        let mut meta = LightCurveMeta {
            path: Some(path),
            ..LightCurveMeta::default()
        };
        let known = self.known_transits.get(&target).map_or(&[][..], Vec::as_slice);
        if options.remove_known_transits && !known.is_empty() {
            let before: usize = segments.iter().map(LightCurveSegment::len).sum();
            let nsegments = segments.len();
            segments = segments
                .iter()
                .filter_map(|lc| lc.retain(|t| !known.iter().any(|transit| transit.covers(t))))
                .collect();
            let after: usize = segments.iter().map(LightCurveSegment::len).sum();
            meta.removed_cadences = before - after;
            meta.removed_segments = nsegments - segments.len();
            debug!(
                "target {target}: masked {} cadences of {} known transits",
                meta.removed_cadences,
                known.len()
            );
        }
        Ok((segments, meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIGHT_CURVE: &str = "\
chunk,time,flux,flux_err,texp
1,10.0,1.0,0.001,0.02
0,0.0,1.0,0.001,0.02
0,0.5,0.99,0.001,0.02
1,10.5,1.0,0.001,0.02
1,11.0,1.0,0.001,0.02
";

    #[test]
    fn rows_are_grouped_by_chunk() {
        let segments = segments_from_reader(LIGHT_CURVE.as_bytes()).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].time().to_vec(), vec![0.0, 0.5]);
        assert_eq!(segments[1].time().to_vec(), vec![10.0, 10.5, 11.0]);
        assert_eq!(segments[1].texp(), 0.02);
    }

    #[test]
    fn known_transit_phase() {
        let transit = KnownTransit {
            kicid: 1,
            period: 10.0,
            t0: 0.5,
            duration: 0.2,
        };
        assert!(transit.covers(0.5));
        assert!(transit.covers(30.6));
        assert!(transit.covers(-9.45));
        assert!(!transit.covers(5.5));
        assert!(!transit.covers(10.0));
    }

    #[test]
    fn load_and_mask() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("7.csv"), LIGHT_CURVE).unwrap();
        let source = CsvLightCurveSource::new(dir.path()).with_known_transits([KnownTransit {
            kicid: 7,
            period: 100.0,
            t0: 0.5,
            duration: 0.1,
        }]);

        let (segments, meta) = source.load(7, LoadOptions::default()).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(meta.removed_cadences, 0);

        let options = LoadOptions {
            remove_known_transits: true,
            delete_temporary: false,
        };
        let (segments, meta) = source.load(7, options).unwrap();
        assert_eq!(segments[0].len(), 1);
        assert_eq!(meta.removed_cadences, 1);

        assert!(matches!(
            source.load(8, options),
            Err(LightCurveError::NotFound(8))
        ));
    }
}
