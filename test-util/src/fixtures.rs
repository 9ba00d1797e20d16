use serde::Serialize;
use std::path::Path;
use transit_fit::{LightCurveSegment, TargetId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    CsvError(#[from] csv::Error),
}

#[derive(Clone, Debug, Serialize)]
pub struct CandidateRow {
    pub kicid: TargetId,
    pub transit_time: f64,
    pub transit_duration: f64,
    pub transit_ror: f64,
    pub centroid_offset: f64,
    pub centroid_offset_err: f64,
    pub accept_time: bool,
    pub accept_bic: bool,
}

impl CandidateRow {
    /// Accepted transit of the default injection at `transit_time`
    pub fn accepted(kicid: TargetId, transit_time: f64) -> Self {
        Self {
            kicid,
            transit_time,
            transit_duration: 0.15,
            transit_ror: 0.05,
            centroid_offset: 0.5,
            centroid_offset_err: 1.0,
            accept_time: true,
            accept_bic: true,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StarRow {
    pub kepid: TargetId,
    pub teff: Option<f64>,
    pub logg: Option<f64>,
    pub kepmag: Option<f64>,
    pub radius: f64,
    pub radius_err1: f64,
    pub radius_err2: f64,
    pub mass: f64,
    pub mass_err1: f64,
    pub mass_err2: f64,
}

impl StarRow {
    pub fn sun(kepid: TargetId) -> Self {
        Self {
            kepid,
            teff: Some(5772.0),
            logg: Some(4.44),
            kepmag: None,
            radius: 1.0,
            radius_err1: 0.1,
            radius_err2: -0.1,
            mass: 1.0,
            mass_err1: 0.1,
            mass_err2: -0.1,
        }
    }
}

#[derive(Serialize)]
struct CadenceRow {
    chunk: usize,
    time: f64,
    flux: f64,
    flux_err: f64,
    texp: f64,
}

fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_candidates(path: impl AsRef<Path>, rows: &[CandidateRow]) -> Result<(), Error> {
    write_rows(path.as_ref(), rows)
}

pub fn write_stars(path: impl AsRef<Path>, rows: &[StarRow]) -> Result<(), Error> {
    write_rows(path.as_ref(), rows)
}

/// Write `<directory>/<target>.csv`, the chunk index is the segment position
pub fn write_light_curve(
    directory: impl AsRef<Path>,
    target: TargetId,
    segments: &[LightCurveSegment],
) -> Result<(), Error> {
    let rows = segments.iter().enumerate().flat_map(|(chunk, lc)| {
        lc.time()
            .into_iter()
            .zip(lc.flux())
            .zip(lc.flux_err())
            .map(move |((&time, &flux), &flux_err)| CadenceRow {
                chunk,
                time,
                flux,
                flux_err,
                texp: lc.texp(),
            })
            .collect::<Vec<_>>()
    });
    write_rows(&directory.as_ref().join(format!("{target}.csv")), rows)
}
