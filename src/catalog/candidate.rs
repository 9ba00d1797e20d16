use crate::error::CatalogError;
use crate::types::TargetId;

use itertools::process_results;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// One detected transit of a candidate
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub kicid: TargetId,
    /// Mid-transit epoch, days
    pub transit_time: f64,
    /// Transit duration, days
    pub transit_duration: f64,
    /// Planet to star radius ratio
    pub transit_ror: f64,
    pub centroid_offset: f64,
    pub centroid_offset_err: f64,
    #[serde(deserialize_with = "deserialize_flag")]
    pub accept_time: bool,
    #[serde(deserialize_with = "deserialize_flag")]
    pub accept_bic: bool,
}

impl Candidate {
    /// Signal-to-noise ratio of the centroid offset
    pub fn centroid_offset_s2n(&self) -> f64 {
        self.centroid_offset / self.centroid_offset_err
    }

    pub fn is_accepted(&self) -> bool {
        self.accept_time && self.accept_bic
    }
}

/// Accepts `true`/`false` in any case and `1`/`0`
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean flag, got {other:?}"
        ))),
    }
}

pub fn candidates_from_reader<R: Read>(reader: R) -> Result<Vec<Candidate>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    process_results(csv_reader.deserialize::<Candidate>(), |iter| iter.collect())
}

/// Read the candidate table, one row per detected transit
pub fn read_candidates(path: impl AsRef<Path>) -> Result<Vec<Candidate>, CatalogError> {
    let path = path.as_ref();
    let csv_error = |source| CatalogError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|err| csv_error(err.into()))?;
    candidates_from_reader(file).map_err(csv_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANDIDATES: &str = "\
kicid,transit_time,transit_duration,transit_ror,centroid_offset,centroid_offset_err,accept_time,accept_bic,extra
10,120.5,0.4,0.05,1.0,0.5,True,true,x
10,420.5,0.42,0.07,3.0,0.5,1,0,y
";

    #[test]
    fn parse_flags_and_ignore_extra_columns() {
        let candidates = candidates_from_reader(CANDIDATES.as_bytes()).unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].is_accepted());
        assert!(candidates[1].accept_time);
        assert!(!candidates[1].is_accepted());
        assert_eq!(candidates[0].centroid_offset_s2n(), 2.0);
    }

    #[test]
    fn bad_flag_is_an_error() {
        let data = "\
kicid,transit_time,transit_duration,transit_ror,centroid_offset,centroid_offset_err,accept_time,accept_bic
1,0.0,0.1,0.1,0.0,1.0,maybe,true
";
        assert!(candidates_from_reader(data.as_bytes()).is_err());
    }
}
