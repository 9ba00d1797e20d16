//! Candidate table and stellar catalog

mod candidate;
pub use candidate::{Candidate, candidates_from_reader, read_candidates};

use crate::error::CatalogError;
use crate::types::TargetId;

use itertools::process_results;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Stellar parameters of a catalog star
///
/// Errors are asymmetric: `*_err1` is the upper and `*_err2` the (negative) lower error.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct StarRecord {
    pub kepid: TargetId,
    pub teff: Option<f64>,
    pub logg: Option<f64>,
    pub kepmag: Option<f64>,
    /// R☉
    pub radius: f64,
    pub radius_err1: f64,
    pub radius_err2: f64,
    /// M☉
    pub mass: f64,
    pub mass_err1: f64,
    pub mass_err2: f64,
}

impl StarRecord {
    /// Symmetrised radius error
    pub fn radius_err(&self) -> f64 {
        0.5 * (self.radius_err1 - self.radius_err2)
    }

    /// Symmetrised mass error
    pub fn mass_err(&self) -> f64 {
        0.5 * (self.mass_err1 - self.mass_err2)
    }

    /// Check that the record can be used as a prior
    pub fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |reason| {
            Err(CatalogError::InvalidRecord {
                target: self.kepid,
                reason,
            })
        };
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return invalid("radius must be positive");
        }
        if !(self.mass.is_finite() && self.mass > 0.0) {
            return invalid("mass must be positive");
        }
        if !(self.radius_err().is_finite() && self.radius_err() > 0.0) {
            return invalid("radius error must be positive");
        }
        if !(self.mass_err().is_finite() && self.mass_err() > 0.0) {
            return invalid("mass error must be positive");
        }
        Ok(())
    }
}

/// Lookup of stellar parameters by target
pub trait StellarCatalog: Send + Sync {
    fn star(&self, target: TargetId) -> Result<StarRecord, CatalogError>;
}

/// Catalog loaded from a CSV table
#[derive(Clone, Debug, Default)]
pub struct CsvStellarCatalog {
    stars: HashMap<TargetId, StarRecord>,
}

impl CsvStellarCatalog {
    pub fn from_records(records: impl IntoIterator<Item = StarRecord>) -> Self {
        Self {
            stars: records
                .into_iter()
                .map(|record| (record.kepid, record))
                .collect(),
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        process_results(csv_reader.deserialize::<StarRecord>(), |records| {
            Self::from_records(records)
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let csv_error = |source| CatalogError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(|err| csv_error(err.into()))?;
        Self::from_reader(file).map_err(csv_error)
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }
}

impl StellarCatalog for CsvStellarCatalog {
    fn star(&self, target: TargetId) -> Result<StarRecord, CatalogError> {
        self.stars
            .get(&target)
            .cloned()
            .ok_or(CatalogError::NotFound(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    const STARS: &str = "\
kepid,teff,logg,kepmag,radius,radius_err1,radius_err2,mass,mass_err1,mass_err2
10,5700,4.4,12.1,0.95,0.1,-0.05,1.02,0.08,-0.12
11,,,,1.2,0.0,0.0,1.1,0.1,-0.1
";

    #[test]
    fn lookup_and_errors() {
        let catalog = CsvStellarCatalog::from_reader(STARS.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 2);
        let star = catalog.star(10).unwrap();
        assert_eq!(star.teff, Some(5700.0));
        assert_relative_eq!(star.radius_err(), 0.075, epsilon = 1e-12);
        assert_relative_eq!(star.mass_err(), 0.1, epsilon = 1e-12);
        star.validate().unwrap();

        let star = catalog.star(11).unwrap();
        assert_eq!(star.logg, None);
        assert!(matches!(
            star.validate(),
            Err(CatalogError::InvalidRecord { target: 11, .. })
        ));

        assert!(matches!(catalog.star(12), Err(CatalogError::NotFound(12))));
    }
}
