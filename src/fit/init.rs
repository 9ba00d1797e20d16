use crate::catalog::{Candidate, StarRecord};
use crate::error::{CatalogError, InvalidParameter};
use crate::prior::StellarPrior;
use crate::transit::{Body, Central, TransitSystem, semi_major_axis};
use crate::types::TargetId;

use itertools::Itertools;
use serde::Serialize;
use std::f64::consts::PI;

/// Period assigned to a candidate with a single observed transit, days
pub const SINGLE_TRANSIT_PERIOD: f64 = 2000.0;

/// Candidate transits of one target
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CandidateGroup {
    pub kicid: TargetId,
    pub candidates: Vec<Candidate>,
}

/// Group candidate rows by target
///
/// `targets` restricts the selection unless it is empty. Rows failing the accept flags are
/// dropped unless `fit_all` is set, and a group is kept only if at least one of its rows has a
/// centroid offset signal-to-noise ratio not above `max_offset`. Groups are ordered by target id.
pub fn select_targets(
    candidates: &[Candidate],
    targets: &[TargetId],
    fit_all: bool,
    max_offset: f64,
) -> Vec<CandidateGroup> {
    candidates
        .iter()
        .filter(|c| targets.is_empty() || targets.contains(&c.kicid))
        .filter(|c| fit_all || c.is_accepted())
        .cloned()
        .into_group_map_by(|c| c.kicid)
        .into_iter()
        .filter(|(_, group)| group.iter().any(|c| c.centroid_offset_s2n() <= max_offset))
        .map(|(kicid, candidates)| CandidateGroup { kicid, candidates })
        .sorted_unstable_by_key(|group| group.kicid)
        .collect()
}

/// Starting point of the fit of one target
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TargetInit {
    pub kicid: TargetId,
    /// R☉
    pub star_radius: f64,
    pub star_radius_err: f64,
    /// M☉
    pub star_mass: f64,
    pub star_mass_err: f64,
    /// Days
    pub period: f64,
    pub t0: f64,
    /// Body radius, R☉
    pub radius: f64,
    pub impact: f64,
}

impl TargetInit {
    /// Derive the initial orbit from the candidate transits and the catalog star
    ///
    /// Several transits give the period as the mean spacing of the sorted epochs, the first
    /// epoch is the reference one. The impact parameter compares the observed duration with
    /// the duration of a central transit.
    pub fn new(group: &CandidateGroup, star: &StarRecord) -> Result<Self, CatalogError> {
        star.validate()?;
        let n = group.candidates.len();
        if n == 0 {
            return Err(CatalogError::InvalidRecord {
                target: group.kicid,
                reason: "target has no candidate transit",
            });
        }
        let epochs = group
            .candidates
            .iter()
            .map(|c| c.transit_time)
            .sorted_by(f64::total_cmp)
            .collect_vec();
        let (period, t0) = if n > 1 {
            ((epochs[n - 1] - epochs[0]) / (n - 1) as f64, epochs[0])
        } else {
            (SINGLE_TRANSIT_PERIOD, epochs[0])
        };
        let mean = |f: fn(&Candidate) -> f64| group.candidates.iter().map(f).sum::<f64>() / n as f64;
        let ror = mean(|c| c.transit_ror);
        let duration = mean(|c| c.transit_duration);

        let radius = ror * star.radius;
        let a = semi_major_axis(period, star.mass);
        let central_duration = period * radius / (PI * a);
        let impact = (1.0 - central_duration / duration).abs().sqrt();
        Ok(Self {
            kicid: group.kicid,
            star_radius: star.radius,
            star_radius_err: star.radius_err(),
            star_mass: star.mass,
            star_mass_err: star.mass_err(),
            period,
            t0,
            radius,
            impact,
        })
    }

    /// Transit system at the initial guess, with every parameter free except the body mass
    pub fn system(&self, supersample: usize) -> Result<TransitSystem, InvalidParameter> {
        let mut system = TransitSystem::new(Central {
            flux: 1.0,
            radius: self.star_radius,
            mass: self.star_mass,
            q1: 0.5,
            q2: 0.5,
        })?
        .with_supersample(supersample);
        system.add_body(Body {
            radius: self.radius,
            period: self.period,
            t0: self.t0,
            b: self.impact,
            e: 0.01,
            omega: 0.0,
            mass: 0.0,
        })?;
        system.thaw_parameter("*");
        system.freeze_parameter("bodies*:mass");
        Ok(system)
    }

    pub fn prior(&self) -> StellarPrior {
        StellarPrior::new(
            self.star_mass,
            self.star_mass_err,
            self.star_radius,
            self.star_radius_err,
        )
    }
}
