use crate::gp::GaussianProcess;
use crate::transit::TransitSystem;

use std::ops::Range;

/// Names and block offsets of the flat parameter vector
///
/// The system block comes first, followed by one block per noise model in fit-segment order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterLayout {
    names: Vec<String>,
    blocks: Vec<Range<usize>>,
}

impl ParameterLayout {
    pub fn new(system: &TransitSystem, gps: &[GaussianProcess]) -> Self {
        let mut names = system.parameter_names();
        let mut blocks = vec![0..names.len()];
        for (i, gp) in gps.iter().enumerate() {
            let start = names.len();
            names.extend(
                gp.parameter_names()
                    .into_iter()
                    .map(|name| format!("gp[{i}]:{name}")),
            );
            blocks.push(start..names.len());
        }
        Self { names, blocks }
    }

    /// Total vector length
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn system(&self) -> Range<usize> {
        self.blocks[0].clone()
    }

    /// Block of the noise model of the `i`-th fit segment
    pub fn gp(&self, i: usize) -> Range<usize> {
        self.blocks[i + 1].clone()
    }

    /// Number of noise-model blocks
    pub fn ngp(&self) -> usize {
        self.blocks.len() - 1
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}
