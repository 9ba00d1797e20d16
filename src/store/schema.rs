use serde::{Deserialize, Serialize};

pub(crate) const MAGIC: &[u8; 8] = b"TRFCHAIN";
pub(crate) const FORMAT_VERSION: u32 = 1;
pub(crate) const VERSION_OFFSET: u64 = 8;
pub(crate) const COMMITTED_OFFSET: u64 = 12;
pub(crate) const HEADER_LEN_OFFSET: u64 = 20;
pub(crate) const HEADER_OFFSET: u64 = 28;

pub(crate) const F64_SIZE: u64 = 8;
pub(crate) const PARAMS_RECORD_SIZE: u64 = 32;
pub(crate) const DATA_RECORD_SIZE: u64 = 24;

/// Byte offsets of the tables relative to the end of the padded header
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOffsets {
    pub chain: u64,
    pub lnprob: u64,
    pub params: u64,
    pub pred: u64,
    pub data: u64,
    pub end: u64,
}

/// Shapes of all tables of a chain file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSchema {
    pub nsteps: usize,
    pub nwalkers: usize,
    /// Parameter names, one chain column each
    pub columns: Vec<String>,
    /// Total cadences of the fit segments, the length of a prediction row
    pub ncadences: usize,
    /// Rows of the `data` table
    pub ndata: usize,
    pub tables: TableOffsets,
}

impl StoreSchema {
    pub fn new(
        nsteps: usize,
        nwalkers: usize,
        columns: Vec<String>,
        ncadences: usize,
        ndata: usize,
    ) -> Self {
        let cells = (nsteps * nwalkers) as u64;
        let chain = 0;
        let lnprob = chain + cells * columns.len() as u64 * F64_SIZE;
        let params = lnprob + cells * F64_SIZE;
        let pred = params + cells * PARAMS_RECORD_SIZE;
        let data = pred + cells * 2 * ncadences as u64 * F64_SIZE;
        let end = data + ndata as u64 * DATA_RECORD_SIZE;
        Self {
            nsteps,
            nwalkers,
            columns,
            ncadences,
            ndata,
            tables: TableOffsets {
                chain,
                lnprob,
                params,
                pred,
                data,
                end,
            },
        }
    }

    pub fn ncolumns(&self) -> usize {
        self.columns.len()
    }

    /// Byte size of one step in the chain, lnprob, params and pred tables
    pub(crate) fn step_sizes(&self) -> [u64; 4] {
        let nwalkers = self.nwalkers as u64;
        [
            nwalkers * self.ncolumns() as u64 * F64_SIZE,
            nwalkers * F64_SIZE,
            nwalkers * PARAMS_RECORD_SIZE,
            nwalkers * 2 * self.ncadences as u64 * F64_SIZE,
        ]
    }
}

/// Derived quantities of one chain entry
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamsRecord {
    pub ncadence: i64,
    pub period: f64,
    pub impact: f64,
    pub eccen: f64,
}

impl ParamsRecord {
    pub(crate) fn to_le_bytes(self) -> [u8; PARAMS_RECORD_SIZE as usize] {
        let mut bytes = [0; PARAMS_RECORD_SIZE as usize];
        bytes[0..8].copy_from_slice(&self.ncadence.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.period.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.impact.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.eccen.to_le_bytes());
        bytes
    }

    pub(crate) fn from_le_bytes(bytes: &[u8]) -> Self {
        Self {
            ncadence: i64::from_le_bytes(le_array(&bytes[0..8])),
            period: f64::from_le_bytes(le_array(&bytes[8..16])),
            impact: f64::from_le_bytes(le_array(&bytes[16..24])),
            eccen: f64::from_le_bytes(le_array(&bytes[24..32])),
        }
    }
}

/// Observation of a loaded segment, `chunk` is the segment index in load order
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DataRecord {
    pub chunk: i64,
    pub time: f64,
    pub flux: f64,
}

impl DataRecord {
    pub(crate) fn to_le_bytes(self) -> [u8; DATA_RECORD_SIZE as usize] {
        let mut bytes = [0; DATA_RECORD_SIZE as usize];
        bytes[0..8].copy_from_slice(&self.chunk.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.time.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.flux.to_le_bytes());
        bytes
    }

    pub(crate) fn from_le_bytes(bytes: &[u8]) -> Self {
        Self {
            chunk: i64::from_le_bytes(le_array(&bytes[0..8])),
            time: f64::from_le_bytes(le_array(&bytes[8..16])),
            flux: f64::from_le_bytes(le_array(&bytes[16..24])),
        }
    }
}

/// Copy of an 8-byte slice
pub(crate) fn le_array(bytes: &[u8]) -> [u8; 8] {
    let mut array = [0; 8];
    array.copy_from_slice(bytes);
    array
}

/// Start of the tables for a header of the given length
pub(crate) fn tables_start(header_len: u64) -> u64 {
    (HEADER_OFFSET + header_len).next_multiple_of(8)
}
