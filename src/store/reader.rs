use crate::error::StoreError;
use crate::store::schema::{
    COMMITTED_OFFSET, DATA_RECORD_SIZE, DataRecord, F64_SIZE, FORMAT_VERSION, HEADER_LEN_OFFSET,
    HEADER_OFFSET, MAGIC, PARAMS_RECORD_SIZE, ParamsRecord, StoreSchema, VERSION_OFFSET, le_array,
    tables_start,
};

use ndarray::{Array2, Array3, Array4};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

pub(crate) struct Header {
    pub schema: StoreSchema,
    pub base: u64,
    pub committed: usize,
}

pub(crate) fn read_header(file: &mut File) -> Result<Header, StoreError> {
    let mut fixed = [0; HEADER_OFFSET as usize];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut fixed)?;
    if &fixed[..MAGIC.len()] != MAGIC {
        return Err(StoreError::BadMagic);
    }
    let version = {
        let start = VERSION_OFFSET as usize;
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&fixed[start..start + 4]);
        u32::from_le_bytes(bytes)
    };
    if version != FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion(version));
    }
    let read_u64 = |offset: u64| {
        let start = offset as usize;
        u64::from_le_bytes(le_array(&fixed[start..start + 8]))
    };
    let committed = read_u64(COMMITTED_OFFSET) as usize;
    let header_len = read_u64(HEADER_LEN_OFFSET);
    let available = file.metadata()?.len().saturating_sub(HEADER_OFFSET);
    if header_len > available {
        return Err(StoreError::HeaderLength {
            len: header_len,
            available,
        });
    }

    let mut header = vec![0; header_len as usize];
    file.read_exact(&mut header)?;
    let schema: StoreSchema = serde_json::from_slice(&header)?;
    Ok(Header {
        schema,
        base: tables_start(header_len),
        committed,
    })
}

/// Reader of committed steps of a chain file
#[derive(Debug)]
pub struct ChainReader {
    file: File,
    schema: StoreSchema,
    base: u64,
    committed: usize,
}

impl ChainReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut file = File::open(path)?;
        let header = read_header(&mut file)?;
        Ok(Self {
            file,
            schema: header.schema,
            base: header.base,
            committed: header.committed,
        })
    }

    pub fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn is_complete(&self) -> bool {
        self.committed == self.schema.nsteps
    }

    fn read_bytes(&mut self, offset: u64, len: u64) -> Result<Vec<u8>, StoreError> {
        let mut bytes = vec![0; len as usize];
        self.file.seek(SeekFrom::Start(self.base + offset))?;
        self.file.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_f64s(&mut self, offset: u64, count: usize) -> Result<Vec<f64>, StoreError> {
        let bytes = self.read_bytes(offset, count as u64 * F64_SIZE)?;
        Ok(bytes
            .chunks_exact(F64_SIZE as usize)
            .map(|chunk| f64::from_le_bytes(le_array(chunk)))
            .collect())
    }

    fn cells(&self) -> usize {
        self.committed * self.schema.nwalkers
    }

    fn shape_error(table: &'static str, expected: usize, actual: usize) -> StoreError {
        StoreError::ShapeMismatch {
            table,
            expected,
            actual,
        }
    }

    /// `(steps, nwalkers, columns)` parameter vectors
    pub fn chain(&mut self) -> Result<Array3<f64>, StoreError> {
        let shape = (self.committed, self.schema.nwalkers, self.schema.ncolumns());
        let count = shape.0 * shape.1 * shape.2;
        let values = self.read_f64s(self.schema.tables.chain, count)?;
        Array3::from_shape_vec(shape, values).map_err(|_| Self::shape_error("chain", count, count))
    }

    /// `(steps, nwalkers)` log-posterior values
    pub fn ln_prob(&mut self) -> Result<Array2<f64>, StoreError> {
        let shape = (self.committed, self.schema.nwalkers);
        let count = self.cells();
        let values = self.read_f64s(self.schema.tables.lnprob, count)?;
        Array2::from_shape_vec(shape, values).map_err(|_| Self::shape_error("lnprob", count, count))
    }

    /// `(steps, nwalkers)` derived quantities
    pub fn params(&mut self) -> Result<Array2<ParamsRecord>, StoreError> {
        let shape = (self.committed, self.schema.nwalkers);
        let count = self.cells();
        let bytes = self.read_bytes(self.schema.tables.params, count as u64 * PARAMS_RECORD_SIZE)?;
        let records = bytes
            .chunks_exact(PARAMS_RECORD_SIZE as usize)
            .map(ParamsRecord::from_le_bytes)
            .collect();
        Array2::from_shape_vec(shape, records).map_err(|_| Self::shape_error("params", count, count))
    }

    /// `(steps, nwalkers, 2, cadences)` predictions, see [Blob](crate::Blob)
    pub fn predictions(&mut self) -> Result<Array4<f64>, StoreError> {
        let shape = (
            self.committed,
            self.schema.nwalkers,
            2,
            self.schema.ncadences,
        );
        let count = shape.0 * shape.1 * shape.2 * shape.3;
        let values = self.read_f64s(self.schema.tables.pred, count)?;
        Array4::from_shape_vec(shape, values).map_err(|_| Self::shape_error("pred", count, count))
    }

    pub fn data(&mut self) -> Result<Vec<DataRecord>, StoreError> {
        let bytes = self.read_bytes(
            self.schema.tables.data,
            self.schema.ndata as u64 * DATA_RECORD_SIZE,
        )?;
        Ok(bytes
            .chunks_exact(DATA_RECORD_SIZE as usize)
            .map(DataRecord::from_le_bytes)
            .collect())
    }
}
