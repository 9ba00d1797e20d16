use crate::error::StoreError;
use crate::posterior::Blob;
use crate::store::schema::{
    COMMITTED_OFFSET, DataRecord, FORMAT_VERSION, MAGIC, ParamsRecord, StoreSchema, tables_start,
};
use crate::store::reader::read_header;

use log::debug;
use ndarray::{ArrayView1, ArrayView2};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Append-only writer of a chain file
///
/// Steps must be written in order, each exactly once. A step becomes visible to readers only
/// after all of its tables are on disk.
#[derive(Debug)]
pub struct ChainWriter {
    file: File,
    path: PathBuf,
    schema: StoreSchema,
    base: u64,
    committed: usize,
}

fn f64_bytes<'a>(values: impl IntoIterator<Item = &'a f64>) -> Vec<u8> {
    values.into_iter().flat_map(|x| x.to_le_bytes()).collect()
}

impl ChainWriter {
    /// Create (or truncate) the file, allocate all tables and write the `data` table
    pub fn create(
        path: impl AsRef<Path>,
        schema: StoreSchema,
        data: &[DataRecord],
    ) -> Result<Self, StoreError> {
        if data.len() != schema.ndata {
            return Err(StoreError::ShapeMismatch {
                table: "data",
                expected: schema.ndata,
                actual: data.len(),
            });
        }
        let path = path.as_ref().to_path_buf();
        let header = serde_json::to_vec(&schema)?;
        let base = tables_start(header.len() as u64);

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.write_all(MAGIC)?;
        file.write_all(&FORMAT_VERSION.to_le_bytes())?;
        file.write_all(&0_u64.to_le_bytes())?;
        file.write_all(&(header.len() as u64).to_le_bytes())?;
        file.write_all(&header)?;
        file.set_len(base + schema.tables.end)?;

        let rows: Vec<u8> = data.iter().flat_map(|row| row.to_le_bytes()).collect();
        file.seek(SeekFrom::Start(base + schema.tables.data))?;
        file.write_all(&rows)?;
        file.sync_all()?;
        debug!(
            "created {} for {} steps of {} walkers",
            path.display(),
            schema.nsteps,
            schema.nwalkers
        );

        Ok(Self {
            file,
            path,
            schema,
            base,
            committed: 0,
        })
    }

    /// Reopen an existing file to append after its last committed step
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let header = read_header(&mut file)?;
        Ok(Self {
            file,
            path,
            schema: header.schema,
            base: header.base,
            committed: header.committed,
        })
    }

    pub fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of committed steps, also the index of the next writable step
    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn is_complete(&self) -> bool {
        self.committed == self.schema.nsteps
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<(), StoreError> {
        self.file.seek(SeekFrom::Start(self.base + offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    /// Write one step of the ensemble
    ///
    /// `positions` is `(nwalkers, columns)`, `ln_probs` and `blobs` have one entry per walker.
    /// Blobs without predictions are stored as NaN rows.
    pub fn append_step(
        &mut self,
        step: usize,
        positions: ArrayView2<f64>,
        ln_probs: ArrayView1<f64>,
        blobs: &[Blob],
    ) -> Result<(), StoreError> {
        let schema = &self.schema;
        if step >= schema.nsteps {
            return Err(StoreError::StepOutOfRange {
                step,
                nsteps: schema.nsteps,
            });
        }
        if step != self.committed {
            return Err(StoreError::StepNotWritable {
                step,
                next: self.committed,
            });
        }
        let nwalkers = schema.nwalkers;
        if positions.dim() != (nwalkers, schema.ncolumns()) {
            return Err(StoreError::ShapeMismatch {
                table: "chain",
                expected: nwalkers * schema.ncolumns(),
                actual: positions.len(),
            });
        }
        if ln_probs.len() != nwalkers {
            return Err(StoreError::ShapeMismatch {
                table: "lnprob",
                expected: nwalkers,
                actual: ln_probs.len(),
            });
        }
        if blobs.len() != nwalkers {
            return Err(StoreError::ShapeMismatch {
                table: "params",
                expected: nwalkers,
                actual: blobs.len(),
            });
        }

        let ncadences = schema.ncadences;
        let mut pred = Vec::with_capacity(nwalkers * 2 * ncadences * 8);
        let mut params = Vec::with_capacity(nwalkers * 32);
        for blob in blobs {
            match blob.concatenated_predictions() {
                Some(rows) if rows.ncols() == ncadences => pred.extend(f64_bytes(&rows)),
                Some(rows) => {
                    return Err(StoreError::ShapeMismatch {
                        table: "pred",
                        expected: ncadences,
                        actual: rows.ncols(),
                    });
                }
                None => pred.extend(f64_bytes(&vec![f64::NAN; 2 * ncadences])),
            }
            let record = match blob.orbit {
                Some(orbit) => ParamsRecord {
                    ncadence: blob.ncadence as i64,
                    period: orbit.period,
                    impact: orbit.impact,
                    eccen: orbit.eccentricity,
                },
                None => ParamsRecord {
                    ncadence: blob.ncadence as i64,
                    period: f64::NAN,
                    impact: f64::NAN,
                    eccen: f64::NAN,
                },
            };
            params.extend(record.to_le_bytes());
        }

        let [chain_size, lnprob_size, params_size, pred_size] = schema.step_sizes();
        let step64 = step as u64;
        let tables = schema.tables.clone();
        self.write_at(tables.chain + step64 * chain_size, &f64_bytes(positions))?;
        self.write_at(tables.lnprob + step64 * lnprob_size, &f64_bytes(ln_probs))?;
        self.write_at(tables.params + step64 * params_size, &params)?;
        self.write_at(tables.pred + step64 * pred_size, &pred)?;
        self.file.sync_data()?;

        self.committed = step + 1;
        self.file.seek(SeekFrom::Start(COMMITTED_OFFSET))?;
        self.file
            .write_all(&(self.committed as u64).to_le_bytes())?;
        self.file.sync_data()?;
        Ok(())
    }
}
