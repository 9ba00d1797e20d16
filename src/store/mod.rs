//! Single-file binary store of production chains
//!
//! A chain file starts with the magic bytes `TRFCHAIN`, a little-endian `u32` format version, a
//! `u64` count of committed steps and the `u64` length of a JSON-encoded [StoreSchema]. Fixed-size
//! little-endian tables follow, aligned to eight bytes: `chain`, `lnprob`, `params`, `pred` and
//! `data`.

mod reader;
pub use reader::ChainReader;

mod schema;
pub use schema::{DataRecord, ParamsRecord, StoreSchema, TableOffsets};

mod writer;
pub use writer::ChainWriter;

/// File name of the chain of a target inside its output directory
pub const CHAIN_FILE_NAME: &str = "chain.bin";

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::StoreError;
    use crate::posterior::{Blob, SegmentPrediction};
    use crate::transit::OrbitalSummary;

    use ndarray::{Array1, Array2, array};

    fn schema() -> StoreSchema {
        StoreSchema::new(3, 2, vec!["x".into(), "y".into()], 2, 3)
    }

    fn data() -> Vec<DataRecord> {
        (0..3)
            .map(|i| DataRecord {
                chunk: i / 2,
                time: i as f64,
                flux: 1.0,
            })
            .collect()
    }

    fn blob(step: usize) -> Blob {
        Blob {
            orbit: Some(OrbitalSummary {
                period: 10.0 + step as f64,
                eccentricity: 0.1,
                impact: 0.2,
            }),
            ncadence: step,
            predictions: vec![SegmentPrediction {
                gp: array![1.0, 2.0],
                model: array![3.0, 4.0],
            }],
        }
    }

    fn append(writer: &mut ChainWriter, step: usize) -> Result<(), StoreError> {
        let positions = Array2::from_elem((2, 2), step as f64);
        let ln_probs = Array1::from_elem(2, -(step as f64));
        writer.append_step(
            step,
            positions.view(),
            ln_probs.view(),
            &[blob(step), Blob::default()],
        )
    }

    #[test]
    fn steps_are_written_once_and_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CHAIN_FILE_NAME);
        let mut writer = ChainWriter::create(&path, schema(), &data()).unwrap();

        assert!(matches!(
            append(&mut writer, 1),
            Err(StoreError::StepNotWritable { step: 1, next: 0 })
        ));
        append(&mut writer, 0).unwrap();
        assert!(matches!(
            append(&mut writer, 0),
            Err(StoreError::StepNotWritable { step: 0, next: 1 })
        ));
        append(&mut writer, 1).unwrap();
        assert_eq!(writer.committed(), 2);
        assert!(!writer.is_complete());
        drop(writer);

        let mut writer = ChainWriter::open(&path).unwrap();
        assert_eq!(writer.committed(), 2);
        append(&mut writer, 2).unwrap();
        assert!(writer.is_complete());
        assert!(matches!(
            append(&mut writer, 3),
            Err(StoreError::StepOutOfRange { step: 3, nsteps: 3 })
        ));
    }

    #[test]
    fn tables_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CHAIN_FILE_NAME);
        let mut writer = ChainWriter::create(&path, schema(), &data()).unwrap();
        append(&mut writer, 0).unwrap();
        append(&mut writer, 1).unwrap();

        let mut reader = ChainReader::open(&path).unwrap();
        assert_eq!(reader.schema(), &schema());
        assert_eq!(reader.committed(), 2);

        let chain = reader.chain().unwrap();
        assert_eq!(chain.dim(), (2, 2, 2));
        assert_eq!(chain[[1, 0, 1]], 1.0);

        let ln_prob = reader.ln_prob().unwrap();
        assert_eq!(ln_prob, array![[0.0, 0.0], [-1.0, -1.0]]);

        let params = reader.params().unwrap();
        assert_eq!(params[[1, 0]].period, 11.0);
        assert_eq!(params[[1, 0]].ncadence, 1);
        assert_eq!(params[[1, 0]].eccen, 0.1);
        assert!(params[[1, 1]].period.is_nan());

        let pred = reader.predictions().unwrap();
        assert_eq!(pred.dim(), (2, 2, 2, 2));
        assert_eq!(pred[[0, 0, 0, 1]], 2.0);
        assert_eq!(pred[[0, 0, 1, 0]], 3.0);
        assert!(pred[[0, 1, 0, 0]].is_nan());

        assert_eq!(reader.data().unwrap(), data());
    }

    #[test]
    fn shapes_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CHAIN_FILE_NAME);
        assert!(matches!(
            ChainWriter::create(&path, schema(), &data()[..2]),
            Err(StoreError::ShapeMismatch { table: "data", .. })
        ));

        let mut writer = ChainWriter::create(&path, schema(), &data()).unwrap();
        let wrong = Array2::zeros((2, 3));
        let result = writer.append_step(
            0,
            wrong.view(),
            Array1::zeros(2).view(),
            &[Blob::default(), Blob::default()],
        );
        assert!(matches!(
            result,
            Err(StoreError::ShapeMismatch { table: "chain", .. })
        ));
        assert_eq!(writer.committed(), 0);
    }

    #[test]
    fn foreign_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-chain.bin");
        std::fs::write(&path, vec![0_u8; 64]).unwrap();
        assert!(matches!(
            ChainReader::open(&path),
            Err(StoreError::BadMagic)
        ));
    }

    #[test]
    fn oversized_header_length_is_rejected() {
        use super::schema::{HEADER_LEN_OFFSET, HEADER_OFFSET};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CHAIN_FILE_NAME);
        drop(ChainWriter::create(&path, schema(), &data()).unwrap());
        let mut bytes = std::fs::read(&path).unwrap();
        let offset = HEADER_LEN_OFFSET as usize;
        bytes[offset..offset + 8].copy_from_slice(&u64::MAX.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();
        let available = bytes.len() as u64 - HEADER_OFFSET;
        assert!(matches!(
            ChainReader::open(&path),
            Err(StoreError::HeaderLength { len: u64::MAX, available: a }) if a == available
        ));
    }
}
