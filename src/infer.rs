//! Running reads through a trained classifier and writing per-site calls.
use std::io::Write;

use eyre::Result;
use itertools::Itertools;
use ndarray::{concatenate, Array2, ArrayView1, ArrayView2, ArrayView3, Axis};

use crate::{
    dataset::{BatchOptions, Dataset, DatasetMetadata},
    extract::ExtractOptions,
    read::Read,
};

/// Model boundary. Takes a batch of padded signal `(n, len)` and features
/// `(n, channels, len)` and returns unnormalized scores `(n, outputs)`.
pub trait Classifier {
    fn predict(&self, signal: ArrayView2<f32>, features: ArrayView3<f32>) -> Result<Array2<f32>>;
}

/// Classifier output for every call site in a read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadCalls {
    pub read_id: String,
    pub positions: Vec<usize>,
    pub labels: Vec<i64>,
    pub logits: Array2<f32>,
}

impl ReadCalls {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Extract every call site in `read` and score them in batches. Returns
/// `None` when no chunk could be extracted.
pub fn call_read_mods<C: Classifier>(
    read: &Read,
    extract: &ExtractOptions,
    metadata: &DatasetMetadata,
    classifier: &C,
    batch_size: usize,
) -> Result<Option<ReadCalls>> {
    let (chunks, counts) = extract.extract_read(read);
    if chunks.is_empty() {
        log::debug!("No chunks for read {}:\n{counts}", read.read_id());
        return Ok(None);
    }
    let opts = BatchOptions::default().batch_size(batch_size);
    let mut dataset = Dataset::from_chunks(&chunks, metadata.clone(), opts)?;
    let num_outputs = metadata.num_outputs();

    let mut batch_logits = Vec::with_capacity(dataset.n_batches());
    for batch in dataset.batches() {
        let logits = classifier.predict(batch.signal, batch.features)?;
        if logits.dim() != (batch.len(), num_outputs) {
            eyre::bail!(
                "Classifier returned shape {:?}, expected ({}, {num_outputs})",
                logits.dim(),
                batch.len()
            );
        }
        batch_logits.push(logits);
    }
    let views: Vec<_> = batch_logits.iter().map(|l| l.view()).collect();
    let logits = concatenate(Axis(0), &views)?;

    Ok(Some(ReadCalls {
        read_id: read.read_id().to_string(),
        positions: chunks.iter().map(|c| c.read_seq_pos()).collect(),
        labels: chunks.iter().map(|c| c.label()).collect(),
        logits,
    }))
}

pub fn softmax(logits: ArrayView1<f32>) -> Vec<f32> {
    let max = logits.fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|x| x / total).collect()
}

fn argmax(xs: ArrayView1<f32>) -> usize {
    xs.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_idx, best), (idx, &x)| {
            if x > best {
                (idx, x)
            } else {
                (best_idx, best)
            }
        })
        .0
}

/// Tab separated per-site calls.
pub struct ResultsWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ResultsWriter<W> {
    pub fn new(writer: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);
        writer.write_record(["read_id", "read_pos", "label", "class_pred", "class_probs"])?;
        Ok(ResultsWriter { writer })
    }

    pub fn write_calls(&mut self, calls: &ReadCalls) -> Result<()> {
        for (i, row) in calls.logits.outer_iter().enumerate() {
            let probs = softmax(row).iter().map(|p| p.to_string()).join(",");
            self.writer.write_record([
                calls.read_id.clone(),
                calls.positions[i].to_string(),
                calls.labels[i].to_string(),
                argmax(row).to_string(),
                probs,
            ])?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use float_eq::assert_float_eq;
    use ndarray::array;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        alphabet::Alphabet,
        chunk::KmerContext,
        extract::{ChunkWindow, SiteSelection},
        motif::Motif,
    };

    /// Scores the first signal sample for the unmodified class and its
    /// negation for the modified class.
    struct FirstSample;

    impl Classifier for FirstSample {
        fn predict(&self, signal: ArrayView2<f32>, _features: ArrayView3<f32>) -> Result<Array2<f32>> {
            let mut out = Array2::zeros((signal.nrows(), 2));
            for (i, row) in signal.outer_iter().enumerate() {
                out[[i, 0]] = row[0];
                out[[i, 1]] = -row[0];
            }
            Ok(out)
        }
    }

    struct WrongShape;

    impl Classifier for WrongShape {
        fn predict(&self, signal: ArrayView2<f32>, _features: ArrayView3<f32>) -> Result<Array2<f32>> {
            Ok(Array2::zeros((signal.nrows(), 5)))
        }
    }

    fn setup() -> (Read, ExtractOptions, DatasetMetadata) {
        let signal: Vec<f32> = (0..100).map(|x| x as f32 - 50.0).collect();
        let map = (0..=10).map(|i| i * 10).collect();
        let read = Read::try_new("r1", signal, "ACGTACGTAC", map, None).unwrap();
        let extract = ExtractOptions::new(
            ChunkWindow::FixedSignal {
                before: 5,
                after: 5,
            },
            SiteSelection::Motif(Motif::new("CG", 0).unwrap()),
        )
        .kmer_context(KmerContext::new(1, 1));
        let alphabet = Alphabet::try_new("ACGTm", "ACGTC", vec!["5mC".into()]).unwrap();
        let metadata = DatasetMetadata::from_options(&extract, b"m", &alphabet);
        (read, extract, metadata)
    }

    #[test]
    fn test_softmax() {
        let probs = softmax(array![1.0, 1.0].view());
        assert_float_eq!(probs, vec![0.5f32, 0.5], abs_all <= 1e-6);
        let probs = softmax(array![1000.0, 0.0].view());
        assert_float_eq!(probs[0], 1.0f32, abs <= 1e-6);
        assert_eq!(argmax(array![0.1, 0.7, 0.2].view()), 1);
    }

    #[test]
    fn test_call_read_mods() {
        let (read, extract, metadata) = setup();
        let calls = call_read_mods(&read, &extract, &metadata, &FirstSample, 1)
            .unwrap()
            .unwrap();
        assert_eq!(calls.positions, vec![1, 5]);
        assert_eq!(calls.labels, vec![-1, -1]);
        assert_eq!(calls.logits, array![[-40.0, 40.0], [0.0, -0.0]]);

        assert!(call_read_mods(&read, &extract, &metadata, &WrongShape, 4).is_err());
    }

    #[test]
    fn test_no_sites() {
        let (_, extract, metadata) = setup();
        let read = Read::try_new("r2", vec![0.0; 40], "AAAA", vec![0, 10, 20, 30, 40], None).unwrap();
        let calls = call_read_mods(&read, &extract, &metadata, &FirstSample, 4).unwrap();
        assert!(calls.is_none());
    }

    #[test]
    fn test_results_writer() {
        let (read, extract, metadata) = setup();
        let calls = call_read_mods(&read, &extract, &metadata, &FirstSample, 4)
            .unwrap()
            .unwrap();
        let mut buf = Vec::new();
        {
            let mut writer = ResultsWriter::new(&mut buf).unwrap();
            writer.write_calls(&calls).unwrap();
            writer.flush().unwrap();
        }
        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "read_id\tread_pos\tlabel\tclass_pred\tclass_probs");
        assert!(lines[1].starts_with("r1\t1\t-1\t1\t"));
        assert_eq!(lines[2], "r1\t5\t-1\t0\t0.5,0.5");
    }
}
