use std::{error::Error, fs::File, io::BufReader};

use assert_fs::{fixture::PathChild, TempDir};
use float_eq::assert_float_eq;
use libmodchunk::{
    arrow::{
        arrow_utils::{read_records, write_records},
        read_record::ReadRecord,
    },
    Alphabet, BatchOptions, CallMode, ChunkWindow, Dataset, DatasetMetadata, ExtractOptions,
    KmerContext, LabelConverter, Motif, SiteSelection, Splits,
};
use pretty_assertions::assert_eq;

/// ACGT repeated ten times with four samples per base. CpG cytosines are
/// coded as 5mC when `methylated` is set.
fn cpg_record(read_id: &str, methylated: bool) -> ReadRecord {
    let int_seq = (0..40)
        .map(|i| match i % 4 {
            1 if methylated => 4,
            x => x as u8,
        })
        .collect();
    ReadRecord::new(
        read_id.to_string(),
        (0..160).map(|x| (x % 7) as f32 / 7.0).collect(),
        int_seq,
        (0..=40).map(|i| i * 4).collect(),
        true,
    )
}

fn mod_alphabet() -> Alphabet {
    Alphabet::try_new("ACGTm", "ACGTC", vec!["5mC".to_string()]).unwrap()
}

#[test_log::test]
fn test_modification_pipeline() -> Result<(), Box<dyn Error>> {
    let temp_dir = TempDir::new()?;
    let reads_path = temp_dir.child("reads.arrow");
    let records: Vec<ReadRecord> = (0..6)
        .map(|i| cpg_record(&format!("read{i}"), i % 2 == 0))
        .collect();
    write_records(File::create(reads_path.path())?, &records)?;

    let alphabet = mod_alphabet();
    let reads = read_records(BufReader::new(File::open(reads_path.path())?), &alphabet)?;
    assert_eq!(reads.len(), 6);

    let motif: Motif = "1:CG".parse()?;
    let label_conv = LabelConverter::for_mods(&alphabet, b"m", &motif)?;
    let extract = ExtractOptions::new(
        ChunkWindow::FixedSignal {
            before: 4,
            after: 4,
        },
        SiteSelection::Motif(motif),
    )
    .kmer_context(KmerContext::new(2, 2))
    .label_conv(label_conv);
    let (chunks, counts) = extract.run(&reads)?;
    // First and last CpG of each read lack kmer context
    assert_eq!(chunks.len(), 48);
    assert_eq!(counts.successes(), 48);
    assert_eq!(counts.get("Invalid context seq extracted"), 12);
    assert!(chunks.iter().all(|c| c.sig_len() == 8));

    let metadata = DatasetMetadata::from_options(&extract, b"m", &alphabet);
    assert_eq!(metadata.num_outputs(), 2);
    let dataset = Dataset::from_chunks(&chunks, metadata, BatchOptions::default().batch_size(8))?;
    assert_eq!(dataset.features().dim(), (48, 20, 8));
    let dist = dataset.label_distribution();
    assert_eq!(dist.get(&0), Some(&24));
    assert_eq!(dist.get(&1), Some(&24));
    dataset.ensure_trainable()?;

    let Splits {
        mut train,
        val,
        val_trn,
    } = dataset.split(0.25)?;
    let val = val.unwrap();
    assert_eq!(val.len(), 12);
    assert_eq!(val_trn.unwrap().len(), 12);
    assert_eq!(train.len(), 36);
    let n_rows: usize = train.batches().map(|b| b.len()).sum();
    assert_eq!(n_rows, 32);

    let val_path = temp_dir.child("val.pkl");
    val.save(val_path.path())?;
    let loaded = Dataset::load(val_path.path(), BatchOptions::default())?;
    assert_eq!(loaded.labels(), val.labels());
    assert_eq!(loaded.signal(), val.signal());
    Ok(())
}

#[test]
fn test_fixed_signal_example() -> Result<(), Box<dyn Error>> {
    let record = ReadRecord::new(
        "example".to_string(),
        (0..100).map(|x| x as f32).collect(),
        vec![0, 1, 2, 3, 0, 1, 2, 3, 0, 1],
        (0..=10).map(|i| i * 10).collect(),
        false,
    );
    let read = record.into_read(&Alphabet::default())?;
    let extract = ExtractOptions::new(
        ChunkWindow::FixedSignal {
            before: 5,
            after: 5,
        },
        SiteSelection::Motif(Motif::new("CG", 0)?),
    )
    .kmer_context(KmerContext::new(1, 1));
    let (chunks, _) = extract.run(&[read])?;

    let focus: Vec<usize> = chunks.iter().map(|c| c.read_seq_pos()).collect();
    assert_eq!(focus, vec![1, 5]);
    for (chunk, first) in chunks.iter().zip([10.0f32, 50.0]) {
        assert_eq!(chunk.sig_len(), 10);
        assert_float_eq!(chunk.signal()[0], first, abs <= 1e-6);
        assert_eq!(chunk.before_context_seq().len(), 1);
        assert_eq!(chunk.after_context_seq().len(), 1);
        assert_eq!(chunk.label(), -1);
    }

    let metadata = DatasetMetadata::from_options(&extract, b"", &Alphabet::default());
    let dataset = Dataset::from_chunks(&chunks, metadata, BatchOptions::default())?;
    assert!(dataset.ensure_trainable().is_err());
    Ok(())
}

#[test]
fn test_base_prediction_pipeline() -> Result<(), Box<dyn Error>> {
    let alphabet = mod_alphabet();
    let read = cpg_record("read", true).into_read(&alphabet)?;
    let extract = ExtractOptions::new(
        ChunkWindow::FixedSequence {
            before: 2,
            after: 2,
        },
        SiteSelection::Motif(Motif::any_base()),
    )
    .kmer_context(KmerContext::new(1, 1))
    .call_mode(CallMode::BasePrediction)
    .label_conv(LabelConverter::canonical(&alphabet));
    let (chunks, _) = extract.run(&[read])?;
    assert!(chunks.iter().all(|c| c.sequence()[c.seq_focus_pos()] == b'N'));
    assert!(chunks.iter().all(|c| c.seq_len() == 5));

    let metadata = DatasetMetadata::from_options(&extract, b"", &alphabet);
    let mut dataset = Dataset::from_chunks(&chunks, metadata, BatchOptions::default())?;
    // 5mC still labels as C
    assert_eq!(dataset.label_distribution().len(), 4);
    assert!(matches!(
        dataset.trim_chunk_context(1, 1),
        Err(libmodchunk::error::DatasetError::UnsupportedTrim)
    ));
    dataset.trim_kmer_context(0, 0)?;
    assert_eq!(dataset.features().dim().1, 4);
    Ok(())
}
