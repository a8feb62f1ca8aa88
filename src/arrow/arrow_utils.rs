use std::io::{Read as IoRead, Seek, Write};

use arrow2::{
    array::Array,
    chunk::Chunk,
    datatypes::Schema,
    io::ipc::{
        read::{read_file_metadata, FileReader},
        write::{Compression, FileWriter, WriteOptions},
    },
};
use arrow2_convert::{
    deserialize::{ArrowDeserialize, TryIntoCollection},
    field::ArrowField,
    serialize::{ArrowSerialize, TryIntoArrow},
};
use eyre::Result;
use indicatif::{style::TemplateError, ProgressBar, ProgressStyle};

use super::read_record::ReadRecord;
use crate::{alphabet::Alphabet, read::Read};

/// Wraps writer for use later with [save].
pub fn wrap_writer<W>(writer: W, schema: Schema) -> Result<FileWriter<W>>
where
    W: Write,
{
    let options = WriteOptions {
        compression: Some(Compression::LZ4),
    };
    let fw = FileWriter::try_new(writer, schema, None, options)?;
    Ok(fw)
}

/// Writes data to Arrow file
pub fn save<W, T>(writer: &mut FileWriter<W>, x: &[T]) -> Result<()>
where
    T: ArrowField<Type = T> + ArrowSerialize + 'static,
    W: Write,
{
    if !x.is_empty() {
        let arrow_array: Chunk<Box<dyn Array>> = x.try_into_arrow()?;
        writer.write(&arrow_array, None)?;
    }
    Ok(())
}

pub(crate) fn load<R>(mut reader: R) -> Result<FileReader<R>>
where
    R: IoRead + Seek,
{
    let metadata = read_file_metadata(&mut reader)?;
    let reader = FileReader::new(reader, metadata, None, None);
    Ok(reader)
}

fn block_bar(n_blocks: u64) -> Result<ProgressBar, TemplateError> {
    let style = ProgressStyle::default_bar().template("[{elapsed}] - {percent}% - {bar}")?;
    let pb = ProgressBar::new(n_blocks).with_style(style);

    Ok(pb)
}

/// Apply a function to each block of data loaded from an Arrow file, showing
/// a progress bar over blocks. Fails on the first block that cannot be loaded.
pub fn load_apply_measured<R, F, T>(reader: R, mut func: F) -> Result<()>
where
    R: IoRead + Seek,
    F: FnMut(Vec<T>) -> eyre::Result<()>,
    T: ArrowField<Type = T> + ArrowDeserialize + 'static,
    for<'a> &'a <T as ArrowDeserialize>::ArrayType: IntoIterator,
{
    let feather = load(reader)?;
    let n_blocks = feather.metadata().blocks.len();
    let pb = block_bar(n_blocks as u64)?;
    for block in feather {
        if let Ok(chunk) = block {
            for arr in chunk.into_arrays().into_iter() {
                let records: Vec<T> = arr.try_into_collection()?;
                func(records)?;
            }
        } else {
            log::error!("Failed to load arrow chunk");
            return Err(eyre::eyre!("Failed to load arrow chunk"));
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(())
}

/// Load every read from a mapped signal file. Reads that fail validation are
/// skipped and counted.
pub fn read_records<R>(reader: R, alphabet: &Alphabet) -> Result<Vec<Read>>
where
    R: IoRead + Seek,
{
    let mut reads = Vec::new();
    let mut n_failed = 0;
    load_apply_measured(reader, |records: Vec<ReadRecord>| {
        for record in records {
            let read_id = record.read_id.clone();
            match record.into_read(alphabet) {
                Ok(read) => reads.push(read),
                Err(e) => {
                    log::debug!("Skipping read {read_id}: {e}");
                    n_failed += 1;
                }
            }
        }
        Ok(())
    })?;
    if n_failed > 0 {
        log::warn!("Skipped {n_failed} reads that failed validation");
    }
    log::info!("Loaded {} reads", reads.len());
    Ok(reads)
}

/// Write read records as a single block.
pub fn write_records<W: Write>(writer: W, records: &[ReadRecord]) -> Result<()> {
    let mut writer = wrap_writer(writer, ReadRecord::schema())?;
    save(&mut writer, records)?;
    writer.finish()?;
    Ok(())
}
