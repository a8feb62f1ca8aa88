pub mod arrow_utils;
pub mod read_record;

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use arrow2_convert::deserialize::TryIntoCollection;
    use pretty_assertions::assert_eq;

    use super::{
        arrow_utils::{load, read_records, save, wrap_writer, write_records},
        read_record::ReadRecord,
    };
    use crate::alphabet::Alphabet;

    fn record(read_id: &str, labeled: bool) -> ReadRecord {
        ReadRecord::new(
            read_id.to_string(),
            (0..20).map(|x| x as f32).collect(),
            vec![0, 4, 2, 3],
            vec![2, 5, 9, 12, 18],
            labeled,
        )
    }

    #[test]
    fn test_round_trip() {
        let x = [record("a", true), record("b", false)];
        let schema = ReadRecord::schema();

        let file = vec![];
        let mut writer = wrap_writer(file, schema).unwrap();
        save(&mut writer, &x).unwrap();
        save(&mut writer, &x[..1]).unwrap();
        writer.finish().unwrap();

        let reader = Cursor::new(writer.into_inner());
        let filereader = load(reader).unwrap();
        let mut loaded = Vec::new();
        for chunks in filereader.flatten() {
            for row in chunks.into_arrays().into_iter() {
                let records: Vec<ReadRecord> = row.try_into_collection().unwrap();
                loaded.extend(records);
            }
        }
        assert_eq!(loaded, vec![x[0].clone(), x[1].clone(), x[0].clone()]);
    }

    #[test]
    fn test_read_records() {
        let alphabet = Alphabet::try_new("ACGTm", "ACGTC", vec![]).unwrap();
        let mut bad = record("bad", true);
        bad.int_seq = vec![0, 9, 2, 3];

        let mut file = Vec::new();
        write_records(&mut file, &[record("a", true), bad, record("b", false)]).unwrap();

        let reads = read_records(Cursor::new(file), &alphabet).unwrap();
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0].read_id(), "a");
        assert_eq!(reads[0].seq(), b"ACGT");
        assert_eq!(reads[0].seq_to_sig_map(), &[0, 3, 7, 10, 16]);
        assert_eq!(reads[0].signal()[0], 2.0);
        assert_eq!(reads[0].int_seq(), Some(&[0u8, 4, 2, 3][..]));
        assert!(reads[1].int_seq().is_none());
    }
}
