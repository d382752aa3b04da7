//! End-to-end tests of the file handle: sequential reading, random access
//! through the index, appending, and failure reporting.

use slow5_io::{
    AuxType, AuxValue, ErrorKind, FlexString, Header, PressMethod, Record, Slow5Error, Slow5File,
};

use std::fs;
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("slow5_io_file_{}_{}", std::process::id(), name));
    path
}

fn exp_header() -> Header {
    let mut header = Header::new();
    header.add_attr("asic_id").unwrap();
    header.add_attr("exp_start_time").unwrap();
    header.set_attr("asic_id", "3574887596", 0).unwrap();
    header
        .set_attr("exp_start_time", "2019-11-05T12:04:24Z", 0)
        .unwrap();
    header.add_aux_field("median_before", AuxType::Double).unwrap();
    header.add_aux_field("start_time", AuxType::Uint64).unwrap();
    header.add_aux_field("channel_number", AuxType::String).unwrap();
    header
}

fn exp_record(i: usize) -> Record {
    let mut rec = Record::new();
    rec.read_id = FlexString::from(format!("read_{}", i).as_str());
    rec.read_group = 0;
    rec.digitisation = 8192.0;
    rec.offset = 16.0 + i as f64;
    rec.range = 1467.61;
    rec.sampling_rate = 4000.0;
    rec.raw_signal = (0..200).map(|s| ((s * (i + 1)) % 1000) as i16 - 500).collect();
    if i % 3 == 0 {
        rec.set_aux("median_before", AuxValue::missing(AuxType::Double));
    } else {
        rec.set_aux("median_before", AuxValue::Double(219.1 + i as f64));
    }
    rec.set_aux("start_time", AuxValue::Uint64(335_000 + i as u64));
    rec.set_aux("channel_number", AuxValue::Str((i + 1).to_string()));
    rec
}

fn write_exp_file(path: &PathBuf, n: usize, method: PressMethod) {
    let mut writer = Slow5File::create(path, exp_header(), method).unwrap();
    for i in 0..n {
        writer.add_rec(&exp_record(i)).unwrap();
    }
    writer.close().unwrap();
}

#[test]
fn open_ascii_and_count_records() {
    let path = temp_path("count.slow5");
    write_exp_file(&path, 10, PressMethod::None);

    let mut file = Slow5File::open(&path).unwrap();
    let mut count = 0;
    while let Some(rec) = file.next_rec().unwrap() {
        assert_eq!(rec.read_id, format!("read_{}", count).as_str());
        count += 1;
    }
    assert_eq!(count, 10);
    // The end-of-file sentinel repeats once reached.
    assert!(file.next_rec().unwrap().is_none());
    assert!(file.next_rec().unwrap().is_none());

    fs::remove_file(&path).unwrap();
}

#[test]
fn records_iterator_matches_file_order() {
    let path = temp_path("iter.blow5");
    write_exp_file(&path, 6, PressMethod::None);

    let mut file = Slow5File::open(&path).unwrap();
    let records: Vec<Record> = file.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 6);
    for (i, rec) in records.iter().enumerate() {
        assert_eq!(*rec, exp_record(i));
    }

    fs::remove_file(&path).unwrap();
}

#[test]
fn index_and_random_get() {
    let path = temp_path("random.blow5");
    write_exp_file(&path, 8, PressMethod::Gzip);
    let sidecar = {
        let mut os = path.clone().into_os_string();
        os.push(".idx");
        PathBuf::from(os)
    };

    // The 3rd record from a fresh sequential scan.
    let mut scan = Slow5File::open(&path).unwrap();
    scan.next_rec().unwrap().unwrap();
    scan.next_rec().unwrap().unwrap();
    let third = scan.next_rec().unwrap().unwrap();

    let mut file = Slow5File::open(&path).unwrap();
    // No index yet: random access fails, then the index is built on load.
    assert!(matches!(
        file.get_rec("read_2"),
        Err(Slow5Error::IndexNotLoaded)
    ));
    file.index_load().unwrap();
    assert!(sidecar.exists());

    let fetched = file.get_rec(&third.read_id).unwrap();
    assert_eq!(fetched, third);

    // The stream is left at the end of the fetched record: the next
    // sequential read yields the record after it.
    let fetched = file.get_rec("read_0").unwrap();
    assert_eq!(fetched, exp_record(0));
    let next = file.next_rec().unwrap().unwrap();
    assert_eq!(next, exp_record(1));

    assert!(matches!(
        file.get_rec("no_such_read"),
        Err(Slow5Error::ReadIdNotFound(_))
    ));

    // A second handle loads the sidecar instead of re-scanning.
    let mut reload = Slow5File::open(&path).unwrap();
    reload.index_load().unwrap();
    assert_eq!(reload.get_rec("read_7").unwrap(), exp_record(7));

    fs::remove_file(&path).unwrap();
    fs::remove_file(&sidecar).unwrap();
}

#[test]
fn index_build_is_deterministic() {
    let path = temp_path("deterministic.blow5");
    write_exp_file(&path, 5, PressMethod::None);

    let idx_a = temp_path("deterministic_a.idx");
    let idx_b = temp_path("deterministic_b.idx");
    let mut file = Slow5File::open(&path).unwrap();
    file.index_to(&idx_a).unwrap();
    file.index_to(&idx_b).unwrap();
    assert_eq!(fs::read(&idx_a).unwrap(), fs::read(&idx_b).unwrap());

    // Scan order is preserved in the loaded index.
    file.index_load().unwrap();
    let ids: Vec<String> = file.index().unwrap().ids().iter().map(|id| id.to_string()).collect();
    assert_eq!(ids, (0..5).map(|i| format!("read_{}", i)).collect::<Vec<_>>());

    fs::remove_file(&path).unwrap();
    fs::remove_file(&idx_a).unwrap();
    fs::remove_file(&idx_b).unwrap();
    fs::remove_file(file.index().unwrap().path()).unwrap();
}

#[test]
fn duplicate_append_is_rejected() {
    let path = temp_path("duplicate.blow5");

    let mut writer = Slow5File::create(&path, exp_header(), PressMethod::None).unwrap();
    let first = exp_record(0);
    let mut second = exp_record(1);
    second.read_id = first.read_id.clone();

    writer.add_rec(&first).unwrap();
    let err = writer.add_rec(&second).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Duplicate);

    // The first record is untouched by the failed append.
    assert_eq!(writer.get_rec("read_0").unwrap(), first);
    writer.close().unwrap();

    let mut reader = Slow5File::open(&path).unwrap();
    let records: Vec<Record> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0], first);

    fs::remove_file(&path).unwrap();
}

#[test]
fn newer_file_versions_are_rejected() {
    let path = temp_path("version.blow5");
    write_exp_file(&path, 1, PressMethod::None);

    let mut bytes = fs::read(&path).unwrap();
    bytes[8] += 1; // bump the major version past the library maximum
    fs::write(&path, &bytes).unwrap();

    let err = Slow5File::open(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Version);

    fs::remove_file(&path).unwrap();
}

#[test]
fn truncated_final_record_is_not_eof() {
    let path = temp_path("truncated.blow5");
    write_exp_file(&path, 2, PressMethod::None);

    // Chop off the eof marker and the tail of the second record.
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 16]).unwrap();

    let mut file = Slow5File::open(&path).unwrap();
    assert!(file.next_rec().unwrap().is_some());
    let err = file.next_rec().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Truncated);

    fs::remove_file(&path).unwrap();
}

#[test]
fn ascii_appends_are_indexed_too() {
    let path = temp_path("append.slow5");

    let mut writer = Slow5File::create(&path, exp_header(), PressMethod::None).unwrap();
    writer.add_rec(&exp_record(0)).unwrap();
    writer.add_rec(&exp_record(1)).unwrap();
    assert_eq!(writer.get_rec("read_1").unwrap(), exp_record(1));
    writer.close().unwrap();

    let mut reader = Slow5File::open(&path).unwrap();
    reader.index_load().unwrap();
    assert_eq!(reader.get_rec("read_0").unwrap(), exp_record(0));
    let sidecar = reader.index().unwrap().path().to_path_buf();

    fs::remove_file(&path).unwrap();
    fs::remove_file(&sidecar).unwrap();
}

#[test]
fn header_attributes_survive_the_file() {
    let path = temp_path("header.blow5");
    write_exp_file(&path, 1, PressMethod::None);

    let file = Slow5File::open(&path).unwrap();
    let header = file.header();
    assert_eq!(header.num_read_groups(), 1);
    assert_eq!(header.get_attr("asic_id", 0), Some("3574887596"));
    assert_eq!(header.get_attr("asic_id", 5), None);
    assert_eq!(header.aux().len(), 3);
    assert_eq!(
        header.aux().get("median_before").unwrap().aux_type(),
        AuxType::Double
    );

    fs::remove_file(&path).unwrap();
}
