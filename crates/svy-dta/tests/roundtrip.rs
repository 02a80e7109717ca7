//! Integration tests: write a dataset, read it back, compare.
//!
//! Every test goes through real files on disk so the seek-back map
//! backpatching and the buffered sink are exercised end to end.

use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;

use svy_dta::{ByteOrder, DtaFile, DtaError, VarType};
use svy_store::{DocumentStore, MemoryStore};

fn temp_path(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

/// Write `file` to a fresh path and read it back into a new instance.
fn roundtrip(file: &mut DtaFile<MemoryStore>) -> DtaFile<MemoryStore> {
    let dir = TempDir::new().unwrap();
    let path = temp_path(&dir, "roundtrip.dta");
    file.write(&path).unwrap();

    let mut read_back = DtaFile::new(MemoryStore::new(), "obs");
    read_back.read(&path).unwrap();
    read_back
}

/// Household-shaped dataset used by several tests.
fn household_file(order: ByteOrder) -> DtaFile<MemoryStore> {
    let mut file = DtaFile::new(MemoryStore::new(), "obs");
    file.set_byte_order(order);
    file.set_dataset_label("Household roster, wave 3");
    file.set_timestamp("12 Aug 2025 14:33");

    file.set_variable_count(5).unwrap();
    file.set_all_types(vec![
        VarType::Int,
        VarType::Double,
        VarType::Str(9),
        VarType::Int,
        VarType::StrL,
    ])
    .unwrap();
    file.set_all_variable_names(
        ["hhid", "weight", "district", "age", "remark"]
            .map(String::from)
            .to_vec(),
    )
    .unwrap();

    let hhid = file.variable_id("hhid").unwrap();
    file.set_variable_label(hhid, "Household identifier");
    file.set_format(hhid, "%8.0g");
    file.set_sort_rank(hhid, 0).unwrap();

    file.push_row(json!({
        "hhid": 101, "weight": 1.25, "district": "north", "age": 34,
        "remark": "clean interview"
    }))
    .unwrap();
    file.push_row(json!({
        "hhid": 102, "weight": 0.75, "district": "south", "age": 61,
        "remark": "proxy respondent"
    }))
    .unwrap();
    file.push_row(json!({
        "hhid": 103, "weight": 2.5, "district": "east", "age": 28
    }))
    .unwrap();

    file
}

#[test]
fn test_basic_roundtrip_lsf() {
    let mut file = household_file(ByteOrder::Lsf);
    let read_back = roundtrip(&mut file);

    assert_eq!(read_back.release(), "118");
    assert_eq!(read_back.byte_order(), ByteOrder::Lsf);
    assert_eq!(read_back.variable_count(), 5);
    assert_eq!(read_back.observation_count(), 3);
    assert_eq!(read_back.dataset_label(), "Household roster, wave 3");
    assert_eq!(read_back.timestamp(), Some("12 Aug 2025 14:33"));
}

#[test]
fn test_basic_roundtrip_msf() {
    let mut file = household_file(ByteOrder::Msf);
    let read_back = roundtrip(&mut file);

    assert_eq!(read_back.byte_order(), ByteOrder::Msf);
    assert_eq!(read_back.variable_count(), 5);
    assert_eq!(read_back.observation_count(), 3);

    let row = read_back
        .store()
        .find_one("obs", &json!({"_id": 2}))
        .unwrap()
        .unwrap();
    assert_eq!(row["hhid"], json!(102));
    assert_eq!(row["weight"], json!(0.75));
    assert_eq!(row["district"], json!("south"));
}

#[test]
fn test_dictionary_roundtrip() {
    let mut file = household_file(ByteOrder::Lsf);
    let read_back = roundtrip(&mut file);

    assert_eq!(
        read_back.variable_names(),
        vec!["hhid", "weight", "district", "age", "remark"]
    );

    let hhid = read_back.variable_id("hhid").unwrap();
    assert_eq!(read_back.var_type(hhid), VarType::Int);
    assert_eq!(read_back.variable_label(hhid), Some("Household identifier"));
    assert_eq!(read_back.format(hhid), Some("%8.0g"));
    assert_eq!(read_back.sort_rank(hhid), Some(0));

    let district = read_back.variable_id("district").unwrap();
    assert_eq!(read_back.var_type(district), VarType::Str(9));
    assert_eq!(read_back.variable_label(district), None);
    assert_eq!(read_back.sort_rank(district), None);

    let remark = read_back.variable_id("remark").unwrap();
    assert_eq!(read_back.var_type(remark), VarType::StrL);
}

// The five-variable scenario: int, double, str9, int, strL over three
// observations, the third with its long string absent.
#[test]
fn test_absent_long_string_stays_absent() {
    let mut file = household_file(ByteOrder::Lsf);
    let read_back = roundtrip(&mut file);

    assert_eq!(read_back.variable_count(), 5);
    assert_eq!(read_back.observation_count(), 3);

    let row = read_back
        .store()
        .find_one("obs", &json!({"_id": 3}))
        .unwrap()
        .unwrap();
    assert!(row.get("remark").is_none());
    assert_eq!(row["district"], json!("east"));

    let row = read_back
        .store()
        .find_one("obs", &json!({"_id": 1}))
        .unwrap()
        .unwrap();
    assert_eq!(row["remark"], json!("clean interview"));
}

#[test]
fn test_missing_values_read_back_as_absent() {
    let mut file = DtaFile::new(MemoryStore::new(), "obs");
    file.set_variable_count(5).unwrap();
    file.set_all_types(vec![
        VarType::Byte,
        VarType::Int,
        VarType::Long,
        VarType::Float,
        VarType::Double,
    ])
    .unwrap();
    file.set_all_variable_names(
        ["b", "i", "l", "f", "d"].map(String::from).to_vec(),
    )
    .unwrap();

    // First row fully populated, second row entirely missing.
    file.push_row(json!({"b": -5, "i": 32740, "l": -2147483647, "f": 0.5, "d": -12.625}))
        .unwrap();
    file.push_row(json!({})).unwrap();

    let read_back = roundtrip(&mut file);

    let full = read_back
        .store()
        .find_one("obs", &json!({"_id": 1}))
        .unwrap()
        .unwrap();
    assert_eq!(full["b"], json!(-5));
    assert_eq!(full["i"], json!(32740));
    assert_eq!(full["l"], json!(-2147483647i64));
    assert_eq!(full["f"], json!(0.5));
    assert_eq!(full["d"], json!(-12.625));

    let empty = read_back
        .store()
        .find_one("obs", &json!({"_id": 2}))
        .unwrap()
        .unwrap();
    let fields = empty.as_object().unwrap();
    // Only the row id survives; sentinels never leak as numbers.
    assert_eq!(fields.len(), 1);
    assert!(fields.contains_key("_id"));
}

#[test]
fn test_long_string_dedup_single_record() {
    let mut file = DtaFile::new(MemoryStore::new(), "obs");
    file.set_variable_count(1).unwrap();
    let id = file.variable_at(0).unwrap();
    file.set_var_type(id, VarType::StrL);
    file.set_variable_name(id, "comment");

    file.push_row(json!({"comment": "identical payload"})).unwrap();
    file.push_row(json!({"comment": "identical payload"})).unwrap();
    file.push_row(json!({"comment": "a different payload"})).unwrap();

    let dir = TempDir::new().unwrap();
    let path = temp_path(&dir, "dedup.dta");
    file.write(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let marker_count = bytes.windows(3).filter(|window| window == b"GSO").count();
    assert_eq!(marker_count, 2);

    let mut read_back = DtaFile::new(MemoryStore::new(), "obs");
    read_back.read(&path).unwrap();
    for row in 1..=2u64 {
        let doc = read_back
            .store()
            .find_one("obs", &json!({"_id": row}))
            .unwrap()
            .unwrap();
        assert_eq!(doc["comment"], json!("identical payload"));
    }
    let doc = read_back
        .store()
        .find_one("obs", &json!({"_id": 3}))
        .unwrap()
        .unwrap();
    assert_eq!(doc["comment"], json!("a different payload"));
}

#[test]
fn test_enumeration_roundtrip() {
    let mut file = DtaFile::new(MemoryStore::new(), "obs");
    file.set_variable_count(2).unwrap();
    file.set_all_types(vec![VarType::Byte, VarType::Int]).unwrap();
    file.set_all_variable_names(["sex", "age"].map(String::from).to_vec())
        .unwrap();

    file.define_enumeration("Sex", &[(1, "Male"), (2, "Female")]);
    let sex = file.variable_id("sex").unwrap();
    file.set_value_label(sex, "Sex").unwrap();

    file.push_row(json!({"sex": 1, "age": 40})).unwrap();

    let read_back = roundtrip(&mut file);

    let table = read_back.enumeration("Sex").unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(1), Some("Male"));
    assert_eq!(table.get(2), Some("Female"));

    let sex = read_back.variable_id("sex").unwrap();
    assert_eq!(read_back.value_label(sex), Some("Sex"));
    let age = read_back.variable_id("age").unwrap();
    assert_eq!(read_back.value_label(age), None);
}

#[test]
fn test_notes_and_characteristics_roundtrip() {
    let mut file = household_file(ByteOrder::Lsf);
    file.add_note("verify outlier weights", None);
    file.add_note("ages over 95 confirmed on callback", Some("age"));
    file.add_note("second dataset note", None);
    file.set_characteristic("hhid", "source", "census frame 2024");

    let read_back = roundtrip(&mut file);

    assert_eq!(
        read_back.notes(None),
        vec!["verify outlier weights", "second dataset note"]
    );
    assert_eq!(
        read_back.notes(Some("age")),
        vec!["ages over 95 confirmed on callback"]
    );
    assert_eq!(
        read_back.characteristic("hhid", "source"),
        Some("census frame 2024")
    );
}

#[test]
fn test_truncation_is_deterministic() {
    let mut file = DtaFile::new(MemoryStore::new(), "obs");

    let label: String = "L".repeat(81);
    file.set_dataset_label(&label);
    assert_eq!(file.dataset_label(), &label[..80]);

    file.set_variable_count(1).unwrap();
    let id = file.variable_at(0).unwrap();
    let name: String = "n".repeat(40);
    file.set_variable_name(id, &name);
    assert_eq!(file.variable_name(id), &name[..32]);
    file.set_var_type(id, VarType::Byte);

    let read_back = roundtrip(&mut file);
    assert_eq!(read_back.dataset_label(), &label[..80]);
    let id = read_back.variable_at(0).unwrap();
    assert_eq!(read_back.variable_name(id), &name[..32]);
}

#[test]
fn test_sort_order_roundtrip() {
    let mut file = household_file(ByteOrder::Lsf);
    let age = file.variable_id("age").unwrap();
    file.set_sort_rank(age, 1).unwrap();

    let read_back = roundtrip(&mut file);
    let hhid = read_back.variable_id("hhid").unwrap();
    let age = read_back.variable_id("age").unwrap();
    assert_eq!(read_back.sort_rank(hhid), Some(0));
    assert_eq!(read_back.sort_rank(age), Some(1));
}

#[test]
fn test_corrupted_markers_are_format_errors() {
    let mut file = household_file(ByteOrder::Lsf);
    let dir = TempDir::new().unwrap();
    let path = temp_path(&dir, "clean.dta");
    file.write(&path).unwrap();
    let clean = std::fs::read(&path).unwrap();

    for marker in [&b"<header>"[..], b"<map>", b"<data>", b"</stata_dta>"] {
        let position = clean
            .windows(marker.len())
            .position(|window| window == marker)
            .unwrap();

        let mut corrupt = clean.clone();
        corrupt[position + 1] ^= 0x20;
        let bad_path = temp_path(&dir, "corrupt.dta");
        std::fs::write(&bad_path, &corrupt).unwrap();

        let mut reader = DtaFile::new(MemoryStore::new(), "obs");
        let err = reader.read(&bad_path).unwrap_err();
        assert!(
            err.is_format(),
            "marker {:?}: expected a format error, got {err}",
            String::from_utf8_lossy(marker)
        );
    }
}

#[test]
fn test_wrong_extension_rejected() {
    let mut file = DtaFile::new(MemoryStore::new(), "obs");
    let err = file.read(Path::new("survey.csv")).unwrap_err();
    assert!(matches!(err, DtaError::WrongExtension { .. }));

    let err = file.write(Path::new("survey.xlsx")).unwrap_err();
    assert!(matches!(err, DtaError::WrongExtension { .. }));
}

#[test]
fn test_missing_file_reported() {
    let mut file = DtaFile::new(MemoryStore::new(), "obs");
    let err = file.read(Path::new("/nonexistent/survey.dta")).unwrap_err();
    assert!(matches!(err, DtaError::FileNotFound { .. }));
}

#[test]
fn test_empty_dataset_roundtrip() {
    let mut file = DtaFile::new(MemoryStore::new(), "obs");
    let read_back = roundtrip(&mut file);
    assert_eq!(read_back.variable_count(), 0);
    assert_eq!(read_back.observation_count(), 0);
    assert_eq!(read_back.dataset_label(), "");
}

#[test]
fn test_offset_map_matches_section_positions() {
    use svy_dta::MapSection;

    let mut file = household_file(ByteOrder::Lsf);
    let dir = TempDir::new().unwrap();
    let path = temp_path(&dir, "map.dta");
    file.write(&path).unwrap();
    let bytes = std::fs::read(&path).unwrap();

    let mut read_back = DtaFile::new(MemoryStore::new(), "obs");
    read_back.read(&path).unwrap();
    let map = &read_back.model().map;

    assert_eq!(map.get(MapSection::Open), 0);
    assert_eq!(map.get(MapSection::Eof), bytes.len() as u64);

    for (section, marker) in [
        (MapSection::Map, &b"<map>"[..]),
        (MapSection::VariableTypes, b"<variable_types>"),
        (MapSection::Data, b"<data>"),
        (MapSection::LongStrings, b"<strls>"),
        (MapSection::ValueLabels, b"<value_labels>"),
        (MapSection::Close, b"</stata_dta>"),
    ] {
        let offset = map.get(section) as usize;
        assert_eq!(
            &bytes[offset..offset + marker.len()],
            marker,
            "offset for {section:?}"
        );
    }
}

#[test]
fn test_rereading_resets_collection() {
    let mut file = household_file(ByteOrder::Lsf);
    let dir = TempDir::new().unwrap();
    let path = temp_path(&dir, "twice.dta");
    file.write(&path).unwrap();

    let mut reader = DtaFile::new(MemoryStore::new(), "obs");
    reader.read(&path).unwrap();
    reader.read(&path).unwrap();

    // 3 observations plus the model bundle, not doubled.
    assert_eq!(reader.store().len("obs"), 4);
}
