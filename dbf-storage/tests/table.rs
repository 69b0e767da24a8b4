use dbf_datatype::{Date, Month};
use dbf_storage::{
    AttributeTable, DbfConfig, EditAction, Error, Field, ProgressSink, Schema, Value, ValueType,
};
use encoding_rs::UTF_8;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn schema() -> Schema {
    Schema::new(vec![
        Field::character("NAME", 12).unwrap(),
        Field::numeric("CODE", 2, 0).unwrap(),
        Field::numeric("POP", 10, 0).unwrap(),
        Field::numeric("AREA", 10, 2).unwrap(),
        Field::logical("PAVED").unwrap(),
        Field::date("FOUNDED").unwrap(),
    ])
}

fn row(i: usize) -> Vec<Value> {
    let founded = Date::from_calendar_date(2000, Month::January, (i % 28 + 1) as u8).unwrap();
    vec![
        Value::from(format!("city{}", i)),
        Value::I64((i % 10) as i64),
        Value::I64(1000 * i as i64 + 7),
        Value::F64(i as f64 + 0.25),
        Value::Bool(i % 2 == 0),
        Value::Date(founded),
    ]
}

fn create_table(dir: &Path, rows: usize) -> PathBuf {
    let path = dir.join("cities.dbf");
    let mut table = AttributeTable::create(schema(), &DbfConfig::default());
    for i in 0..rows {
        table.add_row(&row(i)).unwrap();
    }
    table.save_as(&path, false).unwrap();
    path
}

fn name_of(table: &AttributeTable, r: usize) -> Value {
    table.read_row(r).unwrap().get("NAME").cloned().unwrap()
}

#[test]
fn test_round_trip() {
    let dir = tempdir().unwrap();
    let path = create_table(dir.path(), 10);
    let config = DbfConfig::default();
    let mut table = AttributeTable::open(&path, &config).unwrap();
    assert_eq!(table.num_records(), 10);
    assert!(table.deletion_index().is_empty());
    assert_eq!(table.schema().len(), 6);
    assert_eq!(table.schema().field(1).value_type, ValueType::Byte);
    assert_eq!(table.schema().field(2).value_type, ValueType::Long);
    assert_eq!(table.schema().field(3).value_type, ValueType::Double);
    // stateless read before materializing
    assert_eq!(table.read_row(4).unwrap().into_values(), row(4));

    table.fill(0).unwrap();
    let data = table.data().unwrap();
    assert_eq!(data.num_rows(), 10);
    for i in 0..10 {
        assert_eq!(data.row(i), row(i));
    }
    assert!(data.failures().is_empty());
}

#[test]
fn test_save_as_existing_file() {
    let dir = tempdir().unwrap();
    let path = create_table(dir.path(), 2);
    let mut table = AttributeTable::open(&path, &DbfConfig::default()).unwrap();
    assert!(matches!(table.save_as(&path, false), Err(Error::FileExists(_))));
    table.save_as(&path, true).unwrap();
    let table = AttributeTable::open(&path, &DbfConfig::default()).unwrap();
    assert_eq!(table.num_records(), 2);
}

#[test]
fn test_open_missing_file() {
    let dir = tempdir().unwrap();
    let res = AttributeTable::open(dir.path().join("nothing.dbf"), &DbfConfig::default());
    assert!(matches!(res, Err(Error::FileNotFound(_))));
}

#[test]
fn test_empty_file() {
    let dir = tempdir().unwrap();
    let path = create_table(dir.path(), 0);
    let len = fs::metadata(&path).unwrap().len() as usize;
    // header, descriptors, terminator and EOF marker
    assert_eq!(len, 32 + 32 * 6 + 1 + 1);

    let mut table = AttributeTable::open(&path, &DbfConfig::default()).unwrap();
    assert!(table.supply_page_of_data(0, 3).unwrap().is_none());
    assert!(table.supply_page_of_column(0, 3, "NAME").unwrap().is_empty());
    assert!(matches!(table.read_row(0), Err(Error::RowOutOfBound(0))));
    table.fill(0).unwrap();
    let data = table.data().unwrap();
    assert_eq!(data.num_rows(), 0);
    assert_eq!(data.schema().len(), 6);
    assert_eq!(data.schema().field(0).name, "NAME");
}

#[test]
fn test_remove_row_consistency() {
    let dir = tempdir().unwrap();
    let path = create_table(dir.path(), 10);
    let config = DbfConfig::default();
    let mut table = AttributeTable::open(&path, &config).unwrap();
    assert!(table.remove_row_at(3).unwrap());
    assert!(!table.remove_row_at(9).unwrap());
    assert_eq!(table.num_records(), 9);
    assert_eq!(table.deletion_index().tombstones(), &[3]);
    assert_eq!(name_of(&table, 3), Value::from("city4"));

    // tombstone is found again by scanning the flags
    let mut table = AttributeTable::open(&path, &config).unwrap();
    assert_eq!(table.num_records(), 9);
    let index = table.deletion_index().clone();
    assert_eq!(index.tombstones(), &[3]);
    for r in 0..9 {
        assert_eq!(index.row_index(index.file_index(r)), r);
    }

    table.fill(0).unwrap();
    let data = table.data().unwrap();
    assert_eq!(data.num_rows(), 9);
    let expected: Vec<_> = (0..10).filter(|i| *i != 3).map(row).collect();
    let actual: Vec<_> = data.rows().collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_open_with_known_tombstones() {
    let dir = tempdir().unwrap();
    let path = create_table(dir.path(), 5);
    let config = DbfConfig::default();
    let mut table = AttributeTable::open(&path, &config).unwrap();
    assert!(table.remove_row_at(1).unwrap());

    let table = AttributeTable::open_with_tombstones(&path, vec![1], &config).unwrap();
    assert_eq!(table.deletion_index().tombstones(), &[1]);
    assert_eq!(table.num_records(), 4);
    assert_eq!(name_of(&table, 1), Value::from("city2"));
    let rows = table.get_attributes(&[3, 0]).unwrap();
    assert_eq!(rows.row(0), row(4));
    assert_eq!(rows.row(1), row(0));
}

#[test]
fn test_paging_equivalence() {
    let dir = tempdir().unwrap();
    let path = create_table(dir.path(), 10);
    let config = DbfConfig::default();
    let mut table = AttributeTable::open(&path, &config).unwrap();
    assert!(table.remove_row_at(2).unwrap());

    let paged = AttributeTable::open(&path, &config).unwrap();
    let mut filled = AttributeTable::open(&path, &config).unwrap();
    filled.fill(0).unwrap();
    let data = filled.data().unwrap();

    let page = paged.supply_page_of_data(5, 3).unwrap().unwrap();
    assert_eq!(page.num_rows(), 3);
    for i in 0..3 {
        assert_eq!(page.row(i), data.row(5 + i));
    }
    // short page at the end, nothing past it
    let page = paged.supply_page_of_data(8, 5).unwrap().unwrap();
    assert_eq!(page.num_rows(), 1);
    assert_eq!(page.row(0), row(9));
    assert!(paged.supply_page_of_data(9, 1).unwrap().is_none());
    assert!(paged.supply_page_of_data(0, 0).unwrap().is_none());

    let cols = paged.supply_page_of_columns(5, 3, &["POP", "NAME"]).unwrap();
    assert_eq!(cols.len(), 2);
    for i in 0..3 {
        assert_eq!(cols[0][i], data.get(5 + i, 2));
        assert_eq!(cols[1][i], data.get(5 + i, 0));
    }
    let area = paged.supply_page_of_column(0, 2, "area").unwrap();
    assert_eq!(area, vec![Value::F64(0.25), Value::F64(1.25)]);
    assert!(matches!(
        paged.supply_page_of_column(0, 2, "MISSING"),
        Err(Error::FieldNotFound(_))
    ));
}

#[test]
fn test_widening_preserves_data() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("codes.dbf");
    let config = DbfConfig::default();
    let schema = Schema::new(vec![Field::numeric("CODE", 2, 0).unwrap()]);
    assert_eq!(schema.field(0).value_type, ValueType::Byte);
    let mut table = AttributeTable::create(schema, &config);
    for v in [10, 20, -5] {
        table.add_row(&[Value::I64(v)]).unwrap();
    }
    table.save_as(&path, false).unwrap();

    let mut table = AttributeTable::open(&path, &config).unwrap();
    assert_eq!(table.schema().field(0).value_type, ValueType::Byte);
    // stateless read cannot widen
    assert!(matches!(
        table.read_row(2),
        Err(Error::NumericOverflow { .. })
    ));
    // column paging is stateless as well
    assert!(matches!(
        table.supply_page_of_column(0, 3, "CODE"),
        Err(Error::NumericOverflow { .. })
    ));
    let col = table.supply_page_of_column(0, 2, "CODE").unwrap();
    assert_eq!(col, vec![Value::I64(10), Value::I64(20)]);
    assert_eq!(table.schema().field(0).value_type, ValueType::Byte);

    table.fill(0).unwrap();
    assert_eq!(table.schema().field(0).value_type, ValueType::Short);
    let data = table.data().unwrap();
    let values: Vec<_> = data.rows().map(|r| r[0].clone()).collect();
    assert_eq!(values, vec![Value::I64(10), Value::I64(20), Value::I64(-5)]);
    assert!(data.failures().is_empty());
}

#[test]
fn test_sidecar_wins_over_language_driver() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("names.dbf");
    let config = DbfConfig::default().default_encoding(UTF_8);
    let mut table = AttributeTable::create(schema(), &config);
    table.add_row(&[Value::from("Zürich")]).unwrap();
    table.save_as(&path, false).unwrap();
    // no language driver for utf-8, so the sidecar carries it
    assert_eq!(table.language_driver_id(), 0);
    let sidecar = path.with_extension("cpg");
    assert_eq!(fs::read_to_string(&sidecar).unwrap(), "UTF-8");

    let mut bytes = fs::read(&path).unwrap();
    bytes[29] = 0x57;
    fs::write(&path, &bytes).unwrap();

    let defaults = DbfConfig::default();
    let table = AttributeTable::open(&path, &defaults).unwrap();
    assert!(table.encoding().is_utf8());
    assert_eq!(name_of(&table, 0), Value::from("Zürich"));

    fs::remove_file(&sidecar).unwrap();
    let table = AttributeTable::open(&path, &defaults).unwrap();
    assert_eq!(table.encoding().name(), "windows-1252");
    assert_eq!(name_of(&table, 0), Value::from("ZÃ¼rich"));
}

#[test]
fn test_edit_in_place() {
    let dir = tempdir().unwrap();
    let path = create_table(dir.path(), 10);
    let config = DbfConfig::default();
    let mut table = AttributeTable::open(&path, &config).unwrap();
    table.edit(1, &row(42)).unwrap();
    table
        .edit_many(&[(2, row(43)), (3, vec![Value::from("short")])])
        .unwrap();
    assert_eq!(table.add_row(&row(99)).unwrap(), 10);
    assert_eq!(table.num_records(), 11);
    assert!(matches!(table.edit(11, &row(0)), Err(Error::RowOutOfBound(11))));

    let table = AttributeTable::open(&path, &config).unwrap();
    assert_eq!(table.num_records(), 11);
    assert!(table.deletion_index().is_empty());
    assert_eq!(table.read_row(1).unwrap().into_values(), row(42));
    assert_eq!(table.read_row(2).unwrap().into_values(), row(43));
    let short = table.read_row(3).unwrap();
    assert_eq!(short.get("NAME"), Some(&Value::from("short")));
    assert_eq!(short.get("POP"), Some(&Value::Null));
    assert_eq!(table.read_row(10).unwrap().into_values(), row(99));
}

#[test]
fn test_edit_raw() {
    let dir = tempdir().unwrap();
    let path = create_table(dir.path(), 5);
    let mut table = AttributeTable::open(&path, &DbfConfig::default()).unwrap();
    let mut visited = vec![];
    let stopped = table
        .edit_raw(&[0, 1, 2], |r, buf| {
            visited.push(r);
            buf[0] = b'X';
            if r == 1 {
                EditAction::MODIFIED | EditAction::STOP
            } else {
                EditAction::MODIFIED
            }
        })
        .unwrap();
    assert!(stopped);
    assert_eq!(visited, vec![0, 1]);
    assert_eq!(name_of(&table, 0), Value::from("Xity0"));
    assert_eq!(name_of(&table, 1), Value::from("Xity1"));
    assert_eq!(name_of(&table, 2), Value::from("city2"));

    let stopped = table
        .edit_raw(&[3, 4], |_, buf| {
            buf[0] = b'Y';
            EditAction::empty()
        })
        .unwrap();
    assert!(!stopped);
    assert_eq!(name_of(&table, 3), Value::from("city3"));
}

#[test]
fn test_filled_table_mirrors_edits() {
    let dir = tempdir().unwrap();
    let path = create_table(dir.path(), 10);
    let config = DbfConfig::default();
    let mut table = AttributeTable::open(&path, &config).unwrap();
    table.fill(0).unwrap();
    assert!(table.remove_row_at(0).unwrap());
    table.edit(0, &row(50)).unwrap();
    table
        .edit_raw(&[1], |_, buf| {
            buf[0] = b'Z';
            EditAction::MODIFIED
        })
        .unwrap();
    let data = table.data().unwrap();
    assert_eq!(data.num_rows(), 9);
    assert_eq!(data.row(0), row(50));
    assert_eq!(data.get(1, 0), Value::from("Zity2"));

    // saving compacts the tombstone away
    table.save().unwrap();
    assert!(table.deletion_index().is_empty());
    let table = AttributeTable::open(&path, &config).unwrap();
    assert_eq!(table.num_records(), 9);
    assert!(table.deletion_index().is_empty());
    assert_eq!(table.read_row(0).unwrap().into_values(), row(50));
    assert_eq!(name_of(&table, 1), Value::from("Zity2"));
    assert_eq!(name_of(&table, 8), Value::from("city9"));
}

#[test]
fn test_unbound_table() {
    let dir = tempdir().unwrap();
    let mut table = AttributeTable::create(schema(), &DbfConfig::default());
    assert!(matches!(table.save(), Err(Error::NoFile)));
    table.fill(3).unwrap();
    assert_eq!(table.num_rows(), 3);
    assert!(table.data().unwrap().row(2).iter().all(Value::is_null));
    table.edit(1, &row(1)).unwrap();
    assert!(table.remove_row_at(0).unwrap());
    assert_eq!(table.read_row(0).unwrap().into_values(), row(1));

    let path = dir.path().join("new.dbf");
    table.save_as(&path, false).unwrap();
    assert_eq!(table.path(), Some(path.as_path()));
    let table = AttributeTable::open(&path, &DbfConfig::default()).unwrap();
    assert_eq!(table.num_records(), 2);
    assert_eq!(table.read_row(0).unwrap().into_values(), row(1));
}

#[test]
fn test_rejected_edit_leaves_file_and_rows() {
    let dir = tempdir().unwrap();
    let path = create_table(dir.path(), 3);
    let config = DbfConfig::default();
    let mut table = AttributeTable::open(&path, &config).unwrap();
    table.fill(0).unwrap();
    let before = fs::read(&path).unwrap();

    let mut bad = row(7);
    bad[0] = Value::from("changed");
    bad[5] = Value::from("notadate");
    assert!(matches!(table.edit(0, &bad), Err(Error::DataType(_))));
    let mut bad = row(8);
    bad[5] = Value::Bool(true);
    assert!(matches!(table.add_row(&bad), Err(Error::DataType(_))));
    let mut bad = row(10);
    bad[4] = row(10)[5].clone();
    assert!(table.edit_many(&[(1, row(9)), (2, bad)]).is_err());

    assert_eq!(table.num_records(), 3);
    assert_eq!(table.num_rows(), 3);
    assert_eq!(table.data().unwrap().row(0), row(0));
    // a batch stops at the first rejected row, earlier rows are kept
    assert_eq!(table.data().unwrap().row(1), row(9));
    assert_eq!(table.data().unwrap().row(2), row(2));

    let table = AttributeTable::open(&path, &config).unwrap();
    assert_eq!(table.num_records(), 3);
    assert_eq!(table.read_row(0).unwrap().into_values(), row(0));
    assert_eq!(table.read_row(1).unwrap().into_values(), row(9));
    assert_eq!(table.read_row(2).unwrap().into_values(), row(2));
    let after = fs::read(&path).unwrap();
    assert_eq!(before.len(), after.len());
}

#[test]
fn test_changed_layout_blocks_edits_until_saved() {
    let dir = tempdir().unwrap();
    let path = create_table(dir.path(), 2);
    let config = DbfConfig::default();
    let mut table = AttributeTable::open(&path, &config).unwrap();
    table.fill(0).unwrap();
    let mut data = table.data().unwrap().clone();
    data.add_column(Field::character("EXTRA", 30).unwrap());
    table.set_data(data);
    assert!(table.is_layout_changed());
    let len = fs::metadata(&path).unwrap().len();

    let mut wide = row(5);
    wide.push(Value::from("more"));
    assert!(matches!(table.edit(0, &wide), Err(Error::LayoutChanged)));
    assert!(matches!(table.add_row(&wide), Err(Error::LayoutChanged)));
    assert!(matches!(table.remove_row_at(0), Err(Error::LayoutChanged)));
    assert!(matches!(
        table.edit_raw(&[0], |_, _| EditAction::MODIFIED),
        Err(Error::LayoutChanged)
    ));
    assert!(matches!(table.fill(0), Err(Error::LayoutChanged)));
    assert_eq!(fs::metadata(&path).unwrap().len(), len);
    let reopened = AttributeTable::open(&path, &config).unwrap();
    assert_eq!(reopened.read_row(1).unwrap().into_values(), row(1));

    table.save().unwrap();
    assert!(!table.is_layout_changed());
    table.edit(0, &wide).unwrap();
    let table = AttributeTable::open(&path, &config).unwrap();
    assert_eq!(table.schema().len(), 7);
    assert_eq!(table.read_row(0).unwrap().into_values(), wide);
    let mut second = row(1);
    second.push(Value::Null);
    assert_eq!(table.read_row(1).unwrap().into_values(), second);
}

#[derive(Default)]
struct Recorder {
    reports: Vec<(String, u8)>,
    done: Vec<String>,
}

impl ProgressSink for Recorder {
    fn progress(&mut self, task: &str, percent: u8) {
        self.reports.push((task.to_string(), percent));
    }

    fn done(&mut self, task: &str) {
        self.done.push(task.to_string());
    }
}

#[test]
fn test_progress_of_scan_and_fill() {
    let dir = tempdir().unwrap();
    let path = create_table(dir.path(), 10);
    let config = DbfConfig::default();

    // no tombstone possible, the scan is skipped
    let mut rec = Recorder::default();
    AttributeTable::open_with_progress(&path, None, &config, &mut rec).unwrap();
    assert!(rec.reports.is_empty());
    assert!(rec.done.is_empty());

    let mut table = AttributeTable::open(&path, &config).unwrap();
    assert!(table.remove_row_at(4).unwrap());
    let mut rec = Recorder::default();
    let mut table = AttributeTable::open_with_progress(&path, None, &config, &mut rec).unwrap();
    assert_eq!(table.deletion_index().tombstones(), &[4]);
    let percents: Vec<u8> = rec.reports.iter().map(|(_, p)| *p).collect();
    assert_eq!(percents, (1..=10).map(|i| i * 10).collect::<Vec<u8>>());
    assert!(rec.reports.iter().all(|(t, _)| t == "scan deletions"));
    assert_eq!(rec.done, vec!["scan deletions".to_string()]);

    let mut rec = Recorder::default();
    table.fill_with_progress(0, &mut rec).unwrap();
    assert_eq!(table.num_rows(), 9);
    assert_eq!(rec.reports.last(), Some(&("fill".to_string(), 100)));
    assert!(rec.reports.windows(2).all(|w| w[0].1 < w[1].1));
    assert_eq!(rec.done, vec!["fill".to_string()]);
}
