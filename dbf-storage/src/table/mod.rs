//! Attribute table bound to a dBASE file.
//!
//! The table keeps schema and deletion state in memory. Rows are either
//! materialized once by [`AttributeTable::fill`], or accessed in place by
//! paging and editing without loading the whole file.
pub mod edit;
pub mod page;

use crate::config::DbfConfig;
use crate::data::DataTable;
use crate::deletion::{DeletionIndex, OffsetCache};
use crate::encoding::{self, TextEncoding};
use crate::error::{Error, Result};
use crate::field::Schema;
use crate::header::{self, Header, EOF_MARKER};
use crate::progress::{NoProgress, ProgressMeter, ProgressSink};
use crate::record::{RecordCodec, Row};
use dbf_datatype::{Date, Value};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

pub use edit::{EditAction, EditSession};

#[derive(Debug)]
pub struct AttributeTable {
    path: Option<PathBuf>,
    config: DbfConfig,
    schema: Schema,
    // live rows, as stored in the header
    num_records: usize,
    deletion: DeletionIndex,
    offsets: Mutex<OffsetCache>,
    encoding: TextEncoding,
    ldid: u8,
    update_date: Date,
    header_length: usize,
    record_length: usize,
    data: Option<DataTable>,
    // rows set by set_data no longer match the record layout of the file
    layout_changed: bool,
}

impl AttributeTable {
    /// Create an empty table not bound to any file.
    pub fn create(schema: Schema, config: &DbfConfig) -> Self {
        let config = config.clone();
        let encoding = TextEncoding::new(config.default_encoding);
        let ldid = encoding::ldid_for(encoding, 0, &config);
        let header_length = schema.header_length();
        let record_length = schema.record_length();
        let data = DataTable::new(schema.clone());
        AttributeTable {
            path: None,
            config,
            schema,
            num_records: 0,
            deletion: DeletionIndex::new(),
            offsets: Mutex::new(OffsetCache::new()),
            encoding,
            ldid,
            update_date: header::today(),
            header_length,
            record_length,
            data: Some(data),
            layout_changed: false,
        }
    }

    /// Open table and scan it for tombstones.
    #[inline]
    pub fn open(path: impl AsRef<Path>, config: &DbfConfig) -> Result<Self> {
        Self::open_with_progress(path, None, config, &mut NoProgress)
    }

    /// Open table with tombstones already known by the caller.
    /// The list is trusted and no scan is done.
    #[inline]
    pub fn open_with_tombstones(
        path: impl AsRef<Path>,
        tombstones: Vec<usize>,
        config: &DbfConfig,
    ) -> Result<Self> {
        Self::open_with_progress(path, Some(tombstones), config, &mut NoProgress)
    }

    pub fn open_with_progress(
        path: impl AsRef<Path>,
        tombstones: Option<Vec<usize>>,
        config: &DbfConfig,
        progress: &mut dyn ProgressSink,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = open_file(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let header = header::read_header(&mut reader, || modified_date(path))?;
        let encoding = encoding::resolve(Some(path), header.ldid, config);
        let schema = header::read_fields(&mut reader, &header, encoding)?;
        let header_length = header.header_length as usize;
        let record_length = header.record_length as usize;
        if schema.record_length() != record_length {
            log::warn!(
                "record length {} of {} does not match fields {}",
                record_length,
                path.display(),
                schema.record_length()
            );
            return Err(Error::InvalidHeader);
        }
        let num_records = header.num_records as usize;
        let deletion = match tombstones {
            Some(t) => DeletionIndex::from_tombstones(t),
            None => DeletionIndex::scan(
                &mut reader,
                file_len,
                header_length,
                record_length,
                num_records,
                progress,
            )?,
        };
        log::debug!(
            "open {}: {} fields, {} records, {} tombstones, encoding {}",
            path.display(),
            schema.len(),
            num_records,
            deletion.len(),
            encoding.name()
        );
        Ok(AttributeTable {
            path: Some(path.to_path_buf()),
            config: config.clone(),
            schema,
            num_records,
            deletion,
            offsets: Mutex::new(OffsetCache::new()),
            encoding,
            ldid: header.ldid,
            update_date: header.update_date,
            header_length,
            record_length,
            data: None,
            layout_changed: false,
        })
    }

    #[inline]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[inline]
    pub fn config(&self) -> &DbfConfig {
        &self.config
    }

    /// Schema of the table. After fill, value types reflect any widening.
    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[inline]
    pub fn num_records(&self) -> usize {
        self.num_records
    }

    /// Number of live rows, counting unsaved rows once materialized.
    #[inline]
    pub fn num_rows(&self) -> usize {
        match &self.data {
            Some(data) => data.num_rows(),
            None => self.num_records,
        }
    }

    #[inline]
    pub fn deletion_index(&self) -> &DeletionIndex {
        &self.deletion
    }

    #[inline]
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Change encoding used for subsequent reads and writes.
    #[inline]
    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.encoding = encoding;
    }

    #[inline]
    pub fn language_driver_id(&self) -> u8 {
        self.ldid
    }

    #[inline]
    pub fn update_date(&self) -> Date {
        self.update_date
    }

    #[inline]
    pub fn header_length(&self) -> usize {
        self.header_length
    }

    #[inline]
    pub fn record_length(&self) -> usize {
        self.record_length
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        self.data.is_some()
    }

    #[inline]
    pub fn data(&self) -> Option<&DataTable> {
        self.data.as_ref()
    }

    #[inline]
    pub fn data_mut(&mut self) -> Option<&mut DataTable> {
        self.data.as_mut()
    }

    /// Replace materialized rows. The schema follows the data and is written
    /// by the next save.
    ///
    /// If the record layout changes, in-place edits and reloads of a bound
    /// table fail with [`Error::LayoutChanged`] until the table is saved.
    #[inline]
    pub fn set_data(&mut self, data: DataTable) {
        if !data.schema().same_layout(&self.schema) {
            self.layout_changed = true;
        }
        self.schema = data.schema().clone();
        self.data = Some(data);
    }

    /// Whether the materialized rows have a record layout the file does not
    /// have yet.
    #[inline]
    pub fn is_layout_changed(&self) -> bool {
        self.layout_changed
            || self
                .data
                .as_ref()
                .map_or(false, |d| !d.schema().same_layout(&self.schema))
    }

    #[inline]
    pub(crate) fn codec(&self) -> RecordCodec {
        RecordCodec::new(self.encoding)
    }

    /// Byte offset of the record of given logical row.
    #[inline]
    pub(crate) fn row_offset(&self, row: usize) -> u64 {
        self.offsets.lock().offset(
            &self.deletion,
            row,
            self.num_records,
            self.header_length,
            self.record_length,
        )
    }

    #[inline]
    pub(crate) fn open_reader(&self) -> Result<BufReader<File>> {
        let path = self.path.as_deref().ok_or(Error::NoFile)?;
        Ok(BufReader::new(open_file(path)?))
    }

    /// Materialize all live rows.
    ///
    /// A table without file gets `default_rows` empty rows instead.
    #[inline]
    pub fn fill(&mut self, default_rows: usize) -> Result<()> {
        self.fill_with_progress(default_rows, &mut NoProgress)
    }

    pub fn fill_with_progress(
        &mut self,
        default_rows: usize,
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        if self.path.is_none() {
            let mut data = DataTable::with_capacity(self.schema.clone(), default_rows);
            for _ in 0..default_rows {
                data.push_row(vec![])?;
            }
            self.num_records = default_rows;
            self.data = Some(data);
            return Ok(());
        }
        if self.layout_changed {
            return Err(Error::LayoutChanged);
        }
        let mut reader = self.open_reader()?;
        reader.seek(SeekFrom::Start(self.header_length as u64))?;
        let codec = self.codec();
        let physical = self.num_records + self.deletion.len();
        let mut data = DataTable::with_capacity(self.schema.clone(), self.num_records);
        let mut tombstones = self.deletion.tombstones().iter().peekable();
        let mut buf = vec![0u8; self.record_length];
        let mut meter = ProgressMeter::new(progress, "fill", physical);
        for file_index in 0..physical {
            if data.num_rows() >= self.num_records {
                break;
            }
            if let Err(e) = reader.read_exact(&mut buf) {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    log::warn!(
                        "unexpected end of file at record {}, {} of {} rows read",
                        file_index,
                        data.num_rows(),
                        self.num_records
                    );
                    break;
                }
                return Err(e.into());
            }
            meter.update(file_index + 1);
            if tombstones.next_if_eq(&&file_index).is_some() {
                continue;
            }
            codec.decode_into(&buf[1..], &mut data)?;
        }
        meter.finish();
        log::debug!(
            "fill {} rows, {} conversion failures",
            data.num_rows(),
            data.failures().len()
        );
        self.schema = data.schema().clone();
        self.data = Some(data);
        Ok(())
    }

    /// Read one row without materializing the table.
    /// Numeric values too wide for the declared type are an error here.
    pub fn read_row(&self, row: usize) -> Result<Row> {
        if let Some(data) = &self.data {
            if row >= data.num_rows() {
                return Err(Error::RowOutOfBound(row));
            }
            return Ok(row_from(data.schema(), data.row(row)));
        }
        if row >= self.num_records {
            return Err(Error::RowOutOfBound(row));
        }
        let mut reader = self.open_reader()?;
        let mut buf = vec![0u8; self.record_length];
        reader.seek(SeekFrom::Start(self.row_offset(row)))?;
        reader.read_exact(&mut buf)?;
        self.codec().decode_row(&self.schema, &buf[1..])
    }

    /// Rows at given logical indexes, in the given order.
    pub fn get_attributes(&self, rows: &[usize]) -> Result<DataTable> {
        if let Some(data) = &self.data {
            return data.select(rows);
        }
        let mut res = DataTable::with_capacity(self.schema.clone(), rows.len());
        if rows.is_empty() {
            return Ok(res);
        }
        let mut reader = self.open_reader()?;
        let codec = self.codec();
        let mut buf = vec![0u8; self.record_length];
        let mut pos = None;
        for &row in rows {
            if row >= self.num_records {
                return Err(Error::RowOutOfBound(row));
            }
            let offset = self.row_offset(row);
            if pos != Some(offset) {
                reader.seek(SeekFrom::Start(offset))?;
            }
            reader.read_exact(&mut buf)?;
            pos = Some(offset + self.record_length as u64);
            codec.decode_into(&buf[1..], &mut res)?;
        }
        Ok(res)
    }

    /// Write materialized rows back to the bound file.
    #[inline]
    pub fn save(&mut self) -> Result<()> {
        let path = self.path.clone().ok_or(Error::NoFile)?;
        self.write_to(&path)
    }

    /// Write materialized rows to a new file and bind the table to it.
    pub fn save_as(&mut self, path: impl AsRef<Path>, overwrite: bool) -> Result<()> {
        let path = path.as_ref();
        if !overwrite && path.exists() {
            return Err(Error::FileExists(path.to_path_buf()));
        }
        self.write_to(path)
    }

    fn write_to(&mut self, path: &Path) -> Result<()> {
        if self.data.is_none() {
            self.fill(0)?;
        }
        let data = match &self.data {
            Some(data) => data,
            None => return Err(Error::NoFile),
        };
        let schema = data.schema().clone();
        let ldid = encoding::ldid_for(self.encoding, self.ldid, &self.config);
        let update_date = header::today();
        let header = Header::for_schema(&schema, data.num_rows() as u32, ldid, update_date);
        let codec = self.codec();
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        header::write_header(&mut writer, &header, &schema, self.encoding)?;
        let mut buf = Vec::with_capacity(schema.record_length());
        for values in data.rows() {
            codec.encode_row(&schema, &values, false, &mut buf);
            writer.write_all(&buf)?;
        }
        if self.config.write_eof_marker {
            writer.write_all(&[EOF_MARKER])?;
        }
        writer.flush()?;
        // an existing sidecar is rewritten so it never contradicts the header
        let sidecar_exists = encoding::sidecar_path(path, &self.config).exists();
        if self.config.write_sidecar && (ldid == 0 || sidecar_exists) {
            encoding::write_sidecar(path, self.encoding, &self.config)?;
        }
        log::debug!("save {} rows to {}", data.num_rows(), path.display());

        self.num_records = data.num_rows();
        self.path = Some(path.to_path_buf());
        self.schema = schema;
        self.ldid = ldid;
        self.update_date = update_date;
        self.header_length = header.header_length as usize;
        self.record_length = header.record_length as usize;
        // rows are compacted, tombstones are gone
        self.deletion = DeletionIndex::new();
        self.offsets.lock().invalidate();
        self.layout_changed = false;
        Ok(())
    }
}

#[inline]
fn row_from(schema: &Schema, values: Vec<Value>) -> Row {
    let names = schema.fields().iter().map(|f| f.name.clone());
    Row::from_pairs(names.zip(values))
}

#[inline]
fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::IOError(e),
    })
}

#[inline]
fn modified_date(path: &Path) -> Date {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|t| OffsetDateTime::from(t).date())
        .unwrap_or_else(|_| header::today())
}
