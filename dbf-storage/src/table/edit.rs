//! In-place editing of the bound file.
//!
//! Edits write records directly at their physical offsets. Removal only
//! flips the flag byte, the record stays in the file until the next save
//! compacts it. If rows are materialized, every edit is mirrored there.
use super::AttributeTable;
use crate::data::DataTable;
use crate::deletion::FLAG_DELETED;
use crate::error::{Error, Result};
use crate::header::{self, Header, EOF_MARKER};
use crate::record::RecordCodec;
use bitflags::bitflags;
use dbf_datatype::Value;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};

bitflags! {
    /// Outcome of a raw edit callback on one record.
    pub struct EditAction: u8 {
        const MODIFIED = 0x01; // write buffer back
        const STOP = 0x02; // skip remaining rows
    }
}

/// Open read/write handle on the table file.
///
/// The handle is released when the session ends, including on errors.
pub struct EditSession<'a> {
    table: &'a mut AttributeTable,
    file: File,
    codec: RecordCodec,
    buf: Vec<u8>,
}

impl<'a> EditSession<'a> {
    #[inline]
    pub fn table(&self) -> &AttributeTable {
        self.table
    }

    /// Flush and close the handle.
    #[inline]
    pub fn end_edit(mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Append a row and return its logical index.
    ///
    /// Values the materialized rows cannot hold are rejected before the
    /// file is touched.
    pub fn add_row(&mut self, values: &[Value]) -> Result<usize> {
        self.check_row(values)?;
        let t = &mut *self.table;
        let physical = t.num_records + t.deletion.len();
        let offset = t.header_length as u64 + (physical * t.record_length) as u64;
        self.codec.encode_row(&t.schema, values, false, &mut self.buf);
        if t.config.write_eof_marker {
            self.buf.push(EOF_MARKER);
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&self.buf)?;
        let row = t.num_records;
        t.num_records += 1;
        t.offsets.lock().invalidate();
        self.write_header()?;
        if let Some(data) = &mut self.table.data {
            data.widen_to_fit(values);
            data.push_row(values.to_vec())?;
        }
        Ok(row)
    }

    /// Overwrite all fields of a row. Missing values are written blank.
    pub fn edit(&mut self, row: usize, values: &[Value]) -> Result<()> {
        if row >= self.table.num_records {
            return Err(Error::RowOutOfBound(row));
        }
        self.check_row(values)?;
        let offset = self.table.row_offset(row);
        self.codec
            .encode_row(&self.table.schema, values, false, &mut self.buf);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&self.buf)?;
        if let Some(data) = &mut self.table.data {
            data.widen_to_fit(values);
            data.set_row(row, values)?;
        }
        Ok(())
    }

    pub fn edit_many(&mut self, pairs: &[(usize, Vec<Value>)]) -> Result<()> {
        for (row, values) in pairs {
            self.edit(*row, values)?;
        }
        Ok(())
    }

    /// Mark row as removed. Returns false if the row does not exist.
    pub fn remove_row_at(&mut self, row: usize) -> Result<bool> {
        let t = &mut *self.table;
        if row >= t.num_records {
            return Ok(false);
        }
        let file_index = t.deletion.file_index(row);
        let offset = t.header_length as u64 + (file_index * t.record_length) as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&[FLAG_DELETED])?;
        t.deletion.insert(file_index);
        t.num_records -= 1;
        t.offsets.lock().invalidate();
        self.write_header()?;
        if let Some(data) = &mut self.table.data {
            data.remove_row(row)?;
        }
        Ok(true)
    }

    /// Hand the field bytes of each row to `f`, flag byte excluded.
    ///
    /// The buffer is written back if `f` returns [`EditAction::MODIFIED`].
    /// Returns true if `f` stopped the batch with [`EditAction::STOP`].
    pub fn edit_raw<F>(&mut self, rows: &[usize], mut f: F) -> Result<bool>
    where
        F: FnMut(usize, &mut [u8]) -> EditAction,
    {
        self.buf.clear();
        self.buf.resize(self.table.record_length - 1, 0);
        for &row in rows {
            if row >= self.table.num_records {
                return Err(Error::RowOutOfBound(row));
            }
            let offset = self.table.row_offset(row) + 1;
            self.file.seek(SeekFrom::Start(offset))?;
            self.file.read_exact(&mut self.buf)?;
            let action = f(row, &mut self.buf[..]);
            if action.contains(EditAction::MODIFIED) {
                let values = self.raw_values()?;
                self.file.seek(SeekFrom::Start(offset))?;
                self.file.write_all(&self.buf)?;
                if let (Some(data), Some(values)) = (&mut self.table.data, values) {
                    data.widen_to_fit(&values);
                    data.set_row(row, &values)?;
                }
            }
            if action.contains(EditAction::STOP) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Decode the raw buffer for the materialized rows, if any.
    fn raw_values(&self) -> Result<Option<Vec<Value>>> {
        let data = match &self.table.data {
            Some(data) => data,
            None => return Ok(None),
        };
        let offsets = self.table.schema.offsets();
        let mut values = Vec::with_capacity(offsets.len());
        for (f, start) in self.table.schema.fields().iter().zip(offsets) {
            // offsets count the flag byte
            let start = start - 1;
            let end = (start + f.length as usize).min(self.buf.len());
            values.push(self.codec.decode_field_widened(f, &self.buf[start.min(end)..end])?);
        }
        data.check_row(&values)?;
        Ok(Some(values))
    }

    #[inline]
    fn check_row(&self, values: &[Value]) -> Result<()> {
        match &self.table.data {
            Some(data) => data.check_row(values),
            None => Ok(()),
        }
    }

    fn write_header(&mut self) -> Result<()> {
        let t = &mut *self.table;
        t.update_date = header::today();
        let header = Header {
            update_date: t.update_date,
            num_records: t.num_records as u32,
            header_length: t.header_length as u16,
            record_length: t.record_length as u16,
            ldid: t.ldid,
        };
        self.file.seek(SeekFrom::Start(0))?;
        header::write_fixed_header(&mut self.file, &header)
    }
}

impl Drop for EditSession<'_> {
    #[inline]
    fn drop(&mut self) {
        if let Err(e) = self.file.flush() {
            log::warn!("flush on end of edit failed: {}", e);
        }
    }
}

impl AttributeTable {
    /// Start editing the bound file in place.
    ///
    /// Fails with [`Error::LayoutChanged`] while rows set by
    /// [`AttributeTable::set_data`] have a record layout the file does not
    /// have yet.
    pub fn begin_edit(&mut self) -> Result<EditSession<'_>> {
        let path = self.path.as_deref().ok_or(Error::NoFile)?;
        if self.is_layout_changed() {
            return Err(Error::LayoutChanged);
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
                _ => Error::IOError(e),
            })?;
        let codec = self.codec();
        let buf = Vec::with_capacity(self.record_length);
        Ok(EditSession {
            table: self,
            file,
            codec,
            buf,
        })
    }

    /// Append a row. A table without file only grows its rows.
    pub fn add_row(&mut self, values: &[Value]) -> Result<usize> {
        if self.path.is_none() {
            let data = self.unbound_data()?;
            data.check_row(values)?;
            data.widen_to_fit(values);
            data.push_row(values.to_vec())?;
            let rows = data.num_rows();
            self.num_records = rows;
            return Ok(rows - 1);
        }
        let mut session = self.begin_edit()?;
        let row = session.add_row(values)?;
        session.end_edit()?;
        Ok(row)
    }

    pub fn edit(&mut self, row: usize, values: &[Value]) -> Result<()> {
        if self.path.is_none() {
            let data = self.unbound_data()?;
            if row >= data.num_rows() {
                return Err(Error::RowOutOfBound(row));
            }
            data.check_row(values)?;
            data.widen_to_fit(values);
            return data.set_row(row, values);
        }
        let mut session = self.begin_edit()?;
        session.edit(row, values)?;
        session.end_edit()
    }

    pub fn edit_many(&mut self, pairs: &[(usize, Vec<Value>)]) -> Result<()> {
        if self.path.is_none() {
            for (row, values) in pairs {
                self.edit(*row, values)?;
            }
            return Ok(());
        }
        let mut session = self.begin_edit()?;
        session.edit_many(pairs)?;
        session.end_edit()
    }

    pub fn remove_row_at(&mut self, row: usize) -> Result<bool> {
        if self.path.is_none() {
            let data = self.unbound_data()?;
            if row >= data.num_rows() {
                return Ok(false);
            }
            data.remove_row(row)?;
            let rows = data.num_rows();
            self.num_records = rows;
            return Ok(true);
        }
        let mut session = self.begin_edit()?;
        let removed = session.remove_row_at(row)?;
        session.end_edit()?;
        Ok(removed)
    }

    /// Raw batch edit of the bound file. See [`EditSession::edit_raw`].
    pub fn edit_raw<F>(&mut self, rows: &[usize], f: F) -> Result<bool>
    where
        F: FnMut(usize, &mut [u8]) -> EditAction,
    {
        let mut session = self.begin_edit()?;
        let stopped = session.edit_raw(rows, f)?;
        session.end_edit()?;
        Ok(stopped)
    }

    #[inline]
    fn unbound_data(&mut self) -> Result<&mut DataTable> {
        self.data.as_mut().ok_or(Error::NoFile)
    }
}
