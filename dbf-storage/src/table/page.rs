//! Paged reads which do not materialize the table.
use super::AttributeTable;
use crate::data::DataTable;
use crate::error::{Error, Result};
use dbf_datatype::Value;
use smallvec::SmallVec;
use std::io::{Read, Seek, SeekFrom};

impl AttributeTable {
    /// Read up to `count` live rows starting at logical row `start`.
    ///
    /// The physical range covering the page is read in one go. A page
    /// reaching past the end of file is returned short. Returns `None` if
    /// no row can be produced.
    pub fn supply_page_of_data(&self, start: usize, count: usize) -> Result<Option<DataTable>> {
        let end = match self.page_end(start, count) {
            Some(end) => end,
            None => return Ok(None),
        };
        if let Some(data) = &self.data {
            let rows: Vec<usize> = (start..end).collect();
            return data.select(&rows).map(Some);
        }
        let first = self.deletion.file_index(start);
        let last = self.deletion.file_index(end - 1);
        let rl = self.record_length;
        let mut reader = self.open_reader()?;
        reader.seek(SeekFrom::Start(self.row_offset(start)))?;
        let len = ((last - first + 1) * rl) as u64;
        let mut buf = Vec::with_capacity(len as usize);
        reader.take(len).read_to_end(&mut buf)?;
        if buf.len() < len as usize {
            log::debug!(
                "short page at row {}: {} of {} bytes available",
                start,
                buf.len(),
                len
            );
        }

        let codec = self.codec();
        let mut page = DataTable::with_capacity(self.schema.clone(), end - start);
        for (i, record) in buf.chunks_exact(rl).enumerate() {
            if self.deletion.is_deleted(first + i) {
                continue;
            }
            codec.decode_into(&record[1..], &mut page)?;
        }
        if page.num_rows() == 0 {
            return Ok(None);
        }
        Ok(Some(page))
    }

    /// Read one column of up to `count` live rows starting at `start`.
    #[inline]
    pub fn supply_page_of_column(&self, start: usize, count: usize, column: &str) -> Result<Vec<Value>> {
        let mut res = self.supply_page_of_columns(start, count, &[column])?;
        Ok(res.pop().unwrap_or_default())
    }

    /// Read several columns of up to `count` live rows starting at `start`.
    ///
    /// Result is indexed by the order of `columns`. Like [`read_row`], this
    /// is a stateless read: a numeric value too wide for its declared type
    /// fails with [`Error::NumericOverflow`].
    ///
    /// [`read_row`]: AttributeTable::read_row
    pub fn supply_page_of_columns(
        &self,
        start: usize,
        count: usize,
        columns: &[&str],
    ) -> Result<Vec<Vec<Value>>> {
        let mut cols: SmallVec<[usize; 16]> = SmallVec::with_capacity(columns.len());
        for name in columns {
            cols.push(self.schema.find(name)?);
        }
        let end = match self.page_end(start, count) {
            Some(end) => end,
            None => return Ok(vec![vec![]; columns.len()]),
        };
        if let Some(data) = &self.data {
            return Ok(cols
                .iter()
                .map(|c| (start..end).map(|r| data.get(r, *c)).collect())
                .collect());
        }

        let offsets = self.schema.offsets();
        let mut res = vec![Vec::with_capacity(end - start); columns.len()];
        let codec = self.codec();
        let mut reader = self.open_reader()?;
        let mut buf = vec![0u8; self.record_length];
        // seek only across tombstones
        let mut pos = None;
        for row in start..end {
            let base = self.row_offset(row);
            if pos != Some(base) {
                reader.seek(SeekFrom::Start(base))?;
            }
            if let Err(e) = reader.read_exact(&mut buf) {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    log::debug!("column page stops at row {}, end of file", row);
                    return Ok(truncate_all(res, row - start));
                }
                return Err(Error::IOError(e));
            }
            pos = Some(base + self.record_length as u64);
            for (i, &c) in cols.iter().enumerate() {
                let field = self.schema.field(c);
                let bs = &buf[offsets[c]..offsets[c] + field.length as usize];
                res[i].push(codec.decode_field(field, bs)?);
            }
        }
        Ok(res)
    }

    /// Exclusive end row of a page, `None` if the page is empty.
    #[inline]
    fn page_end(&self, start: usize, count: usize) -> Option<usize> {
        let total = self.num_rows();
        if count == 0 || start >= total {
            return None;
        }
        Some(total.min(start.saturating_add(count)))
    }
}

#[inline]
fn truncate_all(mut res: Vec<Vec<Value>>, rows: usize) -> Vec<Vec<Value>> {
    for r in &mut res {
        r.truncate(rows);
    }
    res
}
