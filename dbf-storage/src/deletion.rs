//! Tombstone index mapping logical rows to physical records.
//!
//! A removed row stays in the file with its flag byte set to `*`.
//! Logical row numbers skip those records, physical row numbers count them.
use crate::error::Result;
use crate::progress::{ProgressMeter, ProgressSink};
use std::io::{Read, Seek, SeekFrom};

pub const FLAG_LIVE: u8 = b' ';
pub const FLAG_DELETED: u8 = b'*';

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionIndex {
    // sorted physical indexes of tombstones
    deleted: Vec<usize>,
}

impl DeletionIndex {
    #[inline]
    pub fn new() -> Self {
        DeletionIndex::default()
    }

    /// Build index from tombstones known by the caller. No scan is done.
    #[inline]
    pub fn from_tombstones(mut deleted: Vec<usize>) -> Self {
        deleted.sort_unstable();
        deleted.dedup();
        DeletionIndex { deleted }
    }

    /// Scan flag byte of every physical record.
    ///
    /// The scan is skipped if the data region holds exactly `num_records`
    /// records, optionally followed by the EOF marker, because then no
    /// record can be a tombstone.
    pub fn scan<R: Read + Seek>(
        reader: &mut R,
        file_len: u64,
        header_length: usize,
        record_length: usize,
        num_records: usize,
        progress: &mut dyn ProgressSink,
    ) -> Result<Self> {
        let expected = (header_length + record_length * num_records) as u64;
        if file_len == expected || file_len == expected + 1 {
            return Ok(DeletionIndex::new());
        }
        let physical = (file_len.saturating_sub(header_length as u64) / record_length as u64) as usize;
        log::debug!(
            "scan {} physical records for tombstones, header declares {}",
            physical,
            num_records
        );
        let mut deleted = vec![];
        let mut record = vec![0u8; record_length];
        let mut meter = ProgressMeter::new(progress, "scan deletions", physical);
        // records are read front to back, positioned once
        reader.seek(SeekFrom::Start(header_length as u64))?;
        for idx in 0..physical {
            reader.read_exact(&mut record)?;
            if record[0] != FLAG_LIVE {
                deleted.push(idx);
            }
            meter.update(idx + 1);
        }
        meter.finish();
        Ok(DeletionIndex { deleted })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.deleted.len()
    }

    #[inline]
    pub fn tombstones(&self) -> &[usize] {
        &self.deleted
    }

    #[inline]
    pub fn is_deleted(&self, file_index: usize) -> bool {
        self.deleted.binary_search(&file_index).is_ok()
    }

    /// Translate logical row to physical record by skipping tombstones.
    #[inline]
    pub fn file_index(&self, row: usize) -> usize {
        let mut offset = 0;
        for &d in &self.deleted {
            if d <= row + offset {
                offset += 1;
            } else {
                break;
            }
        }
        row + offset
    }

    /// Translate physical record to logical row.
    #[inline]
    pub fn row_index(&self, file_index: usize) -> usize {
        file_index - self.deleted.partition_point(|d| *d < file_index)
    }

    /// Add tombstone, keeping the list sorted.
    /// Returns false if the record is already a tombstone.
    #[inline]
    pub fn insert(&mut self, file_index: usize) -> bool {
        match self.deleted.binary_search(&file_index) {
            Ok(_) => false,
            Err(pos) => {
                self.deleted.insert(pos, file_index);
                true
            }
        }
    }
}

/// Byte offsets of every logical row, derived from the deletion index.
///
/// Only needed when tombstones exist. Removal marks it dirty and the next
/// lookup rebuilds it.
#[derive(Debug, Default)]
pub struct OffsetCache {
    offsets: Vec<u64>,
    dirty: bool,
}

impl OffsetCache {
    #[inline]
    pub fn new() -> Self {
        OffsetCache {
            offsets: vec![],
            dirty: true,
        }
    }

    #[inline]
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns offset of the record of given logical row.
    pub fn offset(
        &mut self,
        index: &DeletionIndex,
        row: usize,
        num_records: usize,
        header_length: usize,
        record_length: usize,
    ) -> u64 {
        if index.is_empty() {
            return header_length as u64 + (row * record_length) as u64;
        }
        if self.dirty || self.offsets.len() != num_records {
            self.rebuild(index, num_records, header_length, record_length);
        }
        match self.offsets.get(row) {
            Some(offset) => *offset,
            None => header_length as u64 + (index.file_index(row) * record_length) as u64,
        }
    }

    fn rebuild(
        &mut self,
        index: &DeletionIndex,
        num_records: usize,
        header_length: usize,
        record_length: usize,
    ) {
        self.offsets.clear();
        self.offsets.reserve(num_records);
        let mut tombstones = index.tombstones().iter().peekable();
        let mut file_index = 0;
        while self.offsets.len() < num_records {
            if tombstones.next_if_eq(&&file_index).is_none() {
                self.offsets
                    .push(header_length as u64 + (file_index * record_length) as u64);
            }
            file_index += 1;
        }
        self.dirty = false;
    }
}
