//! Codec of the file header and field descriptor array.
//!
//! ```text
//! | 0 | 1-3  | 4-7     | 8-9     | 10-11   | 12-28    | 29   | 30-31    |
//! | 3 | date | records | hdr len | rec len | reserved | LDID | reserved |
//! ```
//! followed by 32-byte field descriptors and a 0x0D terminator.
use crate::encoding::TextEncoding;
use crate::error::{Error, Result};
use crate::field::{Field, FieldType, Schema};
use bytemuck::{Pod, Zeroable};
use dbf_datatype::{Date, Month};
use std::io::{Read, Write};
use std::mem;
use time::OffsetDateTime;

/// The only supported file type tag: dBASE III without memo.
pub const FILE_TYPE_DBASE3: u8 = 0x03;
pub const HEADER_TERMINATOR: u8 = 0x0D;
pub const EOF_MARKER: u8 = 0x1A;
pub const FIELD_NAME_LENGTH: usize = 11;

const _: () = assert!(mem::size_of::<RawHeader>() == 32);
const _: () = assert!(mem::size_of::<RawField>() == 32);

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct RawHeader {
    file_type: u8,
    update: [u8; 3],
    num_records: [u8; 4],
    header_length: [u8; 2],
    record_length: [u8; 2],
    reserved1: [u8; 17],
    ldid: u8,
    reserved2: [u8; 2],
}

// SAFETY: all members are bytes, so there is no padding and any bit
// pattern is valid.
unsafe impl Zeroable for RawHeader {}
unsafe impl Pod for RawHeader {}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct RawField {
    name: [u8; FIELD_NAME_LENGTH],
    ty: u8,
    address: [u8; 4],
    length: u8,
    decimal_count: u8,
    reserved: [u8; 14],
}

// SAFETY: same as RawHeader.
unsafe impl Zeroable for RawField {}
unsafe impl Pod for RawField {}

/// Decoded fixed part of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub update_date: Date,
    pub num_records: u32,
    pub header_length: u16,
    pub record_length: u16,
    pub ldid: u8,
}

impl Header {
    /// Number of field descriptors declared by header length.
    #[inline]
    pub fn num_fields(&self) -> usize {
        (self.header_length as usize).saturating_sub(33) / 32
    }

    #[inline]
    pub fn for_schema(schema: &Schema, num_records: u32, ldid: u8, update_date: Date) -> Self {
        Header {
            update_date,
            num_records,
            header_length: schema.header_length() as u16,
            record_length: schema.record_length() as u16,
            ldid,
        }
    }
}

/// Read the 32-byte fixed header.
///
/// An invalid update date is replaced by the result of `fallback_date`.
pub fn read_header<R, F>(reader: &mut R, fallback_date: F) -> Result<Header>
where
    R: Read,
    F: FnOnce() -> Date,
{
    let mut raw = RawHeader::zeroed();
    reader.read_exact(bytemuck::bytes_of_mut(&mut raw))?;
    if raw.file_type != FILE_TYPE_DBASE3 {
        return Err(Error::UnsupportedFormat(raw.file_type));
    }
    let update_date = decode_date(raw.update).unwrap_or_else(fallback_date);
    let num_records = i32::from_le_bytes(raw.num_records);
    let header_length = u16::from_le_bytes(raw.header_length);
    let record_length = u16::from_le_bytes(raw.record_length);
    if num_records < 0 || header_length < 33 || record_length < 1 {
        return Err(Error::InvalidHeader);
    }
    Ok(Header {
        update_date,
        num_records: num_records as u32,
        header_length,
        record_length,
        ldid: raw.ldid,
    })
}

/// Read field descriptors following the fixed header.
/// Reader must be positioned right after the fixed header.
pub fn read_fields<R: Read>(reader: &mut R, header: &Header, encoding: TextEncoding) -> Result<Schema> {
    let n = header.num_fields();
    let mut fields = Vec::with_capacity(n);
    for _ in 0..n {
        let mut raw = RawField::zeroed();
        reader.read_exact(bytemuck::bytes_of_mut(&mut raw))?;
        if raw.name[0] == HEADER_TERMINATOR {
            // header length overstates the descriptor count
            break;
        }
        let name_len = raw
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(FIELD_NAME_LENGTH);
        let name = encoding.decode(&raw.name[..name_len]).trim().to_string();
        if raw.length == 0 {
            return Err(Error::InvalidFormat);
        }
        let ty = FieldType::from_tag(raw.ty);
        let decimal_count = raw.decimal_count.min(raw.length);
        fields.push(Field::new(name, ty, raw.length, decimal_count)?);
    }
    Ok(Schema::new(fields))
}

/// Write fixed header, field descriptors and terminator.
pub fn write_header<W: Write>(
    writer: &mut W,
    header: &Header,
    schema: &Schema,
    encoding: TextEncoding,
) -> Result<()> {
    write_fixed_header(writer, header)?;
    for f in schema.fields() {
        let mut raw = RawField::zeroed();
        let name = encoding.encode_bounded(&f.name, FIELD_NAME_LENGTH);
        raw.name[..name.len()].copy_from_slice(&name);
        raw.ty = f.ty.tag();
        raw.length = f.length;
        raw.decimal_count = f.decimal_count;
        writer.write_all(bytemuck::bytes_of(&raw))?;
    }
    writer.write_all(&[HEADER_TERMINATOR])?;
    Ok(())
}

/// Write the 32-byte fixed header only.
/// Used by in-place edits which change the record count.
pub fn write_fixed_header<W: Write>(writer: &mut W, header: &Header) -> Result<()> {
    let mut raw = RawHeader::zeroed();
    raw.file_type = FILE_TYPE_DBASE3;
    raw.update = encode_date(header.update_date);
    raw.num_records = (header.num_records as i32).to_le_bytes();
    raw.header_length = header.header_length.to_le_bytes();
    raw.record_length = header.record_length.to_le_bytes();
    raw.ldid = header.ldid;
    writer.write_all(bytemuck::bytes_of(&raw))?;
    Ok(())
}

#[inline]
fn decode_date(bs: [u8; 3]) -> Option<Date> {
    let month = Month::try_from(bs[1]).ok()?;
    Date::from_calendar_date(1900 + bs[0] as i32, month, bs[2]).ok()
}

#[inline]
fn encode_date(date: Date) -> [u8; 3] {
    let year = (date.year() - 1900).clamp(0, 255) as u8;
    [year, date.month() as u8, date.day()]
}

#[inline]
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}
