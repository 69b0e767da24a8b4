use dbf_datatype::error::Error as DataTypeError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported file type 0x{0:02X}")]
    UnsupportedFormat(u8),
    #[error("Unsupported field type '{0}'")]
    UnsupportedFieldType(char),
    #[error("Numeric overflow in field {field}: '{text}'")]
    NumericOverflow { field: String, text: String },
    #[error("Invalid header")]
    InvalidHeader,
    #[error("Invalid format")]
    InvalidFormat,
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("File already exists: {0}")]
    FileExists(PathBuf),
    #[error("Table is not bound to a file")]
    NoFile,
    #[error("Record layout differs from file, save first")]
    LayoutChanged,
    #[error("Row out of bound({0})")]
    RowOutOfBound(usize),
    #[error("Field not found: {0}")]
    FieldNotFound(String),
    #[error("Invalid field: {0}")]
    InvalidField(String),
    #[error("Data type error: {0}")]
    DataType(DataTypeError),
    #[error("IO Error: {0}")]
    IOError(std::io::Error),
}

impl From<DataTypeError> for Error {
    #[inline]
    fn from(src: DataTypeError) -> Self {
        Error::DataType(src)
    }
}

impl From<std::io::Error> for Error {
    #[inline]
    fn from(src: std::io::Error) -> Self {
        Error::IOError(src)
    }
}
