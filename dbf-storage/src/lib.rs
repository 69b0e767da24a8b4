//! Attribute table engine for dBASE III files.
//!
//! A table consists of a fixed header, field descriptors and fixed-length
//! text records. Rows are read either fully into a columnar [`DataTable`],
//! by pages, or edited in place. Removed rows remain in the file as
//! tombstones until the table is saved.
pub mod config;
pub mod data;
pub mod deletion;
pub mod encoding;
pub mod error;
pub mod field;
pub mod header;
pub mod number;
pub mod progress;
pub mod record;
pub mod table;

pub use config::DbfConfig;
pub use data::{ConversionFailure, DataTable};
pub use deletion::DeletionIndex;
pub use encoding::TextEncoding;
pub use error::{Error, Result};
pub use field::{Field, FieldType, Schema};
pub use progress::{NoProgress, ProgressSink};
pub use record::{RecordCodec, Row};
pub use table::{AttributeTable, EditAction, EditSession};

pub use dbf_datatype::{Value, ValueType};
