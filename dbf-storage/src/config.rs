use encoding_rs::{Encoding, WINDOWS_1252};

/// Options of the attribute engine.
///
/// The configuration is passed explicitly to every table, so different
/// tables in one process may resolve text encodings differently.
#[derive(Debug, Clone)]
pub struct DbfConfig {
    /// Encoding used when neither sidecar nor language driver id resolves.
    pub default_encoding: &'static Encoding,
    /// Codepage used for language driver id 0x57 ("current ANSI").
    pub ansi_codepage: u16,
    /// Extension of the sidecar codepage file, without leading dot.
    pub sidecar_extension: String,
    /// Append 0x1A after the last record on save.
    pub write_eof_marker: bool,
    /// Write sidecar codepage file on save if the encoding has no
    /// language driver id.
    pub write_sidecar: bool,
}

impl Default for DbfConfig {
    #[inline]
    fn default() -> Self {
        DbfConfig {
            default_encoding: WINDOWS_1252,
            ansi_codepage: 1252,
            sidecar_extension: String::from("cpg"),
            write_eof_marker: true,
            write_sidecar: true,
        }
    }
}

impl DbfConfig {
    #[inline]
    pub fn default_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.default_encoding = encoding;
        self
    }

    #[inline]
    pub fn ansi_codepage(mut self, codepage: u16) -> Self {
        self.ansi_codepage = codepage;
        self
    }

    #[inline]
    pub fn sidecar_extension(mut self, ext: impl Into<String>) -> Self {
        self.sidecar_extension = ext.into();
        self
    }

    #[inline]
    pub fn write_eof_marker(mut self, write: bool) -> Self {
        self.write_eof_marker = write;
        self
    }

    #[inline]
    pub fn write_sidecar(mut self, write: bool) -> Self {
        self.write_sidecar = write;
        self
    }
}
