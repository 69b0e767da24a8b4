//! Resolution of the text encoding of a table.
//!
//! The header carries a single language driver id (LDID) which maps to
//! a legacy codepage. A sidecar file next to the table may override it
//! with a numeric codepage or an encoding label such as `UTF-8`.
use crate::config::DbfConfig;
use encoding_rs::{EncoderResult, Encoding, UTF_8};
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Language driver id meaning "current ANSI codepage of the platform".
pub const LDID_ANSI: u8 = 0x57;

/// Text codec of character fields and field names.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding(&'static Encoding);

impl TextEncoding {
    #[inline]
    pub fn new(encoding: &'static Encoding) -> Self {
        TextEncoding(encoding)
    }

    #[inline]
    pub fn utf8() -> Self {
        TextEncoding(UTF_8)
    }

    #[inline]
    pub fn encoding(&self) -> &'static Encoding {
        self.0
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    #[inline]
    pub fn is_utf8(&self) -> bool {
        self.0 == UTF_8
    }

    /// Windows codepage number of this encoding, if there is one.
    #[inline]
    pub fn codepage(&self) -> Option<u16> {
        codepage::from_encoding(self.0)
    }

    #[inline]
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        let (s, _) = self.0.decode_without_bom_handling(bytes);
        s
    }

    /// Encode string. Characters the encoding cannot represent become `?`.
    pub fn encode<'a>(&self, s: &'a str) -> Cow<'a, [u8]> {
        if self.is_utf8() || (self.0.is_ascii_compatible() && s.is_ascii()) {
            return Cow::Borrowed(s.as_bytes());
        }
        let mut encoder = self.0.new_encoder();
        let mut res = Vec::with_capacity(
            encoder
                .max_buffer_length_from_utf8_without_replacement(s.len())
                .unwrap_or(s.len()),
        );
        let mut src = s;
        loop {
            let (result, read) =
                encoder.encode_from_utf8_to_vec_without_replacement(src, &mut res, true);
            src = &src[read..];
            match result {
                EncoderResult::InputEmpty => break,
                EncoderResult::OutputFull => {
                    let extra = encoder
                        .max_buffer_length_from_utf8_without_replacement(src.len())
                        .unwrap_or(src.len());
                    res.reserve(extra.max(16));
                }
                EncoderResult::Unmappable(_) => res.push(b'?'),
            }
        }
        Cow::Owned(res)
    }

    /// Encode string into at most `max_bytes` bytes.
    /// Characters are taken as whole units, so a multi-byte character is
    /// never split at the boundary.
    pub fn encode_bounded(&self, s: &str, max_bytes: usize) -> Vec<u8> {
        let all = self.encode(s);
        if all.len() <= max_bytes {
            return all.into_owned();
        }
        let mut res = Vec::with_capacity(max_bytes);
        let mut buf = [0u8; 4];
        for c in s.chars() {
            let bs = self.encode(c.encode_utf8(&mut buf));
            if res.len() + bs.len() > max_bytes {
                break;
            }
            res.extend_from_slice(&bs);
        }
        res
    }
}

impl fmt::Debug for TextEncoding {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextEncoding").field(&self.0.name()).finish()
    }
}

/// Resolve encoding of the table at given path.
///
/// The sidecar file wins if present and parseable. Otherwise the language
/// driver id is looked up, falling back to the configured default.
#[inline]
pub fn resolve(path: Option<&Path>, ldid: u8, config: &DbfConfig) -> TextEncoding {
    if let Some(enc) = path.and_then(|p| read_sidecar(p, config)) {
        return enc;
    }
    resolve_ldid(ldid, config)
}

/// Resolve encoding by language driver id only.
#[inline]
pub fn resolve_ldid(ldid: u8, config: &DbfConfig) -> TextEncoding {
    let cp = if ldid == LDID_ANSI {
        Some(config.ansi_codepage)
    } else {
        ldid_to_codepage(ldid)
    };
    match cp {
        Some(cp) => match codepage::to_encoding(cp) {
            Some(enc) => TextEncoding(enc),
            None => {
                log::warn!(
                    "codepage {} of language driver 0x{:02X} is not supported, use {}",
                    cp,
                    ldid,
                    config.default_encoding.name()
                );
                TextEncoding(config.default_encoding)
            }
        },
        None => TextEncoding(config.default_encoding),
    }
}

/// Choose language driver id to write for given encoding.
/// The current id is kept if it still resolves to the same encoding.
#[inline]
pub fn ldid_for(encoding: TextEncoding, current: u8, config: &DbfConfig) -> u8 {
    if current != 0 && resolve_ldid(current, config) == encoding {
        return current;
    }
    encoding
        .codepage()
        .and_then(codepage_to_ldid)
        .unwrap_or(0)
}

#[inline]
pub fn sidecar_path(path: &Path, config: &DbfConfig) -> PathBuf {
    path.with_extension(&config.sidecar_extension)
}

/// Read the sidecar codepage file. Any failure is treated as absence.
pub fn read_sidecar(path: &Path, config: &DbfConfig) -> Option<TextEncoding> {
    let lower = sidecar_path(path, config);
    let upper = path.with_extension(config.sidecar_extension.to_uppercase());
    let content = fs::read(&lower).or_else(|_| fs::read(&upper)).ok()?;
    let text = String::from_utf8_lossy(&content);
    let res = parse_sidecar(&text);
    if res.is_none() {
        log::debug!("ignore unparseable sidecar of {}: {:?}", path.display(), text.trim());
    }
    res
}

/// Parse content of sidecar file: a numeric codepage or an encoding label.
#[inline]
pub fn parse_sidecar(text: &str) -> Option<TextEncoding> {
    let token = text.lines().next()?.trim();
    if token.is_empty() {
        return None;
    }
    if token.eq_ignore_ascii_case("UTF-8") || token.eq_ignore_ascii_case("UTF8") {
        return Some(TextEncoding::utf8());
    }
    if let Ok(cp) = token.parse::<u16>() {
        return codepage::to_encoding(cp).map(TextEncoding);
    }
    Encoding::for_label(token.as_bytes()).map(TextEncoding)
}

/// Write sidecar declaring given encoding.
#[inline]
pub fn write_sidecar(path: &Path, encoding: TextEncoding, config: &DbfConfig) -> std::io::Result<()> {
    let content = if encoding.is_utf8() {
        Cow::Borrowed("UTF-8")
    } else {
        match encoding.codepage() {
            Some(cp) => Cow::Owned(cp.to_string()),
            None => Cow::Borrowed(encoding.name()),
        }
    };
    fs::write(sidecar_path(path, config), content.as_bytes())
}

/// Static table of language driver ids.
#[inline]
pub fn ldid_to_codepage(ldid: u8) -> Option<u16> {
    let cp = match ldid {
        0x01 | 0x09 | 0x0B | 0x0D | 0x0F | 0x11 | 0x15 | 0x18 | 0x19 | 0x1B => 437,
        0x02 | 0x0A | 0x0E | 0x10 | 0x12 | 0x14 | 0x16 | 0x1A | 0x1D | 0x25 | 0x37 => 850,
        0x03 | 0x58 | 0x59 => 1252,
        0x04 => 10000,
        0x08 | 0x17 | 0x66 => 865,
        0x13 | 0x7B => 932,
        0x1C | 0x6C => 863,
        0x1F | 0x22 | 0x23 | 0x40 | 0x64 | 0x87 => 852,
        0x24 => 860,
        0x26 | 0x65 => 866,
        0x4D | 0x7A => 936,
        0x4E | 0x79 => 949,
        0x4F | 0x78 => 950,
        0x50 | 0x7C => 874,
        0x67 => 861,
        0x6A | 0x86 => 737,
        0x6B | 0x88 => 857,
        0x96 => 10007,
        0x97 => 10029,
        0x98 => 10006,
        0xC8 => 1250,
        0xC9 => 1251,
        0xCA => 1254,
        0xCB => 1253,
        0xCC => 1257,
        _ => return None,
    };
    Some(cp)
}

/// Preferred language driver id of a codepage.
#[inline]
pub fn codepage_to_ldid(cp: u16) -> Option<u8> {
    let ldid = match cp {
        437 => 0x01,
        850 => 0x02,
        1252 => 0x03,
        10000 => 0x04,
        865 => 0x08,
        932 => 0x13,
        863 => 0x1C,
        852 => 0x64,
        860 => 0x24,
        866 => 0x65,
        936 => 0x4D,
        949 => 0x4E,
        950 => 0x4F,
        874 => 0x50,
        861 => 0x67,
        737 => 0x6A,
        857 => 0x6B,
        10007 => 0x96,
        10029 => 0x97,
        10006 => 0x98,
        1250 => 0xC8,
        1251 => 0xC9,
        1254 => 0xCA,
        1253 => 0xCB,
        1257 => 0xCC,
        _ => return None,
    };
    Some(ldid)
}
