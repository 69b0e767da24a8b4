use dbf_datatype::Decimal;

/// Fixed-width ASCII rendering of numeric fields.
///
/// Values are rounded half away from zero on their shortest decimal
/// representation, then right-justified and padded with spaces.
/// If the rendering does not fit, fractional digits are dropped first.
/// If the integral part alone is still too wide, the leftmost digits are
/// cut, the same as the integer path does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberConverter {
    length: usize,
    decimal_count: usize,
}

impl NumberConverter {
    #[inline]
    pub fn new(length: u8, decimal_count: u8) -> Self {
        NumberConverter {
            length: length as usize,
            decimal_count: decimal_count as usize,
        }
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn decimal_count(&self) -> usize {
        self.decimal_count
    }

    /// Render f64. Non-finite values render as blanks, which read back as null.
    #[inline]
    pub fn format_f64(&self, v: f64) -> Vec<u8> {
        if !v.is_finite() {
            return vec![b' '; self.length];
        }
        self.format_plain(&format!("{}", v))
    }

    #[inline]
    pub fn format_f32(&self, v: f32) -> Vec<u8> {
        if !v.is_finite() {
            return vec![b' '; self.length];
        }
        self.format_plain(&format!("{}", v))
    }

    #[inline]
    pub fn format_decimal(&self, d: &Decimal) -> Vec<u8> {
        self.format_plain(&d.to_string(-1))
    }

    /// Render plain decimal text such as `-12.345`.
    pub fn format_plain(&self, text: &str) -> Vec<u8> {
        let mut frac = self.decimal_count;
        let mut s = round_plain(text, frac);
        while s.len() > self.length && frac > 0 {
            frac -= 1;
            s = round_plain(text, frac);
        }
        right_justify(s.as_bytes(), self.length)
    }

    /// Locale-invariant parse of a field buffer.
    #[inline]
    pub fn parse_f64(&self, bytes: &[u8]) -> Option<f64> {
        std::str::from_utf8(bytes).ok()?.trim().parse().ok()
    }
}

/// Render integer right-justified in `length` bytes.
/// Digits that do not fit are cut from the left.
#[inline]
pub fn format_integer(v: i64, length: usize) -> Vec<u8> {
    right_justify(v.to_string().as_bytes(), length)
}

#[inline]
fn right_justify(bs: &[u8], length: usize) -> Vec<u8> {
    if bs.len() >= length {
        return bs[bs.len() - length..].to_vec();
    }
    let mut res = vec![b' '; length - bs.len()];
    res.extend_from_slice(bs);
    res
}

/// Round plain decimal text to `frac` fractional digits, half away from zero.
fn round_plain(text: &str, frac: usize) -> String {
    let text = text.trim();
    let (neg, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (intg, fr) = match unsigned.find('.') {
        Some(pos) => (&unsigned[..pos], &unsigned[pos + 1..]),
        None => (unsigned, ""),
    };
    let intg = if intg.is_empty() { "0" } else { intg };
    let mut digits: Vec<u8> = Vec::with_capacity(intg.len() + frac + 1);
    digits.extend_from_slice(intg.as_bytes());
    let fr = fr.as_bytes();
    for i in 0..frac {
        digits.push(fr.get(i).copied().unwrap_or(b'0'));
    }
    if fr.get(frac).map_or(false, |d| *d >= b'5') {
        // propagate carry from the last kept digit
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, b'1');
                break;
            }
            i -= 1;
            if digits[i] == b'9' {
                digits[i] = b'0';
            } else {
                digits[i] += 1;
                break;
            }
        }
    }
    let split = digits.len() - frac;
    let mut res = String::with_capacity(digits.len() + 2);
    let is_zero = digits.iter().all(|d| *d == b'0');
    if neg && !is_zero {
        res.push('-');
    }
    let intg_digits = &digits[..split];
    // strip redundant leading zeros, keeping at least one digit
    let lead = intg_digits
        .iter()
        .position(|d| *d != b'0')
        .unwrap_or(intg_digits.len().saturating_sub(1));
    res.extend(intg_digits[lead..].iter().map(|d| *d as char));
    if frac > 0 {
        res.push('.');
        res.extend(digits[split..].iter().map(|d| *d as char));
    }
    res
}
