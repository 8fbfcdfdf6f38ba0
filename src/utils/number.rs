//! Brazilian-locale number handling and Latin-1 decoding for ANS files.

/// Parses raw ANS statement values: every `.` groups thousands and `,` is
/// the decimal mark, so `5.000` is five thousand.
pub fn parse_br_strict(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replace('.', "")
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parses `1.234.567,89` style values. Plain `1234.5` is accepted as well.
/// Only for the pipeline's own files, which always carry a decimal comma.
pub fn parse_br_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else if trimmed.matches('.').count() > 1 {
        trimmed.replace('.', "")
    } else {
        trimmed.to_string()
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Formats with a decimal comma and no thousands separator, two places.
pub fn format_br_decimal(value: f64) -> String {
    format!("{:.2}", value).replace('.', ",")
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Every Latin-1 byte maps to the Unicode code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
