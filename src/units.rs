//! Unit conversions for raw chain constants and small number formatters.

/// Bytes per decimal petabyte.
pub const BYTES_PER_PB: f64 = 1e15;
/// Bytes per decimal gigabyte.
pub const BYTES_PER_GB: f64 = 1e9;
/// Smallest units per whole token (18 decimals).
pub const UNITS_PER_TOKEN: f64 = 1e18;

pub const SECS_PER_DAY: u64 = 86_400;

pub fn bytes_to_pb(bytes: f64) -> f64 {
    bytes / BYTES_PER_PB
}

pub fn bytes_to_gb(bytes: f64) -> f64 {
    bytes / BYTES_PER_GB
}

pub fn units_to_tokens(units: f64) -> f64 {
    units / UNITS_PER_TOKEN
}

/// Round half away from zero to three decimals.
pub fn round3(x: f64) -> f64 {
    (x * 1_000.0).round() / 1_000.0
}

/// `1234567` → `"1,234,567"`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_separator() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(812_345_678), "812,345,678");
    }

    #[test]
    fn rounding_to_three_places() {
        assert_eq!(round3(1.23449), 1.234);
        assert_eq!(round3(-0.0006), -0.001);
        assert_eq!(round3(2.0), 2.0);
    }
}
