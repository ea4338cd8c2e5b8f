//! Human readable byte sizes.

use serde::{Deserialize, Serialize};

/// Options for [`format_size`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeOptions {
    /// Maximum number of decimal places; trailing zeros are dropped.
    pub decimals: usize,
    /// Step between units, usually 1024 or 1000.
    pub base: f64,
    /// Ascending unit names.
    pub sizes: Vec<String>,
}

impl Default for SizeOptions {
    fn default() -> Self {
        Self {
            decimals: 2,
            base: 1024.0,
            sizes: ["Bytes", "KB", "MB", "GB", "TB"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Format a raw number of bytes, e.g. `1536` as `1.5 KB`.
///
/// Values beyond the largest unit are expressed in that unit; values below
/// one byte use the smallest.
pub fn format_size(bytes: f64, options: &SizeOptions) -> String {
    if bytes == 0.0 {
        return "0 Bytes".to_string();
    }

    let max_index = options.sizes.len().saturating_sub(1);
    let exponent = (bytes.abs().ln() / options.base.ln()).floor();
    let index = if exponent.is_finite() && exponent > 0.0 {
        (exponent as usize).min(max_index)
    } else {
        0
    };

    let value = bytes / options.base.powi(index as i32);
    let unit = options.sizes.get(index).map(String::as_str).unwrap_or("");
    format!("{} {}", trim_decimals(value, options.decimals), unit)
}

/// Round to `decimals` places and drop trailing zeros.
fn trim_decimals(value: f64, decimals: usize) -> String {
    let fixed = format!("{value:.decimals$}");
    if !fixed.contains('.') {
        return fixed;
    }
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, "0 Bytes")]
    #[case(1.0, "1 Bytes")]
    #[case(512.0, "512 Bytes")]
    #[case(1024.0, "1 KB")]
    #[case(1536.0, "1.5 KB")]
    #[case(1_048_576.0, "1 MB")]
    #[case(1_234_567.0, "1.18 MB")]
    #[case(5_368_709_120.0, "5 GB")]
    fn test_default_options(#[case] bytes: f64, #[case] expected: &str) {
        assert_eq!(format_size(bytes, &SizeOptions::default()), expected);
    }

    #[test]
    fn test_clamps_to_largest_unit() {
        let bytes = 1024f64.powi(5);
        assert_eq!(format_size(bytes, &SizeOptions::default()), "1024 TB");
    }

    #[test]
    fn test_fractional_bytes_use_smallest_unit() {
        assert_eq!(format_size(0.5, &SizeOptions::default()), "0.5 Bytes");
    }

    #[test]
    fn test_decimal_base_and_precision() {
        let options = SizeOptions {
            decimals: 1,
            base: 1000.0,
            sizes: vec!["B".into(), "kB".into(), "MB".into()],
        };
        assert_eq!(format_size(1_260_000.0, &options), "1.3 MB");
        assert_eq!(format_size(999.0, &options), "999 B");
    }

    #[test]
    fn test_options_from_json() {
        let options: SizeOptions = serde_json::from_str(r#"{"decimals": 0}"#).unwrap();
        assert_eq!(options.base, 1024.0);
        assert_eq!(format_size(1536.0, &options), "2 KB");
    }
}
