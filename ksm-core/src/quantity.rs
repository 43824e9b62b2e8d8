use crate::errors::*;

err_impl! {QuantityError,
    #[error("malformed Kubernetes quantity: {0}")]
    Malformed(String),
}

/// Parses a Kubernetes resource quantity string (milli `m`, binarySI `Ki/Mi/Gi/...`,
/// decimalSI `k/M/G/...`, or a bare number) into an approximate `f64` (spec 4.G,
/// S3: `"250m"` -> 0.25, `"5Gi"` -> 5368709120).
pub fn parse_quantity(raw: &str) -> anyhow::Result<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!(QuantityError::malformed(raw));
    }

    if let Some(digits) = raw.strip_suffix('m') {
        return digits.parse::<f64>().map(|v| v / 1000.0).map_err(|_| QuantityError::malformed(raw));
    }

    const BINARY_SUFFIXES: &[(&str, f64)] =
        &[("Ki", 1024.0), ("Mi", 1_048_576.0), ("Gi", 1_073_741_824.0), ("Ti", 1_099_511_627_776.0), ("Pi", 1_125_899_906_842_624.0), ("Ei", 1_152_921_504_606_846_976.0)];
    for (suffix, multiplier) in BINARY_SUFFIXES {
        if let Some(digits) = raw.strip_suffix(suffix) {
            return digits.parse::<f64>().map(|v| v * multiplier).map_err(|_| QuantityError::malformed(raw));
        }
    }

    const DECIMAL_SUFFIXES: &[(&str, f64)] =
        &[("k", 1e3), ("M", 1e6), ("G", 1e9), ("T", 1e12), ("P", 1e15), ("E", 1e18)];
    for (suffix, multiplier) in DECIMAL_SUFFIXES {
        if let Some(digits) = raw.strip_suffix(suffix) {
            return digits.parse::<f64>().map(|v| v * multiplier).map_err(|_| QuantityError::malformed(raw));
        }
    }

    raw.parse::<f64>().map_err(|_| QuantityError::malformed(raw))
}
