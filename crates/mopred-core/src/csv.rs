//! CSV cell formatting shared by the event log and the metrics ledger.

/// Quotes `value` when it holds a comma, quote or newline.
pub fn field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Six decimals, or an empty cell for `None`.
pub fn optional_float(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}
