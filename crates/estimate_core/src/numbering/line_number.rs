//! Display code formatting for change-order lines.

/// Code rendered when either half of the number is unknown.
pub const CO_CODE_FALLBACK: &str = "CO";

/// Formats a change-order display code, e.g. `15` and `2` as `15-CO2`.
pub fn format_co_line_number(source_line_no: Option<u32>, co_sequence_no: Option<u32>) -> String {
    match (source_line_no, co_sequence_no) {
        (Some(line_no), Some(sequence_no)) => format!("{line_no}-CO{sequence_no}"),
        _ => CO_CODE_FALLBACK.to_string(),
    }
}
