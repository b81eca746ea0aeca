//! Human-readable rendering of parameter values.
//!
//! `format_parameter_value` detects the kind of unit and dispatches to
//! the currency, percentage, multiplier, duration or plain-number
//! formatter. All formatters use at most a fixed number of decimals and
//! trim trailing zeros, so `27.10` prints as `27.1` and `27.00` as `27`.

use crate::model::Parameter;

/// Coarse classification of a unit string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Currency,
    Percentage,
    Multiplier,
    Duration,
    Count,
    Dimensionless,
}

const DURATION_UNITS: &[&str] = &[
    "year", "years", "month", "months", "week", "weeks", "day", "days", "hour", "hours",
];

/// Classify `unit`. Anything non-empty that is not money, a rate, a
/// multiplier or a duration is a count (`deaths`, `QALYs`, `patients`, ...).
pub fn detect_unit_kind(unit: &str) -> UnitKind {
    let lower = unit.trim().to_ascii_lowercase();
    if lower.is_empty() {
        return UnitKind::Dimensionless;
    }
    if lower.starts_with("usd") || lower.starts_with('$') || lower.contains("dollar") {
        return UnitKind::Currency;
    }
    if lower.starts_with('%') || lower.contains("percent") || lower == "rate" {
        return UnitKind::Percentage;
    }
    if matches!(lower.as_str(), "x" | "ratio" | "multiplier" | "roi") {
        return UnitKind::Multiplier;
    }
    let base = lower.split('/').next().unwrap_or("").trim();
    if DURATION_UNITS.contains(&base) {
        return UnitKind::Duration;
    }
    UnitKind::Count
}

/// Format `value` according to the kind of `unit`.
///
/// ```
/// use dih_params::format_parameter_value;
/// assert_eq!(format_parameter_value(27_180_000_000.0, "USD"), "$27.18B");
/// assert_eq!(format_parameter_value(0.125, "%"), "12.5%");
/// assert_eq!(format_parameter_value(55_000_000.0, "deaths"), "55 million");
/// ```
pub fn format_parameter_value(value: f64, unit: &str) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }
    match detect_unit_kind(unit) {
        UnitKind::Currency => format_currency(value),
        UnitKind::Percentage => format_percentage(value),
        UnitKind::Multiplier => format_multiplier(value),
        UnitKind::Duration => {
            let base = unit.split('/').next().unwrap_or(unit).trim();
            format_duration(value, base)
        }
        UnitKind::Count | UnitKind::Dimensionless => format_number(value),
    }
}

/// `$` amounts scaled to K/M/B/T.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }
    const SCALES: &[(f64, &str)] = &[(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];
    let abs = value.abs();
    let body = match scaled(abs, SCALES, 2) {
        Some((digits, suffix)) => format!("${digits}{suffix}"),
        None if abs.fract() == 0.0 => format!("${abs:.0}"),
        None => {
            let cents = format!("{abs:.2}");
            if cents == "1000.00" {
                "$1K".to_string()
            } else {
                format!("${cents}")
            }
        }
    };
    format!("{}{body}", sign(value, &body))
}

/// Percent with one decimal. Values with magnitude at most 1 are fractions.
pub fn format_percentage(value: f64) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }
    let pct = if value.abs() <= 1.0 { value * 100.0 } else { value };
    format!("{}%", trim_decimals(pct, 1))
}

/// Plain numbers: million/billion/trillion words, thousands separators below.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }
    const SCALES: &[(f64, &str)] = &[(1e12, " trillion"), (1e9, " billion"), (1e6, " million")];
    let abs = value.abs();
    let body = match scaled(abs, SCALES, 2) {
        Some((digits, suffix)) => format!("{digits}{suffix}"),
        None => {
            let digits = trim_decimals(abs, 2);
            if digits == "1000000" {
                "1 million".to_string()
            } else {
                group_thousands(&digits)
            }
        }
    };
    format!("{}{body}", sign(value, &body))
}

/// `463x`, `2.5x`.
pub fn format_multiplier(value: f64) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }
    format!("{}x", trim_decimals(value, 1))
}

/// `2.5 years`, `1 year`.
pub fn format_duration(value: f64, unit: &str) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }
    let digits = trim_decimals(value, 2);
    let unit = if digits == "1" {
        unit.strip_suffix('s').unwrap_or(unit)
    } else {
        unit
    };
    format!("{digits} {unit}")
}

/// `low–high` for a parameter's confidence interval, if it has one.
pub fn format_confidence_interval(param: &Parameter) -> Option<String> {
    param.confidence_interval.map(|(low, high)| {
        format!(
            "{}–{}",
            format_parameter_value(low, &param.unit),
            format_parameter_value(high, &param.unit)
        )
    })
}

/// Pick the largest scale `abs` reaches and format the scaled digits.
/// Rounding that reaches 1000 moves up one scale (`999.999K` → `1M`).
fn scaled(abs: f64, scales: &[(f64, &'static str)], decimals: usize) -> Option<(String, &'static str)> {
    let idx = scales.iter().position(|&(div, _)| abs >= div)?;
    let (div, suffix) = scales[idx];
    let digits = trim_decimals(abs / div, decimals);
    if idx > 0 && digits.parse::<f64>().is_ok_and(|d| d >= 1000.0) {
        let (bigger, bigger_suffix) = scales[idx - 1];
        return Some((trim_decimals(abs / bigger, decimals), bigger_suffix));
    }
    Some((digits, suffix))
}

/// Fixed decimals with trailing zeros (and a bare `.`) removed.
fn trim_decimals(value: f64, decimals: usize) -> String {
    let mut s = format!("{value:.decimals$}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

/// `-` for negative values unless the displayed digits round to zero.
fn sign(value: f64, displayed: &str) -> &'static str {
    if value < 0.0 && displayed.bytes().any(|b| matches!(b, b'1'..=b'9')) {
        "-"
    } else {
        ""
    }
}

/// Insert `,` every three digits of the integer part.
fn group_thousands(digits: &str) -> String {
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    let mut out = String::with_capacity(int_part.len() + int_part.len() / 3 + 4);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_unit_kind() {
        assert_eq!(detect_unit_kind("USD"), UnitKind::Currency);
        assert_eq!(detect_unit_kind("USD/year"), UnitKind::Currency);
        assert_eq!(detect_unit_kind("$"), UnitKind::Currency);
        assert_eq!(detect_unit_kind("dollars per QALY"), UnitKind::Currency);
        assert_eq!(detect_unit_kind("%"), UnitKind::Percentage);
        assert_eq!(detect_unit_kind("percentage"), UnitKind::Percentage);
        assert_eq!(detect_unit_kind("rate"), UnitKind::Percentage);
        assert_eq!(detect_unit_kind("x"), UnitKind::Multiplier);
        assert_eq!(detect_unit_kind("ROI"), UnitKind::Multiplier);
        assert_eq!(detect_unit_kind("years"), UnitKind::Duration);
        assert_eq!(detect_unit_kind("deaths/year"), UnitKind::Count);
        assert_eq!(detect_unit_kind("QALYs"), UnitKind::Count);
        assert_eq!(detect_unit_kind(""), UnitKind::Dimensionless);
    }

    #[test]
    fn test_trim_decimals() {
        assert_eq!(trim_decimals(27.18, 2), "27.18");
        assert_eq!(trim_decimals(27.10, 2), "27.1");
        assert_eq!(trim_decimals(27.0, 2), "27");
        assert_eq!(trim_decimals(-0.001, 2), "0");
        assert_eq!(trim_decimals(100.0, 0), "100");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("1234567"), "1,234,567");
        assert_eq!(group_thousands("123"), "123");
        assert_eq!(group_thousands("1234.5"), "1,234.5");
    }

    #[test]
    fn test_scale_rollover() {
        assert_eq!(format_currency(999_999.0), "$1M");
        assert_eq!(format_currency(999.999), "$1K");
        assert_eq!(format_number(999_999_999.0), "1 billion");
        assert_eq!(format_number(999_999.999), "1 million");
    }
}
