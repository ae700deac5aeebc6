use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;

use tiffin_core::models::validate_amount;

pub(crate) const CURRENCY: &str = "₹";

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Parse a month reference into a date inside that month.
/// Accepts "2025-09", any full date form [`parse_date`] accepts, or nothing for today.
pub(crate) fn parse_month(month: Option<String>) -> Result<NaiveDate> {
    match month {
        Some(s) if s.len() == 7 && s.as_bytes().get(4) == Some(&b'-') => {
            NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
                .with_context(|| format!("Invalid month '{s}'. Use YYYY-MM"))
        }
        other => parse_date(other),
    }
}

/// Parse an amount like "120", "85.50", "₹1,200". Zero is allowed (it clears a slot).
pub(crate) fn parse_amount(s: &str) -> Result<f64> {
    let cleaned = s.trim().trim_start_matches(CURRENCY).replace(',', "");
    let value: f64 = cleaned
        .trim()
        .parse()
        .with_context(|| format!("Invalid amount: '{s}'. Use a number like '120' or '85.50'"))?;
    validate_amount(value)?;
    Ok(value)
}

pub(crate) fn format_money(v: f64) -> String {
    let v = no_neg_zero(v);
    format!("{CURRENCY}{v:.2}")
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// Render a horizontal bar chart, one line per `(label, value)`.
/// Bars are scaled so the largest value spans `width` cells.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation
)]
pub(crate) fn bar_chart(rows: &[(String, f64)], width: usize) -> Vec<String> {
    let max = rows.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    let label_width = rows.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);

    rows.iter()
        .map(|(label, value)| {
            let cells = if max > 0.0 {
                ((value / max) * width as f64).round() as usize
            } else {
                0
            };
            // Never draw an empty bar for a non-zero value
            let cells = if *value > 0.0 { cells.max(1) } else { 0 };
            let pad = label_width - label.chars().count();
            format!(
                "  {label}{:pad$} │{} {}",
                "",
                "█".repeat(cells),
                format_money(*value)
            )
        })
        .collect()
}

pub(crate) fn ensure_nonempty_update(
    amount: Option<&str>,
    meal: Option<&str>,
    date: Option<&String>,
    note: Option<&String>,
) -> Result<()> {
    if amount.is_none() && meal.is_none() && date.is_none() && note.is_none() {
        bail!("Nothing to update. Provide at least one of --amount, --meal, --date, or --note");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
        assert_eq!(
            parse_date(Some("tomorrow".to_string())).unwrap(),
            today + chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2025-09-01".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
    }

    #[test]
    fn test_parse_month() {
        let sept = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        assert_eq!(parse_month(Some("2025-09".to_string())).unwrap(), sept);
        assert_eq!(
            parse_month(Some("2025-09-17".to_string())).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 17).unwrap()
        );
        assert_eq!(parse_month(None).unwrap(), Local::now().date_naive());
        assert!(parse_month(Some("2025-13".to_string())).is_err());
        assert!(parse_month(Some("Sept".to_string())).is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert!((parse_amount("120").unwrap() - 120.0).abs() < f64::EPSILON);
        assert!((parse_amount("85.50").unwrap() - 85.5).abs() < f64::EPSILON);
        assert!((parse_amount("₹1,200").unwrap() - 1200.0).abs() < f64::EPSILON);
        assert!((parse_amount(" 0 ").unwrap()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_amount_invalid() {
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("-5").is_err());
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(120.0), "₹120.00");
        assert_eq!(format_money(85.456), "₹85.46");
        assert_eq!(format_money(-0.0), "₹0.00");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("Other: masala dosa", 10), "Other: ...");
        assert_eq!(truncate("Crème brûlée", 10), "Crème b...");
    }

    #[test]
    fn test_bar_chart_scales_to_largest() {
        let rows = vec![
            ("Lunch".to_string(), 200.0),
            ("Breakfast".to_string(), 100.0),
            ("Other".to_string(), 1.0),
        ];
        let lines = bar_chart(&rows, 10);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].matches('█').count(), 10);
        assert_eq!(lines[1].matches('█').count(), 5);
        assert_eq!(lines[2].matches('█').count(), 1);
        assert!(lines[0].starts_with("  Lunch     │"));
        assert!(lines[1].ends_with("₹100.00"));
    }

    #[test]
    fn test_bar_chart_all_zero() {
        let rows = vec![("Lunch".to_string(), 0.0)];
        let lines = bar_chart(&rows, 10);
        assert_eq!(lines[0].matches('█').count(), 0);
    }

    #[test]
    fn test_ensure_nonempty_update() {
        assert!(ensure_nonempty_update(None, None, None, None).is_err());
        assert!(ensure_nonempty_update(Some("10"), None, None, None).is_ok());
    }
}
