use std::collections::HashSet;
use std::io::{Read, Write};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Serialize;

use crate::db::Database;
use crate::models::{
    Expense, NewExpense, categorize_label, slot_for_label, split_label, validate_amount,
};

/// A single row parsed from an expense CSV.
#[derive(Debug, Clone)]
pub struct CsvRow {
    pub date: String,
    pub meal: String,
    pub amount: f64,
}

/// Summary of what an import would do / did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub dry_run: bool,
    pub rows_parsed: usize,
    pub saved: usize,
    pub cleared: usize,
    pub dates_spanned: usize,
}

/// Write rows as `Date,Meal,Amount` with the labels and amounts exactly as stored.
pub fn write_csv<W: Write>(writer: W, expenses: &[Expense]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["Date", "Meal", "Amount"])?;
    for e in expenses {
        wtr.write_record([
            e.date.format("%Y-%m-%d").to_string(),
            e.label.clone(),
            e.amount.to_string(),
        ])?;
    }
    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Parse an expense CSV from any reader.
///
/// Expected header: `Date,Meal,Amount` (any order, case-insensitive, extra
/// columns ignored).
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<CsvRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();
    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };

    let idx_date = col("Date").context("Missing required column: Date")?;
    let idx_meal = col("Meal").context("Missing required column: Meal")?;
    let idx_amount = col("Amount").context("Missing required column: Amount")?;

    let mut rows = Vec::new();

    for (line_num, result) in rdr.records().enumerate() {
        let line = line_num + 2;
        let record = result.with_context(|| format!("Failed to parse CSV row {line}"))?;

        let date = record.get(idx_date).unwrap_or("").to_string();
        let meal = record.get(idx_meal).unwrap_or("").to_string();
        let amount_str = record.get(idx_amount).unwrap_or("");

        if date.is_empty() && meal.is_empty() && amount_str.is_empty() {
            continue;
        }

        let amount: f64 = amount_str
            .trim_start_matches('₹')
            .replace(',', "")
            .trim()
            .parse()
            .with_context(|| format!("Invalid amount '{amount_str}' on row {line}"))?;

        rows.push(CsvRow { date, meal, amount });
    }

    Ok(rows)
}

/// Accepts `YYYY-MM-DD` and `MM/DD/YYYY`.
fn normalize_date(raw: &str) -> Result<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%m/%d/%Y") {
        return Ok(d);
    }
    bail!("Unrecognized date format: '{raw}'. Expected YYYY-MM-DD or MM/DD/YYYY")
}

/// Import parsed rows through the slot upsert, so a later row for the same
/// (date, meal) replaces an earlier one. Every row is checked before anything
/// is written, and the writes share one transaction. When `dry_run` is true
/// nothing is written.
pub fn import_rows(db: &Database, rows: &[CsvRow], dry_run: bool) -> Result<ImportSummary> {
    let mut summary = ImportSummary {
        dry_run,
        rows_parsed: rows.len(),
        ..ImportSummary::default()
    };
    let mut dates: HashSet<NaiveDate> = HashSet::new();
    let mut entries = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let date = normalize_date(&row.date).with_context(|| format!("Row {}", i + 2))?;
        validate_amount(row.amount).with_context(|| format!("Row {}", i + 2))?;
        dates.insert(date);

        if row.amount > 0.0 {
            summary.saved += 1;
        } else {
            summary.cleared += 1;
        }
        entries.push(NewExpense {
            date,
            meal: slot_for_label(&row.meal).unwrap_or_else(|| categorize_label(&row.meal)),
            amount: row.amount,
            note: split_label(&row.meal),
        });
    }

    if !dry_run {
        db.upsert_meals(&entries)?;
    }

    summary.dates_spanned = dates.len();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Meal;

    const SAMPLE_CSV: &str = "\
Date,Meal,Amount
2025-09-01,Breakfast,40
2025-09-01,Lunch,120.50
2025-09-01,Other: chai,15
09/02/2025,Evening,\"1,200\"

2025-09-03,Dinner,0
";

    #[test]
    fn test_parse_csv_basic() {
        let rows = parse_csv(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].date, "2025-09-01");
        assert_eq!(rows[0].meal, "Breakfast");
        assert!((rows[1].amount - 120.5).abs() < f64::EPSILON);
        assert_eq!(rows[2].meal, "Other: chai");
        assert!((rows[3].amount - 1200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_csv_missing_column() {
        let bad = "Date,Amount\n2025-09-01,10\n";
        let err = parse_csv(bad.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Meal"));
    }

    #[test]
    fn test_parse_csv_invalid_amount() {
        let bad = "Date,Meal,Amount\n2025-09-01,Lunch,lots\n";
        let err = parse_csv(bad.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_export_keeps_full_precision() {
        let source = Database::open_in_memory().unwrap();
        let csv = "Date,Meal,Amount\n2025-09-01,Lunch,10.125\n";
        import_rows(&source, &parse_csv(csv.as_bytes()).unwrap(), false).unwrap();

        let mut buf = Vec::new();
        write_csv(&mut buf, &source.all_expenses().unwrap()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("2025-09-01,Lunch,10.125\n"));

        let target = Database::open_in_memory().unwrap();
        import_rows(&target, &parse_csv(text.as_bytes()).unwrap(), false).unwrap();
        assert_eq!(target.all_expenses().unwrap()[0].amount, 10.125);
    }

    #[test]
    fn test_import_bad_row_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let csv = "Date,Meal,Amount\n2025-09-01,Lunch,100\n2025-09-02,Dinner,80\nsomeday,Lunch,5\n";
        let rows = parse_csv(csv.as_bytes()).unwrap();

        let err = import_rows(&db, &rows, false).unwrap_err();
        assert!(format!("{err:#}").contains("Row 4"));
        assert!(db.all_expenses().unwrap().is_empty());
    }

    #[test]
    fn test_import_other_note_with_meal_keyword_keeps_note() {
        let db = Database::open_in_memory().unwrap();
        let csv = "Date,Meal,Amount\n2025-09-01,Other: dinner leftovers,60\n";
        import_rows(&db, &parse_csv(csv.as_bytes()).unwrap(), false).unwrap();

        let all = db.all_expenses().unwrap();
        assert_eq!(all[0].label, "Other: dinner leftovers");
        assert_eq!(all[0].meal, Meal::Other);
    }

    #[test]
    fn test_normalize_date() {
        let expected = NaiveDate::from_ymd_opt(2025, 9, 2).unwrap();
        assert_eq!(normalize_date("2025-09-02").unwrap(), expected);
        assert_eq!(normalize_date("09/02/2025").unwrap(), expected);
        assert!(normalize_date("2 Sept").is_err());
    }

    #[test]
    fn test_import_dry_run_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let rows = parse_csv(SAMPLE_CSV.as_bytes()).unwrap();
        let summary = import_rows(&db, &rows, true).unwrap();

        assert!(summary.dry_run);
        assert_eq!(summary.rows_parsed, 5);
        assert_eq!(summary.saved, 4);
        assert_eq!(summary.cleared, 1);
        assert_eq!(summary.dates_spanned, 3);
        assert!(db.all_expenses().unwrap().is_empty());
    }

    #[test]
    fn test_import_normalizes_labels() {
        let db = Database::open_in_memory().unwrap();
        let rows = parse_csv(SAMPLE_CSV.as_bytes()).unwrap();
        import_rows(&db, &rows, false).unwrap();

        let sept2 = NaiveDate::from_ymd_opt(2025, 9, 2).unwrap();
        let dinner = db.get_meal(sept2, Meal::Dinner).unwrap().unwrap();
        assert_eq!(dinner.label, "Dinner");
        assert!((dinner.amount - 1200.0).abs() < f64::EPSILON);

        let sept1 = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let other = db.get_meal(sept1, Meal::Other).unwrap().unwrap();
        assert_eq!(other.label, "Other: chai");
        assert_eq!(db.all_expenses().unwrap().len(), 4);
    }

    #[test]
    fn test_import_later_rows_replace_earlier() {
        let db = Database::open_in_memory().unwrap();
        let csv = "Date,Meal,Amount\n2025-09-01,Lunch,100\n2025-09-01,Afternoon,80\n";
        let rows = parse_csv(csv.as_bytes()).unwrap();
        import_rows(&db, &rows, false).unwrap();

        let all = db.all_expenses().unwrap();
        assert_eq!(all.len(), 1);
        assert!((all[0].amount - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_export_then_import_preserves_rows() {
        let source = Database::open_in_memory().unwrap();
        let rows = parse_csv(SAMPLE_CSV.as_bytes()).unwrap();
        import_rows(&source, &rows, false).unwrap();

        let mut buf = Vec::new();
        write_csv(&mut buf, &source.all_expenses().unwrap()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Date,Meal,Amount\n"));
        assert!(text.contains("2025-09-01,Other: chai,15\n"));

        let target = Database::open_in_memory().unwrap();
        let reparsed = parse_csv(text.as_bytes()).unwrap();
        import_rows(&target, &reparsed, false).unwrap();
        assert_eq!(target.all_expenses().unwrap().len(), 4);
    }
}
