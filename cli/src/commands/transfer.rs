use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};

use tiffin_core::csv_io::{import_rows, parse_csv, write_csv};
use tiffin_core::db::Database;

pub(crate) fn cmd_export(db: &Database, output: Option<&Path>) -> Result<()> {
    let mut expenses = db.all_expenses()?;
    // Oldest first reads better in a spreadsheet
    expenses.reverse();

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create file: {}", path.display()))?;
            write_csv(file, &expenses)?;
            let count = expenses.len();
            eprintln!("Exported {count} entries to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write_csv(&mut lock, &expenses)?;
            lock.flush()?;
        }
    }

    Ok(())
}

pub(crate) fn cmd_import(db: &Database, path: &Path, dry_run: bool, json: bool) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let rows = parse_csv(file)?;

    if rows.is_empty() {
        if json {
            println!(
                "{}",
                serde_json::json!({ "error": "No rows found in CSV file" })
            );
        } else {
            eprintln!("No rows found in CSV file.");
        }
        return Ok(());
    }

    let summary = import_rows(db, &rows, dry_run)?;
    tracing::info!(
        rows = summary.rows_parsed,
        saved = summary.saved,
        dry_run,
        "csv import finished"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if dry_run {
        println!("Dry run — no changes made.\n");
        println!("  Rows parsed:    {}", summary.rows_parsed);
        println!("  Entries to save: {}", summary.saved);
        println!("  Slots to clear: {}", summary.cleared);
        println!("  Dates spanned:  {}", summary.dates_spanned);
    } else {
        println!("Import complete.\n");
        println!("  Rows parsed:    {}", summary.rows_parsed);
        println!("  Entries saved:  {}", summary.saved);
        println!("  Slots cleared:  {}", summary.cleared);
        println!("  Dates spanned:  {}", summary.dates_spanned);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_to_file_and_import_back() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("expenses.csv");

        let source = Database::open_in_memory().unwrap();
        let csv = "Date,Meal,Amount\n2025-09-01,Lunch,120\n2025-09-02,Morning,40\n";
        let rows = parse_csv(csv.as_bytes()).unwrap();
        import_rows(&source, &rows, false).unwrap();

        cmd_export(&source, Some(&csv_path)).unwrap();
        let written = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "Date,Meal,Amount");
        assert_eq!(lines[1], "2025-09-01,Lunch,120");
        assert_eq!(lines[2], "2025-09-02,Breakfast,40");

        let target = Database::open_in_memory().unwrap();
        cmd_import(&target, &csv_path, false, true).unwrap();
        assert_eq!(target.all_expenses().unwrap().len(), 2);
    }

    #[test]
    fn test_import_missing_file() {
        let db = Database::open_in_memory().unwrap();
        let err = cmd_import(&db, Path::new("/nonexistent/expenses.csv"), false, false)
            .unwrap_err();
        assert!(err.to_string().contains("Failed to open file"));
    }
}
