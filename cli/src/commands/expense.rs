use anyhow::{Result, bail};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use tiffin_core::db::Database;
use tiffin_core::models::{Expense, UpdateExpense, month_bounds, parse_meal};

use super::helpers::{
    ensure_nonempty_update, format_money, json_error, parse_amount, parse_date, parse_month,
    truncate,
};

pub(crate) fn cmd_list(db: &Database, month: Option<&str>, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct ExpenseRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Amount")]
        amount: String,
    }

    let expenses = match month {
        Some(m) => {
            let (start, end) = month_bounds(parse_month(Some(m.to_string()))?);
            let mut rows = db.expenses_in_range(start, end)?;
            rows.reverse();
            rows
        }
        None => db.all_expenses()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&expenses)?);
        return Ok(());
    }

    if expenses.is_empty() {
        eprintln!("No entries saved yet. Add some with `tiffin set` or `tiffin entry`.");
        process::exit(2);
    }

    let rows: Vec<ExpenseRow> = expenses
        .iter()
        .map(|e| ExpenseRow {
            id: e.id,
            date: e.date.format("%Y-%m-%d").to_string(),
            meal: truncate(&e.label, 30),
            amount: format_money(e.amount),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let count = expenses.len();
    let total = format_money(expenses.iter().map(|e| e.amount).sum());
    println!("\n  {count} entries, total {total}");

    Ok(())
}

pub(crate) fn cmd_update(
    db: &Database,
    id: i64,
    amount: Option<&str>,
    meal: Option<&str>,
    date: Option<String>,
    note: Option<String>,
    json: bool,
) -> Result<()> {
    ensure_nonempty_update(amount, meal, date.as_ref(), note.as_ref())?;

    let amount = amount.map(parse_amount).transpose()?;
    if amount == Some(0.0) {
        bail!("Amount must be greater than 0. Use `tiffin delete {id}` to remove the entry");
    }
    let update = UpdateExpense {
        amount,
        meal: meal.map(parse_meal).transpose()?,
        date: date.map(Some).map(parse_date).transpose()?,
        note: note.map(|n| {
            let n = n.trim().to_string();
            if n.is_empty() { None } else { Some(n) }
        }),
    };

    if let Some(entry) = db.update_expense(id, &update)? {
        if json {
            println!("{}", serde_json::to_string_pretty(&entry)?);
        } else {
            print_updated(&entry);
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Entry {id} not found")));
        } else {
            eprintln!("Entry {id} not found");
        }
        process::exit(2);
    }
}

fn print_updated(entry: &Expense) {
    let id = entry.id;
    let label = &entry.label;
    let date = entry.date;
    let money = format_money(entry.amount);
    println!("Updated entry {id}: {label} on {date} — {money}");
}

pub(crate) fn cmd_delete(db: &Database, id: i64, json: bool) -> Result<()> {
    if db.delete_expense(id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": id }));
        } else {
            println!("Deleted entry {id}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Entry {id} not found")));
        } else {
            eprintln!("Entry {id} not found");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_clear(db: &Database, date: Option<String>, yes: bool, json: bool) -> Result<()> {
    if date.is_some() {
        let date = parse_date(date)?;
        let removed = db.clear_day(date)?;
        tracing::info!(%date, removed, "cleared day");
        if json {
            println!("{}", serde_json::json!({ "cleared": removed, "date": date }));
        } else {
            println!("Cleared {removed} entries for {date}");
        }
        return Ok(());
    }

    if !yes {
        bail!("This deletes every entry. Re-run with --yes to confirm");
    }

    let removed = db.clear_all()?;
    tracing::info!(removed, "cleared all entries");

    if json {
        println!("{}", serde_json::json!({ "cleared": removed }));
    } else {
        println!("Cleared {removed} entries");
    }
    Ok(())
}
