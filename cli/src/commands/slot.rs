use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::process;

use tiffin_core::db::Database;
use tiffin_core::models::{
    BudgetStatus, DAILY_OVER_ABOVE, DAILY_SAVED_BELOW, DailySheet, Expense, Meal, NewExpense,
    parse_meal,
};

use super::helpers::{format_money, json_error, parse_amount, parse_date};

pub(crate) fn cmd_set(
    db: &Database,
    meal: &str,
    amount: &str,
    note: Option<String>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let meal = parse_meal(meal)?;
    let amount = parse_amount(amount)?;
    let date = parse_date(date)?;

    if note.is_some() && meal != Meal::Other {
        eprintln!("Note: descriptions are only kept for the 'other' meal");
    }

    let saved = db.upsert_meal(&NewExpense {
        date,
        meal,
        amount,
        note,
    })?;

    match saved {
        Some(entry) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                let label = &entry.label;
                let money = format_money(entry.amount);
                println!("Saved {label} for {date}: {money}");
            }
        }
        None => {
            if json {
                println!("{}", serde_json::json!({ "cleared": meal, "date": date }));
            } else {
                println!("Cleared {meal} for {date}");
            }
        }
    }

    Ok(())
}

pub(crate) fn cmd_remove(db: &Database, meal: &str, date: Option<String>, json: bool) -> Result<()> {
    let meal = parse_meal(meal)?;
    let date = parse_date(date)?;

    if db.delete_meal(date, meal)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": meal, "date": date }));
        } else {
            println!("Deleted {meal} for {date}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("No {meal} entry for {date}")));
        } else {
            eprintln!("No {meal} entry for {date}");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_day(db: &Database, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let sheet = db.build_daily_sheet(date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sheet)?);
        return Ok(());
    }

    print_sheet(&sheet);

    if sheet.is_empty() {
        process::exit(2);
    }
    Ok(())
}

fn print_sheet(sheet: &DailySheet) {
    let date = sheet.date.format("%A, %d %B %Y");
    println!("=== {date} ===\n");
    for slot in &sheet.slots {
        let icon = slot.meal.icon();
        let meal = slot.meal.label();
        match &slot.entry {
            Some(e) => {
                let id = e.id;
                let money = format_money(e.amount);
                let note = e
                    .note
                    .as_ref()
                    .map(|n| format!(" ({n})"))
                    .unwrap_or_default();
                println!("  {icon} {meal:<10} {money:>10}{note}  [{id}]");
            }
            None => println!("  {icon} {meal:<10} {:>10}", "-"),
        }
    }
    if !sheet.extra.is_empty() {
        println!("\n  Also recorded:");
        for e in &sheet.extra {
            let id = e.id;
            let label = &e.label;
            let money = format_money(e.amount);
            println!("     {label:<10} {money:>10}  [{id}]");
        }
    }
    let total = format_money(sheet.total);
    println!("\n  TOTAL: {total}");
    if !sheet.is_empty() {
        println!("  {}", budget_message(sheet.budget));
    }
}

pub(crate) fn budget_message(status: BudgetStatus) -> String {
    let low = format_money(DAILY_SAVED_BELOW);
    let high = format_money(DAILY_OVER_ABOVE);
    match status {
        BudgetStatus::Over => format!("🚨 Over {high} today. Watch the extras."),
        BudgetStatus::Saved => format!("🎉 Under {low} today. You saved!"),
        BudgetStatus::OnTrack => format!("👍 On track ({low}-{high})."),
    }
}

/// One change made through the entry form.
#[derive(Debug, Serialize)]
pub(crate) struct FormChange {
    pub meal: Meal,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<Expense>,
}

enum Answer {
    Keep,
    Clear,
    Amount(f64),
}

fn parse_answer(line: &str) -> Result<Answer> {
    match line.trim() {
        "" => Ok(Answer::Keep),
        "-" => Ok(Answer::Clear),
        s => {
            let amount = parse_amount(s)?;
            Ok(if amount == 0.0 {
                Answer::Clear
            } else {
                Answer::Amount(amount)
            })
        }
    }
}

/// Walk the four meals of `date`, prompting on `output` and reading answers
/// from `input`. Blank keeps the current value, `0` or `-` deletes it, a
/// number replaces it. Invalid answers are re-asked. Stops early at EOF.
pub(crate) fn run_entry_form<R: BufRead, W: Write>(
    db: &Database,
    date: NaiveDate,
    input: &mut R,
    output: &mut W,
) -> Result<Vec<FormChange>> {
    let sheet = db.build_daily_sheet(date)?;
    let mut changes = Vec::new();

    writeln!(output, "Entering amounts ({}) for {date}", super::helpers::CURRENCY)?;
    writeln!(output, "  blank = keep, 0 or - = delete\n")?;

    'meals: for slot in &sheet.slots {
        let current = slot
            .entry
            .as_ref()
            .map_or_else(|| "-".to_string(), |e| format_money(e.amount));

        let answer = loop {
            write!(output, "{} {} [{current}]: ", slot.meal.icon(), slot.meal)?;
            output.flush()?;
            let Some(line) = read_line(input)? else {
                break 'meals;
            };
            match parse_answer(&line) {
                Ok(a) => break a,
                Err(e) => writeln!(output, "  {e}")?,
            }
        };

        match answer {
            Answer::Keep => {}
            Answer::Clear => {
                if db.delete_meal(date, slot.meal)? {
                    changes.push(FormChange {
                        meal: slot.meal,
                        action: "deleted",
                        entry: None,
                    });
                }
            }
            Answer::Amount(amount) => {
                let mut note = slot.entry.as_ref().and_then(|e| e.note.clone());
                if slot.meal == Meal::Other {
                    let shown = note.as_deref().unwrap_or("");
                    write!(output, "  Description [{shown}]: ")?;
                    output.flush()?;
                    if let Some(line) = read_line(input)? {
                        let line = line.trim();
                        if !line.is_empty() {
                            note = Some(line.to_string());
                        }
                    }
                }
                let entry = db.upsert_meal(&NewExpense {
                    date,
                    meal: slot.meal,
                    amount,
                    note,
                })?;
                changes.push(FormChange {
                    meal: slot.meal,
                    action: "saved",
                    entry,
                });
            }
        }
    }

    Ok(changes)
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

pub(crate) fn cmd_entry(db: &Database, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    // Prompts go to stderr so --json output on stdout stays clean
    let mut prompts = io::stderr();

    let changes = run_entry_form(db, date, &mut input, &mut prompts)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&changes)?);
        return Ok(());
    }

    eprintln!();
    if changes.is_empty() {
        println!("No changes for {date}");
    } else {
        let count = changes.len();
        println!("{count} change(s) saved\n");
        print_sheet(&db.build_daily_sheet(date)?);
    }
    Ok(())
}
