use anyhow::Result;
use chrono::Local;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use tiffin_core::db::Database;
use tiffin_core::models::PeriodSummary;

use super::helpers::{bar_chart, format_money, parse_date, parse_month};

const CHART_WIDTH: usize = 30;

pub(crate) fn cmd_month(db: &Database, month: Option<String>, json: bool) -> Result<()> {
    let date = parse_month(month)?;
    let summary = db.build_monthly_summary(date)?;
    print_summary(&summary, json)
}

pub(crate) fn cmd_report(db: &Database, from: &str, to: Option<String>, json: bool) -> Result<()> {
    let start = parse_date(Some(from.to_string()))?;
    let end = match to {
        Some(t) => parse_date(Some(t))?,
        None => Local::now().date_naive(),
    };
    let title = format!("{start} to {end}");
    let summary = db.build_period_summary(start, end, &title)?;
    print_summary(&summary, json)
}

fn print_summary(summary: &PeriodSummary, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct DayRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Entries")]
        entries: usize,
        #[tabled(rename = "Total")]
        total: String,
    }

    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Entries")]
        entries: usize,
        #[tabled(rename = "Total")]
        total: String,
    }

    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    if summary.is_empty() {
        let title = &summary.title;
        eprintln!("No entries for {title}. Add some with `tiffin set` or `tiffin entry`.");
        process::exit(2);
    }

    println!("=== Summary: {} ===\n", summary.title);

    let day_rows: Vec<DayRow> = summary
        .daily
        .iter()
        .map(|d| DayRow {
            date: d.date.format("%Y-%m-%d").to_string(),
            entries: d.entries,
            total: format_money(d.total),
        })
        .collect();
    println!("Daily breakdown");
    let table = Table::new(&day_rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}\n");

    let total = format_money(summary.total);
    let average = format_money(summary.average_per_day);
    let days = summary.daily.len();
    println!("  TOTAL: {total} over {days} day(s), {average}/day\n");

    let meal_rows: Vec<MealRow> = summary
        .by_meal
        .iter()
        .map(|m| MealRow {
            meal: format!("{} {}", m.meal.icon(), m.meal),
            entries: m.entries,
            total: format_money(m.total),
        })
        .collect();
    println!("By meal");
    let table = Table::new(&meal_rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}\n");

    let chart_rows: Vec<(String, f64)> = summary
        .by_meal
        .iter()
        .map(|m| (m.meal.label().to_string(), m.total))
        .collect();
    for line in bar_chart(&chart_rows, CHART_WIDTH) {
        println!("{line}");
    }

    Ok(())
}
