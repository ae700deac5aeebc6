use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{DailyTotal, Expense, Meal, MealTotal, PeriodSummary, categorize_label};

/// Sum amounts per date, ascending by date.
#[must_use]
pub fn daily_totals(expenses: &[Expense]) -> Vec<DailyTotal> {
    let mut by_date: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for e in expenses {
        let slot = by_date.entry(e.date).or_default();
        slot.0 += e.amount;
        slot.1 += 1;
    }
    by_date
        .into_iter()
        .map(|(date, (total, entries))| DailyTotal {
            date,
            total,
            entries,
        })
        .collect()
}

/// Bucket rows into the four categories by label keyword and sum them.
///
/// Only categories with at least one row are returned, largest total first.
/// Ties keep breakfast/lunch/dinner/other order.
#[must_use]
pub fn meal_totals(expenses: &[Expense]) -> Vec<MealTotal> {
    let mut totals: Vec<MealTotal> = Meal::ALL
        .iter()
        .map(|&meal| MealTotal {
            meal,
            total: 0.0,
            entries: 0,
        })
        .collect();

    for e in expenses {
        let meal = categorize_label(&e.label);
        if let Some(t) = totals.iter_mut().find(|t| t.meal == meal) {
            t.total += e.amount;
            t.entries += 1;
        }
    }

    totals.retain(|t| t.entries > 0);
    // sort_by is stable, so equal totals keep Meal::ALL order
    totals.sort_by(|a, b| b.total.total_cmp(&a.total));
    totals
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize(
    start: NaiveDate,
    end: NaiveDate,
    title: impl Into<String>,
    expenses: &[Expense],
) -> PeriodSummary {
    let daily = daily_totals(expenses);
    let by_meal = meal_totals(expenses);
    let total: f64 = expenses.iter().map(|e| e.amount).sum();
    let average_per_day = if daily.is_empty() {
        0.0
    } else {
        total / daily.len() as f64
    };

    PeriodSummary {
        title: title.into(),
        start,
        end,
        daily,
        by_meal,
        total,
        entry_count: expenses.len(),
        average_per_day,
    }
}
