use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// The four fixed slots a day's spending is recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Meal {
    Breakfast,
    Lunch,
    Dinner,
    Other,
}

impl Meal {
    pub const ALL: [Meal; 4] = [Meal::Breakfast, Meal::Lunch, Meal::Dinner, Meal::Other];

    /// Label written to the `meal` column for new rows.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Meal::Breakfast => "Breakfast",
            Meal::Lunch => "Lunch",
            Meal::Dinner => "Dinner",
            Meal::Other => "Other",
        }
    }

    /// Label older databases used for the same slot.
    #[must_use]
    pub fn legacy_label(self) -> Option<&'static str> {
        match self {
            Meal::Breakfast => Some("Morning"),
            Meal::Lunch => Some("Afternoon"),
            Meal::Dinner => Some("Evening"),
            Meal::Other => None,
        }
    }

    #[must_use]
    pub fn icon(self) -> &'static str {
        match self {
            Meal::Breakfast => "🍳",
            Meal::Lunch => "🍛",
            Meal::Dinner => "🍲",
            Meal::Other => "🥤",
        }
    }
}

impl fmt::Display for Meal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Meal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        for meal in Meal::ALL {
            let legacy = meal.legacy_label().map(str::to_lowercase);
            if lower == meal.label().to_lowercase() || legacy.as_deref() == Some(lower.as_str()) {
                return Ok(meal);
            }
        }
        let choices: Vec<String> = Meal::ALL.iter().map(|m| m.label().to_lowercase()).collect();
        bail!("Invalid meal '{s}'. Must be one of: {}", choices.join(", "))
    }
}

/// Parse user input into a [`Meal`], accepting legacy names.
pub fn parse_meal(s: &str) -> Result<Meal> {
    s.parse()
}

/// Bucket a stored label into one of the four report categories by keyword.
/// An `Other: <note>` label whose note names a meal lands in that meal.
#[must_use]
pub fn categorize_label(label: &str) -> Meal {
    let lower = label.trim().to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if has_any(&["breakfast", "morning"]) {
        Meal::Breakfast
    } else if has_any(&["lunch", "afternoon"]) {
        Meal::Lunch
    } else if has_any(&["dinner", "evening"]) {
        Meal::Dinner
    } else {
        Meal::Other
    }
}

/// The day slot a stored label occupies, if any. Matches the current and
/// legacy names exactly, plus `Other` and any `Other:` label.
#[must_use]
pub fn slot_for_label(label: &str) -> Option<Meal> {
    if label == "Other" || label.to_lowercase().starts_with("other:") {
        return Some(Meal::Other);
    }
    Meal::ALL
        .into_iter()
        .find(|m| label == m.label() || m.legacy_label() == Some(label))
}

/// Build the label stored for a slot. Only `Other` carries a note.
#[must_use]
pub fn format_label(meal: Meal, note: Option<&str>) -> String {
    match (meal, note.map(str::trim)) {
        (Meal::Other, Some(n)) if !n.is_empty() => format!("Other: {n}"),
        _ => meal.label().to_string(),
    }
}

/// Extract the note from an `Other: <note>` label.
#[must_use]
pub fn split_label(label: &str) -> Option<String> {
    let (head, rest) = label.split_once(':')?;
    if !head.trim().eq_ignore_ascii_case("other") {
        return None;
    }
    let note = rest.trim();
    if note.is_empty() {
        None
    } else {
        Some(note.to_string())
    }
}

pub fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() {
        bail!("Amount must be a finite number");
    }
    if amount < 0.0 {
        bail!("Amount must not be negative (use 0 to clear an entry)");
    }
    Ok(())
}

/// First and last day of the month containing `date`.
#[must_use]
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first);
    (first, last)
}

/// Daily spend under this counts as a day saved.
pub const DAILY_SAVED_BELOW: f64 = 150.0;
/// Daily spend above this is over budget.
pub const DAILY_OVER_ABOVE: f64 = 220.0;

/// How a day's total compares with the daily budget band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    Saved,
    OnTrack,
    Over,
}

impl BudgetStatus {
    #[must_use]
    pub fn for_total(total: f64) -> Self {
        if total > DAILY_OVER_ABOVE {
            BudgetStatus::Over
        } else if total < DAILY_SAVED_BELOW {
            BudgetStatus::Saved
        } else {
            BudgetStatus::OnTrack
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expense {
    pub id: i64,
    pub date: NaiveDate,
    /// Raw text of the `meal` column.
    pub label: String,
    /// Slot the row fills, or its keyword bucket when it fills none.
    pub meal: Meal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub date: NaiveDate,
    pub meal: Meal,
    pub amount: f64,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default)]
#[allow(clippy::option_option)]
pub struct UpdateExpense {
    pub amount: Option<f64>,
    pub meal: Option<Meal>,
    pub date: Option<NaiveDate>,
    pub note: Option<Option<String>>,
}

impl UpdateExpense {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.amount.is_none() && self.meal.is_none() && self.date.is_none() && self.note.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetSlot {
    pub meal: Meal,
    pub entry: Option<Expense>,
}

/// State of the daily entry form: one slot per meal.
///
/// `extra` holds the day's rows no slot shows (duplicates left by older
/// versions, unrecognized labels). `total` covers every row of the day.
#[derive(Debug, Clone, Serialize)]
pub struct DailySheet {
    pub date: NaiveDate,
    pub slots: Vec<SheetSlot>,
    pub extra: Vec<Expense>,
    pub total: f64,
    pub budget: BudgetStatus,
}

impl DailySheet {
    #[must_use]
    pub fn amount(&self, meal: Meal) -> Option<f64> {
        self.slots
            .iter()
            .find(|s| s.meal == meal)
            .and_then(|s| s.entry.as_ref())
            .map(|e| e.amount)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extra.is_empty() && self.slots.iter().all(|s| s.entry.is_none())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: f64,
    pub entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealTotal {
    pub meal: Meal,
    pub total: f64,
    pub entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodSummary {
    pub title: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub daily: Vec<DailyTotal>,
    pub by_meal: Vec<MealTotal>,
    pub total: f64,
    pub entry_count: usize,
    pub average_per_day: f64,
}

impl PeriodSummary {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }
}
