use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use rusqlite::{Connection, params};
use tracing::debug;

use crate::models::{
    BudgetStatus, DailySheet, Expense, Meal, NewExpense, PeriodSummary, SheetSlot, UpdateExpense,
    categorize_label, format_label, month_bounds, slot_for_label, split_label, validate_amount,
};
use crate::report;

const SELECT_EXPENSE: &str = "SELECT id, date, meal, amount, created_at, updated_at FROM expenses";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            // Same shape the first version of the tracker created, so an
            // existing food_expenses.db opens in place.
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS expenses (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    date DATE NOT NULL,
                    meal TEXT NOT NULL,
                    amount REAL NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date);

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            let now = Local::now().to_rfc3339();
            self.conn.execute_batch(
                "ALTER TABLE expenses ADD COLUMN created_at TEXT;
                 ALTER TABLE expenses ADD COLUMN updated_at TEXT;
                 CREATE INDEX IF NOT EXISTS idx_expenses_date_meal ON expenses(date, meal);",
            )?;
            self.conn.execute(
                "UPDATE expenses SET created_at = ?1, updated_at = ?1 WHERE created_at IS NULL",
                params![now],
            )?;
            self.conn.execute_batch("PRAGMA user_version = 2;")?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    // Expects columns: 0: id, 1: date, 2: meal, 3: amount, 4: created_at, 5: updated_at
    fn expense_from_row(row: &rusqlite::Row) -> rusqlite::Result<Expense> {
        let date_str: String = row.get(1)?;
        let date = NaiveDate::parse_from_str(date_str.get(..10).unwrap_or(&date_str), "%Y-%m-%d")
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
            })?;
        let label: String = row.get(2)?;
        Ok(Expense {
            id: row.get(0)?,
            date,
            meal: slot_for_label(&label).unwrap_or_else(|| categorize_label(&label)),
            note: split_label(&label),
            label,
            amount: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    /// SQL condition matching every stored label that belongs to a slot.
    fn slot_condition(meal: Meal) -> String {
        match meal.legacy_label() {
            Some(legacy) => format!("meal IN ('{}', '{legacy}')", meal.label()),
            None => "(meal = 'Other' OR meal LIKE 'Other:%')".to_string(),
        }
    }

    fn date_key(date: NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    fn query_expenses(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Expense>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, Self::expense_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // --- Slots (date, meal) ---

    /// Record the amount spent on one meal of one day, replacing whatever the
    /// slot held before. An amount of zero only clears the slot.
    ///
    /// Returns the stored row, or `None` when the slot was cleared.
    pub fn upsert_meal(&self, entry: &NewExpense) -> Result<Option<Expense>> {
        validate_amount(entry.amount)?;

        let tx = self.conn.unchecked_transaction()?;
        let id = Self::write_slot(&tx, entry)?;
        tx.commit()?;

        match id {
            Some(id) => self
                .get_expense(id)?
                .context("Expense not found after upsert")
                .map(Some),
            None => Ok(None),
        }
    }

    /// Apply many slot writes in one transaction. Nothing is written unless
    /// every entry is valid and every write succeeds.
    pub fn upsert_meals(&self, entries: &[NewExpense]) -> Result<()> {
        for entry in entries {
            validate_amount(entry.amount)?;
        }

        let tx = self.conn.unchecked_transaction()?;
        for entry in entries {
            Self::write_slot(&tx, entry)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn write_slot(conn: &Connection, entry: &NewExpense) -> Result<Option<i64>> {
        let date_str = Self::date_key(entry.date);
        let condition = Self::slot_condition(entry.meal);

        let replaced = conn.execute(
            &format!("DELETE FROM expenses WHERE date = ?1 AND {condition}"),
            params![date_str],
        )?;

        let id = if entry.amount > 0.0 {
            let now = Local::now().to_rfc3339();
            let label = format_label(entry.meal, entry.note.as_deref());
            conn.execute(
                "INSERT INTO expenses (date, meal, amount, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![date_str, label, entry.amount, now, now],
            )?;
            Some(conn.last_insert_rowid())
        } else {
            None
        };

        debug!(date = %date_str, meal = %entry.meal, amount = entry.amount, replaced, "upserted meal slot");
        Ok(id)
    }

    /// Current entry for a slot. Rows under the current label win over rows
    /// under the legacy label; for `Other` the newest row wins.
    pub fn get_meal(&self, date: NaiveDate, meal: Meal) -> Result<Option<Expense>> {
        let condition = Self::slot_condition(meal);
        let rows = self.query_expenses(
            &format!("{SELECT_EXPENSE} WHERE date = ?1 AND {condition} ORDER BY id DESC"),
            params![Self::date_key(date)],
        )?;

        let preferred = if meal == Meal::Other {
            None
        } else {
            rows.iter().position(|e| e.label == meal.label())
        };
        Ok(match preferred {
            Some(idx) => rows.into_iter().nth(idx),
            None => rows.into_iter().next(),
        })
    }

    pub fn delete_meal(&self, date: NaiveDate, meal: Meal) -> Result<bool> {
        let condition = Self::slot_condition(meal);
        let rows = self.conn.execute(
            &format!("DELETE FROM expenses WHERE date = ?1 AND {condition}"),
            params![Self::date_key(date)],
        )?;
        debug!(%date, %meal, rows, "deleted meal slot");
        Ok(rows > 0)
    }

    /// Delete every row stored for `date`, whatever its label.
    pub fn clear_day(&self, date: NaiveDate) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM expenses WHERE date = ?1",
            params![Self::date_key(date)],
        )?;
        debug!(%date, rows, "cleared day");
        Ok(rows)
    }

    // --- Rows by id ---

    pub fn get_expense(&self, id: i64) -> Result<Option<Expense>> {
        let mut stmt = self.conn.prepare(&format!("{SELECT_EXPENSE} WHERE id = ?1"))?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::expense_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn delete_expense(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM expenses WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Edit a row in place. The stored label only changes when the meal or
    /// note is edited. Moving a slot row onto an occupied slot replaces the
    /// occupant; an amount-only edit touches nothing else.
    ///
    /// Returns `None` when no row has this id.
    pub fn update_expense(&self, id: i64, update: &UpdateExpense) -> Result<Option<Expense>> {
        let Some(existing) = self.get_expense(id)? else {
            return Ok(None);
        };

        let amount = update.amount.unwrap_or(existing.amount);
        validate_amount(amount)?;
        if amount == 0.0 {
            bail!("Amount must be greater than 0 (delete the entry to clear it)");
        }

        let date = update.date.unwrap_or(existing.date);
        let relabel = update.meal.is_some() || update.note.is_some();
        let label = if relabel {
            let meal = update.meal.unwrap_or(existing.meal);
            let note = match &update.note {
                Some(n) => n.clone(),
                None => existing.note.clone(),
            };
            format_label(meal, note.as_deref())
        } else {
            existing.label.clone()
        };
        let date_str = Self::date_key(date);
        let now = Local::now().to_rfc3339();

        let tx = self.conn.unchecked_transaction()?;
        let moved = relabel || date != existing.date;
        if let Some(slot) = slot_for_label(&label).filter(|_| moved) {
            let condition = Self::slot_condition(slot);
            let evicted = tx.execute(
                &format!("DELETE FROM expenses WHERE date = ?1 AND {condition} AND id != ?2"),
                params![date_str, id],
            )?;
            debug!(id, evicted, "moved entry into slot");
        }
        tx.execute(
            "UPDATE expenses SET date = ?1, meal = ?2, amount = ?3, updated_at = ?4 WHERE id = ?5",
            params![date_str, label, amount, now, id],
        )?;
        tx.commit()?;

        self.get_expense(id)
    }

    // --- Scans ---

    /// Every row between `start` and `end` inclusive, oldest first.
    pub fn expenses_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Expense>> {
        self.query_expenses(
            &format!("{SELECT_EXPENSE} WHERE date BETWEEN ?1 AND ?2 ORDER BY date, id"),
            params![Self::date_key(start), Self::date_key(end)],
        )
    }

    /// Every stored row, newest first.
    pub fn all_expenses(&self) -> Result<Vec<Expense>> {
        self.query_expenses(
            &format!("{SELECT_EXPENSE} ORDER BY date DESC, id DESC"),
            [],
        )
    }

    pub fn clear_all(&self) -> Result<usize> {
        let rows = self.conn.execute("DELETE FROM expenses", [])?;
        debug!(rows, "cleared all expenses");
        Ok(rows)
    }

    // --- Views ---

    pub fn build_daily_sheet(&self, date: NaiveDate) -> Result<DailySheet> {
        let mut slots = Vec::with_capacity(Meal::ALL.len());
        for meal in Meal::ALL {
            let entry = self.get_meal(date, meal)?;
            slots.push(SheetSlot { meal, entry });
        }

        let rows = self.expenses_in_range(date, date)?;
        let total: f64 = rows.iter().map(|e| e.amount).sum();
        let shown: Vec<i64> = slots
            .iter()
            .filter_map(|s| s.entry.as_ref().map(|e| e.id))
            .collect();
        let extra = rows
            .into_iter()
            .filter(|e| !shown.contains(&e.id))
            .collect();

        Ok(DailySheet {
            date,
            slots,
            extra,
            total,
            budget: BudgetStatus::for_total(total),
        })
    }

    pub fn build_period_summary(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        title: &str,
    ) -> Result<PeriodSummary> {
        if start > end {
            bail!("Start date {start} is after end date {end}");
        }
        let expenses = self.expenses_in_range(start, end)?;
        Ok(report::summarize(start, end, title, &expenses))
    }

    /// Summary of the calendar month containing `date`.
    pub fn build_monthly_summary(&self, date: NaiveDate) -> Result<PeriodSummary> {
        let (start, end) = month_bounds(date);
        let title = start.format("%B %Y").to_string();
        self.build_period_summary(start, end, &title)
    }
}
