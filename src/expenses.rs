use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::Connection;

use crate::error::{FaturaError, Result};
use crate::models::{Category, Expense};

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| FaturaError::InvalidDate(raw.to_string()))
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Optional, ANDed constraints. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub category: Option<Category>,
}

impl ExpenseFilter {
    pub fn from_args(from: Option<&str>, to: Option<&str>, category: Option<&str>) -> Result<Self> {
        let filter = Self {
            from: from.map(parse_date).transpose()?,
            to: to.map(parse_date).transpose()?,
            category: category.map(str::parse::<Category>).transpose()?,
        };
        if let (Some(f), Some(t)) = (filter.from, filter.to) {
            if f > t {
                return Err(FaturaError::Other(format!("--from {f} is after --to {t}")));
            }
        }
        Ok(filter)
    }

    #[cfg(test)]
    pub fn matches(&self, expense: &Expense) -> bool {
        self.from.map_or(true, |f| expense.date >= f)
            && self.to.map_or(true, |t| expense.date <= t)
            && self.category.map_or(true, |c| expense.category == c)
    }

    #[cfg(test)]
    pub fn apply(&self, expenses: &[Expense]) -> Vec<Expense> {
        expenses.iter().filter(|e| self.matches(e)).cloned().collect()
    }

    fn sql_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut params = Vec::new();
        if let Some(f) = self.from {
            params.push(Value::Text(f.format("%Y-%m-%d").to_string()));
            clauses.push(format!("date >= ?{}", params.len()));
        }
        if let Some(t) = self.to {
            params.push(Value::Text(t.format("%Y-%m-%d").to_string()));
            clauses.push(format!("date <= ?{}", params.len()));
        }
        if let Some(c) = self.category {
            params.push(Value::Text(c.name().to_string()));
            clauses.push(format!("category = ?{}", params.len()));
        }
        if clauses.is_empty() {
            ("1 = 1".to_string(), params)
        } else {
            (clauses.join(" AND "), params)
        }
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(f) = self.from {
            parts.push(format!("from {f}"));
        }
        if let Some(t) = self.to {
            parts.push(format!("to {t}"));
        }
        if let Some(c) = self.category {
            parts.push(format!("category {c}"));
        }
        if parts.is_empty() {
            "all expenses".to_string()
        } else {
            parts.join(", ")
        }
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

pub fn query_expenses(conn: &Connection, filter: &ExpenseFilter) -> Result<Vec<Expense>> {
    let (clause, params) = filter.sql_clause();
    let sql = format!(
        "SELECT id, receipt_id, date, category, description, amount, currency, vendor \
         FROM expenses WHERE {clause} ORDER BY date DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
        Ok(Expense {
            id: row.get(0)?,
            receipt_id: row.get(1)?,
            date: row.get(2)?,
            category: row.get(3)?,
            description: row.get(4)?,
            amount: row.get(5)?,
            currency: row.get(6)?,
            vendor: row.get(7)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn insert_expense(conn: &Connection, expense: &Expense) -> Result<i64> {
    conn.execute(
        "INSERT INTO expenses (receipt_id, date, category, description, amount, currency, vendor) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            expense.receipt_id,
            expense.date,
            expense.category,
            expense.description,
            expense.amount,
            expense.currency,
            expense.vendor,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_for_receipt(conn: &Connection, receipt_id: &str) -> Result<usize> {
    Ok(conn.execute("DELETE FROM expenses WHERE receipt_id = ?1", [receipt_id])?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};

    pub fn expense(date: &str, category: Category, amount: f64, vendor: &str, description: &str) -> Expense {
        Expense {
            id: None,
            receipt_id: None,
            date: parse_date(date).unwrap(),
            category,
            description: Some(description.to_string()),
            amount,
            currency: "EUR".to_string(),
            vendor: Some(vendor.to_string()),
        }
    }

    pub fn sample() -> Vec<Expense> {
        vec![
            expense("2024-01-15", Category::Food, 45.50, "Conad", "Grocery shopping"),
            expense("2024-01-14", Category::Transport, 12.30, "Uber", "Taxi ride"),
            expense("2024-02-10", Category::Food, 32.00, "Pizza Place", "Restaurant"),
        ]
    }

    fn seeded() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        for e in sample() {
            insert_expense(&conn, &e).unwrap();
        }
        (dir, conn)
    }

    #[test]
    fn test_no_filter_returns_all_newest_first() {
        let (_dir, conn) = seeded();
        let rows = query_expenses(&conn, &ExpenseFilter::default()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date, parse_date("2024-02-10").unwrap());
        assert_eq!(rows[2].date, parse_date("2024-01-14").unwrap());
    }

    #[test]
    fn test_category_filter() {
        let (_dir, conn) = seeded();
        let filter = ExpenseFilter::from_args(None, None, Some("Transport")).unwrap();
        let rows = query_expenses(&conn, &filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, parse_date("2024-01-14").unwrap());
        assert_eq!(filter.apply(&sample()).len(), 1);
    }

    #[test]
    fn test_date_bounds_are_inclusive_and_anded() {
        let (_dir, conn) = seeded();
        let filter =
            ExpenseFilter::from_args(Some("2024-01-14"), Some("2024-01-15"), Some("food")).unwrap();
        let rows = query_expenses(&conn, &filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, 45.50);

        let only_from = ExpenseFilter::from_args(Some("2024-01-15"), None, None).unwrap();
        assert_eq!(query_expenses(&conn, &only_from).unwrap().len(), 2);
        assert_eq!(only_from.apply(&sample()).len(), 2);
    }

    #[test]
    fn test_sql_and_in_memory_filters_agree() {
        let (_dir, conn) = seeded();
        let filter = ExpenseFilter::from_args(None, Some("2024-01-31"), None).unwrap();
        let db_rows = query_expenses(&conn, &filter).unwrap();
        let mem_rows = filter.apply(&sample());
        assert_eq!(db_rows.len(), mem_rows.len());
    }

    #[test]
    fn test_bad_filter_arguments() {
        assert!(matches!(
            ExpenseFilter::from_args(Some("01/02/2024"), None, None),
            Err(FaturaError::InvalidDate(_))
        ));
        assert!(matches!(
            ExpenseFilter::from_args(None, None, Some("Snacks")),
            Err(FaturaError::UnknownCategory(_))
        ));
        assert!(ExpenseFilter::from_args(Some("2024-02-01"), Some("2024-01-01"), None).is_err());
    }

    #[test]
    fn test_delete_for_receipt() {
        let (_dir, conn) = seeded();
        conn.execute(
            "INSERT INTO receipts (id, file_path, original_name, checksum) VALUES ('r1', 'x', 'x', 'c')",
            [],
        )
        .unwrap();
        let mut e = expense("2024-03-01", Category::Other, 1.0, "X", "y");
        e.receipt_id = Some("r1".to_string());
        insert_expense(&conn, &e).unwrap();
        assert_eq!(delete_for_receipt(&conn, "r1").unwrap(), 1);
        assert_eq!(query_expenses(&conn, &ExpenseFilter::default()).unwrap().len(), 3);
    }

    #[test]
    fn test_describe() {
        assert_eq!(ExpenseFilter::default().describe(), "all expenses");
        let f = ExpenseFilter::from_args(Some("2024-01-01"), None, Some("Food")).unwrap();
        assert_eq!(f.describe(), "from 2024-01-01, category Food");
    }
}
