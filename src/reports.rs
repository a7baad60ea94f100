use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Category, Expense};

// ---------------------------------------------------------------------------
// Monthly breakdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyReport {
    pub month: String,
    pub categories: BTreeMap<Category, f64>,
    pub total: f64,
}

/// Group expenses into `YYYY-MM` buckets, oldest month first. Only the
/// categories that occur in a month appear in its bucket.
pub fn monthly_reports(expenses: &[Expense]) -> Vec<MonthlyReport> {
    let mut months: BTreeMap<String, MonthlyReport> = BTreeMap::new();
    for e in expenses {
        let key = e.month_key();
        let bucket = months.entry(key.clone()).or_insert_with(|| MonthlyReport {
            month: key,
            categories: BTreeMap::new(),
            total: 0.0,
        });
        bucket.total += e.amount;
        *bucket.categories.entry(e.category).or_insert(0.0) += e.amount;
    }
    months.into_values().collect()
}

// ---------------------------------------------------------------------------
// Category totals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub total: f64,
    pub count: usize,
}

/// Totals per category across all months, largest first.
pub fn category_totals(expenses: &[Expense]) -> Vec<CategoryTotal> {
    let mut totals: BTreeMap<Category, CategoryTotal> = BTreeMap::new();
    for e in expenses {
        let entry = totals.entry(e.category).or_insert(CategoryTotal {
            category: e.category,
            total: 0.0,
            count: 0,
        });
        entry.total += e.amount;
        entry.count += 1;
    }
    let mut out: Vec<CategoryTotal> = totals.into_values().collect();
    out.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.category.cmp(&b.category))
    });
    out
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub months: Vec<MonthlyReport>,
    pub categories: Vec<CategoryTotal>,
    pub total: f64,
    pub count: usize,
}

pub fn summarize(expenses: &[Expense]) -> Summary {
    let months = monthly_reports(expenses);
    let total = months.iter().map(|m| m.total).sum();
    Summary {
        categories: category_totals(expenses),
        months,
        total,
        count: expenses.len(),
    }
}
