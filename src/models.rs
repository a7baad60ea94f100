use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::FaturaError;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// The closed set of expense categories. Stored by English name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Food,
    Transport,
    Technology,
    Entertainment,
    Health,
    Clothing,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Food,
        Category::Transport,
        Category::Technology,
        Category::Entertainment,
        Category::Health,
        Category::Clothing,
        Category::Other,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Food => "Food",
            Self::Transport => "Transport",
            Self::Technology => "Technology",
            Self::Entertainment => "Entertainment",
            Self::Health => "Health",
            Self::Clothing => "Clothing",
            Self::Other => "Other",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Transport => "transport",
            Self::Technology => "technology",
            Self::Entertainment => "entertainment",
            Self::Health => "health",
            Self::Clothing => "clothing",
            Self::Other => "other",
        }
    }

    /// Albanian label, as shown on the receipts this tool was built around.
    pub fn label_sq(&self) -> &'static str {
        match self {
            Self::Food => "Ushqim",
            Self::Transport => "Transport",
            Self::Technology => "Teknologji",
            Self::Entertainment => "Argëtim",
            Self::Health => "Shëndetësi",
            Self::Clothing => "Veshmbathje",
            Self::Other => "Tjetër",
        }
    }

    /// Case-insensitive lookup by name, key, Albanian label or short alias.
    pub fn parse(raw: &str) -> Option<Category> {
        let needle = raw.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        if let Some(cat) = Self::ALL
            .iter()
            .find(|c| c.key() == needle || c.label_sq().to_lowercase() == needle)
        {
            return Some(*cat);
        }
        match needle.as_str() {
            "tech" => Some(Self::Technology),
            "groceries" | "grocery" => Some(Self::Food),
            "clothes" => Some(Self::Clothing),
            "tjeter" => Some(Self::Other),
            "argetim" => Some(Self::Entertainment),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = FaturaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::parse(s).ok_or_else(|| FaturaError::UnknownCategory(s.to_string()))
    }
}

impl ToSql for Category {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.name()))
    }
}

impl FromSql for Category {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        Category::parse(raw)
            .ok_or_else(|| FromSqlError::Other(format!("unknown category '{raw}'").into()))
    }
}

// ---------------------------------------------------------------------------
// Parse status
// ---------------------------------------------------------------------------

/// Receipt lifecycle: pending -> parsing -> completed | error.
/// An errored receipt may go back to parsing when the user retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    Pending,
    Parsing,
    Completed,
    Error,
}

impl ParseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Parsing => "parsing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn from_db(raw: &str) -> Option<ParseStatus> {
        match raw {
            "pending" => Some(Self::Pending),
            "parsing" => Some(Self::Parsing),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for ParseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for ParseStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ParseStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        ParseStatus::from_db(raw)
            .ok_or_else(|| FromSqlError::Other(format!("unknown parse status '{raw}'").into()))
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Receipt {
    pub id: String,
    pub file_path: String,
    pub original_name: String,
    pub checksum: String,
    /// `upload` for user files, `demo` for bundled sample data.
    pub source: String,
    pub vendor: Option<String>,
    pub invoice_no: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub currency: Option<String>,
    pub subtotal: Option<f64>,
    pub tax: Option<f64>,
    pub total: Option<f64>,
    pub raw_json: Option<String>,
    pub parse_status: ParseStatus,
    pub parse_error: Option<String>,
    pub created_at: String,
}

impl Receipt {
    pub fn is_demo(&self) -> bool {
        self.source == "demo"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expense {
    pub id: Option<i64>,
    pub receipt_id: Option<String>,
    pub date: NaiveDate,
    pub category: Category,
    pub description: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub vendor: Option<String>,
}

impl Expense {
    /// Year-month bucket used by the reports, e.g. `2024-01`.
    pub fn month_key(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Exact,
    Contains,
    StartsWith,
    Regex,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::Regex => "regex",
        }
    }
}

impl FromStr for MatchType {
    type Err = FaturaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "contains" => Ok(Self::Contains),
            "starts_with" => Ok(Self::StartsWith),
            "regex" => Ok(Self::Regex),
            other => Err(FaturaError::Other(format!(
                "Unknown match type '{other}' (expected exact, contains, starts_with or regex)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VendorRule {
    pub id: i64,
    pub pattern: String,
    pub match_type: MatchType,
    pub category: Category,
    pub priority: i64,
    pub hit_count: i64,
}

// ---------------------------------------------------------------------------
// Parser output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub description: String,
    pub qty: f64,
    pub unit_price: f64,
    pub line_total: f64,
    pub category: Category,
}

/// A receipt after model extraction and field coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedReceipt {
    pub vendor: String,
    pub invoice_no: Option<String>,
    pub invoice_date: NaiveDate,
    pub currency: String,
    pub items: Vec<ReceiptItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub guessed_categories: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_accepts_names_keys_and_labels() {
        assert_eq!(Category::parse("Transport"), Some(Category::Transport));
        assert_eq!(Category::parse("food"), Some(Category::Food));
        assert_eq!(Category::parse("USHQIM"), Some(Category::Food));
        assert_eq!(Category::parse("Tjetër"), Some(Category::Other));
        assert_eq!(Category::parse("tech"), Some(Category::Technology));
        assert_eq!(Category::parse("auto"), None);
        assert_eq!(Category::parse("  "), None);
    }

    #[test]
    fn test_category_from_str_error() {
        let err = "Groceriez".parse::<Category>().unwrap_err();
        assert!(err.to_string().contains("Groceriez"));
    }

    #[test]
    fn test_category_serializes_by_name() {
        let json = serde_json::to_string(&Category::Entertainment).unwrap();
        assert_eq!(json, "\"Entertainment\"");
    }

    #[test]
    fn test_month_key() {
        let e = Expense {
            id: None,
            receipt_id: None,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            category: Category::Food,
            description: None,
            amount: 1.0,
            currency: "EUR".to_string(),
            vendor: None,
        };
        assert_eq!(e.month_key(), "2024-01");
    }

    #[test]
    fn test_parse_status_roundtrip() {
        for status in [
            ParseStatus::Pending,
            ParseStatus::Parsing,
            ParseStatus::Completed,
            ParseStatus::Error,
        ] {
            assert_eq!(ParseStatus::from_db(status.as_str()), Some(status));
        }
        assert_eq!(ParseStatus::from_db("done"), None);
    }
}
