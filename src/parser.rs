//! Turns a vision model's JSON answer into a [`ParsedReceipt`].
//!
//! Missing or malformed header fields are coerced to neutral defaults, item
//! categories left as `"auto"` are resolved by the [`Categorizer`]. A failed
//! call or an undecodable answer is an error: nothing is ever substituted for
//! the user's real receipt data.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::categorizer::Categorizer;
use crate::models::{Category, ParsedReceipt, ReceiptItem};
use crate::vision::{ReceiptImage, VisionModel};

pub const UNKNOWN_VENDOR: &str = "Unknown Vendor";

pub const RECEIPT_PROMPT: &str = r#"You are a receipt parser. Return ONLY valid JSON matching the schema below. Do not add any other text.

Schema:
{
  "vendor": "string",
  "invoice_no": "string|null",
  "invoice_date": "YYYY-MM-DD",
  "currency": "ISO 4217 code (EUR, USD, ...)",
  "items": [
    {"description": "string", "qty": 1, "unit_price": 0.0, "line_total": 0.0, "category": "auto"}
  ],
  "subtotal": 0.0,
  "tax": 0.0,
  "total": 0.0,
  "guessed_categories": true
}

Instructions:
- Identify the vendor name, date, line items and amounts.
- Set every item's category to "auto"; it is assigned afterwards.
- Use the ISO currency code (EUR for euro, USD for dollar, ...).
- All amounts must be plain decimal numbers.
- Dates must be YYYY-MM-DD.
- Return ONLY the JSON object."#;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("no vision API key: set the {0} environment variable")]
    MissingApiKey(String),

    #[error("could not fetch receipt image: {0}")]
    ImageFetch(String),

    #[error("vision request failed: {0}")]
    Request(String),

    #[error("vision API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("vision API returned no text")]
    EmptyResponse,

    #[error("model output is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("model output is not a JSON object")]
    NotAnObject,
}

/// Values used when the model leaves a field out.
#[derive(Debug, Clone)]
pub struct ParseDefaults {
    pub currency: String,
    pub today: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub receipt: ParsedReceipt,
    /// Vendor rules that decided an item category, one entry per item.
    pub rule_hits: Vec<i64>,
}

fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn currency(value: Option<&Value>, default: &str) -> String {
    text(value)
        .map(|c| c.to_uppercase())
        .filter(|c| c.len() == 3 && c.chars().all(|ch| ch.is_ascii_alphabetic()))
        .unwrap_or_else(|| default.to_string())
}

fn date(value: Option<&Value>, today: NaiveDate) -> NaiveDate {
    text(value)
        .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
        .unwrap_or(today)
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn item(
    obj: &Map<String, Value>,
    vendor: &str,
    categorizer: &Categorizer,
    rule_hits: &mut Vec<i64>,
) -> (ReceiptItem, bool) {
    let description = text(obj.get("description")).unwrap_or_default();
    let qty = number(obj.get("qty")).unwrap_or(1.0);
    let unit_price = number(obj.get("unit_price")).unwrap_or(0.0);
    let line_total = number(obj.get("line_total"))
        .or_else(|| number(obj.get("unit_price")).map(|p| round_cents(p * qty)))
        .unwrap_or(0.0);

    let explicit = text(obj.get("category"))
        .filter(|c| !c.eq_ignore_ascii_case("auto"))
        .and_then(|c| Category::parse(&c));

    let (category, inferred) = match explicit {
        Some(c) => (c, false),
        None => {
            let r = categorizer.resolve(Some(vendor), Some(&description));
            if let Some(id) = r.rule_id {
                rule_hits.push(id);
            }
            (r.category, true)
        }
    };

    (
        ReceiptItem {
            description,
            qty,
            unit_price,
            line_total,
            category,
        },
        inferred,
    )
}

/// Decode and coerce the model's raw answer.
pub fn normalize(
    raw: &str,
    categorizer: &Categorizer,
    defaults: &ParseDefaults,
) -> Result<Normalized, ParseError> {
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    let obj = value.as_object().ok_or(ParseError::NotAnObject)?;

    let vendor = text(obj.get("vendor")).unwrap_or_else(|| UNKNOWN_VENDOR.to_string());
    let mut rule_hits = Vec::new();
    let mut any_inferred = false;

    let items: Vec<ReceiptItem> = obj
        .get("items")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_object)
                .map(|o| {
                    let (it, inferred) = item(o, &vendor, categorizer, &mut rule_hits);
                    any_inferred |= inferred;
                    it
                })
                .collect()
        })
        .unwrap_or_default();

    let receipt = ParsedReceipt {
        invoice_no: text(obj.get("invoice_no")),
        invoice_date: date(obj.get("invoice_date"), defaults.today),
        currency: currency(obj.get("currency"), &defaults.currency),
        subtotal: number(obj.get("subtotal")).unwrap_or(0.0),
        tax: number(obj.get("tax")).unwrap_or(0.0),
        total: number(obj.get("total")).unwrap_or(0.0),
        guessed_categories: any_inferred || items.is_empty(),
        items,
        vendor,
    };

    Ok(Normalized { receipt, rule_hits })
}

/// Send the image to the model and normalize what comes back.
pub fn parse_receipt<M: VisionModel + ?Sized>(
    model: &M,
    image: &ReceiptImage,
    categorizer: &Categorizer,
    defaults: &ParseDefaults,
) -> Result<Normalized, ParseError> {
    let raw = model.extract_json(image, RECEIPT_PROMPT)?;
    let out = normalize(&raw, categorizer, defaults);
    if let Err(e) = &out {
        let snippet: String = raw.chars().take(300).collect();
        tracing::warn!(error = %e, raw = %snippet, "model output rejected");
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Test double returning a canned answer.
    pub struct FakeModel(pub std::result::Result<String, fn() -> ParseError>);

    impl VisionModel for FakeModel {
        fn extract_json(&self, _image: &ReceiptImage, prompt: &str) -> Result<String, ParseError> {
            assert!(prompt.contains("invoice_date"));
            match &self.0 {
                Ok(s) => Ok(s.clone()),
                Err(f) => Err(f()),
            }
        }
    }

    pub fn defaults() -> ParseDefaults {
        ParseDefaults {
            currency: "EUR".to_string(),
            today: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        }
    }

    fn image() -> ReceiptImage {
        ReceiptImage {
            bytes: vec![0xFF, 0xD8],
            mime_type: "image/jpeg".to_string(),
        }
    }

    fn run(raw: &str) -> ParsedReceipt {
        normalize(raw, &Categorizer::keywords_only(), &defaults())
            .unwrap()
            .receipt
    }

    #[test]
    fn test_full_receipt() {
        let r = run(r#"{
            "vendor": "Conad Supermarket",
            "invoice_no": "INV-42",
            "invoice_date": "2024-01-15",
            "currency": "eur",
            "items": [
                {"description": "Pane i freskët", "qty": 2, "unit_price": 1.5, "line_total": 3.0, "category": "auto"},
                {"description": "USB cable", "qty": 1, "unit_price": 5.0, "line_total": 5.0, "category": "Technology"}
            ],
            "subtotal": 8.0, "tax": 1.6, "total": 9.6
        }"#);
        assert_eq!(r.vendor, "Conad Supermarket");
        assert_eq!(r.invoice_no.as_deref(), Some("INV-42"));
        assert_eq!(r.invoice_date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(r.currency, "EUR");
        assert_eq!(r.items.len(), 2);
        assert_eq!(r.items[0].category, Category::Food);
        assert_eq!(r.items[1].category, Category::Technology);
        assert!(r.guessed_categories);
        assert_eq!(r.total, 9.6);
    }

    #[test]
    fn test_missing_fields_are_coerced() {
        let r = run(r#"{"items": []}"#);
        assert_eq!(r.vendor, UNKNOWN_VENDOR);
        assert_eq!(r.invoice_no, None);
        assert_eq!(r.invoice_date, defaults().today);
        assert_eq!(r.currency, "EUR");
        assert_eq!((r.subtotal, r.tax, r.total), (0.0, 0.0, 0.0));
        assert!(r.items.is_empty());
        assert!(r.guessed_categories);
    }

    #[test]
    fn test_invalid_numbers_and_strings() {
        let r = run(r#"{"vendor": "  ", "total": "12.50", "tax": "n/a", "subtotal": null,
                        "currency": "euro", "invoice_date": "15/01/2024", "invoice_no": 1234}"#);
        assert_eq!(r.vendor, UNKNOWN_VENDOR);
        assert_eq!(r.total, 12.5);
        assert_eq!(r.tax, 0.0);
        assert_eq!(r.subtotal, 0.0);
        assert_eq!(r.currency, "EUR");
        assert_eq!(r.invoice_date, defaults().today);
        assert_eq!(r.invoice_no.as_deref(), Some("1234"));
    }

    #[test]
    fn test_item_defaults_and_derived_line_total() {
        let r = run(r#"{"vendor": "Uber", "items": [
            {"description": "Ride", "unit_price": 4.25, "qty": 2},
            {"qty": "x"},
            "not an item"
        ]}"#);
        assert_eq!(r.items.len(), 2);
        assert_eq!(r.items[0].line_total, 8.5);
        assert_eq!(r.items[0].category, Category::Transport);
        assert_eq!(r.items[1].description, "");
        assert_eq!(r.items[1].qty, 1.0);
        assert_eq!(r.items[1].line_total, 0.0);
        assert_eq!(r.items[1].category, Category::Transport);
    }

    #[test]
    fn test_explicit_categories_clear_guess_flag() {
        let r = run(r#"{"vendor": "Zara", "items": [
            {"description": "Jacket", "line_total": 60, "category": "Veshmbathje"}
        ]}"#);
        assert_eq!(r.items[0].category, Category::Clothing);
        assert!(!r.guessed_categories);
    }

    #[test]
    fn test_unknown_category_label_is_inferred() {
        let r = run(r#"{"vendor": "Lidl", "items": [
            {"description": "Apples", "line_total": 2, "category": "Groceries & Stuff"}
        ]}"#);
        assert_eq!(r.items[0].category, Category::Food);
        assert!(r.guessed_categories);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = normalize("Sure! Here is the JSON: {", &Categorizer::keywords_only(), &defaults())
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));
        let err = normalize("[1, 2]", &Categorizer::keywords_only(), &defaults()).unwrap_err();
        assert!(matches!(err, ParseError::NotAnObject));
    }

    #[test]
    fn test_parse_receipt_propagates_model_failure() {
        let model = FakeModel(Err(|| ParseError::Status {
            status: 503,
            body: "overloaded".to_string(),
        }));
        let err = parse_receipt(&model, &image(), &Categorizer::keywords_only(), &defaults())
            .unwrap_err();
        assert!(matches!(err, ParseError::Status { status: 503, .. }));
    }

    #[test]
    fn test_parse_receipt_success() {
        let model = FakeModel(Ok(r#"{"vendor": "Netflix", "total": 12.99}"#.to_string()));
        let out = parse_receipt(&model, &image(), &Categorizer::keywords_only(), &defaults())
            .unwrap();
        assert_eq!(out.receipt.vendor, "Netflix");
        assert_eq!(out.receipt.total, 12.99);
        assert!(out.rule_hits.is_empty());
    }

    #[test]
    fn test_rule_hits_reported() {
        use crate::models::{MatchType, VendorRule};
        let categorizer = Categorizer::new(vec![VendorRule {
            id: 7,
            pattern: "kiosk".to_string(),
            match_type: MatchType::Contains,
            category: Category::Food,
            priority: 0,
            hit_count: 0,
        }]);
        let out = normalize(
            r#"{"vendor": "Kiosk Ema", "items": [{"description": "a"}, {"description": "b"}]}"#,
            &categorizer,
            &defaults(),
        )
        .unwrap();
        assert_eq!(out.rule_hits, vec![7, 7]);
        assert!(out.receipt.items.iter().all(|i| i.category == Category::Food));
    }
}
