use chrono::NaiveDate;
use rusqlite::Connection;

use crate::categorizer::Categorizer;
use crate::cli::{open_db, parse_defaults};
use crate::db::{get_metadata, set_metadata};
use crate::error::Result;
use crate::parser::normalize;
use crate::pipeline::{insert_receipt, store_parse_result, SOURCE_DEMO};
use crate::storage::checksum;

const DEMO_KEY: &str = "demo_loaded";

/// Model answers for a handful of receipts. They go through the same
/// normalization and categorization as real ones.
const SAMPLES: &[(&str, &str)] = &[
    (
        "conad-2024-01-15.jpg",
        r#"{"vendor": "Conad", "invoice_no": "C-10421", "invoice_date": "2024-01-15", "currency": "EUR",
            "items": [{"description": "Grocery shopping", "qty": 1, "unit_price": 45.50, "line_total": 45.50, "category": "auto"}],
            "subtotal": 45.50, "tax": 0, "total": 45.50}"#,
    ),
    (
        "uber-2024-01-14.png",
        r#"{"vendor": "Uber", "invoice_date": "2024-01-14", "currency": "EUR",
            "items": [{"description": "Taxi ride", "qty": 1, "unit_price": 12.30, "line_total": 12.30, "category": "auto"}],
            "subtotal": 12.30, "tax": 0, "total": 12.30}"#,
    ),
    (
        "pizza-2024-02-10.jpg",
        r#"{"vendor": "Pizza Place", "invoice_date": "2024-02-10", "currency": "EUR",
            "items": [{"description": "Restaurant", "qty": 1, "unit_price": 32.00, "line_total": 32.00, "category": "auto"}],
            "subtotal": 32.00, "tax": 0, "total": 32.00}"#,
    ),
    (
        "neptun-2024-02-18.jpg",
        r#"{"vendor": "Neptun Electronics", "invoice_no": 88017, "invoice_date": "2024-02-18", "currency": "EUR",
            "items": [
                {"description": "USB-C cable", "qty": 1, "unit_price": 9.99, "line_total": 9.99, "category": "auto"},
                {"description": "Headphones", "qty": 1, "unit_price": 49.00, "line_total": 49.00, "category": "auto"}
            ],
            "subtotal": 58.99, "tax": 0, "total": 58.99}"#,
    ),
    (
        "farmacia-2024-03-03.jpg",
        r#"{"vendor": "Farmacia Tirana", "invoice_date": "2024-03-03", "currency": "EUR",
            "items": [], "subtotal": 15.33, "tax": 3.07, "total": 18.40}"#,
    ),
    (
        "cinema-2024-03-09.jpg",
        r#"{"vendor": "Cinema Millennium", "invoice_date": "2024-03-09", "currency": "EUR",
            "items": [{"description": "Film", "qty": 2, "unit_price": 6.50, "category": "auto"}],
            "subtotal": 13.00, "tax": 0, "total": 13.00}"#,
    ),
    (
        "zara-2024-03-12.jpg",
        r#"{"vendor": "Zara", "invoice_date": "2024-03-12", "currency": "EUR",
            "items": [{"description": "Wool jacket", "qty": 1, "unit_price": 59.90, "line_total": 59.90, "category": "Veshmbathje"}],
            "subtotal": 59.90, "tax": 0, "total": 59.90}"#,
    ),
];

fn load_samples(conn: &mut Connection, today: NaiveDate, currency: &str) -> Result<usize> {
    let categorizer = Categorizer::load(conn)?;
    let defaults = crate::parser::ParseDefaults {
        currency: currency.to_string(),
        today,
    };
    let mut count = 0;
    for (name, raw) in SAMPLES {
        let normalized = normalize(raw, &categorizer, &defaults)?;
        let receipt = insert_receipt(conn, "", name, &checksum(raw.as_bytes()), SOURCE_DEMO)?;
        let (expenses, _) = store_parse_result(conn, &receipt.id, &normalized, &categorizer)?;
        count += expenses.len();
    }
    Ok(count)
}

pub fn run() -> Result<()> {
    let (settings, mut conn) = open_db()?;
    if get_metadata(&conn, DEMO_KEY).is_some() {
        println!("Demo data is already loaded.");
        return Ok(());
    }

    let defaults = parse_defaults(&settings);
    let count = load_samples(&mut conn, defaults.today, &defaults.currency)?;
    set_metadata(&conn, DEMO_KEY, "1")?;

    println!(
        "Loaded {} demo receipts with {count} expenses. Try `fatura report`.",
        SAMPLES.len()
    );
    Ok(())
}
