use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::categorizer::Categorizer;
use crate::cli::{open_db, parse_defaults, storage};
use crate::error::Result;
use crate::fmt::{money, short_id};
use crate::models::ParsedReceipt;
use crate::pipeline::{parse_remote, parse_stored_receipt, ParseOutcome};
use crate::vision::HttpVisionModel;

/// Parse a stored receipt (or a URL) and print the normalized receipt as
/// JSON on stdout. Progress goes to stderr.
pub fn run(id: Option<String>, url: Option<String>, force: bool) -> Result<()> {
    let (settings, mut conn) = open_db()?;
    let model = HttpVisionModel::from_settings(&settings.vision)?;
    let defaults = parse_defaults(&settings);

    let parsed = match (id, url) {
        (_, Some(url)) => {
            let categorizer = Categorizer::load(&conn)?;
            parse_remote(&model, &url, settings.vision.timeout_secs, &categorizer, &defaults)?
        }
        (Some(id), None) => {
            let out = parse_stored_receipt(&mut conn, &storage(&settings), &model, &id, force, &defaults)?;
            eprintln!(
                "Parsed receipt {}: {} expense(s){}",
                short_id(&out.receipt.id),
                out.expenses.len(),
                if out.replaced > 0 {
                    format!(", replaced {}", out.replaced)
                } else {
                    String::new()
                }
            );
            out.parsed
        }
        (None, None) => {
            return Err(crate::error::FaturaError::Other(
                "Give a receipt id or --url".to_string(),
            ))
        }
    };

    println!("{}", serde_json::to_string_pretty(&parsed)?);
    Ok(())
}

pub fn items_table(parsed: &ParsedReceipt) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Description", "Qty", "Unit", "Total", "Category"]);
    for item in &parsed.items {
        table.add_row(vec![
            Cell::new(&item.description),
            Cell::new(item.qty),
            Cell::new(money(item.unit_price, &parsed.currency)),
            Cell::new(money(item.line_total, &parsed.currency)),
            Cell::new(item.category),
        ]);
    }
    table
}

/// Human summary used after `upload --parse`.
pub fn print_outcome(out: &ParseOutcome) {
    let p = &out.parsed;
    println!(
        "{} {} {} {}",
        "Parsed".green(),
        short_id(&out.receipt.id).bold(),
        p.vendor,
        p.invoice_date
    );
    if !p.items.is_empty() {
        println!("{}", items_table(p));
    }
    println!(
        "Total {}  ({} expense(s){})",
        money(p.total, &p.currency),
        out.expenses.len(),
        if p.guessed_categories { ", categories guessed" } else { "" }
    );
}
