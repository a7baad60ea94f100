use colored::{ColoredString, Colorize};
use comfy_table::{Cell, Table};

use crate::cli::{open_db, parse::items_table, storage};
use crate::error::{FaturaError, Result};
use crate::fmt::{money, short_id};
use crate::models::{ParseStatus, ParsedReceipt};
use crate::pipeline::{delete_receipt, find_receipt, list_receipts, receipt_expenses};

fn badge(status: ParseStatus) -> ColoredString {
    match status {
        ParseStatus::Pending => status.as_str().yellow(),
        ParseStatus::Parsing => status.as_str().cyan(),
        ParseStatus::Completed => status.as_str().green(),
        ParseStatus::Error => status.as_str().red(),
    }
}

pub fn list(status: Option<String>) -> Result<()> {
    let status = match status {
        Some(s) => Some(ParseStatus::from_db(&s.to_lowercase()).ok_or_else(|| {
            FaturaError::Other(format!(
                "Unknown status '{s}' (expected pending, parsing, completed or error)"
            ))
        })?),
        None => None,
    };
    let (_, conn) = open_db()?;
    let receipts = list_receipts(&conn, status)?;
    if receipts.is_empty() {
        println!("No receipts. Add one with `fatura upload <photo>`.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "File", "Status", "Vendor", "Date", "Total", "Uploaded"]);
    for r in &receipts {
        let total = match (r.total, r.currency.as_deref()) {
            (Some(t), Some(c)) => money(t, c),
            _ => String::new(),
        };
        table.add_row(vec![
            Cell::new(short_id(&r.id)),
            Cell::new(&r.original_name),
            Cell::new(badge(r.parse_status)),
            Cell::new(r.vendor.as_deref().unwrap_or("")),
            Cell::new(r.invoice_date.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(total),
            Cell::new(&r.created_at),
        ]);
    }
    println!("Receipts\n{table}");
    Ok(())
}

pub fn show(id: &str) -> Result<()> {
    let (_, conn) = open_db()?;
    let r = find_receipt(&conn, id)?;

    println!("ID:        {}", r.id);
    println!("File:      {} ({})", r.original_name, r.source);
    println!("Status:    {}", badge(r.parse_status));
    if let Some(err) = &r.parse_error {
        println!("Error:     {}", err.red());
    }
    if let Some(vendor) = &r.vendor {
        println!("Vendor:    {vendor}");
    }
    if let Some(no) = &r.invoice_no {
        println!("Invoice:   {no}");
    }
    if let Some(date) = r.invoice_date {
        println!("Date:      {date}");
    }
    if let (Some(total), Some(cur)) = (r.total, r.currency.as_deref()) {
        println!(
            "Total:     {} (subtotal {}, tax {})",
            money(total, cur),
            money(r.subtotal.unwrap_or(0.0), cur),
            money(r.tax.unwrap_or(0.0), cur)
        );
    }

    if let Some(raw) = &r.raw_json {
        match serde_json::from_str::<ParsedReceipt>(raw) {
            Ok(parsed) if !parsed.items.is_empty() => println!("\nItems\n{}", items_table(&parsed)),
            Ok(_) => {}
            Err(e) => tracing::warn!(id = %r.id, error = %e, "stored parse result is unreadable"),
        }
    }

    let expenses = receipt_expenses(&conn, &r.id)?;
    if !expenses.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Date", "Description", "Category", "Amount"]);
        for e in &expenses {
            table.add_row(vec![
                Cell::new(e.date),
                Cell::new(e.description.as_deref().unwrap_or("")),
                Cell::new(e.category),
                Cell::new(money(e.amount, &e.currency)),
            ]);
        }
        println!("\nExpenses\n{table}");
    }
    Ok(())
}

pub fn delete(id: &str) -> Result<()> {
    let (settings, conn) = open_db()?;
    let r = delete_receipt(&conn, &storage(&settings), id)?;
    println!("Deleted receipt {} ({})", short_id(&r.id), r.original_name);
    Ok(())
}
