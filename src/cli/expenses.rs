use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::{open_db, FilterArgs};
use crate::error::Result;
use crate::expenses::query_expenses;
use crate::fmt::money;

pub fn run(args: &FilterArgs) -> Result<()> {
    let filter = args.to_filter()?;
    let (_, conn) = open_db()?;
    let rows = query_expenses(&conn, &filter)?;
    if rows.is_empty() {
        println!("No expenses ({}).", filter.describe());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Vendor", "Description", "Category", "Amount"]);
    for e in &rows {
        table.add_row(vec![
            Cell::new(e.date),
            Cell::new(e.vendor.as_deref().unwrap_or("")),
            Cell::new(e.description.as_deref().unwrap_or("")),
            Cell::new(format!("{} / {}", e.category, e.category.label_sq())),
            Cell::new(money(e.amount, &e.currency)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("Expenses: {}\n{table}", filter.describe());
    println!("{} expense(s)", rows.len());
    Ok(())
}
