use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::{open_db, FilterArgs};
use crate::error::Result;
use crate::expenses::query_expenses;
use crate::models::Category;
use crate::reports::summarize;

fn amount(v: f64) -> Cell {
    Cell::new(format!("{v:.2}")).set_alignment(CellAlignment::Right)
}

pub fn run(args: &FilterArgs, json: bool) -> Result<()> {
    let filter = args.to_filter()?;
    let (_, conn) = open_db()?;
    let rows = query_expenses(&conn, &filter)?;
    let summary = summarize(&rows);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No expenses ({}).", filter.describe());
        return Ok(());
    }

    let mut currencies: Vec<&str> = rows.iter().map(|e| e.currency.as_str()).collect();
    currencies.sort_unstable();
    currencies.dedup();
    if currencies.len() > 1 {
        println!(
            "Note: amounts in {} are summed without conversion.",
            currencies.join(", ")
        );
    }

    // Months down, categories across; only categories that occur get a column.
    let used: Vec<Category> = Category::ALL
        .into_iter()
        .filter(|c| summary.categories.iter().any(|t| t.category == *c))
        .collect();

    let mut monthly = Table::new();
    let mut header = vec!["Month".to_string()];
    header.extend(used.iter().map(|c| c.name().to_string()));
    header.push("Total".to_string());
    monthly.set_header(header);
    for m in &summary.months {
        let mut row = vec![Cell::new(&m.month)];
        for c in &used {
            row.push(match m.categories.get(c) {
                Some(v) => amount(*v),
                None => Cell::new(""),
            });
        }
        row.push(amount(m.total));
        monthly.add_row(row);
    }
    println!("By month: {}\n{monthly}", filter.describe());

    let mut by_category = Table::new();
    by_category.set_header(vec!["Category", "Kategoria", "Expenses", "Total", "Share"]);
    for t in &summary.categories {
        let share = if summary.total != 0.0 {
            t.total / summary.total * 100.0
        } else {
            0.0
        };
        by_category.add_row(vec![
            Cell::new(t.category),
            Cell::new(t.category.label_sq()),
            Cell::new(t.count),
            amount(t.total),
            Cell::new(format!("{share:.1}%")).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("\nBy category\n{by_category}");
    println!("\nGrand total: {:.2} across {} expense(s)", summary.total, summary.count);
    Ok(())
}
