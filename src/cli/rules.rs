use comfy_table::{Cell, Table};

use crate::categorizer::{add_rule, deactivate_rule, load_rules};
use crate::cli::open_db;
use crate::error::Result;
use crate::models::{Category, MatchType};

pub fn add(pattern: &str, category: &str, match_type: &str, priority: i64) -> Result<()> {
    let category: Category = category.parse()?;
    let match_type: MatchType = match_type.parse()?;
    let (_, conn) = open_db()?;
    let id = add_rule(&conn, pattern, match_type, category, priority)?;
    println!("Added rule {id}: '{pattern}' \u{2192} {category}");
    Ok(())
}

pub fn list() -> Result<()> {
    let (_, conn) = open_db()?;
    let rules = load_rules(&conn)?;
    if rules.is_empty() {
        println!("No vendor rules. Add one with `fatura rules add <pattern> --category <name>`.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Pattern", "Type", "Category", "Priority", "Hits"]);
    for r in rules {
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(r.pattern),
            Cell::new(r.match_type.as_str()),
            Cell::new(r.category),
            Cell::new(r.priority),
            Cell::new(r.hit_count),
        ]);
    }
    println!("Rules\n{table}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let (_, conn) = open_db()?;
    let (pattern, category) = deactivate_rule(&conn, id)?;
    println!("Deleted rule {id}: '{pattern}' \u{2192} {category}");
    Ok(())
}
