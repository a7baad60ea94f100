use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::models::Category;

pub fn run() -> Result<()> {
    let mut table = Table::new();
    table.set_header(vec!["Category", "Key", "Albanian"]);
    for c in Category::ALL {
        table.add_row(vec![Cell::new(c), Cell::new(c.key()), Cell::new(c.label_sq())]);
    }
    println!("Categories\n{table}");
    Ok(())
}
