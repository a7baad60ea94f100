use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::Result;
use crate::models::Expense;

pub const HEADER: [&str; 6] = ["Date", "Vendor", "Description", "Category", "Amount", "Currency"];

pub fn default_file_name(today: NaiveDate) -> String {
    format!("expenses-{}.csv", today.format("%Y-%m-%d"))
}

/// Write expenses as CSV with every field quoted and `\n` line endings.
pub fn write_csv<W: Write>(out: W, expenses: &[Expense]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(out);
    wtr.write_record(HEADER)?;
    for e in expenses {
        let date = e.date.format("%Y-%m-%d").to_string();
        let amount = format!("{:.2}", e.amount);
        wtr.write_record([
            date.as_str(),
            e.vendor.as_deref().unwrap_or(""),
            e.description.as_deref().unwrap_or(""),
            e.category.name(),
            amount.as_str(),
            e.currency.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv_file(path: &Path, expenses: &[Expense]) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_csv(std::io::BufWriter::new(file), expenses)?;
    tracing::info!(path = %path.display(), rows = expenses.len(), "exported expenses");
    Ok(path.to_path_buf())
}
