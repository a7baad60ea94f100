use std::path::PathBuf;

use crate::cli::{open_db, FilterArgs};
use crate::error::Result;
use crate::expenses::query_expenses;
use crate::export::{default_file_name, write_csv_file};

pub fn run(args: &FilterArgs, output: Option<String>) -> Result<()> {
    let filter = args.to_filter()?;
    let (settings, conn) = open_db()?;
    let rows = query_expenses(&conn, &filter)?;
    let path = output.map(PathBuf::from).unwrap_or_else(|| {
        settings
            .exports_dir()
            .join(default_file_name(chrono::Local::now().date_naive()))
    });
    let path = write_csv_file(&path, &rows)?;
    println!("Wrote {} expense(s) to {}", rows.len(), path.display());
    Ok(())
}
