use crate::db::{get_connection, get_metadata};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings()?;
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_path().display());
    println!("Database:   {}", db_path.display());
    println!("Uploads:    {}", settings.uploads_dir().display());
    println!(
        "Vision:     {:?} / {} (key in ${}: {})",
        settings.vision.provider,
        settings.vision.model,
        settings.vision.api_key_env,
        if settings.vision.api_key().is_some() { "set" } else { "not set" }
    );

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:    {}", format_bytes(size));

        let conn = get_connection(&db_path)?;
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };

        println!();
        println!("Receipts:      {}", count("SELECT count(*) FROM receipts")?);
        println!(
            "  pending:     {}",
            count("SELECT count(*) FROM receipts WHERE parse_status = 'pending'")?
        );
        println!(
            "  error:       {}",
            count("SELECT count(*) FROM receipts WHERE parse_status = 'error'")?
        );
        println!("Expenses:      {}", count("SELECT count(*) FROM expenses")?);
        println!(
            "Vendor rules:  {}",
            count("SELECT count(*) FROM vendor_rules WHERE is_active = 1")?
        );
        if get_metadata(&conn, "demo_loaded").is_some() {
            println!("Demo data:     loaded");
        }
    } else {
        println!();
        println!("Database not found. Run `fatura init` to set up.");
    }

    Ok(())
}
