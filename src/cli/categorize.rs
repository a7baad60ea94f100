use crate::categorizer::Categorizer;
use crate::cli::open_db;
use crate::error::{FaturaError, Result};

pub fn run(vendor: Option<String>, description: Option<String>) -> Result<()> {
    if vendor.is_none() && description.is_none() {
        return Err(FaturaError::Other(
            "Give --vendor and/or --description".to_string(),
        ));
    }
    let (_, conn) = open_db()?;
    let categorizer = Categorizer::load(&conn)?;
    let r = categorizer.resolve(vendor.as_deref(), description.as_deref());
    match r.rule_id {
        Some(id) => println!("{} ({}) via rule {id}", r.category, r.category.label_sq()),
        None => println!("{} ({})", r.category, r.category.label_sq()),
    }
    Ok(())
}
