use crate::db::{get_connection, init_db};
use crate::error::{FaturaError, Result};
use crate::settings::{load_settings, save_settings, settings_file_exists, shellexpand_path};

pub fn run(data_dir: Option<String>, currency: Option<String>) -> Result<()> {
    let mut settings = load_settings()?;
    let existed = settings_file_exists();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(code) = currency {
        let code = code.trim().to_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(FaturaError::Settings(format!(
                "'{code}' is not a three-letter currency code"
            )));
        }
        settings.default_currency = code;
    }

    save_settings(&settings)?;

    let resolved = settings.data_path();
    std::fs::create_dir_all(&resolved)?;
    std::fs::create_dir_all(settings.uploads_dir())?;
    std::fs::create_dir_all(settings.exports_dir())?;

    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;

    if existed {
        println!("Updated fatura at {}", resolved.display());
    } else {
        println!("Initialized fatura at {}", resolved.display());
    }
    if settings.vision.api_key().is_none() {
        println!(
            "Set {} to your vision API key before parsing receipts.",
            settings.vision.api_key_env
        );
    }
    Ok(())
}
