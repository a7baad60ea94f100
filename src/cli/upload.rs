use std::path::Path;

use colored::Colorize;

use crate::cli::{open_db, parse::print_outcome, parse_defaults, storage};
use crate::error::Result;
use crate::fmt::short_id;
use crate::pipeline::{parse_stored_receipt, upload_receipt, UploadOutcome};
use crate::vision::HttpVisionModel;

pub fn run(files: &[String], parse: bool) -> Result<()> {
    let (settings, mut conn) = open_db()?;
    let storage = storage(&settings);

    // Resolve the model before touching any file so a missing key fails fast.
    let model = if parse {
        Some(HttpVisionModel::from_settings(&settings.vision)?)
    } else {
        None
    };

    for file in files {
        let outcome = upload_receipt(&conn, &storage, Path::new(file), settings.max_image_edge)?;
        let receipt = outcome.receipt();
        match &outcome {
            UploadOutcome::Stored { resized, .. } => {
                let note = if *resized { " (downscaled)" } else { "" };
                println!("Stored {file} as {}{note}", short_id(&receipt.id).bold());
            }
            UploadOutcome::Duplicate(existing) => {
                println!(
                    "{} {file} was already uploaded as {} ({})",
                    "Skipped:".yellow(),
                    short_id(&existing.id).bold(),
                    existing.parse_status
                );
                continue;
            }
        }

        if let Some(model) = &model {
            let out = parse_stored_receipt(
                &mut conn,
                &storage,
                model,
                &receipt.id,
                false,
                &parse_defaults(&settings),
            )?;
            print_outcome(&out);
        }
    }
    Ok(())
}
