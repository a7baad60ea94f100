//! Receipt lifecycle: upload, parse, persist.
//!
//! A receipt moves `pending -> parsing -> completed | error`. The `parsing`
//! status only guards against a second submission from the CLI; it is not a
//! lock. Everything a successful parse writes goes in one SQLite transaction,
//! so a failure leaves the previous expenses untouched.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row};

use crate::categorizer::{record_hit, Categorizer};
use crate::error::{FaturaError, Result};
use crate::expenses::{delete_for_receipt, insert_expense};
use crate::imaging;
use crate::models::{Expense, ParseStatus, ParsedReceipt, Receipt};
use crate::parser::{self, Normalized, ParseDefaults};
use crate::storage::{checksum, LocalStorage};
use crate::vision::{self, ReceiptImage, VisionModel};

pub const SOURCE_UPLOAD: &str = "upload";
pub const SOURCE_DEMO: &str = "demo";

const RECEIPT_COLUMNS: &str = "id, file_path, original_name, checksum, source, vendor, invoice_no, \
     invoice_date, currency, subtotal, tax, total, raw_json, parse_status, parse_error, created_at";

// ---------------------------------------------------------------------------
// Receipt rows
// ---------------------------------------------------------------------------

fn receipt_from_row(row: &Row) -> rusqlite::Result<Receipt> {
    Ok(Receipt {
        id: row.get(0)?,
        file_path: row.get(1)?,
        original_name: row.get(2)?,
        checksum: row.get(3)?,
        source: row.get(4)?,
        vendor: row.get(5)?,
        invoice_no: row.get(6)?,
        invoice_date: row.get(7)?,
        currency: row.get(8)?,
        subtotal: row.get(9)?,
        tax: row.get(10)?,
        total: row.get(11)?,
        raw_json: row.get(12)?,
        parse_status: row.get(13)?,
        parse_error: row.get(14)?,
        created_at: row.get(15)?,
    })
}

pub fn get_receipt(conn: &Connection, id: &str) -> Result<Option<Receipt>> {
    let sql = format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], receipt_from_row).optional()?)
}

/// Look up by full id or by an unambiguous prefix of at least four characters.
pub fn find_receipt(conn: &Connection, id_or_prefix: &str) -> Result<Receipt> {
    let needle = id_or_prefix.trim();
    if let Some(r) = get_receipt(conn, needle)? {
        return Ok(r);
    }
    if needle.len() >= 4 {
        let sql = format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipts WHERE substr(id, 1, length(?1)) = ?1 LIMIT 2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let matches = stmt
            .query_map([needle], receipt_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if matches.len() > 1 {
            return Err(FaturaError::Other(format!(
                "Receipt id prefix '{needle}' is ambiguous"
            )));
        }
        if let Some(r) = matches.into_iter().next() {
            return Ok(r);
        }
    }
    Err(FaturaError::ReceiptNotFound(needle.to_string()))
}

fn find_by_checksum(conn: &Connection, sum: &str) -> Result<Option<Receipt>> {
    let sql = format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE checksum = ?1 LIMIT 1");
    Ok(conn.query_row(&sql, [sum], receipt_from_row).optional()?)
}

/// Newest first.
pub fn list_receipts(conn: &Connection, status: Option<ParseStatus>) -> Result<Vec<Receipt>> {
    let sql = format!(
        "SELECT {RECEIPT_COLUMNS} FROM receipts \
         WHERE (?1 IS NULL OR parse_status = ?1) ORDER BY created_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([status.map(|s| s.as_str())], receipt_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn receipt_expenses(conn: &Connection, receipt_id: &str) -> Result<Vec<Expense>> {
    let mut stmt = conn.prepare(
        "SELECT id, receipt_id, date, category, description, amount, currency, vendor \
         FROM expenses WHERE receipt_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([receipt_id], |row| {
            Ok(Expense {
                id: row.get(0)?,
                receipt_id: row.get(1)?,
                date: row.get(2)?,
                category: row.get(3)?,
                description: row.get(4)?,
                amount: row.get(5)?,
                currency: row.get(6)?,
                vendor: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_receipt(
    conn: &Connection,
    file_path: &str,
    original_name: &str,
    sum: &str,
    source: &str,
) -> Result<Receipt> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO receipts (id, file_path, original_name, checksum, source, parse_status) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![id, file_path, original_name, sum, source, ParseStatus::Pending],
    )?;
    get_receipt(conn, &id)?.ok_or(FaturaError::ReceiptNotFound(id))
}

fn set_status(conn: &Connection, id: &str, status: ParseStatus, error: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE receipts SET parse_status = ?1, parse_error = ?2 WHERE id = ?3",
        rusqlite::params![status, error, id],
    )?;
    Ok(())
}

/// Remove a receipt and its stored image. Its expenses stay, unlinked.
pub fn delete_receipt(conn: &Connection, storage: &LocalStorage, id: &str) -> Result<Receipt> {
    let receipt = find_receipt(conn, id)?;
    // Image before row, so a failed removal leaves the receipt listed.
    if !receipt.is_demo() {
        let removed = storage.delete(Path::new(&receipt.file_path))?;
        if !removed {
            tracing::warn!(path = %receipt.file_path, "receipt image was already missing");
        }
    }
    conn.execute("DELETE FROM receipts WHERE id = ?1", [&receipt.id])?;
    tracing::info!(id = %receipt.id, "deleted receipt");
    Ok(receipt)
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum UploadOutcome {
    Stored { receipt: Receipt, resized: bool },
    /// The same file was uploaded before; nothing new was written.
    Duplicate(Receipt),
}

impl UploadOutcome {
    pub fn receipt(&self) -> &Receipt {
        match self {
            Self::Stored { receipt, .. } | Self::Duplicate(receipt) => receipt,
        }
    }
}

pub fn upload_bytes(
    conn: &Connection,
    storage: &LocalStorage,
    bytes: &[u8],
    original_name: &str,
    max_edge: u32,
) -> Result<UploadOutcome> {
    let format = imaging::detect_format(bytes, original_name)?;
    let sum = checksum(bytes);
    if let Some(existing) = find_by_checksum(conn, &sum)? {
        tracing::info!(id = %existing.id, "duplicate upload");
        return Ok(UploadOutcome::Duplicate(existing));
    }

    let prepared = imaging::downscale(bytes, format, max_edge);
    let path = storage.save(&prepared.data, imaging::extension(prepared.format))?;
    let receipt = insert_receipt(
        conn,
        &path.to_string_lossy(),
        original_name,
        &sum,
        SOURCE_UPLOAD,
    )?;
    tracing::info!(id = %receipt.id, name = original_name, "stored receipt");
    Ok(UploadOutcome::Stored {
        receipt,
        resized: prepared.was_resized(),
    })
}

pub fn upload_receipt(
    conn: &Connection,
    storage: &LocalStorage,
    path: &Path,
    max_edge: u32,
) -> Result<UploadOutcome> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    upload_bytes(conn, storage, &bytes, &name, max_edge)
}

// ---------------------------------------------------------------------------
// Expense derivation
// ---------------------------------------------------------------------------

pub fn unitemized_description(vendor: &str) -> String {
    format!("Purchase from {vendor}")
}

/// One expense per item, or a single expense for the receipt total when the
/// receipt has no items. Returns any vendor rule that decided the category
/// of the unitemized expense.
pub fn derive_expenses(
    receipt_id: Option<&str>,
    parsed: &ParsedReceipt,
    categorizer: &Categorizer,
) -> (Vec<Expense>, Option<i64>) {
    let base = |description: String, amount, category| Expense {
        id: None,
        receipt_id: receipt_id.map(str::to_string),
        date: parsed.invoice_date,
        category,
        description: Some(description),
        amount,
        currency: parsed.currency.clone(),
        vendor: Some(parsed.vendor.clone()),
    };

    if parsed.items.is_empty() {
        let r = categorizer.resolve(Some(&parsed.vendor), None);
        let e = base(unitemized_description(&parsed.vendor), parsed.total, r.category);
        return (vec![e], r.rule_id);
    }

    let rows = parsed
        .items
        .iter()
        .map(|item| base(item.description.clone(), item.line_total, item.category))
        .collect();
    (rows, None)
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ParseOutcome {
    pub receipt: Receipt,
    pub parsed: ParsedReceipt,
    pub expenses: Vec<Expense>,
    /// Expenses from an earlier parse that were replaced.
    pub replaced: usize,
}

/// Write a normalized parse result for `receipt_id`, replacing any
/// expenses from an earlier parse.
pub fn store_parse_result(
    conn: &mut Connection,
    receipt_id: &str,
    normalized: &Normalized,
    categorizer: &Categorizer,
) -> Result<(Vec<Expense>, usize)> {
    let parsed = &normalized.receipt;
    let raw = serde_json::to_string(parsed)?;
    let (mut expenses, extra_hit) = derive_expenses(Some(receipt_id), parsed, categorizer);

    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE receipts SET vendor = ?1, invoice_no = ?2, invoice_date = ?3, currency = ?4, \
         subtotal = ?5, tax = ?6, total = ?7, raw_json = ?8, parse_status = ?9, parse_error = NULL \
         WHERE id = ?10",
        rusqlite::params![
            parsed.vendor,
            parsed.invoice_no,
            parsed.invoice_date,
            parsed.currency,
            parsed.subtotal,
            parsed.tax,
            parsed.total,
            raw,
            ParseStatus::Completed,
            receipt_id,
        ],
    )?;
    let replaced = delete_for_receipt(&tx, receipt_id)?;
    for e in expenses.iter_mut() {
        e.id = Some(insert_expense(&tx, e)?);
    }
    for rule_id in normalized.rule_hits.iter().copied().chain(extra_hit) {
        record_hit(&tx, rule_id)?;
    }
    tx.commit()?;
    Ok((expenses, replaced))
}

fn read_stored_image(storage: &LocalStorage, receipt: &Receipt) -> Result<ReceiptImage> {
    let bytes = storage.read(Path::new(&receipt.file_path))?;
    let format = imaging::detect_format(&bytes, &receipt.original_name)?;
    Ok(ReceiptImage {
        bytes,
        mime_type: imaging::mime_type(format).to_string(),
    })
}

/// Parse a stored receipt and persist its expenses.
///
/// Refuses a receipt that is currently `parsing`, and a `completed` one
/// unless `force` is set. On any failure after the status guard, the
/// receipt is marked `error` with the message.
pub fn parse_stored_receipt<M: VisionModel + ?Sized>(
    conn: &mut Connection,
    storage: &LocalStorage,
    model: &M,
    id: &str,
    force: bool,
    defaults: &ParseDefaults,
) -> Result<ParseOutcome> {
    let receipt = find_receipt(conn, id)?;
    match receipt.parse_status {
        ParseStatus::Parsing => return Err(FaturaError::ParseInProgress(receipt.id)),
        ParseStatus::Completed if !force => return Err(FaturaError::AlreadyParsed(receipt.id)),
        _ => {}
    }
    if receipt.is_demo() {
        return Err(FaturaError::Other(format!(
            "Receipt {} is demo data and has no image to parse",
            receipt.id
        )));
    }

    set_status(conn, &receipt.id, ParseStatus::Parsing, None)?;
    tracing::info!(id = %receipt.id, force, "parsing receipt");

    match run_parse(conn, storage, model, &receipt, defaults) {
        Ok((parsed, expenses, replaced)) => {
            let receipt = find_receipt(conn, &receipt.id)?;
            tracing::info!(
                id = %receipt.id,
                vendor = %parsed.vendor,
                expenses = expenses.len(),
                replaced,
                "receipt parsed"
            );
            Ok(ParseOutcome {
                receipt,
                parsed,
                expenses,
                replaced,
            })
        }
        Err(e) => {
            tracing::error!(id = %receipt.id, error = %e, "receipt parse failed");
            if let Err(mark_err) =
                set_status(conn, &receipt.id, ParseStatus::Error, Some(&e.to_string()))
            {
                tracing::error!(id = %receipt.id, error = %mark_err, "could not mark receipt as failed");
            }
            Err(e)
        }
    }
}

fn run_parse<M: VisionModel + ?Sized>(
    conn: &mut Connection,
    storage: &LocalStorage,
    model: &M,
    receipt: &Receipt,
    defaults: &ParseDefaults,
) -> Result<(ParsedReceipt, Vec<Expense>, usize)> {
    let image = read_stored_image(storage, receipt)?;
    let categorizer = Categorizer::load(conn)?;
    let normalized = parser::parse_receipt(model, &image, &categorizer, defaults)?;
    let (expenses, replaced) = store_parse_result(conn, &receipt.id, &normalized, &categorizer)?;
    Ok((normalized.receipt, expenses, replaced))
}

/// Parse an image by URL without storing anything.
pub fn parse_remote<M: VisionModel + ?Sized>(
    model: &M,
    url: &str,
    timeout_secs: Option<u64>,
    categorizer: &Categorizer,
    defaults: &ParseDefaults,
) -> Result<ParsedReceipt> {
    let image = vision::fetch_image(url, timeout_secs)?;
    Ok(parser::parse_receipt(model, &image, categorizer, defaults)?.receipt)
}
