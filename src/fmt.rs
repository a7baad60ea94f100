fn symbol(currency: &str) -> Option<&'static str> {
    match currency {
        "EUR" => Some("€"),
        "USD" => Some("$"),
        "GBP" => Some("£"),
        _ => None,
    }
}

fn grouped(abs: f64) -> String {
    let cents = format!("{:.2}", abs);
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();
    format!("{with_commas}.{dec_part}")
}

/// Format an amount with thousands separators: €1,234.56, or
/// `1,234.56 ALL` for currencies without a known symbol.
pub fn money(val: f64, currency: &str) -> String {
    let sign = if val < 0.0 { "-" } else { "" };
    let body = grouped(val.abs());
    match symbol(currency) {
        Some(s) => format!("{sign}{s}{body}"),
        None => format!("{sign}{body} {currency}"),
    }
}

/// First eight characters of a receipt id, enough to pass back to the CLI.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(1234.56, "EUR"), "€1,234.56");
        assert_eq!(money(-500.00, "USD"), "-$500.00");
        assert_eq!(money(0.0, "EUR"), "€0.00");
        assert_eq!(money(1000000.99, "GBP"), "£1,000,000.99");
        assert_eq!(money(42.10, "ALL"), "42.10 ALL");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0f1e2d3c-aaaa-bbbb"), "0f1e2d3c");
        assert_eq!(short_id("abc"), "abc");
    }
}
