use regex::Regex;
use rusqlite::Connection;

use crate::error::{FaturaError, Result};
use crate::models::{Category, MatchType, VendorRule};

/// Keyword table scanned in order; the first keyword that is a substring of
/// the lowercased `"<vendor> <description>"` decides the category.
///
/// Order is the priority. Text containing keywords from two categories
/// resolves to whichever keyword comes first here. A keyword that embeds a
/// shorter keyword from another category must come before it: "playstation"
/// ahead of "station", "transport" ahead of "sport". Venue names lead so a
/// cinema or concert ticket is not taken for a travel ticket.
pub const KEYWORD_RULES: &[(&str, Category)] = &[
    // Entertainment venues and brands
    ("playstation", Category::Entertainment),
    ("xbox", Category::Entertainment),
    ("netflix", Category::Entertainment),
    ("spotify", Category::Entertainment),
    ("cinema", Category::Entertainment),
    ("cineplexx", Category::Entertainment),
    ("theater", Category::Entertainment),
    ("theatre", Category::Entertainment),
    ("teatri", Category::Entertainment),
    ("concert", Category::Entertainment),
    ("koncert", Category::Entertainment),
    ("movie", Category::Entertainment),
    // Food & groceries
    ("supermarket", Category::Food),
    ("market", Category::Food),
    ("grocery", Category::Food),
    ("restaurant", Category::Food),
    ("bakery", Category::Food),
    ("cafe", Category::Food),
    ("food", Category::Food),
    ("conad", Category::Food),
    ("lidl", Category::Food),
    ("carrefour", Category::Food),
    ("pizza", Category::Food),
    ("bread", Category::Food),
    ("pane", Category::Food),
    ("milk", Category::Food),
    ("qumësht", Category::Food),
    ("ushqim", Category::Food),
    ("meat", Category::Food),
    ("fruit", Category::Food),
    ("vegetable", Category::Food),
    ("coffee", Category::Food),
    ("drink", Category::Food),
    ("water", Category::Food),
    ("caffe", Category::Food),
    ("kafe", Category::Food),
    // Transport
    ("uber", Category::Transport),
    ("taxi", Category::Transport),
    ("bus", Category::Transport),
    ("metro", Category::Transport),
    ("train", Category::Transport),
    ("fuel", Category::Transport),
    ("petrol", Category::Transport),
    ("benzinë", Category::Transport),
    ("gas", Category::Transport),
    ("parking", Category::Transport),
    ("transport", Category::Transport),
    ("station", Category::Transport),
    ("ticket", Category::Transport),
    ("flight", Category::Transport),
    ("airline", Category::Transport),
    // Technology
    ("apple", Category::Technology),
    ("microsoft", Category::Technology),
    ("google", Category::Technology),
    ("amazon", Category::Technology),
    ("software", Category::Technology),
    ("computer", Category::Technology),
    ("laptop", Category::Technology),
    ("tablet", Category::Technology),
    ("phone", Category::Technology),
    ("electronics", Category::Technology),
    ("teknologji", Category::Technology),
    ("tech", Category::Technology),
    // Entertainment
    ("music", Category::Entertainment),
    ("game", Category::Entertainment),
    ("entertainment", Category::Entertainment),
    ("argëtim", Category::Entertainment),
    ("sport", Category::Entertainment),
    ("magazine", Category::Entertainment),
    ("bookstore", Category::Entertainment),
    ("libraria", Category::Entertainment),
    // Health
    ("pharmacy", Category::Health),
    ("farmaci", Category::Health),
    ("medicine", Category::Health),
    ("medical", Category::Health),
    ("doctor", Category::Health),
    ("mjek", Category::Health),
    ("dentist", Category::Health),
    ("hospital", Category::Health),
    ("spital", Category::Health),
    ("clinic", Category::Health),
    ("shëndet", Category::Health),
    ("health", Category::Health),
    // Clothing
    ("zara", Category::Clothing),
    ("h&m", Category::Clothing),
    ("nike", Category::Clothing),
    ("adidas", Category::Clothing),
    ("fashion", Category::Clothing),
    ("clothing", Category::Clothing),
    ("clothes", Category::Clothing),
    ("veshje", Category::Clothing),
    ("shirt", Category::Clothing),
    ("pants", Category::Clothing),
    ("shoes", Category::Clothing),
    ("dress", Category::Clothing),
    ("jacket", Category::Clothing),
];

pub const DEFAULT_CATEGORY: Category = Category::Other;

fn joined_text(vendor: Option<&str>, description: Option<&str>) -> String {
    format!("{} {}", vendor.unwrap_or(""), description.unwrap_or("")).to_lowercase()
}

/// Static keyword scan, no user rules.
pub fn categorize_by_keywords(vendor: Option<&str>, description: Option<&str>) -> Category {
    let text = joined_text(vendor, description);
    KEYWORD_RULES
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .map(|(_, category)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}

fn rule_matches(vendor: &str, rule: &CompiledRule) -> bool {
    let vendor_lower = vendor.trim().to_lowercase();
    let pat_lower = rule.rule.pattern.trim().to_lowercase();
    match rule.rule.match_type {
        MatchType::Exact => vendor_lower == pat_lower,
        MatchType::Contains => vendor_lower.contains(&pat_lower),
        MatchType::StartsWith => vendor_lower.starts_with(&pat_lower),
        MatchType::Regex => rule.regex.as_ref().is_some_and(|re| re.is_match(vendor)),
    }
}

struct CompiledRule {
    rule: VendorRule,
    regex: Option<Regex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub category: Category,
    /// Vendor rule that decided the category, if any.
    pub rule_id: Option<i64>,
}

/// Vendor rules first, then the keyword table, then `Other`.
pub struct Categorizer {
    rules: Vec<CompiledRule>,
}

impl Categorizer {
    pub fn new(mut rules: Vec<VendorRule>) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        let rules = rules
            .into_iter()
            .map(|rule| {
                let regex = match rule.match_type {
                    MatchType::Regex => Regex::new(&rule.pattern).ok(),
                    _ => None,
                };
                CompiledRule { rule, regex }
            })
            .collect();
        Self { rules }
    }

    pub fn keywords_only() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn load(conn: &Connection) -> Result<Self> {
        Ok(Self::new(load_rules(conn)?))
    }

    pub fn resolve(&self, vendor: Option<&str>, description: Option<&str>) -> Resolution {
        if let Some(v) = vendor.filter(|v| !v.trim().is_empty()) {
            if let Some(hit) = self.rules.iter().find(|r| rule_matches(v, r)) {
                return Resolution {
                    category: hit.rule.category,
                    rule_id: Some(hit.rule.id),
                };
            }
        }
        Resolution {
            category: categorize_by_keywords(vendor, description),
            rule_id: None,
        }
    }

    #[cfg(test)]
    pub fn categorize(&self, vendor: Option<&str>, description: Option<&str>) -> Category {
        self.resolve(vendor, description).category
    }
}

// ---------------------------------------------------------------------------
// Vendor rule persistence
// ---------------------------------------------------------------------------

pub fn load_rules(conn: &Connection) -> Result<Vec<VendorRule>> {
    let mut stmt = conn.prepare(
        "SELECT id, pattern, match_type, category, priority, hit_count FROM vendor_rules \
         WHERE is_active = 1 ORDER BY priority DESC, id",
    )?;
    let raw: Vec<(i64, String, String, Category, i64, i64)> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(id, pattern, match_type, category, priority, hit_count)| {
            Ok(VendorRule {
                id,
                pattern,
                match_type: match_type.parse()?,
                category,
                priority,
                hit_count,
            })
        })
        .collect()
}

pub fn add_rule(
    conn: &Connection,
    pattern: &str,
    match_type: MatchType,
    category: Category,
    priority: i64,
) -> Result<i64> {
    if match_type == MatchType::Regex {
        Regex::new(pattern).map_err(|e| FaturaError::Other(format!("Invalid regex: {e}")))?;
    }
    conn.execute(
        "INSERT INTO vendor_rules (pattern, match_type, category, priority) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![pattern, match_type.as_str(), category, priority],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn deactivate_rule(conn: &Connection, id: i64) -> Result<(String, Category)> {
    let row: std::result::Result<(String, Category, i32), _> = conn.query_row(
        "SELECT pattern, category, is_active FROM vendor_rules WHERE id = ?1",
        [id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    );
    match row {
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            Err(FaturaError::Other(format!("No rule with ID {id}")))
        }
        Err(e) => Err(e.into()),
        Ok((_, _, 0)) => Err(FaturaError::Other(format!("Rule {id} is already inactive"))),
        Ok((pattern, category, _)) => {
            conn.execute("UPDATE vendor_rules SET is_active = 0 WHERE id = ?1", [id])?;
            Ok((pattern, category))
        }
    }
}

pub fn record_hit(conn: &Connection, rule_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE vendor_rules SET hit_count = hit_count + 1 WHERE id = ?1",
        [rule_id],
    )?;
    tracing::debug!(rule_id, "vendor rule hit");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn rule(id: i64, pattern: &str, match_type: MatchType, category: Category, priority: i64) -> VendorRule {
        VendorRule {
            id,
            pattern: pattern.to_string(),
            match_type,
            category,
            priority,
            hit_count: 0,
        }
    }

    #[test]
    fn test_vendor_keyword_hit() {
        assert_eq!(categorize_by_keywords(Some("Conad"), Some("")), Category::Food);
    }

    #[test]
    fn test_no_keyword_falls_back_to_other() {
        assert_eq!(
            categorize_by_keywords(Some("Zzyzx Corp"), Some("miscellaneous")),
            Category::Other
        );
        assert_eq!(categorize_by_keywords(None, None), Category::Other);
    }

    #[test]
    fn test_description_only() {
        assert_eq!(categorize_by_keywords(None, Some("Taxi ride")), Category::Transport);
        assert_eq!(categorize_by_keywords(None, Some("Pane i freskët")), Category::Food);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(categorize_by_keywords(Some("NETFLIX.COM"), None), Category::Entertainment);
    }

    #[test]
    fn test_first_match_in_table_order_wins() {
        // Food keywords precede Transport, so "food" beats "uber".
        assert_eq!(categorize_by_keywords(Some("Uber Eats"), Some("food delivery")), Category::Food);
        // "transport" must beat the "sport" substring it contains.
        assert_eq!(categorize_by_keywords(Some("City Transport"), None), Category::Transport);
    }

    #[test]
    fn test_longer_keyword_beats_embedded_one() {
        assert_eq!(
            categorize_by_keywords(Some("PlayStation Store"), None),
            Category::Entertainment
        );
        assert_eq!(
            categorize_by_keywords(Some("Cineplexx"), Some("Movie ticket")),
            Category::Entertainment
        );
        assert_eq!(
            categorize_by_keywords(Some("Teatri Kombëtar"), Some("ticket")),
            Category::Entertainment
        );
        assert_eq!(categorize_by_keywords(None, Some("Bus ticket")), Category::Transport);
        assert_eq!(categorize_by_keywords(Some("Shell Station"), None), Category::Transport);
    }

    #[test]
    fn test_short_words_do_not_catch_unrelated_vendors() {
        assert_ne!(
            categorize_by_keywords(Some("Barber Shop"), Some("haircut")),
            Category::Food
        );
        assert_ne!(
            categorize_by_keywords(Some("Booking.com"), Some("hotel")),
            Category::Entertainment
        );
        assert_eq!(categorize_by_keywords(Some("Caffe Vienna"), None), Category::Food);
        assert_eq!(
            categorize_by_keywords(Some("Libraria Adrion"), None),
            Category::Entertainment
        );
    }

    #[test]
    fn test_deterministic() {
        let first = categorize_by_keywords(Some("Apple Store"), Some("charger"));
        for _ in 0..10 {
            assert_eq!(categorize_by_keywords(Some("Apple Store"), Some("charger")), first);
        }
        assert_eq!(first, Category::Technology);
    }

    #[test]
    fn test_vendor_rule_beats_keywords() {
        let c = Categorizer::new(vec![rule(1, "conad", MatchType::Exact, Category::Other, 0)]);
        let r = c.resolve(Some("Conad"), Some("milk"));
        assert_eq!(r.category, Category::Other);
        assert_eq!(r.rule_id, Some(1));
    }

    #[test]
    fn test_exact_rule_does_not_match_substring() {
        let c = Categorizer::new(vec![rule(1, "conad", MatchType::Exact, Category::Other, 0)]);
        assert_eq!(c.categorize(Some("Conad City"), None), Category::Food);
    }

    #[test]
    fn test_higher_priority_rule_wins() {
        let c = Categorizer::new(vec![
            rule(1, "shop", MatchType::Contains, Category::Clothing, 1),
            rule(2, "shop", MatchType::Contains, Category::Technology, 10),
        ]);
        assert_eq!(c.categorize(Some("Corner Shop"), None), Category::Technology);
    }

    #[test]
    fn test_starts_with_and_regex_rules() {
        let c = Categorizer::new(vec![
            rule(1, "tirana", MatchType::StartsWith, Category::Transport, 0),
            rule(2, r"^ACME\s+\d+$", MatchType::Regex, Category::Health, 0),
            rule(3, "([", MatchType::Regex, Category::Clothing, 0),
        ]);
        assert_eq!(c.categorize(Some("TIRANA PARK"), None), Category::Transport);
        assert_eq!(c.categorize(Some("ACME 42"), None), Category::Health);
        assert_eq!(c.categorize(Some("Zzyzx"), None), Category::Other);
    }

    #[test]
    fn test_rules_persist_and_count_hits() {
        let (_dir, conn) = test_db();
        let id = add_rule(&conn, "Kiosk Ema", MatchType::Exact, Category::Food, 0).unwrap();
        let c = Categorizer::load(&conn).unwrap();
        let r = c.resolve(Some("kiosk ema"), None);
        assert_eq!(r.category, Category::Food);
        record_hit(&conn, r.rule_id.unwrap()).unwrap();
        let rules = load_rules(&conn).unwrap();
        assert_eq!(rules[0].id, id);
        assert_eq!(rules[0].hit_count, 1);
    }

    #[test]
    fn test_invalid_regex_rejected_on_add() {
        let (_dir, conn) = test_db();
        assert!(add_rule(&conn, "([", MatchType::Regex, Category::Food, 0).is_err());
    }

    #[test]
    fn test_deactivate_rule() {
        let (_dir, conn) = test_db();
        let id = add_rule(&conn, "x", MatchType::Contains, Category::Food, 0).unwrap();
        let (pattern, category) = deactivate_rule(&conn, id).unwrap();
        assert_eq!(pattern, "x");
        assert_eq!(category, Category::Food);
        assert!(load_rules(&conn).unwrap().is_empty());
        assert!(deactivate_rule(&conn, id).is_err());
        assert!(deactivate_rule(&conn, 999).is_err());
    }
}
