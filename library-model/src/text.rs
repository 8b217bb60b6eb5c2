//! String normalisation shared by importers and seeders.

use chrono::NaiveDate;

use crate::SLUG_MAX_LEN;

/// Normalise a spreadsheet cell: unify quotes and line endings, collapse
/// whitespace, and strip one pair of wrapping quotes.
pub fn clean_string(raw: &str) -> String {
    let replaced: String = raw
        .replace("\r\n", "\n")
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{00A0}' => ' ',
            other => other,
        })
        .collect();
    let collapsed = collapse_whitespace(&replaced);
    let quoted = collapsed.len() >= 2
        && ((collapsed.starts_with('"') && collapsed.ends_with('"'))
            || (collapsed.starts_with('\'') && collapsed.ends_with('\'')));
    if quoted {
        collapsed[1..collapsed.len() - 1].trim().to_string()
    } else {
        collapsed
    }
}

/// Trim and collapse every whitespace run to a single space.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// URL-safe slug: lowercase ASCII alphanumerics separated by single dashes.
pub fn slugify(input: &str) -> String {
    let lowered = clean_string(input).to_lowercase().replace('&', " and ");
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_dash = false;
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    if slug.len() > SLUG_MAX_LEN {
        slug.truncate(SLUG_MAX_LEN);
    }
    slug.trim_end_matches('-').to_string()
}

const MONTHS: [&str; 12] = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];

/// Parse `d-Mon-yy` / `dd-Mon-yyyy` (e.g. `12-Jul-23`) into `YYYY-MM-DD`.
/// Two-digit years are 20xx.
pub fn parse_day_month_year(raw: &str) -> Option<String> {
    let s = clean_string(raw);
    let mut parts = s.split('-');
    let (day, mon, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    if day.is_empty() || day.len() > 2 || !day.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !(year.len() == 2 || year.len() == 4) || !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if mon.len() != 3 {
        return None;
    }
    let month = MONTHS.iter().position(|m| m.eq_ignore_ascii_case(mon))? as u32 + 1;
    let day: u32 = day.parse().ok()?;
    let two_digit = year.len() == 2;
    let mut year: i32 = year.parse().ok()?;
    if two_digit {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Fresh list-item key, e.g. `blk_3f9c0a1b2d4e`.
pub fn new_key(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &id[..12])
}
