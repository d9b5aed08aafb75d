use crate::types::{Scholarship, ScholarshipMatch};
use chrono::NaiveDate;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    MatchDesc,
    MatchAsc,
    DeadlineAsc,
    DeadlineDesc,
}

impl SortKey {
    /// Unknown keys fall back to `MatchDesc`.
    pub fn parse(key: &str) -> Self {
        match key.trim().to_uppercase().as_str() {
            "MATCH_ASC" => SortKey::MatchAsc,
            "DEADLINE_ASC" => SortKey::DeadlineAsc,
            "DEADLINE_DESC" => SortKey::DeadlineDesc,
            _ => SortKey::MatchDesc,
        }
    }
}

fn by_match(a: &ScholarshipMatch, b: &ScholarshipMatch) -> Ordering {
    a.match_percentage
        .partial_cmp(&b.match_percentage)
        .unwrap_or(Ordering::Equal)
}

/// Deadlines ascending; scholarships without one sort last.
fn by_deadline(a: &Option<NaiveDate>, b: &Option<NaiveDate>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) if descending => y.cmp(x),
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort, so ties keep their candidate order.
pub fn sort_matches(matches: &mut [ScholarshipMatch], key: SortKey) {
    match key {
        SortKey::MatchDesc => matches.sort_by(|a, b| by_match(b, a)),
        SortKey::MatchAsc => matches.sort_by(by_match),
        SortKey::DeadlineAsc => {
            matches.sort_by(|a, b| by_deadline(&a.application_deadline, &b.application_deadline, false))
        }
        SortKey::DeadlineDesc => {
            matches.sort_by(|a, b| by_deadline(&a.application_deadline, &b.application_deadline, true))
        }
    }
}

// ============================================
// Display helpers
// ============================================

pub fn amount_display(scholarship: &Scholarship) -> String {
    let is_full = scholarship
        .scholarship_type
        .as_deref()
        .map(|t| t.eq_ignore_ascii_case("FULL"))
        .unwrap_or(false);
    if is_full {
        return "Fully Funded".to_string();
    }
    if let Some(amount) = scholarship.amount {
        return format!("{} {:.2}", scholarship.currency, amount);
    }
    if let Some(coverage) = scholarship.coverage_percentage {
        return format!("{}% Coverage", coverage);
    }
    "Contact for details".to_string()
}

pub fn deadline_display(deadline: Option<NaiveDate>) -> String {
    deadline
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "No deadline".to_string())
}

/// First eligible country, or "Multiple" when the list is open.
pub fn country_label(scholarship: &Scholarship) -> String {
    scholarship
        .eligible_countries
        .first()
        .cloned()
        .unwrap_or_else(|| "Multiple".to_string())
}

pub fn level_label(scholarship: &Scholarship) -> String {
    if scholarship.eligible_levels.is_empty() {
        "All levels".to_string()
    } else {
        scholarship.eligible_levels.join(", ")
    }
}

/// Institution name when known, else a placeholder carrying the id.
pub fn provider_label(institution_name: Option<&str>, institution_id: i64) -> String {
    match institution_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => format!("Institution #{}", institution_id),
    }
}

/// Days left until the deadline (negative when past).
pub fn days_until_deadline(deadline: Option<NaiveDate>, today: NaiveDate) -> Option<i64> {
    deadline.map(|d| (d - today).num_days())
}
