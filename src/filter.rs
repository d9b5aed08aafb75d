use crate::types::{MatchRequest, Scholarship};

// ============================================
// Candidate filters for match requests
// ============================================

/// Blank request values mean "no filter".
fn requested(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Scholarship lists the requested level. Scholarships without a level list pass.
pub fn matches_education_level(scholarship: &Scholarship, level: Option<&str>) -> bool {
    let Some(level) = level else {
        return true;
    };
    if scholarship.eligible_levels.is_empty() {
        return true;
    }
    let wanted = level.to_uppercase();
    scholarship.eligible_levels.iter().any(|l| *l == wanted)
}

/// Exact country match. Scholarships without a country list pass.
pub fn matches_country(scholarship: &Scholarship, country: Option<&str>) -> bool {
    let Some(country) = country else {
        return true;
    };
    if scholarship.eligible_countries.is_empty() {
        return true;
    }
    scholarship.eligible_countries.iter().any(|c| c == country)
}

pub fn matches_type(scholarship: &Scholarship, scholarship_type: Option<&str>) -> bool {
    match scholarship_type {
        None => true,
        Some(wanted) => scholarship
            .scholarship_type
            .as_deref()
            .map(|t| t.eq_ignore_ascii_case(wanted))
            .unwrap_or(false),
    }
}

/// Keep only the candidates that pass every filter of the request.
pub fn apply_request_filters(
    candidates: Vec<Scholarship>,
    request: &MatchRequest,
) -> Vec<Scholarship> {
    let level = requested(&request.education_level);
    let country = requested(&request.country);
    let scholarship_type = requested(&request.scholarship_type);

    candidates
        .into_iter()
        .filter(|s| matches_education_level(s, level))
        .filter(|s| matches_country(s, country))
        .filter(|s| matches_type(s, scholarship_type))
        .collect()
}
