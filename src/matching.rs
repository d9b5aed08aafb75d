//! Rule-based matching of a student profile against one scholarship.
//!
//! Eight weighted categories are scored independently; a miss flagged as
//! mandatory makes the student ineligible regardless of the total.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::config::{MatchingConfig, Thresholds, Weights};
use crate::types::{
    CategoryScore, MatchBreakdown, MatchQuality, MatchResult, MatchedCriterion, Scholarship,
    StudentProfile, UnmatchedCriterion,
};

const ACADEMIC_CHECK_POINTS: i32 = 5;
const UNKNOWN_INCOME_RANK: u8 = 5;
const IELTS_TO_TOEFL: f64 = 13.4;
const EQUIVALENT_TESTS: &[&str] = &["IELTS", "TOEFL", "PTE", "TOEFL IBT", "TOEFL ITP"];

fn income_ranks() -> &'static HashMap<&'static str, u8> {
    static RANKS: OnceLock<HashMap<&'static str, u8>> = OnceLock::new();
    RANKS.get_or_init(|| {
        HashMap::from([
            ("Below LKR 30,000", 1),
            ("LKR 30,000 - 50,000", 2),
            ("LKR 50,000 - 75,000", 3),
            ("LKR 75,000 - 100,000", 4),
            ("LKR 100,000 - 150,000", 5),
            ("LKR 150,000 - 200,000", 6),
            ("Above LKR 200,000", 7),
        ])
    })
}

fn income_rank(band: &str) -> u8 {
    income_ranks().get(band).copied().unwrap_or(UNKNOWN_INCOME_RANK)
}

/// `earned / maximum` as hundredths of a percent: the ratio is rounded
/// half-up to four decimals first, then scaled.
pub fn percent_hundredths(earned: i32, maximum: i32) -> i64 {
    if maximum <= 0 {
        return 0;
    }
    let (earned, maximum) = (earned.max(0) as i64, maximum as i64);
    (earned * 20_000 + maximum) / (2 * maximum)
}

fn to_percentage(hundredths: i64) -> f64 {
    hundredths as f64 / 100.0
}

fn is_yes(value: &Option<String>) -> bool {
    value
        .as_deref()
        .map(|v| v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

fn fmt_number(value: f64) -> String {
    value.to_string()
}

/// Accumulates criteria while the categories are evaluated.
#[derive(Default)]
struct Tally {
    matched: Vec<MatchedCriterion>,
    unmatched: Vec<UnmatchedCriterion>,
}

impl Tally {
    fn hit(
        &mut self,
        category: &str,
        criterion: &str,
        student: String,
        required: String,
        earned: i32,
        max: i32,
    ) {
        self.matched.push(MatchedCriterion {
            category: category.to_string(),
            criterion: criterion.to_string(),
            student_value: student,
            required_value: required,
            points_earned: earned,
            max_points: max,
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn miss(
        &mut self,
        category: &str,
        criterion: &str,
        student: String,
        required: String,
        missed: i32,
        mandatory: bool,
        suggestion: String,
    ) {
        self.unmatched.push(UnmatchedCriterion {
            category: category.to_string(),
            criterion: criterion.to_string(),
            student_value: student,
            required_value: required,
            points_missed: missed,
            mandatory,
            suggestion: Some(suggestion),
        });
    }
}

fn category_score(category: &str, earned: i32, maximum: i32) -> CategoryScore {
    CategoryScore {
        category: category.to_string(),
        earned,
        maximum,
        percentage: to_percentage(percent_hundredths(earned, maximum)),
    }
}

/// Scores students against scholarships with a fixed set of weights.
#[derive(Debug, Clone, Default)]
pub struct MatchingEngine {
    weights: Weights,
    thresholds: Thresholds,
}

impl MatchingEngine {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            weights: config.weights.clone(),
            thresholds: config.thresholds.clone(),
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn calculate_match(
        &self,
        student: &StudentProfile,
        scholarship: &Scholarship,
        today: NaiveDate,
    ) -> MatchResult {
        tracing::debug!(
            student = student.user_id,
            scholarship = scholarship.id,
            "Calculating match"
        );
        let mut tally = Tally::default();

        let breakdown = MatchBreakdown {
            education_level: self.education_level(student, scholarship, &mut tally),
            academic_performance: self.academic_performance(student, scholarship, &mut tally),
            english_proficiency: self.english_proficiency(student, scholarship, &mut tally),
            age: self.age(student, scholarship, today, &mut tally),
            nationality: self.nationality(student, scholarship, &mut tally),
            financial_need: self.financial_need(student, scholarship, &mut tally),
            field_of_study: self.field_of_study(student, scholarship, &mut tally),
            special_categories: self.special_categories(student, scholarship, &mut tally),
        };

        let earned: i32 = breakdown.categories().iter().map(|c| c.earned).sum();
        let match_percentage = to_percentage(percent_hundredths(earned, self.weights.total()));
        let match_quality = self.quality(match_percentage.trunc() as i32);

        let ineligibility_reason = tally
            .unmatched
            .iter()
            .find(|c| c.mandatory)
            .map(|c| c.criterion.clone());

        MatchResult {
            scholarship_id: scholarship.id,
            student_id: student.user_id,
            match_percentage,
            match_quality,
            matched_criteria: tally.matched,
            unmatched_criteria: tally.unmatched,
            breakdown,
            eligible: ineligibility_reason.is_none(),
            ineligibility_reason,
        }
    }

    pub fn quality(&self, whole_percentage: i32) -> MatchQuality {
        if whole_percentage >= self.thresholds.excellent_match {
            MatchQuality::Excellent
        } else if whole_percentage >= self.thresholds.good_match {
            MatchQuality::Good
        } else if whole_percentage >= self.thresholds.minimum_match_percentage {
            MatchQuality::Fair
        } else {
            MatchQuality::Poor
        }
    }

    fn education_level(
        &self,
        student: &StudentProfile,
        s: &Scholarship,
        tally: &mut Tally,
    ) -> CategoryScore {
        const CATEGORY: &str = "Education Level";
        let max = self.weights.education_level;
        let mut earned = max;

        let level = student.intended_level.as_deref();
        if let (false, Some(level)) = (s.eligible_levels.is_empty(), level) {
            let levels = s.eligible_levels.join(", ");
            if s.eligible_levels.iter().any(|l| *l == level.to_uppercase()) {
                tally.hit(CATEGORY, "Education level matches", level.to_string(), levels, max, max);
            } else {
                earned = 0;
                tally.miss(
                    CATEGORY,
                    "Education level does not match",
                    level.to_string(),
                    levels,
                    max,
                    true,
                    format!("This scholarship is for {} students", s.eligible_levels.join(" or ")),
                );
            }
        }
        category_score(CATEGORY, earned, max)
    }

    fn academic_performance(
        &self,
        student: &StudentProfile,
        s: &Scholarship,
        tally: &mut Tally,
    ) -> CategoryScore {
        const CATEGORY: &str = "Academic Performance";
        let max = self.weights.academic_performance;
        let mut earned = 0;

        match (student.gpa(), s.min_gpa) {
            (Some(gpa), Some(min)) if gpa < min => tally.miss(
                CATEGORY,
                "GPA below requirement",
                format!("{:.2}", gpa),
                format!("Minimum {}", fmt_number(min)),
                ACADEMIC_CHECK_POINTS,
                false,
                format!("Improve academic grades to meet minimum GPA of {}", fmt_number(min)),
            ),
            (Some(gpa), Some(min)) => {
                earned += ACADEMIC_CHECK_POINTS;
                tally.hit(
                    CATEGORY,
                    "GPA requirement met",
                    format!("{:.2}", gpa),
                    format!("Minimum {}", fmt_number(min)),
                    ACADEMIC_CHECK_POINTS,
                    ACADEMIC_CHECK_POINTS,
                );
            }
            _ => earned += ACADEMIC_CHECK_POINTS,
        }

        match (student.z_score, s.min_z_score) {
            (Some(z), Some(min)) if z < min => tally.miss(
                CATEGORY,
                "Z-score below requirement",
                fmt_number(z),
                format!("Minimum {}", fmt_number(min)),
                ACADEMIC_CHECK_POINTS,
                false,
                "Z-score requirement not met".to_string(),
            ),
            (Some(z), Some(min)) => {
                earned += ACADEMIC_CHECK_POINTS;
                tally.hit(
                    CATEGORY,
                    "Z-score requirement met",
                    fmt_number(z),
                    format!("Minimum {}", fmt_number(min)),
                    ACADEMIC_CHECK_POINTS,
                    ACADEMIC_CHECK_POINTS,
                );
            }
            _ => earned += ACADEMIC_CHECK_POINTS,
        }

        let required_stream = s
            .required_al_stream
            .as_deref()
            .filter(|r| !r.eq_ignore_ascii_case("ANY"));
        match (required_stream, student.al_stream.as_deref()) {
            (Some(required), Some(stream)) if required.eq_ignore_ascii_case(stream) => {
                earned += ACADEMIC_CHECK_POINTS;
                tally.hit(
                    CATEGORY,
                    "A/L stream matches",
                    stream.to_string(),
                    required.to_string(),
                    ACADEMIC_CHECK_POINTS,
                    ACADEMIC_CHECK_POINTS,
                );
            }
            (Some(required), Some(stream)) => tally.miss(
                CATEGORY,
                "A/L stream does not match",
                stream.to_string(),
                required.to_string(),
                ACADEMIC_CHECK_POINTS,
                false,
                format!("This scholarship prefers {} stream students", required),
            ),
            _ => earned += ACADEMIC_CHECK_POINTS,
        }

        category_score(CATEGORY, earned, max)
    }

    fn english_proficiency(
        &self,
        student: &StudentProfile,
        s: &Scholarship,
        tally: &mut Tally,
    ) -> CategoryScore {
        const CATEGORY: &str = "English Proficiency";
        let max = self.weights.english_proficiency;

        let required = (s.required_english_test.as_deref(), s.min_english_score);
        let (required_test, required_score) = match required {
            (Some(test), Some(score)) => (test, score),
            _ => return category_score(CATEGORY, max, max),
        };
        let required = format!("{} {}", required_test, fmt_number(required_score));

        let (test, score) = match (student.english_test.as_deref(), student.english_score_value()) {
            (Some(test), Some(score)) => (test, score),
            _ => {
                tally.miss(
                    CATEGORY,
                    "English proficiency test not provided",
                    "Not available".to_string(),
                    required,
                    max,
                    true,
                    format!(
                        "Take {} test and achieve score of {} or higher",
                        required_test,
                        fmt_number(required_score)
                    ),
                );
                return category_score(CATEGORY, 0, max);
            }
        };
        let student_value = format!("{} {}", test, fmt_number(score));

        if !(test.eq_ignore_ascii_case(required_test) || is_equivalent_test(test, required_test)) {
            let earned = max / 3;
            tally.miss(
                CATEGORY,
                "Different English test taken",
                test.to_string(),
                format!("{} required", required_test),
                max - earned,
                false,
                format!(
                    "Take {} test with minimum score of {}",
                    required_test,
                    fmt_number(required_score)
                ),
            );
            return category_score(CATEGORY, earned, max);
        }

        if normalize_english_score(score, test, required_test) >= required_score {
            tally.hit(CATEGORY, "English proficiency met", student_value, required, max, max);
            category_score(CATEGORY, max, max)
        } else {
            let earned = max / 2;
            tally.miss(
                CATEGORY,
                "English score below requirement",
                student_value,
                format!("{} or higher", required),
                max - earned,
                false,
                format!(
                    "Retake {} to achieve score of {}",
                    required_test,
                    fmt_number(required_score)
                ),
            );
            category_score(CATEGORY, earned, max)
        }
    }

    fn age(
        &self,
        student: &StudentProfile,
        s: &Scholarship,
        today: NaiveDate,
        tally: &mut Tally,
    ) -> CategoryScore {
        const CATEGORY: &str = "Age";
        let max = self.weights.age;

        let Some(age) = student.age_on(today) else {
            return category_score(CATEGORY, max / 2, max);
        };

        let mut violated = None;
        if let Some(min) = s.min_age.filter(|min| age < *min) {
            violated = Some(format!("Minimum age {}", min));
        }
        if let Some(max_age) = s.max_age.filter(|max_age| age > *max_age) {
            violated = Some(format!("Maximum age {}", max_age));
        }

        match violated {
            Some(requirement) => {
                tally.miss(
                    CATEGORY,
                    "Age outside required range",
                    format!("{} years old", age),
                    requirement,
                    max,
                    true,
                    "Age requirement cannot be changed".to_string(),
                );
                category_score(CATEGORY, 0, max)
            }
            None => {
                let range = format!(
                    "{} - {}",
                    s.min_age.map(|v| v.to_string()).unwrap_or_else(|| "No min".to_string()),
                    s.max_age.map(|v| v.to_string()).unwrap_or_else(|| "No max".to_string())
                );
                tally.hit(
                    CATEGORY,
                    "Age requirement met",
                    format!("{} years old", age),
                    range,
                    max,
                    max,
                );
                category_score(CATEGORY, max, max)
            }
        }
    }

    fn nationality(
        &self,
        student: &StudentProfile,
        s: &Scholarship,
        tally: &mut Tally,
    ) -> CategoryScore {
        const CATEGORY: &str = "Nationality";
        let max = self.weights.nationality;

        let nationality = match student.nationality.as_deref() {
            Some(n) if !s.eligible_countries.is_empty() => n,
            _ => return category_score(CATEGORY, max, max),
        };
        let countries = s.eligible_countries.join(", ");
        let eligible = s.eligible_countries.iter().any(|country| {
            country.eq_ignore_ascii_case(nationality)
                || (country.eq_ignore_ascii_case("Sri Lanka") && nationality.contains("Sri Lankan"))
        });

        if eligible {
            tally.hit(
                CATEGORY,
                "Nationality eligible",
                nationality.to_string(),
                countries,
                max,
                max,
            );
            category_score(CATEGORY, max, max)
        } else {
            tally.miss(
                CATEGORY,
                "Nationality not in eligible list",
                nationality.to_string(),
                countries.clone(),
                max,
                true,
                format!("This scholarship is only for citizens of {}", countries),
            );
            category_score(CATEGORY, 0, max)
        }
    }

    fn financial_need(
        &self,
        student: &StudentProfile,
        s: &Scholarship,
        tally: &mut Tally,
    ) -> CategoryScore {
        const CATEGORY: &str = "Financial Need";
        let max = self.weights.financial_need;

        if !s.requires_financial_need {
            return category_score(CATEGORY, max, max);
        }

        let incomes = (student.household_income.as_deref(), s.max_household_income.as_deref());
        let earned = match incomes {
            (Some(income), Some(limit)) if income_rank(income) <= income_rank(limit) => {
                tally.hit(
                    CATEGORY,
                    "Financial need criteria met",
                    income.to_string(),
                    format!("Maximum {}", limit),
                    max,
                    max,
                );
                max
            }
            (Some(income), Some(limit)) => {
                tally.miss(
                    CATEGORY,
                    "Income above threshold",
                    income.to_string(),
                    format!("Maximum {}", limit),
                    max,
                    false,
                    "This scholarship prioritizes students from lower income backgrounds"
                        .to_string(),
                );
                0
            }
            (Some(_), None) => max / 2,
            _ => 0,
        };
        category_score(CATEGORY, earned, max)
    }

    fn field_of_study(
        &self,
        student: &StudentProfile,
        s: &Scholarship,
        tally: &mut Tally,
    ) -> CategoryScore {
        const CATEGORY: &str = "Field of Study";
        let max = self.weights.field_of_study;

        if s.eligible_fields.is_empty() {
            return category_score(CATEGORY, max, max);
        }
        if student.preferred_fields.is_empty() {
            return category_score(CATEGORY, max / 2, max);
        }

        let overlaps = student.preferred_fields.iter().any(|sf| {
            let sf = sf.to_lowercase();
            s.eligible_fields.iter().any(|ef| {
                let ef = ef.to_lowercase();
                ef == sf || ef.contains(&sf) || sf.contains(&ef)
            })
        });
        let student_value = student.preferred_fields.join(", ");
        let fields = s.eligible_fields.join(", ");

        if overlaps {
            tally.hit(CATEGORY, "Field of study matches", student_value, fields, max, max);
            category_score(CATEGORY, max, max)
        } else {
            tally.miss(
                CATEGORY,
                "Field of study does not match",
                student_value,
                fields.clone(),
                max,
                false,
                format!("This scholarship is for {} fields", fields),
            );
            category_score(CATEGORY, 0, max)
        }
    }

    fn special_categories(
        &self,
        student: &StudentProfile,
        s: &Scholarship,
        tally: &mut Tally,
    ) -> CategoryScore {
        const CATEGORY: &str = "Special Categories";
        let max = self.weights.special_categories;
        let quarter = max / 4;
        let mut criteria = 0;
        let mut matched = 0;

        if s.sports_achievement_required {
            criteria += 1;
            if is_yes(&student.sports) {
                matched += 1;
                tally.hit(
                    CATEGORY,
                    "Sports achievement",
                    "Yes".into(),
                    "Sports achievement required".into(),
                    quarter,
                    quarter,
                );
            } else {
                tally.miss(
                    CATEGORY,
                    "Sports achievement not indicated",
                    "No".into(),
                    "Sports achievement preferred".into(),
                    quarter,
                    false,
                    "Highlight any sports achievements in your profile".into(),
                );
            }
        }

        if s.leadership_required {
            criteria += 1;
            if is_yes(&student.leadership) {
                matched += 1;
                tally.hit(
                    CATEGORY,
                    "Leadership experience",
                    "Yes".into(),
                    "Leadership experience required".into(),
                    quarter,
                    quarter,
                );
            } else {
                tally.miss(
                    CATEGORY,
                    "Leadership experience not indicated",
                    "No".into(),
                    "Leadership experience preferred".into(),
                    quarter,
                    false,
                    "Highlight any leadership roles in your profile".into(),
                );
            }
        }

        // First-generation is a priority, not a requirement: no miss recorded.
        if s.first_generation_priority {
            criteria += 1;
            if is_yes(&student.first_generation) {
                matched += 1;
                tally.hit(
                    CATEGORY,
                    "First-generation student",
                    "Yes".into(),
                    "First-generation students prioritized".into(),
                    quarter,
                    quarter,
                );
            }
        }

        if s.disability_friendly && is_yes(&student.disability) {
            matched += 1;
            tally.hit(
                CATEGORY,
                "Disability-friendly scholarship",
                "Yes".into(),
                "Disability support available".into(),
                quarter,
                quarter,
            );
        }

        if s.return_to_home_required {
            criteria += 1;
            if is_yes(&student.willing_to_return) {
                matched += 1;
                tally.hit(
                    CATEGORY,
                    "Willing to return to home country",
                    "Yes".into(),
                    "Must return after studies".into(),
                    quarter,
                    quarter,
                );
            } else {
                tally.miss(
                    CATEGORY,
                    "Return requirement",
                    "Not specified".into(),
                    "Must return to home country after studies".into(),
                    quarter,
                    true,
                    "This scholarship requires returning to your home country".into(),
                );
            }
        }

        let earned = if criteria > 0 {
            matched * max / criteria.max(4)
        } else {
            max
        };
        category_score(CATEGORY, earned, max)
    }
}

fn is_equivalent_test(a: &str, b: &str) -> bool {
    let known = |t: &str| EQUIVALENT_TESTS.contains(&t.to_uppercase().as_str());
    known(a) && known(b)
}

/// Convert a score between IELTS and TOEFL scales; other pairs pass through.
pub fn normalize_english_score(score: f64, from: &str, to: &str) -> f64 {
    if from.eq_ignore_ascii_case(to) {
        return score;
    }
    if from.eq_ignore_ascii_case("IELTS") && to.eq_ignore_ascii_case("TOEFL") {
        return score * IELTS_TO_TOEFL;
    }
    if from.eq_ignore_ascii_case("TOEFL") && to.eq_ignore_ascii_case("IELTS") {
        return (score / IELTS_TO_TOEFL * 10.0).round() / 10.0;
    }
    score
}
