use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Declares an upper-case string enum that round-trips through serde and
/// SQLite text columns.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Case-insensitive parse.
            pub fn parse(value: &str) -> Option<Self> {
                let upper = value.trim().to_uppercase();
                match upper.as_str() {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(Role {
    Student => "STUDENT",
    Institution => "INSTITUTION",
    Admin => "ADMIN",
});

string_enum!(ScholarshipStatus {
    Draft => "DRAFT",
    Active => "ACTIVE",
    Closed => "CLOSED",
    Expired => "EXPIRED",
});

string_enum!(ApplicationStatus {
    Submitted => "SUBMITTED",
    UnderReview => "UNDER_REVIEW",
    Shortlisted => "SHORTLISTED",
    Accepted => "ACCEPTED",
    Rejected => "REJECTED",
    Withdrawn => "WITHDRAWN",
});

string_enum!(MatchQuality {
    Excellent => "EXCELLENT",
    Good => "GOOD",
    Fair => "FAIR",
    Poor => "POOR",
});

string_enum!(ContactCategory {
    General => "GENERAL",
    Scholarship => "SCHOLARSHIP",
    Technical => "TECHNICAL",
    Feedback => "FEEDBACK",
    Complaint => "COMPLAINT",
});

string_enum!(ContactStatus {
    New => "NEW",
    Read => "READ",
    InProgress => "IN_PROGRESS",
    Resolved => "RESOLVED",
    Closed => "CLOSED",
});

string_enum!(ContactPriority {
    Low => "LOW",
    Normal => "NORMAL",
    High => "HIGH",
    Urgent => "URGENT",
});

string_enum!(
    /// Outbox states. SENDING marks a row claimed by one delivery attempt.
    EmailStatus {
        Pending => "PENDING",
        Sending => "SENDING",
        Sent => "SENT",
        Retry => "RETRY",
        Failed => "FAILED",
    }
);

string_enum!(ContentType {
    News => "NEWS",
    Blog => "BLOG",
    Both => "BOTH",
});

string_enum!(ArticleKind {
    Blog => "BLOG",
    News => "NEWS",
});

string_enum!(ArticleStatus {
    Draft => "DRAFT",
    Published => "PUBLISHED",
    Archived => "ARCHIVED",
});

// ============================================
// Accounts
// ============================================

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    pub verification_token: Option<String>,
    pub full_name: Option<String>,
    pub institution_name: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The authenticated caller of a service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The caller is `user_id` or an admin.
    pub fn can_act_for(&self, user_id: i64) -> bool {
        self.is_admin() || self.user_id == user_id
    }
}

#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            is_verified: user.is_verified,
            full_name: user.full_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub institution_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

// ============================================
// Student profile
// ============================================

/// Matching input for a student. Yes/No answers are kept as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentProfile {
    pub user_id: i64,
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub district: Option<String>,
    /// UNDERGRADUATE, POSTGRADUATE or PHD
    pub intended_level: Option<String>,
    pub al_stream: Option<String>,
    pub al_grade1: Option<String>,
    pub al_grade2: Option<String>,
    pub al_grade3: Option<String>,
    pub z_score: Option<f64>,
    pub english_test: Option<String>,
    pub english_score: Option<String>,
    pub household_income: Option<String>,
    pub dependents: Option<i32>,
    pub sports: Option<String>,
    pub leadership: Option<String>,
    pub first_generation: Option<String>,
    pub disability: Option<String>,
    pub willing_to_return: Option<String>,
    pub preferred_countries: Vec<String>,
    pub preferred_fields: Vec<String>,
    pub preferred_scholarship_type: Option<String>,
    pub profile_completion: i32,
}

impl Default for StudentProfile {
    fn default() -> Self {
        Self {
            user_id: 0,
            full_name: String::new(),
            date_of_birth: None,
            gender: None,
            nationality: Some("Sri Lankan".to_string()),
            district: None,
            intended_level: None,
            al_stream: None,
            al_grade1: None,
            al_grade2: None,
            al_grade3: None,
            z_score: None,
            english_test: None,
            english_score: None,
            household_income: None,
            dependents: None,
            sports: None,
            leadership: None,
            first_generation: None,
            disability: None,
            willing_to_return: None,
            preferred_countries: Vec::new(),
            preferred_fields: Vec::new(),
            preferred_scholarship_type: None,
            profile_completion: 0,
        }
    }
}

fn grade_points(grade: &str) -> f64 {
    match grade.to_uppercase().as_str() {
        "A" => 4.0,
        "B" => 3.0,
        "C" => 2.0,
        "S" => 1.0,
        _ => 0.0,
    }
}

fn filled(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

impl StudentProfile {
    fn grades(&self) -> impl Iterator<Item = &str> {
        [&self.al_grade1, &self.al_grade2, &self.al_grade3]
            .into_iter()
            .filter_map(|g| g.as_deref())
    }

    /// Completed years at `today`.
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        self.date_of_birth
            .and_then(|dob| today.years_since(dob))
            .map(|years| years as i32)
    }

    /// Mean A/L grade points over the grades present.
    pub fn gpa(&self) -> Option<f64> {
        let points: Vec<f64> = self.grades().map(grade_points).collect();
        if points.is_empty() {
            return None;
        }
        Some(points.iter().sum::<f64>() / points.len() as f64)
    }

    pub fn al_pass_count(&self) -> usize {
        self.grades()
            .filter(|g| matches!(g.to_uppercase().as_str(), "A" | "B" | "C" | "S"))
            .count()
    }

    pub fn english_score_value(&self) -> Option<f64> {
        self.english_score
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
    }

    /// Share of the tracked fields that are filled, rounded down.
    pub fn completion_percentage(&self) -> i32 {
        let checks = [
            !self.full_name.trim().is_empty(),
            self.date_of_birth.is_some(),
            filled(&self.gender),
            filled(&self.nationality),
            filled(&self.district),
            filled(&self.intended_level),
            filled(&self.al_stream),
            filled(&self.al_grade1),
            filled(&self.al_grade2),
            filled(&self.al_grade3),
            self.z_score.is_some(),
            filled(&self.english_test),
            filled(&self.english_score),
            filled(&self.household_income),
            self.dependents.is_some(),
            filled(&self.sports),
            filled(&self.leadership),
            filled(&self.first_generation),
            filled(&self.willing_to_return),
            !self.preferred_fields.is_empty(),
        ];
        let done = checks.iter().filter(|c| **c).count();
        (done * 100 / checks.len()) as i32
    }
}

// ============================================
// Scholarships
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scholarship {
    pub id: i64,
    pub institution_id: i64,
    pub title: String,
    pub description: Option<String>,
    /// FULL, PARTIAL, TUITION or LIVING_EXPENSES
    pub scholarship_type: Option<String>,
    pub coverage_percentage: Option<i32>,
    pub amount: Option<f64>,
    pub currency: String,
    pub eligible_countries: Vec<String>,
    pub eligible_fields: Vec<String>,
    pub eligible_levels: Vec<String>,
    pub min_gpa: Option<f64>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub required_english_test: Option<String>,
    pub min_english_score: Option<f64>,
    pub min_al_passes: Option<i32>,
    pub required_al_stream: Option<String>,
    pub min_z_score: Option<f64>,
    pub requires_financial_need: bool,
    pub max_household_income: Option<String>,
    pub sports_achievement_required: bool,
    pub leadership_required: bool,
    pub first_generation_priority: bool,
    pub disability_friendly: bool,
    pub return_to_home_required: bool,
    pub application_deadline: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub duration_months: Option<i32>,
    pub required_documents: Vec<String>,
    pub status: ScholarshipStatus,
    pub is_featured: bool,
    pub total_applications: i64,
    pub views_count: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Default for Scholarship {
    fn default() -> Self {
        Self {
            id: 0,
            institution_id: 0,
            title: String::new(),
            description: None,
            scholarship_type: None,
            coverage_percentage: None,
            amount: None,
            currency: "USD".to_string(),
            eligible_countries: Vec::new(),
            eligible_fields: Vec::new(),
            eligible_levels: Vec::new(),
            min_gpa: None,
            min_age: None,
            max_age: None,
            required_english_test: None,
            min_english_score: None,
            min_al_passes: None,
            required_al_stream: None,
            min_z_score: None,
            requires_financial_need: false,
            max_household_income: None,
            sports_achievement_required: false,
            leadership_required: false,
            first_generation_priority: false,
            disability_friendly: false,
            return_to_home_required: false,
            application_deadline: None,
            start_date: None,
            duration_months: None,
            required_documents: Vec::new(),
            status: ScholarshipStatus::Draft,
            is_featured: false,
            total_applications: 0,
            views_count: 0,
            created_at: None,
            updated_at: None,
            published_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: String,
}

// ============================================
// Matching
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchRequest {
    pub student_user_id: Option<i64>,
    pub scholarship_ids: Vec<i64>,
    pub education_level: Option<String>,
    pub country: Option<String>,
    pub field_of_study: Option<String>,
    pub scholarship_type: Option<String>,
    pub minimum_match_percentage: i32,
    pub limit: usize,
    pub sort_by: String,
}

impl Default for MatchRequest {
    fn default() -> Self {
        Self {
            student_user_id: None,
            scholarship_ids: Vec::new(),
            education_level: None,
            country: None,
            field_of_study: None,
            scholarship_type: None,
            minimum_match_percentage: 0,
            limit: 50,
            sort_by: "MATCH_DESC".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedCriterion {
    pub category: String,
    pub criterion: String,
    pub student_value: String,
    pub required_value: String,
    pub points_earned: i32,
    pub max_points: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedCriterion {
    pub category: String,
    pub criterion: String,
    pub student_value: String,
    pub required_value: String,
    pub points_missed: i32,
    pub mandatory: bool,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub category: String,
    pub earned: i32,
    pub maximum: i32,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchBreakdown {
    pub education_level: CategoryScore,
    pub academic_performance: CategoryScore,
    pub english_proficiency: CategoryScore,
    pub age: CategoryScore,
    pub nationality: CategoryScore,
    pub financial_need: CategoryScore,
    pub field_of_study: CategoryScore,
    pub special_categories: CategoryScore,
}

impl MatchBreakdown {
    pub fn categories(&self) -> [&CategoryScore; 8] {
        [
            &self.education_level,
            &self.academic_performance,
            &self.english_proficiency,
            &self.age,
            &self.nationality,
            &self.financial_need,
            &self.field_of_study,
            &self.special_categories,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub scholarship_id: i64,
    pub student_id: i64,
    /// 0-100 with two decimals.
    pub match_percentage: f64,
    pub match_quality: MatchQuality,
    pub matched_criteria: Vec<MatchedCriterion>,
    pub unmatched_criteria: Vec<UnmatchedCriterion>,
    pub breakdown: MatchBreakdown,
    pub eligible: bool,
    pub ineligibility_reason: Option<String>,
}

impl MatchResult {
    /// Integer part of the percentage, used for thresholds.
    pub fn whole_percentage(&self) -> i32 {
        self.match_percentage.trunc() as i32
    }
}

/// A scholarship as presented in a ranked match list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScholarshipMatch {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub provider: String,
    pub country: String,
    pub scholarship_type: Option<String>,
    pub amount: Option<f64>,
    pub currency: String,
    pub amount_display: String,
    pub level: String,
    pub application_deadline: Option<NaiveDate>,
    pub deadline_display: String,
    pub is_featured: bool,
    pub match_percentage: f64,
    pub match_quality: MatchQuality,
    pub matched_criteria: Vec<String>,
    pub unmatched_criteria: Vec<String>,
    pub is_eligible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub student_id: i64,
    pub student_name: String,
    pub total_scholarships_analyzed: usize,
    pub matches_found: usize,
    pub excellent_matches: usize,
    pub good_matches: usize,
    pub fair_matches: usize,
    pub scholarships: Vec<ScholarshipMatch>,
    pub improvement_suggestions: Vec<String>,
}

// ============================================
// Applications
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: i64,
    pub scholarship_id: i64,
    pub student_id: i64,
    pub status: ApplicationStatus,
    pub cover_letter: Option<String>,
    pub statement_of_purpose: Option<String>,
    pub reviewer_id: Option<i64>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub match_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplyRequest {
    pub scholarship_id: i64,
    pub cover_letter: Option<String>,
    pub statement_of_purpose: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewRequest {
    pub status: String,
    pub notes: Option<String>,
}

// ============================================
// Contact inbox and outbox
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub category: ContactCategory,
    pub status: ContactStatus,
    pub priority: ContactPriority,
    pub assigned_to: Option<i64>,
    pub admin_notes: Option<String>,
    pub response: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub responded_by: Option<i64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContactMessage {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactResponseRequest {
    pub response: String,
    pub admin_notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactNotesRequest {
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactStats {
    pub total_messages: i64,
    pub new_messages: i64,
    pub in_progress_messages: i64,
    pub resolved_messages: i64,
    pub today_messages: i64,
    pub this_week_messages: i64,
    pub this_month_messages: i64,
    pub average_response_time_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailNotification {
    pub id: i64,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub subject: String,
    pub body: String,
    pub notification_type: String,
    pub reference_id: Option<i64>,
    pub reference_type: Option<String>,
    pub status: EmailStatus,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ============================================
// Content
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub content_type: ContentType,
    pub display_order: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub content_type: Option<String>,
    pub display_order: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub usage_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TagRequest {
    pub name: String,
    pub description: Option<String>,
}

/// A blog post or a news item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub kind: ArticleKind,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub content: String,
    pub featured_image: Option<String>,
    pub category_id: Option<i64>,
    pub tag_ids: Vec<i64>,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    pub status: ArticleStatus,
    pub is_featured: bool,
    pub is_breaking: bool,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub reading_time: Option<i32>,
    pub views_count: i64,
    pub likes_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArticleRequest {
    pub title: String,
    pub slug: Option<String>,
    pub summary: Option<String>,
    pub content: String,
    pub featured_image: Option<String>,
    pub category_id: Option<i64>,
    pub tag_ids: Vec<i64>,
    pub author_name: Option<String>,
    pub is_featured: Option<bool>,
    pub is_breaking: Option<bool>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    /// Publish immediately on create.
    pub publish: Option<bool>,
}

// ============================================
// Paging
// ============================================

pub const MAX_PAGE_SIZE: usize = 100;

/// A requested page with its size clamped to `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl PageRequest {
    pub fn new(page: usize, size: usize) -> Self {
        Self {
            page,
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip. `None` when the offset does not fit an SQLite integer.
    pub fn offset(&self) -> Option<usize> {
        self.page
            .checked_mul(self.size)
            .filter(|offset| i64::try_from(*offset).is_ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total_elements: usize,
    pub total_pages: usize,
    pub first: bool,
    pub last: bool,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, page: usize, size: usize, total_elements: usize) -> Self {
        let total_pages = if size == 0 {
            0
        } else {
            total_elements.div_ceil(size)
        };
        Self {
            content,
            page,
            size,
            total_elements,
            total_pages,
            first: page == 0,
            last: page.saturating_add(1) >= total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_enum_parse() {
        assert_eq!(Role::parse("student"), Some(Role::Student));
        assert_eq!(ApplicationStatus::parse("under_review"), Some(ApplicationStatus::UnderReview));
        assert_eq!(ContactPriority::parse("bogus"), None);
        assert_eq!(ContactStatus::InProgress.as_str(), "IN_PROGRESS");
        assert_eq!(serde_json::to_string(&MatchQuality::Good).unwrap(), "\"GOOD\"");
    }

    #[test]
    fn test_gpa_and_passes() {
        let profile = StudentProfile {
            al_grade1: Some("A".into()),
            al_grade2: Some("b".into()),
            al_grade3: Some("F".into()),
            ..Default::default()
        };
        assert_eq!(profile.gpa(), Some(7.0 / 3.0));
        assert_eq!(profile.al_pass_count(), 2);
        assert_eq!(StudentProfile::default().gpa(), None);
    }

    #[test]
    fn test_age_on() {
        let profile = StudentProfile {
            date_of_birth: NaiveDate::from_ymd_opt(2005, 6, 15),
            ..Default::default()
        };
        let day_before = NaiveDate::from_ymd_opt(2025, 6, 14).unwrap();
        let birthday = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        assert_eq!(profile.age_on(day_before), Some(19));
        assert_eq!(profile.age_on(birthday), Some(20));
    }

    #[test]
    fn test_english_score_value() {
        let mut profile = StudentProfile {
            english_score: Some(" 6.5 ".into()),
            ..Default::default()
        };
        assert_eq!(profile.english_score_value(), Some(6.5));
        profile.english_score = Some("band six".into());
        assert_eq!(profile.english_score_value(), None);
    }

    #[test]
    fn test_completion_percentage() {
        let mut profile = StudentProfile::default();
        // nationality is pre-filled
        assert_eq!(profile.completion_percentage(), 5);
        profile.full_name = "Nimali Perera".into();
        profile.preferred_fields = vec!["Engineering".into()];
        profile.gender = Some("   ".into());
        assert_eq!(profile.completion_percentage(), 15);
    }

    #[test]
    fn test_page_flags() {
        let page = Page::new(vec![1, 2], 0, 2, 5);
        assert_eq!(page.total_pages, 3);
        assert!(page.first);
        assert!(!page.last);
        let last = Page::new(vec![5], 2, 2, 5);
        assert!(last.last);
        let empty: Page<i32> = Page::new(vec![], 0, 20, 0);
        assert!(empty.first && empty.last);
    }

    #[test]
    fn test_page_request_bounds() {
        let req = PageRequest::new(3, 0);
        assert_eq!(req.size, 1);
        assert_eq!(req.offset(), Some(3));
        assert_eq!(PageRequest::new(2, 500).size, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(usize::MAX / 2, 10).offset(), None);
        assert_eq!(PageRequest::new(i64::MAX as usize, 1).offset(), Some(i64::MAX as usize));
        assert_eq!(PageRequest::new(i64::MAX as usize + 1, 1).offset(), None);

        let far: Page<i32> = Page::new(vec![], usize::MAX, 10, 3);
        assert!(far.last);
    }

    #[test]
    fn test_scholarship_defaults_from_json() {
        let s: Scholarship = serde_json::from_str(r#"{"title":"Merit Award"}"#).unwrap();
        assert_eq!(s.currency, "USD");
        assert_eq!(s.status, ScholarshipStatus::Draft);
        assert!(s.eligible_levels.is_empty());
    }
}
