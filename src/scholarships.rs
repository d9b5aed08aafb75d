//! Scholarship catalogue and student matching.

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, Result};
use crate::filter::apply_request_filters;
use crate::matching::MatchingEngine;
use crate::sorter::{
    amount_display, country_label, deadline_display, level_label, provider_label, sort_matches,
    SortKey,
};
use crate::storage::Storage;
use crate::types::{
    Actor, MatchQuality, MatchRequest, MatchResponse, MatchResult, Role, Scholarship,
    ScholarshipMatch, ScholarshipStatus, StudentProfile,
};

const MAX_SUGGESTIONS: usize = 5;

pub struct ScholarshipService {
    storage: Arc<Storage>,
    engine: MatchingEngine,
}

impl ScholarshipService {
    pub fn new(storage: Arc<Storage>, engine: MatchingEngine) -> Self {
        Self { storage, engine }
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    fn profile(&self, student_user_id: i64) -> Result<StudentProfile> {
        self.storage.get_profile(student_user_id)?.ok_or_else(|| {
            AppError::NotFound(format!("Student profile not found for user: {}", student_user_id))
        })
    }

    fn scholarship(&self, id: i64) -> Result<Scholarship> {
        self.storage
            .get_scholarship(id)?
            .ok_or_else(|| AppError::not_found("Scholarship", id))
    }

    pub fn matches_for_student(&self, request: &MatchRequest) -> Result<MatchResponse> {
        self.matches_for_student_on(request, Utc::now().date_naive())
    }

    /// Rank candidate scholarships for the student as of `today`.
    pub fn matches_for_student_on(
        &self,
        request: &MatchRequest,
        today: NaiveDate,
    ) -> Result<MatchResponse> {
        let student_user_id = request
            .student_user_id
            .ok_or_else(|| AppError::validation("studentUserId is required"))?;
        let student = self.profile(student_user_id)?;

        let candidates = if request.scholarship_ids.is_empty() {
            self.storage.active_scholarships(today, false)?
        } else {
            self.storage.scholarships_by_ids(&request.scholarship_ids)?
        };
        let candidates = apply_request_filters(candidates, request);
        let analyzed = candidates.len();

        let mut providers: HashMap<i64, String> = HashMap::new();
        let (mut excellent, mut good, mut fair) = (0, 0, 0);
        let mut matches = Vec::new();

        for scholarship in &candidates {
            let result = self.engine.calculate_match(&student, scholarship, today);
            if result.whole_percentage() < request.minimum_match_percentage {
                continue;
            }
            match result.match_quality {
                MatchQuality::Excellent => excellent += 1,
                MatchQuality::Good => good += 1,
                MatchQuality::Fair => fair += 1,
                MatchQuality::Poor => {}
            }
            let provider = match providers.get(&scholarship.institution_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self.provider_name(scholarship.institution_id)?;
                    providers.insert(scholarship.institution_id, name.clone());
                    name
                }
            };
            matches.push(to_match_entry(scholarship, &result, provider));
        }

        sort_matches(&mut matches, SortKey::parse(&request.sort_by));
        matches.truncate(request.limit);
        // quality counters cover every kept match, the found count only the returned page
        let matches_found = matches.len();

        info!(
            student = student_user_id,
            analyzed,
            matches_found,
            excellent,
            good,
            fair,
            "match run complete"
        );

        Ok(MatchResponse {
            student_id: student.user_id,
            student_name: student.full_name.clone(),
            total_scholarships_analyzed: analyzed,
            matches_found,
            excellent_matches: excellent,
            good_matches: good,
            fair_matches: fair,
            scholarships: matches,
            improvement_suggestions: improvement_suggestions(&student),
        })
    }

    pub fn match_details(&self, student_user_id: i64, scholarship_id: i64) -> Result<MatchResult> {
        let student = self.profile(student_user_id)?;
        let scholarship = self.scholarship(scholarship_id)?;
        Ok(self
            .engine
            .calculate_match(&student, &scholarship, Utc::now().date_naive()))
    }

    fn provider_name(&self, institution_id: i64) -> Result<String> {
        let user = self.storage.find_user(institution_id)?;
        let name = user
            .as_ref()
            .and_then(|u| u.institution_name.as_deref().or(u.full_name.as_deref()));
        Ok(provider_label(name, institution_id))
    }

    // ============================================
    // Catalogue
    // ============================================

    /// ACTIVE scholarships still open for applications, soonest deadline first.
    pub fn active(&self) -> Result<Vec<Scholarship>> {
        self.storage.active_scholarships(Utc::now().date_naive(), false)
    }

    pub fn featured(&self) -> Result<Vec<Scholarship>> {
        self.storage.active_scholarships(Utc::now().date_naive(), true)
    }

    /// Fetch one scholarship and count the view.
    pub fn get(&self, id: i64) -> Result<Scholarship> {
        let mut scholarship = self.scholarship(id)?;
        self.storage.increment_scholarship_views(id)?;
        scholarship.views_count += 1;
        Ok(scholarship)
    }

    pub fn by_institution(&self, institution_id: i64) -> Result<Vec<Scholarship>> {
        self.storage.scholarships_by_institution(institution_id)
    }

    /// Create a DRAFT owned by the caller. Admins may name another institution.
    pub fn create(&self, actor: Actor, draft: Scholarship) -> Result<Scholarship> {
        if !matches!(actor.role, Role::Institution | Role::Admin) {
            return Err(AppError::Forbidden(
                "Only institutions can create scholarships".to_string(),
            ));
        }
        validate_scholarship(&draft)?;

        let institution_id = if actor.is_admin() && draft.institution_id > 0 {
            draft.institution_id
        } else {
            actor.user_id
        };
        let scholarship = Scholarship {
            id: 0,
            institution_id,
            status: ScholarshipStatus::Draft,
            total_applications: 0,
            views_count: 0,
            created_at: None,
            updated_at: None,
            published_at: None,
            ..draft
        };
        let created = self.storage.insert_scholarship(&scholarship, Utc::now())?;
        info!(scholarship = created.id, institution = institution_id, "scholarship created");
        Ok(created)
    }

    /// Replace the editable fields. Ownership, status and counters are kept.
    pub fn update(&self, actor: Actor, id: i64, changes: Scholarship) -> Result<Scholarship> {
        let existing = self.owned(actor, id)?;
        validate_scholarship(&changes)?;

        let updated = Scholarship {
            id,
            institution_id: existing.institution_id,
            status: existing.status,
            total_applications: existing.total_applications,
            views_count: existing.views_count,
            created_at: existing.created_at,
            updated_at: existing.updated_at,
            published_at: existing.published_at,
            ..changes
        };
        self.storage.update_scholarship(&updated, Utc::now())?;
        info!(scholarship = id, "scholarship updated");
        self.scholarship(id)
    }

    pub fn set_status(&self, actor: Actor, id: i64, status: &str) -> Result<Scholarship> {
        let status = ScholarshipStatus::parse(status)
            .ok_or_else(|| AppError::validation(format!("Invalid status: {}", status)))?;
        let mut scholarship = self.owned(actor, id)?;
        let now = Utc::now();
        scholarship.status = status;
        if status == ScholarshipStatus::Active && scholarship.published_at.is_none() {
            scholarship.published_at = Some(now);
        }
        self.storage.update_scholarship(&scholarship, now)?;
        info!(scholarship = id, status = %status, "scholarship status changed");
        self.scholarship(id)
    }

    /// Load a scholarship the caller owns, or any scholarship for admins.
    fn owned(&self, actor: Actor, id: i64) -> Result<Scholarship> {
        let scholarship = self.scholarship(id)?;
        if !actor.can_act_for(scholarship.institution_id) {
            return Err(AppError::Forbidden(
                "You do not have permission to modify this scholarship".to_string(),
            ));
        }
        Ok(scholarship)
    }
}

fn validate_scholarship(s: &Scholarship) -> Result<()> {
    if s.title.trim().is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    if let (Some(min), Some(max)) = (s.min_age, s.max_age) {
        if min > max {
            return Err(AppError::validation("Minimum age cannot exceed maximum age"));
        }
    }
    if let Some(coverage) = s.coverage_percentage {
        if !(0..=100).contains(&coverage) {
            return Err(AppError::validation("Coverage percentage must be between 0 and 100"));
        }
    }
    Ok(())
}

fn to_match_entry(s: &Scholarship, result: &MatchResult, provider: String) -> ScholarshipMatch {
    ScholarshipMatch {
        id: s.id,
        title: s.title.clone(),
        description: s.description.clone(),
        provider,
        country: country_label(s),
        scholarship_type: s.scholarship_type.clone(),
        amount: s.amount,
        currency: s.currency.clone(),
        amount_display: amount_display(s),
        level: level_label(s),
        application_deadline: s.application_deadline,
        deadline_display: deadline_display(s.application_deadline),
        is_featured: s.is_featured,
        match_percentage: result.match_percentage,
        match_quality: result.match_quality,
        matched_criteria: result.matched_criteria.iter().map(|c| c.criterion.clone()).collect(),
        unmatched_criteria: result
            .unmatched_criteria
            .iter()
            .map(|c| match &c.suggestion {
                Some(hint) => format!("{} - {}", c.criterion, hint),
                None => c.criterion.clone(),
            })
            .collect(),
        is_eligible: result.eligible,
    }
}

/// Profile gaps worth closing, at most five.
pub fn improvement_suggestions(student: &StudentProfile) -> Vec<String> {
    let mut suggestions = Vec::new();
    if student.english_test.is_none() || student.english_score.is_none() {
        suggestions.push(
            "Take an English proficiency test (IELTS/TOEFL) to unlock more scholarship opportunities".to_string(),
        );
    }
    let completion = student.completion_percentage();
    if completion < 80 {
        suggestions.push(format!(
            "Complete your profile to {}% more to improve matching accuracy",
            100 - completion
        ));
    }
    if student.preferred_fields.is_empty() {
        suggestions.push("Specify your preferred fields of study to find more relevant scholarships".to_string());
    }
    if student.household_income.is_none() {
        suggestions.push("Add financial information to access need-based scholarships".to_string());
    }
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewUser;
    use chrono::Duration;

    fn setup() -> (ScholarshipService, Arc<Storage>) {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        (ScholarshipService::new(storage.clone(), MatchingEngine::default()), storage)
    }

    fn institution(storage: &Storage) -> Actor {
        let user = storage
            .insert_user(
                &NewUser {
                    email: "grants@uni.example",
                    password_hash: "x",
                    role: Role::Institution,
                    full_name: None,
                    institution_name: Some("University of Peradeniya"),
                    verification_token: None,
                },
                Utc::now(),
            )
            .unwrap();
        Actor {
            user_id: user.id,
            role: Role::Institution,
        }
    }

    fn student(storage: &Storage, user_id: i64) {
        let profile = StudentProfile {
            user_id,
            full_name: "Nimali Perera".into(),
            intended_level: Some("UNDERGRADUATE".into()),
            ..Default::default()
        };
        storage.save_profile(&profile, Utc::now()).unwrap();
    }

    fn publish(
        service: &ScholarshipService,
        actor: Actor,
        title: &str,
        levels: &[&str],
        days: i64,
    ) -> Scholarship {
        let created = service
            .create(
                actor,
                Scholarship {
                    title: title.into(),
                    eligible_levels: levels.iter().map(|s| s.to_string()).collect(),
                    application_deadline: Some(Utc::now().date_naive() + Duration::days(days)),
                    ..Default::default()
                },
            )
            .unwrap();
        service.set_status(actor, created.id, "active").unwrap()
    }

    #[test]
    fn test_create_forces_draft_and_owner() {
        let (service, storage) = setup();
        let actor = institution(&storage);
        let created = service
            .create(
                actor,
                Scholarship {
                    title: "Merit".into(),
                    institution_id: 999,
                    status: ScholarshipStatus::Active,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(created.status, ScholarshipStatus::Draft);
        assert_eq!(created.institution_id, actor.user_id);

        let student = Actor {
            user_id: 50,
            role: Role::Student,
        };
        assert!(matches!(
            service.create(student, Scholarship { title: "X".into(), ..Default::default() }),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_activation_sets_published_and_get_counts_views() {
        let (service, storage) = setup();
        let actor = institution(&storage);
        let active = publish(&service, actor, "Merit", &[], 10);
        assert_eq!(active.status, ScholarshipStatus::Active);
        assert!(active.published_at.is_some());

        assert_eq!(service.get(active.id).unwrap().views_count, 1);
        assert_eq!(service.get(active.id).unwrap().views_count, 2);
        assert!(matches!(
            service.set_status(actor, active.id, "archived"),
            Err(AppError::Validation(_))
        ));
        let stranger = Actor {
            user_id: actor.user_id + 100,
            role: Role::Institution,
        };
        assert!(matches!(
            service.set_status(stranger, active.id, "CLOSED"),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_matches_found_counts_returned_matches() {
        let (service, storage) = setup();
        let actor = institution(&storage);
        student(&storage, 77);
        publish(&service, actor, "Open A", &[], 5);
        publish(&service, actor, "Open B", &["UNDERGRADUATE"], 20);
        publish(&service, actor, "PhD only", &["PHD"], 30);

        let request = MatchRequest {
            student_user_id: Some(77),
            limit: 1,
            ..Default::default()
        };
        let response = service.matches_for_student(&request).unwrap();
        assert_eq!(response.total_scholarships_analyzed, 3);
        assert_eq!(response.matches_found, 1);
        assert_eq!(response.scholarships.len(), 1);
        assert_eq!(response.scholarships[0].provider, "University of Peradeniya");
        assert!(!response.improvement_suggestions.is_empty());
        assert!(response.improvement_suggestions.len() <= MAX_SUGGESTIONS);

        let phd = MatchRequest {
            student_user_id: Some(77),
            education_level: Some("phd".into()),
            ..Default::default()
        };
        let response = service.matches_for_student(&phd).unwrap();
        // Open A has no level list, so it passes the filter too.
        assert_eq!(response.total_scholarships_analyzed, 2);
        let phd_entry = response.scholarships.iter().find(|m| m.title == "PhD only").unwrap();
        assert!(!phd_entry.is_eligible);
    }

    #[test]
    fn test_missing_profile_is_not_found() {
        let (service, _) = setup();
        let request = MatchRequest {
            student_user_id: Some(1),
            ..Default::default()
        };
        assert!(matches!(service.matches_for_student(&request), Err(AppError::NotFound(_))));
        assert!(matches!(
            service.matches_for_student(&MatchRequest::default()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_improvement_suggestions() {
        let empty = StudentProfile::default();
        let suggestions = improvement_suggestions(&empty);
        assert_eq!(suggestions.len(), 4);
        assert_eq!(
            suggestions[1],
            "Complete your profile to 95% more to improve matching accuracy"
        );
    }
}
