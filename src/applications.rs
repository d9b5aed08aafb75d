use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, Result, UniqueConflict};
use crate::matching::MatchingEngine;
use crate::storage::Storage;
use crate::types::{
    Actor, Application, ApplicationStatus, ApplyRequest, ReviewRequest, Role, ScholarshipStatus,
};

pub struct ApplicationService {
    storage: Arc<Storage>,
    engine: MatchingEngine,
}

impl ApplicationService {
    pub fn new(storage: Arc<Storage>, engine: MatchingEngine) -> Self {
        Self { storage, engine }
    }

    /// Submit the student's application. The match score is frozen at submission.
    pub fn apply(&self, student_id: i64, req: &ApplyRequest) -> Result<Application> {
        let scholarship = self
            .storage
            .get_scholarship(req.scholarship_id)?
            .ok_or_else(|| AppError::not_found("Scholarship", req.scholarship_id))?;
        let today = Utc::now().date_naive();
        if scholarship.status != ScholarshipStatus::Active {
            return Err(AppError::validation("Scholarship is not accepting applications"));
        }
        if scholarship.application_deadline.is_some_and(|d| d < today) {
            return Err(AppError::validation("The application deadline has passed"));
        }
        if self.storage.application_exists(scholarship.id, student_id)? {
            return Err(AppError::Conflict(
                "You have already applied for this scholarship".to_string(),
            ));
        }

        let match_score = self
            .storage
            .get_profile(student_id)?
            .map(|profile| self.engine.calculate_match(&profile, &scholarship, today).match_percentage);

        let now = Utc::now();
        let application = self.storage.insert_application(&Application {
            id: 0,
            scholarship_id: scholarship.id,
            student_id,
            status: ApplicationStatus::Submitted,
            cover_letter: req.cover_letter.clone(),
            statement_of_purpose: req.statement_of_purpose.clone(),
            reviewer_id: None,
            review_notes: None,
            reviewed_at: None,
            match_score,
            created_at: now,
            updated_at: now,
        })
        .or_conflict("You have already applied for this scholarship")?;
        info!(
            application = application.id,
            scholarship = scholarship.id,
            student = student_id,
            "application submitted"
        );
        Ok(application)
    }

    pub fn for_student(&self, student_id: i64) -> Result<Vec<Application>> {
        self.storage.applications_for_student(student_id)
    }

    /// Applications to a scholarship, best match first. Owner or admin only.
    pub fn for_scholarship(&self, actor: Actor, scholarship_id: i64) -> Result<Vec<Application>> {
        self.check_owner(actor, scholarship_id)?;
        self.storage.applications_for_scholarship(scholarship_id)
    }

    pub fn review(&self, actor: Actor, id: i64, req: &ReviewRequest) -> Result<Application> {
        let status = ApplicationStatus::parse(&req.status)
            .filter(|s| {
                matches!(
                    s,
                    ApplicationStatus::UnderReview
                        | ApplicationStatus::Shortlisted
                        | ApplicationStatus::Accepted
                        | ApplicationStatus::Rejected
                )
            })
            .ok_or_else(|| AppError::validation(format!("Invalid review status: {}", req.status)))?;

        let mut application = self.application(id)?;
        self.check_owner(actor, application.scholarship_id)?;
        if application.status == ApplicationStatus::Withdrawn {
            return Err(AppError::validation("Application has been withdrawn"));
        }

        let now = Utc::now();
        application.status = status;
        application.reviewer_id = Some(actor.user_id);
        application.review_notes = req.notes.clone().or(application.review_notes);
        application.reviewed_at = Some(now);
        application.updated_at = now;
        self.storage.update_application(&application)?;
        info!(application = id, status = %status, reviewer = actor.user_id, "application reviewed");
        Ok(application)
    }

    pub fn withdraw(&self, student_id: i64, id: i64) -> Result<Application> {
        let mut application = self.application(id)?;
        if application.student_id != student_id {
            return Err(AppError::Forbidden(
                "You can only withdraw your own applications".to_string(),
            ));
        }
        if matches!(
            application.status,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        ) {
            return Err(AppError::validation(format!(
                "Application can no longer be withdrawn (status {})",
                application.status
            )));
        }
        application.status = ApplicationStatus::Withdrawn;
        application.updated_at = Utc::now();
        self.storage.update_application(&application)?;
        info!(application = id, student = student_id, "application withdrawn");
        Ok(application)
    }

    fn application(&self, id: i64) -> Result<Application> {
        self.storage
            .get_application(id)?
            .ok_or_else(|| AppError::not_found("Application", id))
    }

    fn check_owner(&self, actor: Actor, scholarship_id: i64) -> Result<()> {
        let scholarship = self
            .storage
            .get_scholarship(scholarship_id)?
            .ok_or_else(|| AppError::not_found("Scholarship", scholarship_id))?;
        let allowed = actor.is_admin()
            || (actor.role == Role::Institution && actor.user_id == scholarship.institution_id);
        if !allowed {
            return Err(AppError::Forbidden(
                "You do not have permission to manage applications for this scholarship".to_string(),
            ));
        }
        Ok(())
    }
}
