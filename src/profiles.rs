use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, Result};
use crate::storage::Storage;
use crate::types::StudentProfile;

pub struct ProfileService {
    storage: Arc<Storage>,
}

impl ProfileService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub fn get_profile(&self, user_id: i64) -> Result<StudentProfile> {
        self.storage
            .get_profile(user_id)?
            .ok_or_else(|| AppError::NotFound(format!("Student profile not found for user: {}", user_id)))
    }

    /// Replace the stored profile. The key and completion are set here,
    /// whatever the caller sent.
    pub fn upsert_profile(
        &self,
        user_id: i64,
        mut profile: StudentProfile,
    ) -> Result<StudentProfile> {
        if profile.full_name.trim().is_empty() {
            return Err(AppError::validation("Full name is required"));
        }
        if let Some(z) = profile.z_score {
            if !(-5.0..=5.0).contains(&z) {
                return Err(AppError::validation("Z-score must be between -5 and 5"));
            }
        }
        profile.user_id = user_id;
        profile.profile_completion = profile.completion_percentage();
        self.storage.save_profile(&profile, Utc::now())?;
        info!(user_id, completion = profile.profile_completion, "student profile saved");
        Ok(profile)
    }
}
