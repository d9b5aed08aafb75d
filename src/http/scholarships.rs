use axum::extract::{Path, Query, State};
use serde::Deserialize;

use super::extract::CurrentUser;
use super::response::{created, ok, ApiResult, Body};
use super::AppState;
use crate::types::{
    Application, ApplyRequest, MatchRequest, MatchResponse, MatchResult, ReviewRequest, Role,
    Scholarship, StatusUpdate, StudentProfile,
};

// ============================================
// Catalogue
// ============================================

pub(crate) async fn list(State(state): State<AppState>) -> ApiResult<Vec<Scholarship>> {
    ok("Scholarships retrieved", state.scholarships.active()?)
}

pub(crate) async fn featured(State(state): State<AppState>) -> ApiResult<Vec<Scholarship>> {
    ok("Featured scholarships retrieved", state.scholarships.featured()?)
}

pub(crate) async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Scholarship> {
    ok("Scholarship found", state.scholarships.get(id)?)
}

pub(crate) async fn by_institution(
    State(state): State<AppState>,
    Path(institution_id): Path<i64>,
) -> ApiResult<Vec<Scholarship>> {
    ok("Scholarships retrieved", state.scholarships.by_institution(institution_id)?)
}

pub(crate) async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(draft): Body<Scholarship>,
) -> ApiResult<Scholarship> {
    let actor = user.require(&[Role::Institution, Role::Admin])?;
    created("Scholarship created", state.scholarships.create(actor, draft)?)
}

pub(crate) async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Body(changes): Body<Scholarship>,
) -> ApiResult<Scholarship> {
    let actor = user.require(&[Role::Institution, Role::Admin])?;
    ok("Scholarship updated", state.scholarships.update(actor, id, changes)?)
}

pub(crate) async fn set_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Body(update): Body<StatusUpdate>,
) -> ApiResult<Scholarship> {
    let actor = user.require(&[Role::Institution, Role::Admin])?;
    ok("Status updated successfully", state.scholarships.set_status(actor, id, &update.status)?)
}

// ============================================
// Matching
// ============================================

/// A missing `studentUserId` means the caller.
pub(crate) async fn matches(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(mut req): Body<MatchRequest>,
) -> ApiResult<MatchResponse> {
    let student = req.student_user_id.unwrap_or(user.id());
    user.require_self_or_admin(student)?;
    req.student_user_id = Some(student);
    ok("Matches retrieved successfully", state.scholarships.matches_for_student(&req)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MatchQuery {
    #[serde(default)]
    min_match: i32,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default = "default_sort")]
    sort_by: String,
}

fn default_limit() -> usize {
    50
}

fn default_sort() -> String {
    "MATCH_DESC".to_string()
}

pub(crate) async fn matches_for_student(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(student_user_id): Path<i64>,
    Query(q): Query<MatchQuery>,
) -> ApiResult<MatchResponse> {
    user.require_self_or_admin(student_user_id)?;
    let req = MatchRequest {
        student_user_id: Some(student_user_id),
        minimum_match_percentage: q.min_match,
        limit: q.limit,
        sort_by: q.sort_by,
        ..Default::default()
    };
    ok("Matches retrieved successfully", state.scholarships.matches_for_student(&req)?)
}

pub(crate) async fn match_details(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((scholarship_id, student_user_id)): Path<(i64, i64)>,
) -> ApiResult<MatchResult> {
    user.require_self_or_admin(student_user_id)?;
    ok(
        "Match details retrieved",
        state.scholarships.match_details(student_user_id, scholarship_id)?,
    )
}

// ============================================
// Student profile
// ============================================

pub(crate) async fn my_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<StudentProfile> {
    let actor = user.require(&[Role::Student])?;
    ok("Profile retrieved", state.profiles.get_profile(actor.user_id)?)
}

pub(crate) async fn save_my_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(profile): Body<StudentProfile>,
) -> ApiResult<StudentProfile> {
    let actor = user.require(&[Role::Student])?;
    ok("Profile saved", state.profiles.upsert_profile(actor.user_id, profile)?)
}

// ============================================
// Applications
// ============================================

pub(crate) async fn apply(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(req): Body<ApplyRequest>,
) -> ApiResult<Application> {
    let actor = user.require(&[Role::Student])?;
    created("Application submitted", state.applications.apply(actor.user_id, &req)?)
}

pub(crate) async fn my_applications(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Vec<Application>> {
    let actor = user.require(&[Role::Student])?;
    ok("Applications retrieved", state.applications.for_student(actor.user_id)?)
}

pub(crate) async fn applications_for_scholarship(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(scholarship_id): Path<i64>,
) -> ApiResult<Vec<Application>> {
    let actor = user.require(&[Role::Institution, Role::Admin])?;
    ok(
        "Applications retrieved",
        state.applications.for_scholarship(actor, scholarship_id)?,
    )
}

pub(crate) async fn review_application(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Body(req): Body<ReviewRequest>,
) -> ApiResult<Application> {
    let actor = user.require(&[Role::Institution, Role::Admin])?;
    ok("Application reviewed", state.applications.review(actor, id, &req)?)
}

pub(crate) async fn withdraw_application(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Application> {
    let actor = user.require(&[Role::Student])?;
    ok("Application withdrawn", state.applications.withdraw(actor.user_id, id)?)
}
