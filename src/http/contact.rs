use axum::extract::{Path, Query, State};
use serde::Deserialize;

use super::extract::{ClientMeta, CurrentUser};
use super::response::{created, ok, ApiResult, Body};
use super::AppState;
use crate::types::{
    ContactMessage, ContactNotesRequest, ContactRequest, ContactResponseRequest, ContactStats, Page,
};

#[derive(Debug, Deserialize)]
pub(crate) struct PageQuery {
    #[serde(default)]
    page: usize,
    #[serde(default = "default_size")]
    size: usize,
}

fn default_size() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchQuery {
    query: String,
    #[serde(default)]
    page: usize,
    #[serde(default = "default_size")]
    size: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LimitQuery {
    #[serde(default = "default_recent")]
    limit: usize,
}

fn default_recent() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusQuery {
    status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PriorityQuery {
    priority: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssignQuery {
    admin_id: Option<i64>,
}

pub(crate) async fn submit(
    State(state): State<AppState>,
    meta: ClientMeta,
    Body(req): Body<ContactRequest>,
) -> ApiResult<ContactMessage> {
    let saved = state.contact.submit(req, meta.ip, meta.user_agent)?;
    created(
        "Your message has been sent successfully. We'll get back to you soon!",
        saved,
    )
}

pub(crate) async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<PageQuery>,
) -> ApiResult<Page<ContactMessage>> {
    user.require_admin()?;
    ok("Messages retrieved", state.contact.list(q.page, q.size)?)
}

pub(crate) async fn get(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<ContactMessage> {
    user.require_admin()?;
    ok("Message retrieved", state.contact.get(id)?)
}

pub(crate) async fn by_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(status): Path<String>,
    Query(q): Query<PageQuery>,
) -> ApiResult<Page<ContactMessage>> {
    user.require_admin()?;
    ok("Messages retrieved", state.contact.by_status(&status, q.page, q.size)?)
}

pub(crate) async fn search(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<SearchQuery>,
) -> ApiResult<Page<ContactMessage>> {
    user.require_admin()?;
    ok("Search results", state.contact.search(&q.query, q.page, q.size)?)
}

pub(crate) async fn recent(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<ContactMessage>> {
    user.require_admin()?;
    ok("Recent messages retrieved", state.contact.recent(q.limit)?)
}

pub(crate) async fn high_priority(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Vec<ContactMessage>> {
    user.require_admin()?;
    ok("High priority messages retrieved", state.contact.high_priority()?)
}

pub(crate) async fn stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<ContactStats> {
    user.require_admin()?;
    ok("Statistics retrieved", state.contact.stats()?)
}

pub(crate) async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Query(q): Query<StatusQuery>,
) -> ApiResult<ContactMessage> {
    user.require_admin()?;
    ok("Status updated successfully", state.contact.update_status(id, &q.status)?)
}

pub(crate) async fn update_priority(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Query(q): Query<PriorityQuery>,
) -> ApiResult<ContactMessage> {
    user.require_admin()?;
    ok("Priority updated successfully", state.contact.update_priority(id, &q.priority)?)
}

/// Assigns to `adminId`, or to the caller when absent.
pub(crate) async fn assign(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Query(q): Query<AssignQuery>,
) -> ApiResult<ContactMessage> {
    let admin = user.require_admin()?;
    let assignee = q.admin_id.unwrap_or(admin.user_id);
    ok("Message assigned successfully", state.contact.assign(id, assignee)?)
}

pub(crate) async fn respond(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Body(req): Body<ContactResponseRequest>,
) -> ApiResult<ContactMessage> {
    let admin = user.require_admin()?;
    ok("Response sent successfully", state.contact.respond(id, req, admin.user_id)?)
}

pub(crate) async fn add_notes(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Body(req): Body<ContactNotesRequest>,
) -> ApiResult<ContactMessage> {
    user.require_admin()?;
    ok("Notes added successfully", state.contact.add_notes(id, &req.notes)?)
}

pub(crate) async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    user.require_admin()?;
    state.contact.delete(id)?;
    ok("Message deleted successfully", ())
}
