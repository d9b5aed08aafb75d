//! Blog, news, category and tag endpoints.
//!
//! Blog and news share one set of handlers; the router for each prefix
//! carries its `ArticleKind` as an extension.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Extension, Router};
use serde::Deserialize;

use super::extract::CurrentUser;
use super::response::{created, ok, ApiResult, Body};
use super::AppState;
use crate::types::{
    Article, ArticleKind, ArticleRequest, Category, CategoryRequest, Page, Role, Tag, TagRequest,
};

#[derive(Debug, Deserialize)]
pub(crate) struct PageQuery {
    #[serde(default)]
    page: usize,
    #[serde(default = "default_size")]
    size: usize,
}

fn default_size() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub(crate) struct LimitQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    5
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchQuery {
    query: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArticleSearchQuery {
    query: String,
    #[serde(default)]
    page: usize,
    #[serde(default = "default_size")]
    size: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeaturedQuery {
    featured: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BreakingQuery {
    breaking: bool,
}

fn is_admin(user: &Option<CurrentUser>) -> bool {
    user.as_ref().is_some_and(|u| u.actor.role == Role::Admin)
}

pub(crate) fn article_routes(kind: ArticleKind) -> Router<AppState> {
    Router::new()
        .route("/", get(list_articles).post(create_article))
        .route("/featured", get(featured_articles))
        .route("/popular", get(popular_articles))
        .route("/recent", get(recent_articles))
        .route("/breaking", get(breaking_articles))
        .route("/search", get(search_articles))
        .route("/category/:category_id", get(articles_by_category))
        .route("/tag/:tag_id", get(articles_by_tag))
        .route("/slug/:slug", get(article_by_slug))
        .route("/:id", get(get_article).put(update_article).delete(delete_article))
        .route("/:id/publish", post(publish_article))
        .route("/:id/archive", post(archive_article))
        .route("/:id/featured", put(feature_article))
        .route("/:id/breaking", put(mark_breaking))
        .route("/:id/like", post(like_article))
        .layer(Extension(kind))
}

// ============================================
// Articles
// ============================================

async fn list_articles(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    Query(q): Query<PageQuery>,
) -> ApiResult<Page<Article>> {
    ok("Articles retrieved", state.articles(kind).list_published(q.page, q.size)?)
}

async fn featured_articles(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<Article>> {
    ok("Featured articles retrieved", state.articles(kind).featured(q.limit)?)
}

async fn popular_articles(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<Article>> {
    ok("Popular articles retrieved", state.articles(kind).popular(q.limit)?)
}

async fn recent_articles(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<Article>> {
    ok("Recent articles retrieved", state.articles(kind).recent(q.limit)?)
}

async fn breaking_articles(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
) -> ApiResult<Vec<Article>> {
    ok("Breaking news retrieved", state.articles(kind).breaking()?)
}

async fn search_articles(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    Query(q): Query<ArticleSearchQuery>,
) -> ApiResult<Page<Article>> {
    ok("Search results", state.articles(kind).search(&q.query, q.page, q.size)?)
}

async fn articles_by_category(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    Path(category_id): Path<i64>,
    Query(q): Query<PageQuery>,
) -> ApiResult<Page<Article>> {
    ok(
        "Articles retrieved",
        state.articles(kind).by_category(category_id, q.page, q.size)?,
    )
}

async fn articles_by_tag(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    Path(tag_id): Path<i64>,
    Query(q): Query<PageQuery>,
) -> ApiResult<Page<Article>> {
    ok("Articles retrieved", state.articles(kind).by_tag(tag_id, q.page, q.size)?)
}

async fn article_by_slug(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    user: Option<CurrentUser>,
    Path(slug): Path<String>,
) -> ApiResult<Article> {
    ok("Article found", state.articles(kind).get_by_slug(&slug, !is_admin(&user))?)
}

async fn get_article(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    user: Option<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Article> {
    ok("Article found", state.articles(kind).get(id, !is_admin(&user))?)
}

async fn create_article(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    user: CurrentUser,
    Body(req): Body<ArticleRequest>,
) -> ApiResult<Article> {
    let admin = user.require_admin()?;
    created("Article created", state.articles(kind).create(admin, &req)?)
}

async fn update_article(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Body(req): Body<ArticleRequest>,
) -> ApiResult<Article> {
    user.require_admin()?;
    ok("Article updated", state.articles(kind).update(id, &req)?)
}

async fn publish_article(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Article> {
    user.require_admin()?;
    ok("Article published", state.articles(kind).publish(id)?)
}

async fn archive_article(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Article> {
    user.require_admin()?;
    ok("Article archived", state.articles(kind).archive(id)?)
}

async fn feature_article(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Query(q): Query<FeaturedQuery>,
) -> ApiResult<Article> {
    user.require_admin()?;
    ok("Featured flag updated", state.articles(kind).set_featured(id, q.featured)?)
}

async fn mark_breaking(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Query(q): Query<BreakingQuery>,
) -> ApiResult<Article> {
    user.require_admin()?;
    ok("Breaking flag updated", state.articles(kind).set_breaking(id, q.breaking)?)
}

async fn like_article(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    Path(id): Path<i64>,
) -> ApiResult<Article> {
    ok("Article liked", state.articles(kind).like(id)?)
}

async fn delete_article(
    State(state): State<AppState>,
    Extension(kind): Extension<ArticleKind>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    user.require_admin()?;
    state.articles(kind).delete(id)?;
    ok("Article deleted", ())
}

// ============================================
// Categories
// ============================================

pub(crate) async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    ok("Categories retrieved", state.categories.active()?)
}

pub(crate) async fn categories_for_type(
    State(state): State<AppState>,
    Path(content_type): Path<String>,
) -> ApiResult<Vec<Category>> {
    ok("Categories retrieved", state.categories.for_type(&content_type)?)
}

pub(crate) async fn root_categories(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    ok("Categories retrieved", state.categories.roots()?)
}

pub(crate) async fn child_categories(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<Category>> {
    ok("Categories retrieved", state.categories.children(id)?)
}

pub(crate) async fn category_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Category> {
    ok("Category found", state.categories.get_by_slug(&slug)?)
}

pub(crate) async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Category> {
    ok("Category found", state.categories.get(id)?)
}

pub(crate) async fn create_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(req): Body<CategoryRequest>,
) -> ApiResult<Category> {
    user.require_admin()?;
    created("Category created", state.categories.create(&req)?)
}

pub(crate) async fn update_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Body(req): Body<CategoryRequest>,
) -> ApiResult<Category> {
    user.require_admin()?;
    ok("Category updated", state.categories.update(id, &req)?)
}

pub(crate) async fn toggle_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Category> {
    user.require_admin()?;
    ok("Category status toggled", state.categories.toggle_active(id)?)
}

pub(crate) async fn delete_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    user.require_admin()?;
    state.categories.delete(id)?;
    ok("Category deleted", ())
}

// ============================================
// Tags
// ============================================

pub(crate) async fn list_tags(State(state): State<AppState>) -> ApiResult<Vec<Tag>> {
    ok("Tags retrieved", state.tags.all()?)
}

pub(crate) async fn popular_tags(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<Tag>> {
    ok("Popular tags retrieved", state.tags.popular(q.limit)?)
}

pub(crate) async fn search_tags(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> ApiResult<Vec<Tag>> {
    ok("Search results", state.tags.search(&q.query)?)
}

pub(crate) async fn tag_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Tag> {
    ok("Tag found", state.tags.get_by_slug(&slug)?)
}

pub(crate) async fn get_tag(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Tag> {
    ok("Tag found", state.tags.get(id)?)
}

pub(crate) async fn create_tag(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(req): Body<TagRequest>,
) -> ApiResult<Tag> {
    user.require_admin()?;
    created("Tag created", state.tags.create(&req)?)
}

pub(crate) async fn get_or_create_tag(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(req): Body<TagRequest>,
) -> ApiResult<Tag> {
    user.require_admin()?;
    ok("Tag resolved", state.tags.get_or_create(&req.name)?)
}

pub(crate) async fn update_tag(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Body(req): Body<TagRequest>,
) -> ApiResult<Tag> {
    user.require_admin()?;
    ok("Tag updated", state.tags.update(id, &req)?)
}

pub(crate) async fn delete_tag(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    user.require_admin()?;
    state.tags.delete(id)?;
    ok("Tag deleted", ())
}
