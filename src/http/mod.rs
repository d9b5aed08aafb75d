//! HTTP surface: shared state, router and handlers.

mod auth;
mod contact;
mod content;
pub mod extract;
pub mod response;
mod scholarships;

pub use extract::CurrentUser;
pub use response::{ApiResponse, ApiResult};

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;

use crate::applications::ApplicationService;
use crate::auth::AuthService;
use crate::config::Config;
use crate::contact::ContactService;
use crate::content::{ArticleService, CategoryService, TagService};
use crate::error::Result;
use crate::matching::MatchingEngine;
use crate::notify::EmailService;
use crate::profiles::ProfileService;
use crate::scholarships::ScholarshipService;
use crate::storage::Storage;
use crate::types::ArticleKind;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub profiles: Arc<ProfileService>,
    pub scholarships: Arc<ScholarshipService>,
    pub applications: Arc<ApplicationService>,
    pub contact: Arc<ContactService>,
    pub blogs: Arc<ArticleService>,
    pub news: Arc<ArticleService>,
    pub categories: Arc<CategoryService>,
    pub tags: Arc<TagService>,
    pub email: Arc<EmailService>,
}

impl AppState {
    pub fn new(storage: Arc<Storage>, config: &Config) -> Result<Self> {
        let email = Arc::new(EmailService::new(storage.clone(), config.mail.clone())?);
        let engine = MatchingEngine::new(&config.matching);
        Ok(Self {
            auth: Arc::new(AuthService::new(storage.clone(), email.clone(), config.auth.clone())),
            profiles: Arc::new(ProfileService::new(storage.clone())),
            scholarships: Arc::new(ScholarshipService::new(storage.clone(), engine.clone())),
            applications: Arc::new(ApplicationService::new(storage.clone(), engine)),
            contact: Arc::new(ContactService::new(storage.clone(), email.clone())),
            blogs: Arc::new(ArticleService::new(storage.clone(), ArticleKind::Blog)),
            news: Arc::new(ArticleService::new(storage.clone(), ArticleKind::News)),
            categories: Arc::new(CategoryService::new(storage.clone())),
            tags: Arc::new(TagService::new(storage)),
            email,
        })
    }

    pub fn articles(&self, kind: ArticleKind) -> &ArticleService {
        match kind {
            ArticleKind::Blog => &self.blogs,
            ArticleKind::News => &self.news,
        }
    }
}

async fn health(State(_state): State<AppState>) -> ApiResult<&'static str> {
    response::ok("Service is healthy", "UP")
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        // auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh-token", post(auth::refresh_token))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/verify-email", get(auth::verify_email))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/validate", get(auth::validate))
        // students
        .route(
            "/api/students/me/profile",
            get(scholarships::my_profile).put(scholarships::save_my_profile),
        )
        // scholarships and matching
        .route(
            "/api/scholarships",
            get(scholarships::list).post(scholarships::create),
        )
        .route("/api/scholarships/featured", get(scholarships::featured))
        .route("/api/scholarships/matches", post(scholarships::matches))
        .route(
            "/api/scholarships/matches/:student_user_id",
            get(scholarships::matches_for_student),
        )
        .route(
            "/api/scholarships/institution/:institution_id",
            get(scholarships::by_institution),
        )
        .route(
            "/api/scholarships/:id",
            get(scholarships::get).put(scholarships::update),
        )
        .route("/api/scholarships/:id/status", put(scholarships::set_status))
        .route(
            "/api/scholarships/:id/match/:student_user_id",
            get(scholarships::match_details),
        )
        // applications
        .route("/api/applications", post(scholarships::apply))
        .route("/api/applications/mine", get(scholarships::my_applications))
        .route(
            "/api/applications/scholarship/:scholarship_id",
            get(scholarships::applications_for_scholarship),
        )
        .route("/api/applications/:id/review", put(scholarships::review_application))
        .route("/api/applications/:id/withdraw", post(scholarships::withdraw_application))
        // contact
        .route("/api/contact", post(contact::submit).get(contact::list))
        .route("/api/contact/search", get(contact::search))
        .route("/api/contact/recent", get(contact::recent))
        .route("/api/contact/high-priority", get(contact::high_priority))
        .route("/api/contact/stats", get(contact::stats))
        .route("/api/contact/status/:status", get(contact::by_status))
        .route("/api/contact/:id", get(contact::get).delete(contact::delete))
        .route("/api/contact/:id/status", put(contact::update_status))
        .route("/api/contact/:id/priority", put(contact::update_priority))
        .route("/api/contact/:id/assign", put(contact::assign))
        .route("/api/contact/:id/respond", post(contact::respond))
        .route("/api/contact/:id/notes", post(contact::add_notes))
        // content
        .nest("/api/blogs", content::article_routes(ArticleKind::Blog))
        .nest("/api/news", content::article_routes(ArticleKind::News))
        .route(
            "/api/categories",
            get(content::list_categories).post(content::create_category),
        )
        .route("/api/categories/roots", get(content::root_categories))
        .route("/api/categories/type/:content_type", get(content::categories_for_type))
        .route("/api/categories/slug/:slug", get(content::category_by_slug))
        .route(
            "/api/categories/:id",
            get(content::get_category)
                .put(content::update_category)
                .delete(content::delete_category),
        )
        .route("/api/categories/:id/children", get(content::child_categories))
        .route("/api/categories/:id/toggle", put(content::toggle_category))
        .route("/api/tags", get(content::list_tags).post(content::create_tag))
        .route("/api/tags/popular", get(content::popular_tags))
        .route("/api/tags/search", get(content::search_tags))
        .route("/api/tags/resolve", post(content::get_or_create_tag))
        .route("/api/tags/slug/:slug", get(content::tag_by_slug))
        .route(
            "/api/tags/:id",
            get(content::get_tag).put(content::update_tag).delete(content::delete_tag),
        )
        .with_state(state)
}
