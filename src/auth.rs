//! Accounts, sessions and e-mail verification.

use chrono::{Duration, Utc};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::error::{AppError, Result, UniqueConflict};
use crate::notify::EmailService;
use crate::storage::{NewUser, Storage};
use crate::tokens::{self, Claims};
use crate::types::{
    AuthResponse, LoginRequest, RefreshToken, RegisterRequest, Role, StudentProfile, User,
    UserSummary,
};

const MIN_PASSWORD_LEN: usize = 8;
const MAX_EMAIL_LEN: usize = 255;

/// Loose shape check: something@something.tld, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    let re = EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());
    email.len() <= MAX_EMAIL_LEN && re.as_ref().map(|re| re.is_match(email)).unwrap_or(false)
}

pub struct AuthService {
    storage: Arc<Storage>,
    email: Arc<EmailService>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(storage: Arc<Storage>, email: Arc<EmailService>, config: AuthConfig) -> Self {
        Self { storage, email, config }
    }

    pub fn register(&self, req: RegisterRequest) -> Result<AuthResponse> {
        if req.password != req.confirm_password {
            return Err(AppError::validation("Passwords do not match"));
        }
        let email = req.email.trim().to_string();
        if !is_valid_email(&email) {
            return Err(AppError::validation("Please provide a valid email address"));
        }
        if req.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.storage.find_user_by_email(&email)?.is_some() {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let role = req.role.unwrap_or(Role::Student);
        if role == Role::Admin {
            return Err(AppError::Forbidden(
                "Admin accounts cannot be self-registered".to_string(),
            ));
        }
        let full_name = req.full_name.as_deref().map(str::trim).filter(|n| !n.is_empty());
        let institution_name = req.institution_name.as_deref().map(str::trim).filter(|n| !n.is_empty());
        let verification_token = uuid::Uuid::new_v4().to_string();
        let password_hash = tokens::hash_password(&req.password);
        let now = Utc::now();

        let user = self.storage.insert_user(
            &NewUser {
                email: &email,
                password_hash: &password_hash,
                role,
                full_name,
                institution_name,
                verification_token: Some(&verification_token),
            },
            now,
        )
        .or_conflict("Email is already registered")?;

        if role == Role::Student {
            let mut profile = StudentProfile {
                user_id: user.id,
                full_name: full_name.unwrap_or_default().to_string(),
                ..Default::default()
            };
            profile.profile_completion = profile.completion_percentage();
            self.storage.save_profile(&profile, now)?;
        }

        info!(user_id = user.id, email = %user.email, role = %user.role, "user registered");

        if let Err(e) = self
            .email
            .queue_verification(user.id, &user.email, full_name, &verification_token)
        {
            warn!(user_id = user.id, error = %e, "failed to queue verification email");
        }

        self.issue(&user)
    }

    /// Create a verified admin account. Used by the CLI, never over HTTP.
    pub fn create_admin(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<UserSummary> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AppError::validation("Please provide a valid email address"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.storage.find_user_by_email(email)?.is_some() {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }
        let password_hash = tokens::hash_password(password);
        let user = self.storage.insert_user(
            &NewUser {
                email,
                password_hash: &password_hash,
                role: Role::Admin,
                full_name,
                institution_name: None,
                verification_token: None,
            },
            Utc::now(),
        )
        .or_conflict("Email is already registered")?;
        self.storage.mark_user_verified(user.id)?;
        info!(user_id = user.id, email = %user.email, "admin account created");
        self.current_user(user.id)
    }

    pub fn login(&self, req: &LoginRequest) -> Result<AuthResponse> {
        let invalid = || AppError::Unauthorized("Invalid email or password".to_string());
        let user = self.storage.find_user_by_email(&req.email)?.ok_or_else(invalid)?;
        if !tokens::verify_password(&req.password, &user.password_hash) {
            return Err(invalid());
        }
        if !user.is_active {
            return Err(AppError::Forbidden(
                "Account is deactivated. Please contact support.".to_string(),
            ));
        }

        let now = Utc::now();
        self.storage.touch_last_login(user.id, now)?;
        info!(user_id = user.id, email = %user.email, "user logged in");
        self.issue(&user)
    }

    /// Exchange a refresh token for a new pair. The presented token is spent.
    pub fn refresh(&self, refresh_token: &str) -> Result<AuthResponse> {
        let stored = self
            .storage
            .find_refresh_token(refresh_token)?
            .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

        self.storage.delete_refresh_token(&stored.token)?;
        if stored.expires_at <= Utc::now() {
            return Err(AppError::Unauthorized(
                "Refresh token has expired. Please login again.".to_string(),
            ));
        }

        let user = self
            .storage
            .find_user(stored.user_id)?
            .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;
        if !user.is_active {
            return Err(AppError::Forbidden(
                "Account is deactivated. Please contact support.".to_string(),
            ));
        }
        info!(user_id = user.id, "token refreshed");
        self.issue(&user)
    }

    /// Drop every refresh token of the user.
    pub fn logout(&self, user_id: i64) -> Result<()> {
        let removed = self.storage.delete_refresh_tokens_for_user(user_id)?;
        info!(user_id, removed, "user logged out");
        Ok(())
    }

    pub fn verify_email(&self, token: &str) -> Result<()> {
        let user = self
            .storage
            .find_user_by_verification_token(token.trim())?
            .ok_or_else(|| AppError::validation("Invalid verification token"))?;
        self.storage.mark_user_verified(user.id)?;
        info!(user_id = user.id, email = %user.email, "email verified");
        Ok(())
    }

    pub fn current_user(&self, user_id: i64) -> Result<UserSummary> {
        self.storage
            .find_user(user_id)?
            .map(|u| UserSummary::from(&u))
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub fn validate_token(&self, token: &str) -> bool {
        self.authenticate(token).is_ok()
    }

    /// Verify an access token and return its claims.
    pub fn authenticate(&self, token: &str) -> Result<Claims> {
        tokens::verify_access_token(token, self.config.token_secret.as_bytes(), Utc::now().timestamp())
            .map_err(|e| AppError::Unauthorized(format!("Invalid access token: {}", e.message)))
    }

    fn issue(&self, user: &User) -> Result<AuthResponse> {
        let now = Utc::now();
        let ttl = self.config.access_token_ttl_secs;
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: now.timestamp() + ttl,
        };
        let access_token = tokens::issue_access_token(&claims, self.config.token_secret.as_bytes())
            .map_err(|e| AppError::Internal(format!("failed to sign access token: {}", e)))?;

        let refresh = RefreshToken {
            token: uuid::Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: now + Duration::days(self.config.refresh_token_ttl_days),
        };
        self.storage.insert_refresh_token(&refresh)?;

        Ok(AuthResponse {
            access_token,
            refresh_token: refresh.token,
            token_type: "Bearer".to_string(),
            expires_in: ttl,
            user: UserSummary::from(user),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MailConfig;

    fn service() -> (AuthService, Arc<Storage>) {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let email = Arc::new(EmailService::new(storage.clone(), MailConfig::default()).unwrap());
        (AuthService::new(storage.clone(), email, AuthConfig::default()), storage)
    }

    fn request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: "s3cret-pass".into(),
            confirm_password: "s3cret-pass".into(),
            full_name: Some("Kasun Silva".into()),
            role: None,
            institution_name: None,
        }
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("a.b@uni.ac.lk"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@@x.lk"));
        assert!(!is_valid_email("space in@x.lk"));
    }

    #[test]
    fn test_register_creates_student_profile_and_queues_email() {
        let (auth, storage) = service();
        let response = auth.register(request("kasun@example.lk")).unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 86_400);
        assert_eq!(response.user.role, Role::Student);
        assert!(!response.user.is_verified);

        let profile = storage.get_profile(response.user.id).unwrap().unwrap();
        assert_eq!(profile.full_name, "Kasun Silva");
        let emails = storage
            .emails_for_reference(crate::notify::USER_REFERENCE, response.user.id)
            .unwrap();
        assert_eq!(emails.len(), 1);
    }

    #[test]
    fn test_register_rejections() {
        let (auth, _) = service();
        let mut mismatch = request("a@example.lk");
        mismatch.confirm_password = "other-pass".into();
        let err = auth.register(mismatch).unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match");

        let mut short = request("a@example.lk");
        short.password = "short".into();
        short.confirm_password = "short".into();
        assert!(matches!(auth.register(short), Err(AppError::Validation(_))));

        auth.register(request("a@example.lk")).unwrap();
        let err = auth.register(request("A@Example.lk")).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.to_string(), "Email is already registered");
    }

    #[test]
    fn test_admin_only_through_create_admin() {
        let (auth, _) = service();
        let mut req = request("root@example.lk");
        req.role = Some(Role::Admin);
        assert!(matches!(auth.register(req), Err(AppError::Forbidden(_))));

        let admin = auth.create_admin("root@example.lk", "admin-pass-1", Some("Root")).unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.is_verified);
        let session = auth
            .login(&LoginRequest {
                email: "root@example.lk".into(),
                password: "admin-pass-1".into(),
            })
            .unwrap();
        assert_eq!(auth.authenticate(&session.access_token).unwrap().role, Role::Admin);
    }

    #[test]
    fn test_login_and_deactivated_account() {
        let (auth, storage) = service();
        let registered = auth.register(request("b@example.lk")).unwrap();

        let bad = LoginRequest {
            email: "b@example.lk".into(),
            password: "wrong-pass".into(),
        };
        assert_eq!(auth.login(&bad).unwrap_err().to_string(), "Invalid email or password");

        let good = LoginRequest {
            email: "b@example.lk".into(),
            password: "s3cret-pass".into(),
        };
        let session = auth.login(&good).unwrap();
        let claims = auth.authenticate(&session.access_token).unwrap();
        assert_eq!(claims.sub, registered.user.id);

        storage.set_user_active(registered.user.id, false).unwrap();
        assert!(matches!(auth.login(&good), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_refresh_rotates_token() {
        let (auth, storage) = service();
        let first = auth.register(request("c@example.lk")).unwrap();
        let second = auth.refresh(&first.refresh_token).unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
        assert_eq!(
            auth.refresh(&first.refresh_token).unwrap_err().to_string(),
            "Invalid refresh token"
        );

        storage
            .insert_refresh_token(&RefreshToken {
                token: "stale".into(),
                user_id: first.user.id,
                expires_at: Utc::now() - Duration::minutes(1),
            })
            .unwrap();
        assert_eq!(
            auth.refresh("stale").unwrap_err().to_string(),
            "Refresh token has expired. Please login again."
        );
        assert!(storage.find_refresh_token("stale").unwrap().is_none());
    }

    #[test]
    fn test_logout_and_verify_email() {
        let (auth, storage) = service();
        let session = auth.register(request("d@example.lk")).unwrap();
        auth.logout(session.user.id).unwrap();
        assert!(auth.refresh(&session.refresh_token).is_err());

        let token = storage
            .find_user(session.user.id)
            .unwrap()
            .unwrap()
            .verification_token
            .unwrap();
        auth.verify_email(&token).unwrap();
        assert!(auth.current_user(session.user.id).unwrap().is_verified);
        assert_eq!(
            auth.verify_email(&token).unwrap_err().to_string(),
            "Invalid verification token"
        );
        assert!(!auth.validate_token("v1.garbage.sig"));
    }
}
