use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{enum_col, json_text, opt_ts_col, optional, ts, ts_col, Storage};
use crate::error::Result;
use crate::types::{RefreshToken, Role, StudentProfile, User};

const USER_COLUMNS: &str = "id, email, password_hash, role, is_active, is_verified, verification_token,
     full_name, institution_name, last_login, created_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role: enum_col(row, 3, Role::parse)?,
        is_active: row.get(4)?,
        is_verified: row.get(5)?,
        verification_token: row.get(6)?,
        full_name: row.get(7)?,
        institution_name: row.get(8)?,
        last_login: opt_ts_col(row, 9)?,
        created_at: ts_col(row, 10)?,
    })
}

/// Fields needed to create an account.
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub full_name: Option<&'a str>,
    pub institution_name: Option<&'a str>,
    pub verification_token: Option<&'a str>,
}

impl Storage {
    pub fn insert_user(&self, user: &NewUser<'_>, now: DateTime<Utc>) -> Result<User> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (email, password_hash, role, is_active, is_verified, verification_token,
                                full_name, institution_name, created_at)
             VALUES (?1, ?2, ?3, 1, 0, ?4, ?5, ?6, ?7)",
            params![
                user.email,
                user.password_hash,
                user.role.as_str(),
                user.verification_token,
                user.full_name,
                user.institution_name,
                ts(&now),
            ],
        )?;
        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_user)?)
    }

    pub fn find_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        optional(conn.query_row(&sql, params![id], map_user))
    }

    /// Case-insensitive lookup.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        optional(conn.query_row(&sql, params![email.trim()], map_user))
    }

    pub fn find_user_by_verification_token(&self, token: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM users WHERE verification_token = ?1", USER_COLUMNS);
        optional(conn.query_row(&sql, params![token], map_user))
    }

    pub fn mark_user_verified(&self, id: i64) -> Result<()> {
        self.conn()?.execute(
            "UPDATE users SET is_verified = 1, verification_token = NULL WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    pub fn set_user_active(&self, id: i64, active: bool) -> Result<()> {
        self.conn()?
            .execute("UPDATE users SET is_active = ?2 WHERE id = ?1", params![id, active])?;
        Ok(())
    }

    pub fn touch_last_login(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        self.conn()?
            .execute("UPDATE users SET last_login = ?2 WHERE id = ?1", params![id, ts(&now)])?;
        Ok(())
    }

    // ============================================
    // Refresh tokens
    // ============================================

    pub fn insert_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO refresh_tokens (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![token.token, token.user_id, ts(&token.expires_at)],
        )?;
        Ok(())
    }

    pub fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let conn = self.conn()?;
        optional(conn.query_row(
            "SELECT token, user_id, expires_at FROM refresh_tokens WHERE token = ?1",
            params![token],
            |row| {
                Ok(RefreshToken {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    expires_at: ts_col(row, 2)?,
                })
            },
        ))
    }

    /// Returns whether a row was removed.
    pub fn delete_refresh_token(&self, token: &str) -> Result<bool> {
        let removed = self
            .conn()?
            .execute("DELETE FROM refresh_tokens WHERE token = ?1", params![token])?;
        Ok(removed > 0)
    }

    pub fn delete_refresh_tokens_for_user(&self, user_id: i64) -> Result<usize> {
        Ok(self
            .conn()?
            .execute("DELETE FROM refresh_tokens WHERE user_id = ?1", params![user_id])?)
    }

    // ============================================
    // Student profiles
    // ============================================

    pub fn get_profile(&self, user_id: i64) -> Result<Option<StudentProfile>> {
        let conn = self.conn()?;
        let raw: Option<String> = optional(conn.query_row(
            "SELECT profile FROM student_profiles WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        ))?;
        match raw {
            Some(json) => {
                let mut profile: StudentProfile = serde_json::from_str(&json)?;
                profile.user_id = user_id;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// Insert or replace the profile keyed by `profile.user_id`.
    pub fn save_profile(&self, profile: &StudentProfile, now: DateTime<Utc>) -> Result<()> {
        let json = json_text(profile)?;
        self.conn()?.execute(
            "INSERT INTO student_profiles (user_id, profile, completion, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                profile = excluded.profile,
                completion = excluded.completion,
                updated_at = excluded.updated_at",
            params![profile.user_id, json, profile.profile_completion, ts(&now)],
        )?;
        Ok(())
    }
}
