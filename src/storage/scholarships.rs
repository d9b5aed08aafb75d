use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Row};

use super::{
    date, enum_col, json_col, json_text, opt_date_col, opt_ts, opt_ts_col, optional, ts, ts_col,
    Storage,
};
use crate::error::Result;
use crate::types::{Application, ApplicationStatus, Scholarship, ScholarshipStatus};

const SCHOLARSHIP_COLUMNS: &str = "id, institution_id, title, status, is_featured, application_deadline,
     total_applications, views_count, details, created_at, updated_at, published_at";

/// The `details` column holds the full record; indexed columns override it.
fn map_scholarship(row: &Row<'_>) -> rusqlite::Result<Scholarship> {
    let mut s: Scholarship = json_col(row, 8)?;
    s.id = row.get(0)?;
    s.institution_id = row.get(1)?;
    s.title = row.get(2)?;
    s.status = enum_col(row, 3, ScholarshipStatus::parse)?;
    s.is_featured = row.get(4)?;
    s.application_deadline = opt_date_col(row, 5)?;
    s.total_applications = row.get(6)?;
    s.views_count = row.get(7)?;
    s.created_at = Some(ts_col(row, 9)?);
    s.updated_at = Some(ts_col(row, 10)?);
    s.published_at = opt_ts_col(row, 11)?;
    Ok(s)
}

const APPLICATION_COLUMNS: &str = "id, scholarship_id, student_id, status, cover_letter, statement_of_purpose,
     reviewer_id, review_notes, reviewed_at, match_score, created_at, updated_at";

fn map_application(row: &Row<'_>) -> rusqlite::Result<Application> {
    Ok(Application {
        id: row.get(0)?,
        scholarship_id: row.get(1)?,
        student_id: row.get(2)?,
        status: enum_col(row, 3, ApplicationStatus::parse)?,
        cover_letter: row.get(4)?,
        statement_of_purpose: row.get(5)?,
        reviewer_id: row.get(6)?,
        review_notes: row.get(7)?,
        reviewed_at: opt_ts_col(row, 8)?,
        match_score: row.get(9)?,
        created_at: ts_col(row, 10)?,
        updated_at: ts_col(row, 11)?,
    })
}

impl Storage {
    pub fn insert_scholarship(&self, s: &Scholarship, now: DateTime<Utc>) -> Result<Scholarship> {
        let details = json_text(s)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO scholarships (institution_id, title, status, is_featured, application_deadline,
                                       total_applications, views_count, details, created_at, updated_at, published_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6, ?7, ?7, ?8)",
            params![
                s.institution_id,
                s.title,
                s.status.as_str(),
                s.is_featured,
                date(&s.application_deadline),
                details,
                ts(&now),
                opt_ts(&s.published_at),
            ],
        )?;
        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {} FROM scholarships WHERE id = ?1", SCHOLARSHIP_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_scholarship)?)
    }

    /// Persist every editable field. Counters are left untouched.
    pub fn update_scholarship(&self, s: &Scholarship, now: DateTime<Utc>) -> Result<()> {
        let details = json_text(s)?;
        self.conn()?.execute(
            "UPDATE scholarships SET institution_id = ?2, title = ?3, status = ?4, is_featured = ?5,
                    application_deadline = ?6, details = ?7, updated_at = ?8, published_at = ?9
             WHERE id = ?1",
            params![
                s.id,
                s.institution_id,
                s.title,
                s.status.as_str(),
                s.is_featured,
                date(&s.application_deadline),
                details,
                ts(&now),
                opt_ts(&s.published_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_scholarship(&self, id: i64) -> Result<Option<Scholarship>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM scholarships WHERE id = ?1", SCHOLARSHIP_COLUMNS);
        optional(conn.query_row(&sql, params![id], map_scholarship))
    }

    /// Unknown ids are skipped; order follows id.
    pub fn scholarships_by_ids(&self, ids: &[i64]) -> Result<Vec<Scholarship>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM scholarships WHERE id IN ({}) ORDER BY id",
            SCHOLARSHIP_COLUMNS, placeholders
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), map_scholarship)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// ACTIVE with a deadline on or after `today`, soonest deadline first.
    pub fn active_scholarships(
        &self,
        today: NaiveDate,
        featured_only: bool,
    ) -> Result<Vec<Scholarship>> {
        let sql = format!(
            "SELECT {} FROM scholarships
             WHERE status = 'ACTIVE' AND application_deadline >= ?1 AND (?2 = 0 OR is_featured = 1)
             ORDER BY application_deadline ASC, id ASC",
            SCHOLARSHIP_COLUMNS
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![date(&Some(today)), featured_only], map_scholarship)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn scholarships_by_institution(&self, institution_id: i64) -> Result<Vec<Scholarship>> {
        let sql = format!(
            "SELECT {} FROM scholarships WHERE institution_id = ?1 ORDER BY created_at DESC, id DESC",
            SCHOLARSHIP_COLUMNS
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![institution_id], map_scholarship)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn increment_scholarship_views(&self, id: i64) -> Result<()> {
        self.conn()?.execute(
            "UPDATE scholarships SET views_count = views_count + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    // ============================================
    // Applications
    // ============================================

    /// Inserts the application and bumps the scholarship's counter in one transaction.
    pub fn insert_application(&self, app: &Application) -> Result<Application> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO applications (scholarship_id, student_id, status, cover_letter, statement_of_purpose,
                                       match_score, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                app.scholarship_id,
                app.student_id,
                app.status.as_str(),
                app.cover_letter,
                app.statement_of_purpose,
                app.match_score,
                ts(&app.created_at),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE scholarships SET total_applications = total_applications + 1 WHERE id = ?1",
            params![app.scholarship_id],
        )?;
        let sql = format!("SELECT {} FROM applications WHERE id = ?1", APPLICATION_COLUMNS);
        let stored = tx.query_row(&sql, params![id], map_application)?;
        tx.commit()?;
        Ok(stored)
    }

    pub fn application_exists(&self, scholarship_id: i64, student_id: i64) -> Result<bool> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM applications WHERE scholarship_id = ?1 AND student_id = ?2",
            params![scholarship_id, student_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get_application(&self, id: i64) -> Result<Option<Application>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM applications WHERE id = ?1", APPLICATION_COLUMNS);
        optional(conn.query_row(&sql, params![id], map_application))
    }

    pub fn applications_for_student(&self, student_id: i64) -> Result<Vec<Application>> {
        let sql = format!(
            "SELECT {} FROM applications WHERE student_id = ?1 ORDER BY created_at DESC, id DESC",
            APPLICATION_COLUMNS
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![student_id], map_application)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Highest match score first.
    pub fn applications_for_scholarship(&self, scholarship_id: i64) -> Result<Vec<Application>> {
        let sql = format!(
            "SELECT {} FROM applications WHERE scholarship_id = ?1
             ORDER BY match_score IS NULL, match_score DESC, id ASC",
            APPLICATION_COLUMNS
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![scholarship_id], map_application)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn update_application(&self, app: &Application) -> Result<()> {
        self.conn()?.execute(
            "UPDATE applications SET status = ?2, reviewer_id = ?3, review_notes = ?4, reviewed_at = ?5,
                    updated_at = ?6
             WHERE id = ?1",
            params![
                app.id,
                app.status.as_str(),
                app.reviewer_id,
                app.review_notes,
                opt_ts(&app.reviewed_at),
                ts(&app.updated_at),
            ],
        )?;
        Ok(())
    }
}
