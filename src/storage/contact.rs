use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{enum_col, like_pattern, opt_ts, opt_ts_col, optional, to_sql_int, ts, ts_col, Storage};
use crate::error::Result;
use crate::types::{
    ContactCategory, ContactMessage, ContactPriority, ContactStatus, EmailNotification, EmailStatus,
};

const MESSAGE_COLUMNS: &str = "id, first_name, last_name, email, phone, subject, message, category, status,
     priority, assigned_to, admin_notes, response, responded_at, responded_by, ip_address, user_agent,
     created_at, updated_at";

fn map_message(row: &Row<'_>) -> rusqlite::Result<ContactMessage> {
    Ok(ContactMessage {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        subject: row.get(5)?,
        message: row.get(6)?,
        category: enum_col(row, 7, ContactCategory::parse)?,
        status: enum_col(row, 8, ContactStatus::parse)?,
        priority: enum_col(row, 9, ContactPriority::parse)?,
        assigned_to: row.get(10)?,
        admin_notes: row.get(11)?,
        response: row.get(12)?,
        responded_at: opt_ts_col(row, 13)?,
        responded_by: row.get(14)?,
        ip_address: row.get(15)?,
        user_agent: row.get(16)?,
        created_at: ts_col(row, 17)?,
        updated_at: ts_col(row, 18)?,
    })
}

const EMAIL_COLUMNS: &str = "id, recipient_email, recipient_name, subject, body, notification_type,
     reference_id, reference_type, status, error_message, retry_count, max_retries, sent_at, created_at";

fn map_email(row: &Row<'_>) -> rusqlite::Result<EmailNotification> {
    Ok(EmailNotification {
        id: row.get(0)?,
        recipient_email: row.get(1)?,
        recipient_name: row.get(2)?,
        subject: row.get(3)?,
        body: row.get(4)?,
        notification_type: row.get(5)?,
        reference_id: row.get(6)?,
        reference_type: row.get(7)?,
        status: enum_col(row, 8, EmailStatus::parse)?,
        error_message: row.get(9)?,
        retry_count: row.get(10)?,
        max_retries: row.get(11)?,
        sent_at: opt_ts_col(row, 12)?,
        created_at: ts_col(row, 13)?,
    })
}

impl Storage {
    fn query_messages(
        &self,
        where_clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<ContactMessage>> {
        let sql = format!("SELECT {} FROM contact_messages {}", MESSAGE_COLUMNS, where_clause);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, map_message)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn insert_contact_message(&self, m: &ContactMessage) -> Result<ContactMessage> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO contact_messages (first_name, last_name, email, phone, subject, message, category,
                                           status, priority, ip_address, user_agent, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                m.first_name,
                m.last_name,
                m.email,
                m.phone,
                m.subject,
                m.message,
                m.category.as_str(),
                m.status.as_str(),
                m.priority.as_str(),
                m.ip_address,
                m.user_agent,
                ts(&m.created_at),
            ],
        )?;
        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {} FROM contact_messages WHERE id = ?1", MESSAGE_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_message)?)
    }

    /// Write back every mutable column.
    pub fn update_contact_message(&self, m: &ContactMessage) -> Result<()> {
        self.conn()?.execute(
            "UPDATE contact_messages SET status = ?2, priority = ?3, assigned_to = ?4, admin_notes = ?5,
                    response = ?6, responded_at = ?7, responded_by = ?8, updated_at = ?9
             WHERE id = ?1",
            params![
                m.id,
                m.status.as_str(),
                m.priority.as_str(),
                m.assigned_to,
                m.admin_notes,
                m.response,
                opt_ts(&m.responded_at),
                m.responded_by,
                ts(&m.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_contact_message(&self, id: i64) -> Result<Option<ContactMessage>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM contact_messages WHERE id = ?1", MESSAGE_COLUMNS);
        optional(conn.query_row(&sql, params![id], map_message))
    }

    pub fn delete_contact_message(&self, id: i64) -> Result<bool> {
        let removed = self
            .conn()?
            .execute("DELETE FROM contact_messages WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Newest first. Returns the page and the total row count.
    pub fn list_contact_messages(
        &self,
        status: Option<ContactStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<ContactMessage>, usize)> {
        let status = status.map(|s| s.as_str());
        let (offset, limit) = (to_sql_int(offset), to_sql_int(limit));
        let items = self.query_messages(
            "WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
            &[&status, &limit, &offset],
        )?;
        let total: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM contact_messages WHERE (?1 IS NULL OR status = ?1)",
            params![status],
            |row| row.get(0),
        )?;
        Ok((items, total as usize))
    }

    /// Case-insensitive match on subject, message, e-mail and names.
    pub fn search_contact_messages(&self, query: &str) -> Result<Vec<ContactMessage>> {
        let pattern = like_pattern(query);
        self.query_messages(
            "WHERE LOWER(subject) LIKE ?1 ESCAPE '\\' OR LOWER(message) LIKE ?1 ESCAPE '\\'
                OR LOWER(email) LIKE ?1 ESCAPE '\\' OR LOWER(first_name) LIKE ?1 ESCAPE '\\'
                OR LOWER(last_name) LIKE ?1 ESCAPE '\\'
             ORDER BY created_at DESC, id DESC",
            &[&pattern],
        )
    }

    /// HIGH or URGENT messages still NEW, oldest first.
    pub fn high_priority_new_messages(&self) -> Result<Vec<ContactMessage>> {
        self.query_messages(
            "WHERE priority IN ('HIGH', 'URGENT') AND status = 'NEW' ORDER BY created_at ASC, id ASC",
            &[],
        )
    }

    pub fn count_contact_messages(&self, status: Option<ContactStatus>) -> Result<i64> {
        Ok(self.conn()?.query_row(
            "SELECT COUNT(*) FROM contact_messages WHERE (?1 IS NULL OR status = ?1)",
            params![status.map(|s| s.as_str())],
            |row| row.get(0),
        )?)
    }

    pub fn count_contact_messages_since(&self, since: DateTime<Utc>) -> Result<i64> {
        Ok(self.conn()?.query_row(
            "SELECT COUNT(*) FROM contact_messages WHERE created_at >= ?1",
            params![ts(&since)],
            |row| row.get(0),
        )?)
    }

    /// `(created_at, responded_at)` of every answered message.
    pub fn contact_response_times(&self) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT created_at, responded_at FROM contact_messages WHERE responded_at IS NOT NULL",
        )?;
        let rows = stmt.query_map([], |row| Ok((ts_col(row, 0)?, ts_col(row, 1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ============================================
    // Outbox
    // ============================================

    pub fn insert_email(&self, e: &EmailNotification) -> Result<EmailNotification> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO email_notifications (recipient_email, recipient_name, subject, body, notification_type,
                                              reference_id, reference_type, status, retry_count, max_retries,
                                              created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                e.recipient_email,
                e.recipient_name,
                e.subject,
                e.body,
                e.notification_type,
                e.reference_id,
                e.reference_type,
                e.status.as_str(),
                e.retry_count,
                e.max_retries,
                ts(&e.created_at),
            ],
        )?;
        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {} FROM email_notifications WHERE id = ?1", EMAIL_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_email)?)
    }

    pub fn mark_email(
        &self,
        id: i64,
        status: EmailStatus,
        error: Option<&str>,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.conn()?.execute(
            "UPDATE email_notifications SET status = ?2, error_message = ?3, sent_at = ?4 WHERE id = ?1",
            params![id, status.as_str(), error, opt_ts(&sent_at)],
        )?;
        Ok(())
    }

    /// Move a deliverable row to SENDING. `None` when another attempt holds it,
    /// it was already sent, or its retries are used up.
    pub fn claim_email(&self, id: i64) -> Result<Option<EmailNotification>> {
        let conn = self.conn()?;
        let claimed = conn.execute(
            "UPDATE email_notifications SET status = 'SENDING'
             WHERE id = ?1 AND status IN ('PENDING', 'RETRY') AND retry_count < max_retries",
            params![id],
        )?;
        if claimed == 0 {
            return Ok(None);
        }
        let sql = format!("SELECT {} FROM email_notifications WHERE id = ?1", EMAIL_COLUMNS);
        Ok(Some(conn.query_row(&sql, params![id], map_email)?))
    }

    /// Count a failed attempt. The row goes back to RETRY while attempts
    /// remain and ends as FAILED otherwise. Returns the new status.
    pub fn record_email_failure(&self, id: i64, error: &str) -> Result<EmailStatus> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE email_notifications
             SET retry_count = retry_count + 1,
                 status = CASE WHEN retry_count + 1 >= max_retries THEN 'FAILED' ELSE 'RETRY' END,
                 error_message = ?2
             WHERE id = ?1",
            params![id, error],
        )?;
        Ok(conn.query_row(
            "SELECT status FROM email_notifications WHERE id = ?1",
            params![id],
            |row| enum_col(row, 0, EmailStatus::parse),
        )?)
    }

    /// PENDING rows and RETRY rows with attempts left, oldest first.
    pub fn deliverable_emails(&self, limit: usize) -> Result<Vec<EmailNotification>> {
        let sql = format!(
            "SELECT {} FROM email_notifications
             WHERE status IN ('PENDING', 'RETRY') AND retry_count < max_retries
             ORDER BY created_at, id LIMIT ?1",
            EMAIL_COLUMNS
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![to_sql_int(limit)], map_email)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Release rows left in SENDING by a process that stopped mid-delivery.
    pub fn requeue_stalled_emails(&self) -> Result<usize> {
        Ok(self.conn()?.execute(
            "UPDATE email_notifications SET status = 'PENDING' WHERE status = 'SENDING'",
            [],
        )?)
    }

    pub fn emails_for_reference(
        &self,
        reference_type: &str,
        reference_id: i64,
    ) -> Result<Vec<EmailNotification>> {
        let sql = format!(
            "SELECT {} FROM email_notifications WHERE reference_type = ?1 AND reference_id = ?2 ORDER BY id",
            EMAIL_COLUMNS
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![reference_type, reference_id], map_email)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn emails_by_status(&self, status: EmailStatus) -> Result<Vec<EmailNotification>> {
        let sql = format!(
            "SELECT {} FROM email_notifications WHERE status = ?1 ORDER BY id",
            EMAIL_COLUMNS
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![status.as_str()], map_email)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn message(
        subject: &str,
        priority: ContactPriority,
        created_at: DateTime<Utc>,
    ) -> ContactMessage {
        ContactMessage {
            id: 0,
            first_name: "Ruwan".into(),
            last_name: "Fernando".into(),
            email: "ruwan@example.lk".into(),
            phone: None,
            subject: subject.into(),
            message: "Please tell me more about the bursary.".into(),
            category: ContactCategory::General,
            status: ContactStatus::New,
            priority,
            assigned_to: None,
            admin_notes: None,
            response: None,
            responded_at: None,
            responded_by: None,
            ip_address: None,
            user_agent: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_list_is_newest_first_with_total() {
        let storage = Storage::open_in_memory().unwrap();
        let t0 = Utc::now() - Duration::hours(3);
        for (i, subject) in ["one", "two", "three"].iter().enumerate() {
            storage
                .insert_contact_message(&message(subject, ContactPriority::Normal, t0 + Duration::hours(i as i64)))
                .unwrap();
        }
        let (page, total) = storage.list_contact_messages(None, 0, 2).unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.iter().map(|m| m.subject.as_str()).collect::<Vec<_>>(), vec!["three", "two"]);
        let (rest, _) = storage.list_contact_messages(None, 2, 2).unwrap();
        assert_eq!(rest[0].subject, "one");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let storage = Storage::open_in_memory().unwrap();
        storage.insert_contact_message(&message("Visa Question", ContactPriority::Normal, Utc::now())).unwrap();
        assert_eq!(storage.search_contact_messages("visa").unwrap().len(), 1);
        assert_eq!(storage.search_contact_messages("FERNANDO").unwrap().len(), 1);
        assert!(storage.search_contact_messages("tuition").unwrap().is_empty());
    }

    #[test]
    fn test_high_priority_oldest_first() {
        let storage = Storage::open_in_memory().unwrap();
        let now = Utc::now();
        storage.insert_contact_message(&message("late", ContactPriority::High, now)).unwrap();
        storage.insert_contact_message(&message("early", ContactPriority::Urgent, now - Duration::hours(1))).unwrap();
        storage.insert_contact_message(&message("calm", ContactPriority::Normal, now)).unwrap();
        let urgent = storage.high_priority_new_messages().unwrap();
        assert_eq!(urgent.iter().map(|m| m.subject.as_str()).collect::<Vec<_>>(), vec!["early", "late"]);
    }

    fn outbox_row(max_retries: u32) -> EmailNotification {
        EmailNotification {
            id: 0,
            recipient_email: "a@b.lk".into(),
            recipient_name: None,
            subject: "Hi".into(),
            body: "Body".into(),
            notification_type: "TEST".into(),
            reference_id: Some(4),
            reference_type: Some("CONTACT_MESSAGE".into()),
            status: EmailStatus::Pending,
            error_message: None,
            retry_count: 0,
            max_retries,
            sent_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_email_status_update() {
        let storage = Storage::open_in_memory().unwrap();
        let stored = storage.insert_email(&outbox_row(3)).unwrap();
        storage.mark_email(stored.id, EmailStatus::Failed, Some("timeout"), None).unwrap();
        let emails = storage.emails_for_reference("CONTACT_MESSAGE", 4).unwrap();
        assert_eq!(emails[0].status, EmailStatus::Failed);
        assert_eq!(emails[0].error_message.as_deref(), Some("timeout"));
        assert_eq!(storage.emails_by_status(EmailStatus::Failed).unwrap().len(), 1);
    }

    #[test]
    fn test_claim_is_exclusive_and_failures_count() {
        let storage = Storage::open_in_memory().unwrap();
        let row = storage.insert_email(&outbox_row(2)).unwrap();

        let claimed = storage.claim_email(row.id).unwrap().unwrap();
        assert_eq!(claimed.status, EmailStatus::Sending);
        assert!(storage.claim_email(row.id).unwrap().is_none());
        assert!(storage.deliverable_emails(10).unwrap().is_empty());

        assert_eq!(storage.record_email_failure(row.id, "502").unwrap(), EmailStatus::Retry);
        assert_eq!(storage.deliverable_emails(10).unwrap().len(), 1);
        storage.claim_email(row.id).unwrap().unwrap();
        assert_eq!(storage.record_email_failure(row.id, "503").unwrap(), EmailStatus::Failed);

        let failed = storage.emails_by_status(EmailStatus::Failed).unwrap();
        assert_eq!(failed[0].retry_count, 2);
        assert_eq!(failed[0].error_message.as_deref(), Some("503"));
        assert!(storage.claim_email(row.id).unwrap().is_none());
        assert!(storage.deliverable_emails(10).unwrap().is_empty());
    }

    #[test]
    fn test_stalled_rows_are_requeued() {
        let storage = Storage::open_in_memory().unwrap();
        let row = storage.insert_email(&outbox_row(3)).unwrap();
        storage.claim_email(row.id).unwrap().unwrap();
        assert_eq!(storage.requeue_stalled_emails().unwrap(), 1);
        assert_eq!(storage.deliverable_emails(10).unwrap()[0].status, EmailStatus::Pending);
    }
}
