//! Contact form inbox.

use chrono::{DateTime, Duration, Months, Utc};
use std::sync::Arc;
use tracing::{error, info};

use crate::auth::is_valid_email;
use crate::error::{page_offset, AppError, Result};
use crate::notify::EmailService;
use crate::storage::Storage;
use crate::types::{
    ContactCategory, ContactMessage, ContactPriority, ContactRequest, ContactResponseRequest,
    ContactStats, ContactStatus, Page, PageRequest, MAX_PAGE_SIZE,
};

const MAX_NAME_LEN: usize = 100;
const MAX_PHONE_LEN: usize = 20;
const MAX_SUBJECT_LEN: usize = 255;
const MIN_BODY_LEN: usize = 10;
const MAX_BODY_LEN: usize = 5000;

fn char_len(value: &str) -> usize {
    value.chars().count()
}

pub fn validate_request(req: &ContactRequest) -> Result<()> {
    for (label, value) in [("First name", &req.first_name), ("Last name", &req.last_name)] {
        if value.trim().is_empty() {
            return Err(AppError::validation(format!("{} is required", label)));
        }
        if char_len(value) > MAX_NAME_LEN {
            return Err(AppError::validation(format!(
                "{} must be less than {} characters",
                label, MAX_NAME_LEN
            )));
        }
    }
    if req.email.trim().is_empty() {
        return Err(AppError::validation("Email is required"));
    }
    if !is_valid_email(req.email.trim()) {
        return Err(AppError::validation("Please provide a valid email address"));
    }
    if req.phone.as_deref().is_some_and(|p| char_len(p) > MAX_PHONE_LEN) {
        return Err(AppError::validation("Phone number must be less than 20 characters"));
    }
    if req.subject.trim().is_empty() {
        return Err(AppError::validation("Subject is required"));
    }
    if char_len(&req.subject) > MAX_SUBJECT_LEN {
        return Err(AppError::validation("Subject must be less than 255 characters"));
    }
    if req.message.trim().is_empty() {
        return Err(AppError::validation("Message is required"));
    }
    if !(MIN_BODY_LEN..=MAX_BODY_LEN).contains(&char_len(&req.message)) {
        return Err(AppError::validation("Message must be between 10 and 5000 characters"));
    }
    Ok(())
}

/// HIGH for urgent wording or complaints, NORMAL otherwise.
pub fn determine_priority(
    subject: &str,
    message: &str,
    category: ContactCategory,
) -> ContactPriority {
    let subject = subject.to_lowercase();
    let message = message.to_lowercase();
    if subject.contains("urgent")
        || message.contains("urgent")
        || subject.contains("emergency")
        || message.contains("deadline")
        || category == ContactCategory::Complaint
    {
        ContactPriority::High
    } else {
        ContactPriority::Normal
    }
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer.
pub fn client_ip(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    peer: Option<String>,
) -> Option<String> {
    if let Some(first) = forwarded_for
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(first.to_string());
    }
    if let Some(ip) = real_ip.map(str::trim).filter(|v| !v.is_empty()) {
        return Some(ip.to_string());
    }
    peer
}

/// Append a timestamped entry, separated from earlier notes by a blank line.
pub fn append_note(existing: Option<&str>, notes: &str, at: DateTime<Utc>) -> String {
    let entry = format!("[{}]\n{}", at.format("%Y-%m-%dT%H:%M:%S"), notes);
    match existing.filter(|n| !n.is_empty()) {
        Some(previous) => format!("{}\n\n{}", previous, entry),
        None => entry,
    }
}

fn parse_status(value: &str) -> Result<ContactStatus> {
    ContactStatus::parse(value).ok_or_else(|| AppError::validation(format!("Invalid status: {}", value)))
}

fn parse_priority(value: &str) -> Result<ContactPriority> {
    ContactPriority::parse(value).ok_or_else(|| AppError::validation(format!("Invalid priority: {}", value)))
}

fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_PAGE_SIZE)
}

pub struct ContactService {
    storage: Arc<Storage>,
    email: Arc<EmailService>,
}

impl ContactService {
    pub fn new(storage: Arc<Storage>, email: Arc<EmailService>) -> Self {
        Self { storage, email }
    }

    pub fn submit(
        &self,
        req: ContactRequest,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<ContactMessage> {
        validate_request(&req)?;
        let category = match req.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(raw) => ContactCategory::parse(raw)
                .ok_or_else(|| AppError::validation(format!("Invalid category: {}", raw)))?,
            None => ContactCategory::General,
        };
        let priority = determine_priority(&req.subject, &req.message, category);
        let now = Utc::now();

        let saved = self.storage.insert_contact_message(&ContactMessage {
            id: 0,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            email: req.email.trim().to_string(),
            phone: req.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            subject: req.subject.trim().to_string(),
            message: req.message,
            category,
            status: ContactStatus::New,
            priority,
            assigned_to: None,
            admin_notes: None,
            response: None,
            responded_at: None,
            responded_by: None,
            ip_address,
            user_agent,
            created_at: now,
            updated_at: now,
        })?;
        info!(
            contact = saved.id,
            email = %saved.email,
            priority = %saved.priority,
            "contact message received"
        );

        if let Err(e) = self.email.queue_contact_confirmation(&saved) {
            error!(contact = saved.id, error = %e, "failed to queue confirmation email");
        }
        if let Err(e) = self.email.queue_contact_admin_notification(&saved) {
            error!(contact = saved.id, error = %e, "failed to queue admin notification email");
        }
        Ok(saved)
    }

    pub fn get(&self, id: i64) -> Result<ContactMessage> {
        self.storage
            .get_contact_message(id)?
            .ok_or_else(|| AppError::not_found("Contact message", id))
    }

    pub fn list(&self, page: usize, size: usize) -> Result<Page<ContactMessage>> {
        self.list_filtered(None, page, size)
    }

    pub fn by_status(
        &self,
        status: &str,
        page: usize,
        size: usize,
    ) -> Result<Page<ContactMessage>> {
        self.list_filtered(Some(parse_status(status)?), page, size)
    }

    fn list_filtered(
        &self,
        status: Option<ContactStatus>,
        page: usize,
        size: usize,
    ) -> Result<Page<ContactMessage>> {
        let req = PageRequest::new(page, size);
        let (items, total) = self
            .storage
            .list_contact_messages(status, page_offset(&req)?, req.size)?;
        Ok(Page::new(items, req.page, req.size, total))
    }

    pub fn search(&self, query: &str, page: usize, size: usize) -> Result<Page<ContactMessage>> {
        let req = PageRequest::new(page, size);
        let offset = page_offset(&req)?;
        let all = self.storage.search_contact_messages(query)?;
        let total = all.len();
        let items = all.into_iter().skip(offset).take(req.size).collect();
        Ok(Page::new(items, req.page, req.size, total))
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<ContactMessage>> {
        let (items, _) = self.storage.list_contact_messages(None, 0, clamp_limit(limit))?;
        Ok(items)
    }

    pub fn high_priority(&self) -> Result<Vec<ContactMessage>> {
        self.storage.high_priority_new_messages()
    }

    pub fn stats(&self) -> Result<ContactStats> {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> Result<ContactStats> {
        let today = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .unwrap_or(now);
        let week_ago = today - Duration::weeks(1);
        let month_ago = today.checked_sub_months(Months::new(1)).unwrap_or(today);

        let times = self.storage.contact_response_times()?;
        let average_response_time_hours = if times.is_empty() {
            0.0
        } else {
            let total_minutes: i64 = times.iter().map(|(created, responded)| (*responded - *created).num_minutes()).sum();
            let hours = total_minutes as f64 / 60.0 / times.len() as f64;
            (hours * 100.0).round() / 100.0
        };

        Ok(ContactStats {
            total_messages: self.storage.count_contact_messages(None)?,
            new_messages: self.storage.count_contact_messages(Some(ContactStatus::New))?,
            in_progress_messages: self.storage.count_contact_messages(Some(ContactStatus::InProgress))?,
            resolved_messages: self.storage.count_contact_messages(Some(ContactStatus::Resolved))?,
            today_messages: self.storage.count_contact_messages_since(today)?,
            this_week_messages: self.storage.count_contact_messages_since(week_ago)?,
            this_month_messages: self.storage.count_contact_messages_since(month_ago)?,
            average_response_time_hours,
        })
    }

    fn save(&self, mut message: ContactMessage) -> Result<ContactMessage> {
        message.updated_at = Utc::now();
        self.storage.update_contact_message(&message)?;
        Ok(message)
    }

    pub fn update_status(&self, id: i64, status: &str) -> Result<ContactMessage> {
        let status = parse_status(status)?;
        let mut message = self.get(id)?;
        message.status = status;
        self.save(message)
    }

    pub fn update_priority(&self, id: i64, priority: &str) -> Result<ContactMessage> {
        let priority = parse_priority(priority)?;
        let mut message = self.get(id)?;
        message.priority = priority;
        self.save(message)
    }

    /// Assign to an admin. A NEW message moves to IN_PROGRESS.
    pub fn assign(&self, id: i64, admin_id: i64) -> Result<ContactMessage> {
        let mut message = self.get(id)?;
        message.assigned_to = Some(admin_id);
        if message.status == ContactStatus::New {
            message.status = ContactStatus::InProgress;
        }
        let saved = self.save(message)?;
        info!(contact = id, admin = admin_id, "contact message assigned");
        Ok(saved)
    }

    pub fn respond(
        &self,
        id: i64,
        req: ContactResponseRequest,
        admin_id: i64,
    ) -> Result<ContactMessage> {
        let length = char_len(req.response.trim());
        if length == 0 {
            return Err(AppError::validation("Response message is required"));
        }
        if !(MIN_BODY_LEN..=MAX_BODY_LEN).contains(&length) {
            return Err(AppError::validation("Response must be between 10 and 5000 characters"));
        }
        let status = match req.status.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => parse_status(raw)?,
            None => ContactStatus::Resolved,
        };

        let mut message = self.get(id)?;
        message.response = Some(req.response.trim().to_string());
        if let Some(notes) = req.admin_notes.filter(|n| !n.trim().is_empty()) {
            message.admin_notes = Some(notes);
        }
        message.responded_at = Some(Utc::now());
        message.responded_by = Some(admin_id);
        message.status = status;
        let saved = self.save(message)?;
        info!(contact = id, admin = admin_id, status = %status, "contact message answered");

        if let Err(e) = self.email.queue_contact_response(&saved) {
            error!(contact = id, error = %e, "failed to queue response email");
        }
        Ok(saved)
    }

    pub fn add_notes(&self, id: i64, notes: &str) -> Result<ContactMessage> {
        if notes.trim().is_empty() {
            return Err(AppError::validation("Notes are required"));
        }
        let mut message = self.get(id)?;
        message.admin_notes = Some(append_note(message.admin_notes.as_deref(), notes.trim(), Utc::now()));
        self.save(message)
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        if !self.storage.delete_contact_message(id)? {
            return Err(AppError::not_found("Contact message", id));
        }
        info!(contact = id, "contact message deleted");
        Ok(())
    }
}
