//! ScholarFinder Library
//!
//! Scholarship matching service: accounts and tokens, rule-based matching,
//! applications, a contact inbox, blog and news content, plus a typed API
//! client for the HTTP surface.

pub mod applications;
pub mod auth;
pub mod client;
pub mod config;
pub mod contact;
pub mod content;
pub mod error;
pub mod filter;
pub mod http;
pub mod matching;
pub mod notify;
pub mod profiles;
pub mod scholarships;
pub mod sorter;
pub mod storage;
pub mod tokens;
pub mod types;

pub use error::{AppError, Result};
pub use types::*;
