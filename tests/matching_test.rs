//! Match runs against a real database.

use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;

use scholarfinder::config::MatchingConfig;
use scholarfinder::matching::MatchingEngine;
use scholarfinder::scholarships::ScholarshipService;
use scholarfinder::storage::{NewUser, Storage};
use scholarfinder::{AppError, MatchRequest, Role, Scholarship, ScholarshipStatus, StudentProfile};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

fn user(storage: &Storage, email: &str, role: Role, institution_name: Option<&str>) -> i64 {
    storage
        .insert_user(
            &NewUser {
                email,
                password_hash: "x",
                role,
                full_name: None,
                institution_name,
                verification_token: None,
            },
            Utc::now(),
        )
        .unwrap()
        .id
}

fn scholarship(
    storage: &Storage,
    institution_id: i64,
    title: &str,
    levels: &[&str],
    days_left: i64,
) -> i64 {
    let s = Scholarship {
        institution_id,
        title: title.to_string(),
        eligible_levels: levels.iter().map(|l| l.to_string()).collect(),
        application_deadline: Some(today() + Duration::days(days_left)),
        status: ScholarshipStatus::Active,
        ..Default::default()
    };
    storage.insert_scholarship(&s, Utc::now()).unwrap().id
}

struct Fixture {
    service: ScholarshipService,
    storage: Arc<Storage>,
    student: i64,
    institution: i64,
}

fn fixture() -> Fixture {
    let storage = Arc::new(Storage::open_in_memory().unwrap());
    let institution = user(&storage, "grants@trust.lk", Role::Institution, Some("Colombo Trust"));
    let student = user(&storage, "dilini@example.lk", Role::Student, None);
    let profile = StudentProfile {
        user_id: student,
        full_name: "Dilini Fernando".to_string(),
        intended_level: Some("UNDERGRADUATE".to_string()),
        ..Default::default()
    };
    storage.save_profile(&profile, Utc::now()).unwrap();

    Fixture {
        service: ScholarshipService::new(storage.clone(), MatchingEngine::new(&MatchingConfig::default())),
        storage,
        student,
        institution,
    }
}

fn request(student: i64) -> MatchRequest {
    MatchRequest {
        student_user_id: Some(student),
        ..Default::default()
    }
}

#[test]
fn test_level_mismatch_ranks_last_and_is_ineligible() {
    let f = fixture();
    let fit = scholarship(&f.storage, f.institution, "Undergraduate Award", &["UNDERGRADUATE"], 30);
    let misfit = scholarship(&f.storage, f.institution, "PhD Fellowship", &["PHD"], 10);

    let response = f.service.matches_for_student_on(&request(f.student), today()).unwrap();
    assert_eq!(response.student_name, "Dilini Fernando");
    assert_eq!(response.total_scholarships_analyzed, 2);
    assert_eq!(response.matches_found, 2);

    let ids: Vec<i64> = response.scholarships.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![fit, misfit]);
    assert!(response.scholarships[0].is_eligible);
    assert!(!response.scholarships[1].is_eligible);
    assert!(response.scholarships[0].match_percentage > response.scholarships[1].match_percentage);
    assert_eq!(response.scholarships[0].provider, "Colombo Trust");
}

#[test]
fn test_closed_and_expired_are_not_analyzed() {
    let f = fixture();
    scholarship(&f.storage, f.institution, "Open", &[], 5);
    scholarship(&f.storage, f.institution, "Expired", &[], -1);
    let draft = Scholarship {
        institution_id: f.institution,
        title: "Draft".to_string(),
        application_deadline: Some(today() + Duration::days(20)),
        ..Default::default()
    };
    f.storage.insert_scholarship(&draft, Utc::now()).unwrap();

    let response = f.service.matches_for_student_on(&request(f.student), today()).unwrap();
    assert_eq!(response.total_scholarships_analyzed, 1);
    assert_eq!(response.scholarships[0].title, "Open");
}

#[test]
fn test_deadline_sort_and_limit() {
    let f = fixture();
    let late = scholarship(&f.storage, f.institution, "Late", &[], 60);
    let soon = scholarship(&f.storage, f.institution, "Soon", &[], 3);
    scholarship(&f.storage, f.institution, "Middle", &[], 20);

    let req = MatchRequest {
        sort_by: "DEADLINE_ASC".to_string(),
        limit: 2,
        ..request(f.student)
    };
    let response = f.service.matches_for_student_on(&req, today()).unwrap();
    assert_eq!(response.matches_found, 2);
    assert_eq!(response.scholarships.len(), 2);
    assert_eq!(response.scholarships[0].id, soon);

    let req = MatchRequest {
        sort_by: "DEADLINE_DESC".to_string(),
        ..request(f.student)
    };
    let response = f.service.matches_for_student_on(&req, today()).unwrap();
    assert_eq!(response.scholarships[0].id, late);
}

#[test]
fn test_minimum_percentage_drops_weak_matches() {
    let f = fixture();
    scholarship(&f.storage, f.institution, "Undergraduate Award", &["UNDERGRADUATE"], 30);
    scholarship(&f.storage, f.institution, "PhD Fellowship", &["PHD"], 30);

    let all = f.service.matches_for_student_on(&request(f.student), today()).unwrap();
    let best = all.scholarships[0].match_percentage.trunc() as i32;

    let req = MatchRequest {
        minimum_match_percentage: best,
        ..request(f.student)
    };
    let response = f.service.matches_for_student_on(&req, today()).unwrap();
    assert_eq!(response.total_scholarships_analyzed, 2);
    assert_eq!(response.matches_found, 1);
    assert_eq!(response.scholarships[0].title, "Undergraduate Award");
}

#[test]
fn test_request_filters_and_explicit_ids() {
    let f = fixture();
    let undergrad = scholarship(&f.storage, f.institution, "Undergraduate Award", &["UNDERGRADUATE"], 30);
    let phd = scholarship(&f.storage, f.institution, "PhD Fellowship", &["PHD"], 30);

    let req = MatchRequest {
        education_level: Some("phd".to_string()),
        ..request(f.student)
    };
    let response = f.service.matches_for_student_on(&req, today()).unwrap();
    assert_eq!(response.total_scholarships_analyzed, 1);
    assert_eq!(response.scholarships[0].id, phd);

    let req = MatchRequest {
        scholarship_ids: vec![undergrad],
        ..request(f.student)
    };
    let response = f.service.matches_for_student_on(&req, today()).unwrap();
    assert_eq!(response.total_scholarships_analyzed, 1);
    assert_eq!(response.scholarships[0].id, undergrad);
}

#[test]
fn test_unnamed_institution_gets_placeholder_provider() {
    let f = fixture();
    let anonymous = user(&f.storage, "anon@trust.lk", Role::Institution, None);
    scholarship(&f.storage, anonymous, "Quiet Grant", &[], 30);

    let response = f.service.matches_for_student_on(&request(f.student), today()).unwrap();
    assert_eq!(response.scholarships[0].provider, format!("Institution #{}", anonymous));
}

#[test]
fn test_missing_profile_is_not_found() {
    let f = fixture();
    let err = f.service.matches_for_student_on(&request(9_999), today()).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = f
        .service
        .matches_for_student_on(&MatchRequest::default(), today())
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
