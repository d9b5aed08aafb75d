//! End-to-end tests: real router on a loopback port, driven by `ApiClient`.

use chrono::{Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

use scholarfinder::client::{ApiClient, ClientError, TokenService};
use scholarfinder::config::Config;
use scholarfinder::http::{build_router, AppState};
use scholarfinder::storage::Storage;
use scholarfinder::{
    Application, ApplyRequest, Article, ArticleRequest, AuthResponse, ContactMessage,
    ContactRequest, ContactResponseRequest, LoginRequest, MatchRequest, MatchResponse, Page,
    RegisterRequest, Role, Scholarship, StatusUpdate, StudentProfile, UserSummary,
};

struct TestApp {
    base_url: String,
    state: AppState,
    _dir: tempfile::TempDir,
}

impl TestApp {
    fn client(&self) -> ApiClient {
        ApiClient::new(&self.base_url, TokenService::in_memory())
    }
}

async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(Storage::open(&dir.path().join("api.db")).unwrap());
    let state = AppState::new(storage, &Config::default()).unwrap();
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    TestApp {
        base_url: format!("http://{}", addr),
        state,
        _dir: dir,
    }
}

fn register_request(email: &str, role: Role) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        password: "s3cret-pass".to_string(),
        confirm_password: "s3cret-pass".to_string(),
        full_name: Some("Kasun Perera".to_string()),
        role: Some(role),
        institution_name: (role == Role::Institution).then(|| "Colombo Trust".to_string()),
    }
}

async fn registered(app: &TestApp, email: &str, role: Role) -> (ApiClient, AuthResponse) {
    let client = app.client();
    let auth = client
        .register(&register_request(email, role))
        .await
        .unwrap()
        .data
        .unwrap();
    (client, auth)
}

async fn admin_client(app: &TestApp) -> ApiClient {
    app.state
        .auth
        .create_admin("admin@scholarfinder.lk", "admin-pass-1", Some("Admin"))
        .unwrap();
    let client = app.client();
    client
        .login(&LoginRequest {
            email: "admin@scholarfinder.lk".to_string(),
            password: "admin-pass-1".to_string(),
        })
        .await
        .unwrap();
    client
}

fn contact_request(subject: &str) -> ContactRequest {
    ContactRequest {
        first_name: "Chamari".to_string(),
        last_name: "Silva".to_string(),
        email: "chamari@example.lk".to_string(),
        phone: None,
        subject: subject.to_string(),
        message: "When does the Engineering Excellence Award close?".to_string(),
        category: Some("SCHOLARSHIP".to_string()),
    }
}

async fn page_of<T: serde::de::DeserializeOwned>(
    client: &ApiClient,
    path: &str,
    page: &str,
    size: &str,
) -> Result<Page<T>, ClientError> {
    let query = [("page", page), ("size", size)];
    let response = client.request(Method::GET, path, &query, None).await?;
    Ok(response.data.unwrap())
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = spawn_app().await;
    let (client, auth) = registered(&app, "kasun@example.lk", Role::Student).await;
    assert_eq!(auth.token_type, "Bearer");
    assert!(client.tokens().is_authenticated());

    let me = client.current_user().await.unwrap().data.unwrap();
    assert_eq!(me.email, "kasun@example.lk");
    assert_eq!(me.role, Role::Student);
    assert_eq!(client.tokens().user().unwrap(), Some(me));

    let fresh = app.client();
    let err = fresh
        .login(&LoginRequest {
            email: "kasun@example.lk".to_string(),
            password: "wrong-pass".to_string(),
        })
        .await
        .unwrap_err();
    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid email or password");
        }
        other => panic!("expected an API error, got {:?}", other),
    }
    assert!(!fresh.tokens().is_authenticated());
}

#[tokio::test]
async fn test_admin_cannot_self_register() {
    let app = spawn_app().await;
    let err = app
        .client()
        .register(&register_request("mallory@example.lk", Role::Admin))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 403, .. }));
}

#[tokio::test]
async fn test_rejected_access_token_refreshes_and_retries() {
    let app = spawn_app().await;
    let (client, auth) = registered(&app, "nimal@example.lk", Role::Student).await;
    client.tokens().set_token("not-a-token").unwrap();

    let me: UserSummary = client.get("/api/auth/me").await.unwrap().data.unwrap();
    assert_eq!(me.id, auth.user.id);

    let refresh = client.tokens().refresh_token().unwrap().unwrap();
    assert_ne!(refresh, auth.refresh_token);
    assert_ne!(client.tokens().token().unwrap().as_deref(), Some("not-a-token"));
}

#[tokio::test]
async fn test_concurrent_rejections_share_one_refresh() {
    let app = spawn_app().await;
    let (client, _) = registered(&app, "ruwan@example.lk", Role::Student).await;
    client.tokens().set_token("not-a-token").unwrap();

    let (a, b) = tokio::join!(
        client.get::<UserSummary>("/api/auth/me"),
        client.get::<StudentProfile>("/api/students/me/profile"),
    );
    assert!(a.is_ok(), "{:?}", a.err());
    assert!(b.is_ok(), "{:?}", b.err());
}

#[tokio::test]
async fn test_failed_refresh_clears_session() {
    let app = spawn_app().await;
    let (client, _) = registered(&app, "sunil@example.lk", Role::Student).await;
    client.tokens().set_token("not-a-token").unwrap();
    client.tokens().set_refresh_token("not-a-refresh-token").unwrap();

    let err = client.get::<UserSummary>("/api/auth/me").await.unwrap_err();
    assert!(matches!(err, ClientError::SessionExpired));
    assert!(!client.tokens().is_authenticated());
    assert_eq!(client.tokens().refresh_token().unwrap(), None);
    assert_eq!(client.tokens().user().unwrap(), None);
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let app = spawn_app().await;
    let (client, auth) = registered(&app, "amara@example.lk", Role::Student).await;
    client.logout().await.unwrap();
    assert!(!client.tokens().is_authenticated());

    let replay = app.client();
    replay.tokens().set_refresh_token(&auth.refresh_token).unwrap();
    assert!(!replay.refresh().await);
}

#[tokio::test]
async fn test_match_and_apply_flow() {
    let app = spawn_app().await;
    let (institution, _) = registered(&app, "grants@trust.lk", Role::Institution).await;
    let (student, student_auth) = registered(&app, "dilini@example.lk", Role::Student).await;

    let draft = Scholarship {
        title: "Engineering Excellence Award".to_string(),
        scholarship_type: Some("FULL".to_string()),
        amount: Some(5000.0),
        eligible_levels: vec!["UNDERGRADUATE".to_string()],
        eligible_fields: vec!["Engineering".to_string()],
        application_deadline: Some(Utc::now().date_naive() + Duration::days(30)),
        ..Default::default()
    };
    let created: Scholarship = institution.post("/api/scholarships", &draft).await.unwrap().data.unwrap();
    assert_eq!(created.institution_id, institution.tokens().user().unwrap().unwrap().id);

    let status = StatusUpdate {
        status: "ACTIVE".to_string(),
    };
    let path = format!("/api/scholarships/{}/status", created.id);
    let active: Scholarship = institution.put(&path, &status).await.unwrap().data.unwrap();
    assert!(active.published_at.is_some());

    // students cannot publish scholarships
    let err = student.post::<Scholarship, _>("/api/scholarships", &draft).await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 403, .. }));

    let profile = StudentProfile {
        full_name: "Dilini Fernando".to_string(),
        intended_level: Some("UNDERGRADUATE".to_string()),
        al_stream: Some("Physical Science".to_string()),
        al_grade1: Some("A".to_string()),
        al_grade2: Some("A".to_string()),
        al_grade3: Some("B".to_string()),
        z_score: Some(1.8),
        preferred_fields: vec!["Engineering".to_string()],
        ..Default::default()
    };
    let saved: StudentProfile = student.put("/api/students/me/profile", &profile).await.unwrap().data.unwrap();
    assert_eq!(saved.user_id, student_auth.user.id);
    assert!(saved.profile_completion > 0);

    let matches: MatchResponse = student
        .post("/api/scholarships/matches", &MatchRequest::default())
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(matches.student_id, student_auth.user.id);
    assert_eq!(matches.total_scholarships_analyzed, 1);
    assert_eq!(matches.scholarships.len(), 1);
    assert_eq!(matches.scholarships[0].provider, "Colombo Trust");

    // another student's matches are off limits
    let (other, _) = registered(&app, "tharindu@example.lk", Role::Student).await;
    let path = format!("/api/scholarships/matches/{}", student_auth.user.id);
    let err = other.get::<MatchResponse>(&path).await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 403, .. }));

    let apply = ApplyRequest {
        scholarship_id: created.id,
        cover_letter: Some("I would like to study engineering.".to_string()),
        statement_of_purpose: None,
    };
    let application: Application = student.post("/api/applications", &apply).await.unwrap().data.unwrap();
    assert!(application.match_score.is_some());

    let err = student.post::<Application, _>("/api/applications", &apply).await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 409, .. }));

    let path = format!("/api/applications/scholarship/{}", created.id);
    let received: Vec<Application> = institution.get(&path).await.unwrap().data.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].student_id, student_auth.user.id);
}

#[tokio::test]
async fn test_contact_inbox_flow() {
    let app = spawn_app().await;
    let visitor = app.client();
    let message = contact_request("Application deadline question");
    let submitted: ContactMessage = visitor.post("/api/contact", &message).await.unwrap().data.unwrap();
    assert_eq!(submitted.status.as_str(), "NEW");

    // no session to refresh
    let err = visitor.get::<Page<ContactMessage>>("/api/contact").await.unwrap_err();
    assert!(matches!(err, ClientError::SessionExpired));

    let (student, _) = registered(&app, "chamari@example.lk", Role::Student).await;
    let err = student.get::<Page<ContactMessage>>("/api/contact").await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 403, .. }));

    let admin = admin_client(&app).await;
    let inbox: Page<ContactMessage> = admin.get("/api/contact").await.unwrap().data.unwrap();
    assert_eq!(inbox.total_elements, 1);
    assert_eq!(inbox.size, 20);

    let reply = ContactResponseRequest {
        response: "It closes at the end of next month.".to_string(),
        admin_notes: None,
        status: None,
    };
    let path = format!("/api/contact/{}/respond", submitted.id);
    let responded: ContactMessage = admin.post(&path, &reply).await.unwrap().data.unwrap();
    assert_eq!(responded.status.as_str(), "RESOLVED");
    assert!(responded.responded_at.is_some());

    let stats: Value = admin.get("/api/contact/stats").await.unwrap().data.unwrap();
    assert_eq!(stats["totalMessages"], json!(1));
    assert_eq!(stats["resolvedMessages"], json!(1));
}

#[tokio::test]
async fn test_published_blog_is_public() {
    let app = spawn_app().await;
    let admin = admin_client(&app).await;
    let draft = ArticleRequest {
        title: "How to Write a Winning Essay".to_string(),
        content: "Start early and be specific about your goals.".to_string(),
        ..Default::default()
    };
    let post: Article = admin.post("/api/blogs", &draft).await.unwrap().data.unwrap();
    assert_eq!(post.slug, "how-to-write-a-winning-essay");

    let reader = app.client();
    let path = format!("/api/blogs/{}", post.id);
    let err = reader.get::<Article>(&path).await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 404, .. }));

    let publish = format!("/api/blogs/{}/publish", post.id);
    admin.post::<Article, _>(&publish, &json!({})).await.unwrap();

    let by_slug: Article = reader
        .get("/api/blogs/slug/how-to-write-a-winning-essay")
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(by_slug.id, post.id);
    assert_eq!(by_slug.views_count, 1);

    let health: String = reader.get("/api/health").await.unwrap().data.unwrap();
    assert_eq!(health, "UP");
}

#[tokio::test]
async fn test_malformed_json_body_gets_error_envelope() {
    let app = spawn_app().await;
    let response = reqwest::Client::new()
        .post(format!("{}/api/contact", app.base_url))
        .header("content-type", "application/json")
        .body("{\"firstName\": \"Chamari\",")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let envelope: Value = response.json().await.unwrap();
    assert_eq!(envelope["success"], json!(false));
    assert!(envelope["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request body"));
    assert!(envelope["data"].is_null());
    assert!(envelope["timestamp"].is_string());
}

#[tokio::test]
async fn test_contact_inbox_pages_and_clamps() {
    let app = spawn_app().await;
    let visitor = app.client();
    for n in 0..3 {
        let message = contact_request(&format!("Question {}", n));
        visitor
            .post::<ContactMessage, _>("/api/contact", &message)
            .await
            .unwrap();
    }

    let (student, _) = registered(&app, "kamal@example.lk", Role::Student).await;
    let err = page_of::<ContactMessage>(&student, "/api/contact", "0", "20")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 403, .. }));

    let admin = admin_client(&app).await;
    let second = page_of::<ContactMessage>(&admin, "/api/contact", "1", "2").await.unwrap();
    assert_eq!(second.content.len(), 1);
    assert_eq!(second.total_elements, 3);
    assert_eq!(second.total_pages, 2);
    assert!(!second.first);
    assert!(second.last);

    let clamped = page_of::<ContactMessage>(&admin, "/api/contact", "0", "5000").await.unwrap();
    assert_eq!(clamped.size, 100);
    assert_eq!(clamped.content.len(), 3);
    let tiny = page_of::<ContactMessage>(&admin, "/api/contact", "0", "0").await.unwrap();
    assert_eq!(tiny.size, 1);

    let huge = usize::MAX.to_string();
    let err = page_of::<ContactMessage>(&admin, "/api/contact", &huge, "50")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 400, .. }));
}

#[tokio::test]
async fn test_blog_list_pages_and_clamps() {
    let app = spawn_app().await;
    let admin = admin_client(&app).await;
    for title in ["Budgeting Abroad", "Interview Tips", "Finding a Mentor"] {
        let draft = ArticleRequest {
            title: title.to_string(),
            content: "Practical advice for scholarship applicants.".to_string(),
            ..Default::default()
        };
        let post: Article = admin.post("/api/blogs", &draft).await.unwrap().data.unwrap();
        let publish = format!("/api/blogs/{}/publish", post.id);
        admin.post::<Article, _>(&publish, &json!({})).await.unwrap();
    }

    let reader = app.client();
    let first = page_of::<Article>(&reader, "/api/blogs", "0", "2").await.unwrap();
    assert_eq!(first.content.len(), 2);
    assert!(first.first);
    assert!(!first.last);

    let second = page_of::<Article>(&reader, "/api/blogs", "1", "2").await.unwrap();
    assert_eq!(second.content.len(), 1);
    assert!(second.last);
    assert!(second
        .content
        .iter()
        .all(|a| first.content.iter().all(|b| b.id != a.id)));

    let clamped = page_of::<Article>(&reader, "/api/blogs", "0", "1000").await.unwrap();
    assert_eq!(clamped.size, 100);
    assert_eq!(clamped.total_elements, 3);

    let huge = usize::MAX.to_string();
    let err = page_of::<Article>(&reader, "/api/blogs", &huge, "10").await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 400, .. }));
}
