use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use scholarfinder::config::{Config, DEFAULT_CONFIG_PATH};
use scholarfinder::http::{build_router, AppState};
use scholarfinder::matching::MatchingEngine;
use scholarfinder::notify::spawn_outbox_worker;
use scholarfinder::scholarships::ScholarshipService;
use scholarfinder::sorter::days_until_deadline;
use scholarfinder::storage::Storage;
use scholarfinder::MatchRequest;

#[derive(Debug, Parser)]
#[command(name = "scholarfinder", version, about = "Scholarship matching service")]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, env = "SCHOLARFINDER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Print ranked scholarship matches for a student.
    Match {
        /// Student user id.
        #[arg(long)]
        student: i64,
        /// Minimum match percentage.
        #[arg(long, default_value_t = 0)]
        min: i32,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// MATCH_DESC, MATCH_ASC, DEADLINE_ASC or DEADLINE_DESC.
        #[arg(long, default_value = "MATCH_DESC")]
        sort: String,
    },
    /// Create a verified admin account.
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SCHOLARFINDER_ADMIN_PASSWORD")]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Write the default configuration file.
    InitConfig {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn open_storage(config: &Config) -> Result<Arc<Storage>> {
    let storage = Storage::open(Path::new(&config.database.path))
        .with_context(|| format!("Failed to open database {}", config.database.path))?;
    Ok(Arc::new(storage))
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn serve(config: Config) -> Result<()> {
    for warning in config.ensure_servable()? {
        warn!("{}", warning);
    }
    let storage = open_storage(&config)?;
    let state = AppState::new(storage, &config).context("Failed to build services")?;
    let outbox = spawn_outbox_worker(
        state.email.clone(),
        Duration::from_secs(config.mail.worker_interval_secs),
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(bind = %config.server.bind, db = %config.database.path, "scholarfinder listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("server failed")?;
    outbox.abort();
    info!("scholarfinder stopped");
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

fn print_matches(
    config: &Config,
    student: i64,
    min: i32,
    limit: usize,
    sort: String,
) -> Result<()> {
    let storage = open_storage(config)?;
    let service = ScholarshipService::new(storage, MatchingEngine::new(&config.matching));
    let today = Utc::now().date_naive();
    let request = MatchRequest {
        student_user_id: Some(student),
        minimum_match_percentage: min,
        limit,
        sort_by: sort,
        ..Default::default()
    };
    let response = service
        .matches_for_student_on(&request, today)
        .with_context(|| format!("Failed to match student {}", student))?;

    println!(
        "=== Matches for {} (#{}) ===",
        response.student_name, response.student_id
    );
    println!(
        "Analyzed {} scholarships, {} matched ({} excellent, {} good, {} fair)\n",
        response.total_scholarships_analyzed,
        response.matches_found,
        response.excellent_matches,
        response.good_matches,
        response.fair_matches
    );
    println!(
        "{:<6} {:<40} {:>7} {:<10} {:<14} {:>6} {}",
        "ID", "TITLE", "MATCH", "QUALITY", "DEADLINE", "DAYS", "AMOUNT"
    );
    for m in &response.scholarships {
        let days = days_until_deadline(m.application_deadline, today)
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} {:<40} {:>6.2}% {:<10} {:<14} {:>6} {}",
            m.id,
            truncate(&m.title, 40),
            m.match_percentage,
            m.match_quality.as_str(),
            m.deadline_display,
            days,
            m.amount_display
        );
    }

    if !response.improvement_suggestions.is_empty() {
        println!("\nSuggestions:");
        for suggestion in &response.improvement_suggestions {
            println!("  - {}", suggestion);
        }
    }
    Ok(())
}

fn create_admin(config: &Config, email: &str, password: &str, name: Option<&str>) -> Result<()> {
    let state = AppState::new(open_storage(config)?, config).context("Failed to build services")?;
    let admin = state
        .auth
        .create_admin(email, password, name)
        .with_context(|| format!("Failed to create admin {}", email))?;
    println!("Created admin #{} <{}>", admin.id, admin.email);
    Ok(())
}

fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("{:?} already exists; remove it first", path);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    }
    fs::write(path, Config::default_yaml()?).with_context(|| format!("Failed to write {:?}", path))?;
    println!("Wrote default configuration to {:?}", path);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::InitConfig { path }) = &cli.command {
        return init_config(path);
    }

    let config = Config::load(&cli.config)?;
    init_tracing(config.log.json);

    match cli.command {
        None | Some(Command::Serve) => serve(config).await,
        Some(Command::Match {
            student,
            min,
            limit,
            sort,
        }) => print_matches(&config, student, min, limit, sort),
        Some(Command::CreateAdmin { email, password, name }) => {
            create_admin(&config, &email, &password, name.as_deref())
        }
        Some(Command::InitConfig { .. }) => Ok(()),
    }
}
