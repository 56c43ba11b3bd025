use autoecole::config::AppConfig;
use autoecole::error::AppError;
use autoecole::telemetry;
use autoecole::workflows::enrollment::{
    platform_router, Actor, CourseService, CourseStore, DocumentKind, DocumentService,
    EnrollmentService, MemoryIdentity, MemoryMedia, MemoryPlatform, NewSchool, PlatformState,
    SchoolService, UploadRequest, UserAccount, UserId, UserRole,
};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Driving School Marketplace",
    about = "Run the driving school enrollment and curriculum service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk the full enrollment-to-license scenario against in-memory stores
    Demo,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
    /// Seed demo accounts and print their bearer tokens at startup
    #[arg(long)]
    seed_demo: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo => run_demo(),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let platform = Arc::new(MemoryPlatform::default());
    let media = Arc::new(MemoryMedia::default());
    let identity = Arc::new(MemoryIdentity::new(platform.as_ref().clone()));

    if args.seed_demo {
        seed_demo_accounts(platform.as_ref(), identity.as_ref());
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(platform_router(PlatformState::new(
            platform, media, identity,
        )))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "driving school marketplace ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn seed_demo_accounts(platform: &MemoryPlatform, identity: &MemoryIdentity) {
    let student = demo_account("amine@student.example", "Amine", "B.");
    let manager = demo_account("karim@manager.example", "Karim", "Z.");

    identity.register_token("demo-student", student.id.clone());
    identity.register_token("demo-manager", manager.id.clone());

    info!(token = "demo-student", user = %student.id.0, "seeded guest account");
    info!(token = "demo-manager", user = %manager.id.0, "seeded guest account");

    platform.seed_user(student);
    platform.seed_user(manager);
}

fn demo_account(email: &str, first_name: &str, last_name: &str) -> UserAccount {
    UserAccount {
        id: UserId::generate(),
        email: email.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        role: UserRole::Guest,
        state: "Alger".to_string(),
        active: true,
        created_at: Utc::now(),
    }
}

/// Drive one student from guest to earned license and print each milestone.
fn run_demo() -> Result<(), AppError> {
    let platform = Arc::new(MemoryPlatform::default());
    let media = Arc::new(MemoryMedia::default());

    let enrollments = EnrollmentService::new(platform.clone());
    let courses = CourseService::new(platform.clone());
    let documents = DocumentService::new(platform.clone(), media);
    let schools = SchoolService::new(platform.clone(), Arc::new(MemoryMedia::default()));

    let student_account = demo_account("amine@student.example", "Amine", "B.");
    let manager_account = demo_account("karim@manager.example", "Karim", "Z.");
    platform.seed_user(student_account.clone());
    platform.seed_user(manager_account.clone());

    let mut manager = Actor {
        id: manager_account.id,
        role: UserRole::Guest,
    };
    let mut student = Actor {
        id: student_account.id,
        role: UserRole::Guest,
    };

    println!("Driving school marketplace demo");

    let school = schools
        .create_school(
            &manager,
            NewSchool {
                name: "Auto Ecole El Bahdja".to_string(),
                address: "12 Rue Didouche Mourad".to_string(),
                state: "Alger".to_string(),
                phone: "+213 555 010 203".to_string(),
                email: "contact@elbahdja.example".to_string(),
                description: "City driving school".to_string(),
                price: 25000.0,
                latitude: None,
                longitude: None,
            },
            None,
        )
        .map_err(demo_failure)?;
    manager.role = UserRole::Manager;
    println!("- school created: {} ({} DZD)", school.name, school.price);

    let enrollment = enrollments
        .enroll(&student, &school.id)
        .map_err(demo_failure)?;
    student.role = UserRole::Student;
    println!(
        "- enrolled, status {} / payment {}",
        enrollment.status.label(),
        enrollment.payment_status.label()
    );

    let enrollment = enrollments
        .complete_payment(&student, &enrollment.id)
        .map_err(demo_failure)?;
    println!("- payment recorded, status {}", enrollment.status.label());

    for kind in [
        DocumentKind::ProfilePhoto,
        DocumentKind::IdCard,
        DocumentKind::MedicalCertificate,
    ] {
        let receipt = documents
            .upload(
                &student,
                UploadRequest {
                    kind,
                    file_name: format!("{}.png", kind.label()),
                    content_type: "image/png".to_string(),
                    content: vec![0u8; 128],
                },
            )
            .map_err(demo_failure)?;
        documents
            .verify(&manager, &receipt.document.id)
            .map_err(demo_failure)?;
        println!("- uploaded and verified {}", kind.label());
    }

    let enrollment = enrollments
        .approve(&manager, &enrollment.id)
        .map_err(demo_failure)?;
    println!("- manager approved, status {}", enrollment.status.label());

    let curriculum = platform
        .list_courses_by_enrollment(&enrollment.id)
        .map_err(|err| demo_failure(err.into()))?;
    let scores = [85.0, 90.0, 75.0];
    for (course, score) in curriculum.iter().zip(scores) {
        loop {
            let progress = courses
                .complete_session(&manager, &course.id)
                .map_err(demo_failure)?;
            if progress.course_completed {
                break;
            }
        }
        let outcome = courses
            .take_exam(&student, &course.id, score)
            .map_err(demo_failure)?;
        println!(
            "- {}: {} sessions done, exam {:.0}% -> {}",
            course.kind.label(),
            course.total_sessions,
            score,
            if outcome.passed { "passed" } else { "failed" }
        );
        if outcome.license_earned {
            println!("- all exams passed: driving license earned!");
        }
    }

    Ok(())
}

fn demo_failure(err: autoecole::workflows::enrollment::WorkflowError) -> AppError {
    AppError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        err.to_string(),
    ))
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
