use clap::Parser;
use inscripciones_admin::app::{FormVariant, RegistrationForm};
use inscripciones_admin::config::{toml_config::TomlConfig, DEFAULT_CONFIG_FILE};
use inscripciones_admin::core::{CourseDirectory, RegistrationBackend};
use inscripciones_admin::utils::error::{AppError, Result};
use inscripciones_admin::utils::logger;
use inscripciones_admin::{ApiClient, AppConfig, InMemoryBackend, RegistrationWorkflow};

/// 公開報名頁 (QR code) 的終端機版本，不需要登入
#[derive(Parser)]
#[command(name = "kiosk")]
#[command(about = "Public self-registration kiosk for a single course")]
struct Args {
    /// Course to register into
    course_id: String,

    /// Path to TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    #[arg(long, env = "INSCRIPCIONES_API_URL")]
    api_url: Option<String>,

    /// Run against built-in sample data instead of the backend
    #[arg(long)]
    demo: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(&args).await {
        tracing::error!("❌ Kiosk stopped: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(1);
    }
}

async fn run(args: &Args) -> Result<()> {
    let file_config = TomlConfig::from_file_or_default(&args.config)?;

    // 初始化日誌
    logger::init_logger(args.verbose, file_config.log_level(), file_config.log_format());

    if args.demo {
        tracing::info!("🧪 Demo mode: using in-memory sample data");
        return run_kiosk(InMemoryBackend::with_demo_data(), &args.course_id).await;
    }

    let config = AppConfig::from_toml(&file_config)?.with_overrides(args.api_url.clone(), None, None)?;
    let client = ApiClient::from_config(&config)?;
    run_kiosk(client, &args.course_id).await
}

async fn run_kiosk<B>(backend: B, course_id: &str) -> Result<()>
where
    B: RegistrationBackend + CourseDirectory,
{
    let course = backend
        .find_course(course_id)
        .await?
        .ok_or_else(|| AppError::not_found("curso", "El curso no existe o ya no está disponible"))?;

    println!("Inscripción a: {}", course.title);
    if !course.description.is_empty() {
        println!("{}", course.description);
    }
    println!("Del {} al {} ({})", course.start_date, course.end_date, course.modality);

    let workflow = RegistrationWorkflow::new(backend, course_id);
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut form = RegistrationForm::new(workflow, FormVariant::Qr, input, std::io::stdout());

    let summary = form.run().await?;
    tracing::info!(
        "Kiosk session finished: {} enrolled, {} already enrolled",
        summary.enrolled,
        summary.already_enrolled
    );
    Ok(())
}
