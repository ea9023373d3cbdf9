use clap::Parser;
use inscripciones_admin::app::{FormSummary, FormVariant, RegistrationForm};
use inscripciones_admin::config::{toml_config::TomlConfig, Command, CourseCommand, DEFAULT_CONFIG_FILE};
use inscripciones_admin::core::export::{ExportReport, RosterExporter, EMPTY_ROSTER_MESSAGE};
use inscripciones_admin::core::links::registration_link;
use inscripciones_admin::core::session::Session;
use inscripciones_admin::core::CourseDirectory;
use inscripciones_admin::domain::model::{Credentials, NewCourse};
use inscripciones_admin::utils::error::{AppError, ErrorSeverity, Result};
use inscripciones_admin::utils::{logger, validation::Validate};
use inscripciones_admin::{
    ApiClient, AppConfig, CliConfig, LocalStorage, RegistrationWorkflow, SessionStore,
};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    let file_config = match load_file_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logger::init_cli_logger(cli.verbose);
            exit_with(&e);
        }
    };

    // 初始化日誌
    logger::init_logger(cli.verbose, file_config.log_level(), file_config.log_format());
    tracing::info!("Starting inscripciones-admin");

    // 驗證配置
    let config = match AppConfig::from_toml(&file_config).and_then(|c| {
        c.with_overrides(
            cli.api_url.clone(),
            cli.public_url.clone(),
            cli.output_path.clone(),
        )
    }) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            exit_with(&e);
        }
    };
    tracing::debug!("Effective config: {:?}", config);

    let sessions = SessionStore::new(LocalStorage::new(config.state_dir.clone()));
    let (session, source) = match sessions.resolve(cli.token.clone()).await {
        Ok(resolved) => resolved,
        Err(e) => exit_with(&e),
    };

    if let Err(e) = run(cli, &config, &sessions, session).await {
        // 只刪除從 session 檔讀到、被後端拒絕的 token
        match sessions.discard_rejected(source, &e).await {
            Ok(true) => tracing::info!("Removed rejected session file"),
            Ok(false) => {}
            Err(clear_err) => tracing::warn!("Could not remove stale session: {}", clear_err),
        }
        exit_with(&e);
    }
}

fn load_file_config(path: Option<&str>) -> Result<TomlConfig> {
    match path {
        Some(path) => TomlConfig::from_file(path),
        None => TomlConfig::from_file_or_default(DEFAULT_CONFIG_FILE),
    }
}

async fn run(
    cli: CliConfig,
    config: &AppConfig,
    sessions: &SessionStore<LocalStorage>,
    session: Option<Session>,
) -> Result<()> {
    let mut client = ApiClient::from_config(config)?;
    if let Some(session) = session {
        tracing::debug!("Using session {:?}", session);
        client = client.with_session(session);
    }

    match cli.command {
        Command::Login { user, password } => {
            let session = client.login(&Credentials::new(user, password)).await?;
            sessions.save(&session).await?;
            println!(
                "✅ Sesión iniciada como {} ({})",
                session.username(),
                session.role()
            );
        }
        Command::Logout => {
            sessions.clear().await?;
            println!("✅ Sesión cerrada");
        }
        Command::Courses { command } => run_courses(command, &client).await?,
        Command::Register {
            course_id,
            cuil,
            yes,
        } => {
            let summary = run_register(client, &course_id, cuil, yes).await?;
            if summary.session_expired {
                return Err(AppError::auth("Sesión expirada"));
            }
        }
        Command::Roster { course_id, format } => {
            let format = format.unwrap_or(config.export_format);
            let enrollments = client.roster(&course_id).await?;

            let exporter = RosterExporter::new(LocalStorage::new(config.output_path.clone()));
            match exporter.export(&course_id, &enrollments, format).await? {
                ExportReport::Written { path, records } => {
                    tracing::info!("📁 Exported {} enrollments", records);
                    println!(
                        "✅ {} inscripciones exportadas a {}/{}",
                        records, config.output_path, path
                    );
                }
                ExportReport::Empty => println!("{}", EMPTY_ROSTER_MESSAGE),
            }
        }
        Command::QrLink { course_id } => {
            let link = registration_link(&config.public_base_url, &course_id)?;
            println!("{}", link);
        }
    }

    Ok(())
}

async fn run_courses(command: CourseCommand, client: &ApiClient) -> Result<()> {
    match command {
        CourseCommand::List => {
            let courses = client.list_courses().await?;
            if courses.is_empty() {
                println!("No hay cursos disponibles.");
            }
            for course in courses {
                println!(
                    "{:>4}  {:<32} {} a {}  {:>3}/{:<3} {}",
                    course.id,
                    course.title,
                    course.start_date,
                    course.end_date,
                    course.enrolled,
                    course.capacity,
                    course.modality
                );
            }
        }
        CourseCommand::Create(args) => {
            let new_course = NewCourse::from(args);
            new_course.validate()?;
            let course = client.create_course(&new_course).await?;
            println!("✅ Curso creado: {} ({})", course.title, course.id);
        }
        CourseCommand::Delete { course_id } => {
            client.delete_course(&course_id).await?;
            println!("✅ Curso {} eliminado", course_id);
        }
    }
    Ok(())
}

async fn run_register(
    client: ApiClient,
    course_id: &str,
    cuil: Option<String>,
    auto_confirm: bool,
) -> Result<FormSummary> {
    let course = client
        .find_course(course_id)
        .await?
        .ok_or_else(|| AppError::not_found("curso", format!("Curso {} no encontrado", course_id)))?;
    println!("{} ({} cupos disponibles)", course.title, course.available_seats());

    let workflow = RegistrationWorkflow::new(client, course_id);
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut form = RegistrationForm::new(workflow, FormVariant::Manual, input, std::io::stdout())
        .auto_confirm(auto_confirm);

    let summary = match cuil {
        Some(cuil) => {
            form.process(&cuil).await?;
            form.summary().clone()
        }
        None => form.run().await?,
    };

    println!(
        "Inscriptos: {}, ya inscriptos: {}, no encontrados: {}, con errores: {}",
        summary.enrolled, summary.already_enrolled, summary.not_found, summary.failed
    );
    Ok(summary)
}

fn exit_with(e: &AppError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );

    // 輸出用戶友好的錯誤信息
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
