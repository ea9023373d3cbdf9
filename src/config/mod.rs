pub mod cli;
pub mod toml_config;

use crate::core::export::ExportFormat;
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::logger::LogFormat;
use crate::utils::validation::{validate_path, validate_positive_number, validate_url, Validate};
use std::time::Duration;
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
pub use args::{CliConfig, Command, CourseCommand, CreateCourseArgs};

pub const DEFAULT_CONFIG_FILE: &str = "inscripciones.toml";

/// 合併設定檔與命令列參數後實際使用的配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub public_base_url: String,
    pub output_path: String,
    pub state_dir: String,
    pub timeout: Duration,
    pub export_format: ExportFormat,
    pub log_level: Option<String>,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_toml(config: &TomlConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            api_base_url: config.api.base_url.clone(),
            public_base_url: config.public_base_url().to_string(),
            output_path: config.output_path().to_string(),
            state_dir: config.state_dir().to_string(),
            timeout: config.request_timeout(),
            export_format: config.default_export_format()?,
            log_level: config.log_level().map(str::to_string),
            log_format: config.log_format(),
        })
    }

    /// 命令列參數優先於設定檔
    pub fn with_overrides(
        mut self,
        api_url: Option<String>,
        public_url: Option<String>,
        output_path: Option<String>,
    ) -> Result<Self> {
        if let Some(api_url) = api_url {
            self.api_base_url = api_url;
        }
        if let Some(public_url) = public_url {
            self.public_base_url = public_url;
        }
        if let Some(output_path) = output_path {
            self.output_path = output_path;
        }
        self.validate()?;
        Ok(self)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let config = TomlConfig::default();
        Self {
            api_base_url: config.api.base_url.clone(),
            public_base_url: config.public_base_url().to_string(),
            output_path: config.output_path().to_string(),
            state_dir: config.state_dir().to_string(),
            timeout: config.request_timeout(),
            export_format: ExportFormat::Csv,
            log_level: None,
            log_format: LogFormat::Compact,
        }
    }
}

impl ConfigProvider for AppConfig {
    fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_url("api_url", &self.api_base_url)?;
        validate_url("public_url", &self.public_base_url)?;
        validate_path("output_path", &self.output_path)?;
        validate_path("state_dir", &self.state_dir)?;
        validate_positive_number("timeout_seconds", self.timeout.as_secs(), 1)?;
        Ok(())
    }
}

#[cfg(feature = "cli")]
mod args {
    use crate::core::export::ExportFormat;
    use crate::domain::model::{Modality, NewCourse};
    use chrono::NaiveDate;
    use clap::{Args, Parser, Subcommand};

    #[derive(Debug, Parser)]
    #[command(name = "inscripciones-admin")]
    #[command(about = "Administración de cursos e inscripciones")]
    pub struct CliConfig {
        /// 設定檔路徑，預設讀取 ./inscripciones.toml (不存在時使用預設值)
        #[arg(short, long, global = true)]
        pub config: Option<String>,

        #[arg(long, env = "INSCRIPCIONES_API_URL", global = true)]
        pub api_url: Option<String>,

        #[arg(long, global = true)]
        pub public_url: Option<String>,

        #[arg(long, global = true)]
        pub output_path: Option<String>,

        /// 直接使用指定的 token，不讀取已保存的 session
        #[arg(long, env = "INSCRIPCIONES_TOKEN", hide_env_values = true, global = true)]
        pub token: Option<String>,

        #[arg(short, long, global = true, help = "Enable verbose output")]
        pub verbose: bool,

        #[command(subcommand)]
        pub command: Command,
    }

    #[derive(Debug, Subcommand)]
    pub enum Command {
        /// 登入並保存 session
        Login {
            #[arg(short, long)]
            user: String,
            #[arg(short, long, env = "INSCRIPCIONES_PASSWORD", hide_env_values = true)]
            password: String,
        },
        /// 清除已保存的 session
        Logout,
        /// 課程管理
        Courses {
            #[command(subcommand)]
            command: CourseCommand,
        },
        /// 以 CUIL 將人員報名到課程
        Register {
            course_id: String,
            /// 只處理一個 CUIL，不進入互動模式
            #[arg(long)]
            cuil: Option<String>,
            /// 找到人員後直接確認報名
            #[arg(short = 'y', long)]
            yes: bool,
        },
        /// 匯出課程的報名名單
        Roster {
            course_id: String,
            #[arg(long, value_parser = clap::value_parser!(ExportFormat))]
            format: Option<ExportFormat>,
        },
        /// 顯示課程公開報名頁 (QR code) 的網址
        QrLink { course_id: String },
    }

    #[derive(Debug, Subcommand)]
    pub enum CourseCommand {
        List,
        Create(CreateCourseArgs),
        Delete { course_id: String },
    }

    #[derive(Debug, Args)]
    pub struct CreateCourseArgs {
        #[arg(long)]
        pub title: String,
        #[arg(long)]
        pub description: Option<String>,
        #[arg(long)]
        pub start: NaiveDate,
        #[arg(long)]
        pub end: NaiveDate,
        #[arg(long, default_value_t = 60)]
        pub duration_minutes: u32,
        #[arg(long, default_value_t = 30)]
        pub capacity: u32,
        #[arg(long, default_value_t = Modality::Presencial)]
        pub modality: Modality,
    }

    impl From<CreateCourseArgs> for NewCourse {
        fn from(args: CreateCourseArgs) -> Self {
            NewCourse {
                title: args.title,
                description: args.description,
                start_date: args.start,
                end_date: args.end,
                duration_minutes: args.duration_minutes,
                capacity: args.capacity,
                modality: args.modality,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_take_precedence() {
        let config = AppConfig::default()
            .with_overrides(
                Some("http://127.0.0.1:9999/api".to_string()),
                None,
                Some("./exports".to_string()),
            )
            .unwrap();

        assert_eq!(config.api_base_url(), "http://127.0.0.1:9999/api");
        assert_eq!(config.public_base_url(), toml_config::DEFAULT_PUBLIC_BASE_URL);
        assert_eq!(config.output_path(), "./exports");
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let result = AppConfig::default().with_overrides(Some("ftp://x".to_string()), None, None);
        assert!(result.is_err());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_cli_parses_subcommands() {
        use clap::Parser;

        let cli = CliConfig::try_parse_from([
            "inscripciones-admin",
            "--api-url",
            "http://localhost:8080/api",
            "courses",
            "create",
            "--title",
            "Introducción a Rust",
            "--start",
            "2025-03-01",
            "--end",
            "2025-03-31",
            "--modality",
            "virtual",
        ])
        .unwrap();

        assert_eq!(cli.api_url.as_deref(), Some("http://localhost:8080/api"));
        match cli.command {
            Command::Courses {
                command: CourseCommand::Create(args),
            } => {
                let course = crate::domain::model::NewCourse::from(args);
                assert_eq!(course.title, "Introducción a Rust");
                assert_eq!(course.modality, crate::domain::model::Modality::Virtual);
                assert_eq!(course.capacity, 30);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = CliConfig::try_parse_from([
            "inscripciones-admin",
            "roster",
            "3",
            "--format",
            "zip",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Roster { ref course_id, format: Some(ExportFormat::Zip) } if course_id == "3"
        ));
    }
}
