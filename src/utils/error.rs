use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{message}")]
    Validation { field: String, message: String },

    #[error("{message}")]
    NotFound { resource: String, message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("Authentication error: {message}")]
    Auth { message: String },

    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Backend error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid configuration value for '{field}': {value} ({reason})")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Zip operation failed: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Auth,
    Network,
    Configuration,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Validation { .. } => ErrorCategory::Validation,
            AppError::NotFound { .. } => ErrorCategory::NotFound,
            AppError::Conflict { .. } => ErrorCategory::Conflict,
            AppError::Auth { .. } => ErrorCategory::Auth,
            AppError::Network(_) | AppError::Api { .. } => ErrorCategory::Network,
            AppError::Config { .. }
            | AppError::InvalidConfigValue { .. }
            | AppError::Toml(_) => ErrorCategory::Configuration,
            AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::Csv(_)
            | AppError::Zip(_) => ErrorCategory::Storage,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 已經是期望的最終狀態，只是提示
            ErrorCategory::Conflict => ErrorSeverity::Low,
            ErrorCategory::Validation | ErrorCategory::NotFound | ErrorCategory::Network => {
                ErrorSeverity::Medium
            }
            ErrorCategory::Auth | ErrorCategory::Storage => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// 使用者可以重新送出表單再試一次
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::Auth
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Validation => "Revise los datos ingresados y vuelva a intentar",
            ErrorCategory::NotFound => "Verifique el identificador ingresado",
            ErrorCategory::Conflict => "No es necesario hacer nada: la inscripción ya existe",
            ErrorCategory::Auth => "Inicie sesión nuevamente con `inscripciones-admin login`",
            ErrorCategory::Network => "Verifique la conexión con el servidor y reintente",
            ErrorCategory::Configuration => "Revise el archivo de configuración y las opciones",
            ErrorCategory::Storage => "Verifique permisos y espacio en el directorio de salida",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            AppError::Validation { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message } => message.clone(),
            AppError::Auth { message } => format!("Sesión inválida o expirada: {}", message),
            AppError::Network(_) => "No se pudo conectar con el servidor".to_string(),
            AppError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
