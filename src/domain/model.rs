use crate::utils::error::{AppError, Result};
use crate::utils::validation::{validate_non_empty_string, Validate};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_COURSE_TITLE_CHARS: usize = 3;
pub const MIN_COURSE_DURATION_MINUTES: u32 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    #[serde(alias = "Cuil")]
    pub cuil: String,
    #[serde(rename = "firstName", alias = "nombre", alias = "Nombre")]
    pub first_name: String,
    #[serde(rename = "lastName", alias = "apellido", alias = "Apellido")]
    pub last_name: String,
    #[serde(
        default,
        alias = "Email",
        deserialize_with = "wire::empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<String>,
    #[serde(
        default,
        alias = "telefono",
        alias = "Telefono",
        deserialize_with = "wire::empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone: Option<String>,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// 後端不檢查模式欄位，未知的值原樣保留在 `Other`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Modality {
    #[default]
    Presencial,
    Virtual,
    Other(String),
}

impl From<String> for Modality {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "presencial" => Modality::Presencial,
            "virtual" => Modality::Virtual,
            _ => Modality::Other(value.trim().to_string()),
        }
    }
}

impl From<Modality> for String {
    fn from(modality: Modality) -> Self {
        modality.to_string()
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Presencial => write!(f, "presencial"),
            Modality::Virtual => write!(f, "virtual"),
            Modality::Other(other) => write!(f, "{}", other),
        }
    }
}

impl FromStr for Modality {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "presencial" => Ok(Modality::Presencial),
            "virtual" => Ok(Modality::Virtual),
            other => Err(AppError::validation(
                "modality",
                format!("Modalidad desconocida: '{}' (presencial | virtual)", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(alias = "ID", deserialize_with = "wire::string_or_number")]
    pub id: String,
    #[serde(alias = "nombre", alias = "Nombre")]
    pub title: String,
    #[serde(default, alias = "descripcion", alias = "Descripcion")]
    pub description: String,
    #[serde(
        rename = "startDate",
        alias = "fechaInicio",
        alias = "FechaInicio",
        with = "wire::flexible_date"
    )]
    pub start_date: NaiveDate,
    #[serde(
        rename = "endDate",
        alias = "fechaFin",
        alias = "FechaFin",
        with = "wire::flexible_date"
    )]
    pub end_date: NaiveDate,
    #[serde(alias = "capacidad", alias = "Capacidad")]
    pub capacity: u32,
    #[serde(default)]
    pub enrolled: u32,
    #[serde(
        rename = "durationMinutes",
        alias = "duracionMin",
        alias = "DuracionMin",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_minutes: Option<u32>,
    #[serde(
        default,
        alias = "lugar",
        alias = "Lugar",
        deserialize_with = "wire::empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<String>,
    #[serde(
        rename = "modalidad",
        alias = "Modalidad",
        default,
        deserialize_with = "wire::lenient_modality"
    )]
    pub modality: Modality,
}

impl Course {
    pub fn available_seats(&self) -> u32 {
        self.capacity.saturating_sub(self.enrolled)
    }
}

/// 建立課程表單的資料，送出前先在本地驗證
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCourse {
    pub title: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_minutes: u32,
    pub capacity: u32,
    pub modality: Modality,
}

impl Validate for NewCourse {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("title", &self.title, "El nombre del curso es obligatorio")?;
        if self.title.trim().chars().count() < MIN_COURSE_TITLE_CHARS {
            return Err(AppError::validation(
                "title",
                "El nombre del curso debe tener al menos 3 caracteres",
            ));
        }
        if self.start_date > self.end_date {
            return Err(AppError::validation(
                "endDate",
                "La fecha de fin debe ser posterior a la de inicio",
            ));
        }
        if self.capacity == 0 {
            return Err(AppError::validation(
                "capacity",
                "La capacidad debe ser mayor a cero",
            ));
        }
        if self.duration_minutes < MIN_COURSE_DURATION_MINUTES {
            return Err(AppError::validation(
                "durationMinutes",
                "La duración debe ser de al menos 15 minutos",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    #[serde(alias = "ID", deserialize_with = "wire::string_or_number")]
    pub id: String,
    #[serde(
        rename = "curso_id",
        alias = "cursoId",
        alias = "CursoID",
        deserialize_with = "wire::string_or_number"
    )]
    pub course_id: String,
    #[serde(alias = "Cuil")]
    pub cuil: String,
    #[serde(
        rename = "nombre_curso",
        alias = "NombreCurso",
        default,
        deserialize_with = "wire::empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub course_name: Option<String>,
    #[serde(
        rename = "nombre",
        alias = "Nombre",
        default,
        deserialize_with = "wire::empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub first_name: Option<String>,
    #[serde(
        rename = "apellido",
        alias = "Apellido",
        default,
        deserialize_with = "wire::empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_name: Option<String>,
    #[serde(
        rename = "fecha_inscripcion",
        alias = "FechaInscripcion",
        default,
        deserialize_with = "wire::flexible_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub enrolled_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    pub fn matches(&self, course_id: &str, cuil: &str) -> bool {
        same_course_id(&self.course_id, course_id) && self.cuil == cuil
    }
}

/// 數字 id 以數值比較（"05" 與 5 是同一門課），其他 id 以字串比較
pub fn same_course_id(a: &str, b: &str) -> bool {
    match (a.trim().parse::<u64>(), b.trim().parse::<u64>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// 後端欄位格式不一致（Go 結構體名稱 / camelCase / snake_case），這裡集中處理
pub(crate) mod wire {
    use super::Modality;
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        })
    }

    pub fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.filter(|s| !s.trim().is_empty()))
    }

    pub fn lenient_modality<'de, D>(deserializer: D) -> Result<Modality, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        let modality = value.map(Modality::from).unwrap_or_default();
        if let Modality::Other(other) = &modality {
            tracing::warn!("Unknown course modality '{}', keeping it verbatim", other);
        }
        Ok(modality)
    }

    pub fn parse_date(value: &str) -> Option<NaiveDate> {
        let value = value.trim();
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(value)
                    .ok()
                    .map(|dt| dt.date_naive())
            })
    }

    pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
        let value = value.trim();
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|naive| naive.and_utc())
            })
    }

    pub fn flexible_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.as_deref().and_then(parse_timestamp))
    }

    pub mod flexible_date {
        use super::*;

        pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = String::deserialize(deserializer)?;
            parse_date(&value)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", value)))
        }
    }
}
