use crate::core::session::{Role, Session};
use crate::domain::model::{same_course_id, Course, Credentials, Enrollment, NewCourse, Person};
use crate::domain::ports::{
    ConfigProvider, CourseDirectory, EnrollmentCommand, EnrollmentQuery, PersonDirectory,
};
use crate::utils::error::{AppError, Result};
use crate::utils::validation::{validate_url, Validate};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const NO_SESSION_MESSAGE: &str = "No hay una sesión activa. Inicie sesión para continuar";

/// 公開呼叫（QR 報名頁）不需要登入；有工作階段時仍會帶上 token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Public,
    Authenticated,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    usuario: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(default)]
    rol: Option<String>,
    #[serde(default)]
    usuario: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum CourseIdValue<'a> {
    Number(u64),
    Text(&'a str),
}

impl<'a> CourseIdValue<'a> {
    fn from_id(id: &'a str) -> Self {
        id.parse::<u64>()
            .map(CourseIdValue::Number)
            .unwrap_or(CourseIdValue::Text(id))
    }
}

#[derive(Debug, Serialize)]
struct CreateEnrollmentRequest<'a> {
    cuil: &'a str,
    curso_id: CourseIdValue<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCourseRequest<'a> {
    nombre: &'a str,
    descripcion: &'a str,
    fecha_inicio: String,
    fecha_fin: String,
    duracion_min: u32,
    capacidad: u32,
    modalidad: String,
}

impl<'a> From<&'a NewCourse> for CreateCourseRequest<'a> {
    fn from(course: &'a NewCourse) -> Self {
        Self {
            nombre: course.title.trim(),
            descripcion: course.description.as_deref().unwrap_or(""),
            fecha_inicio: course.start_date.format("%Y-%m-%d").to_string(),
            fecha_fin: course.end_date.format("%Y-%m-%d").to_string(),
            duracion_min: course.duration_minutes,
            capacidad: course.capacity,
            modalidad: course.modality.to_string(),
        }
    }
}

/// 建立資源的回應可能包在 `{"message", "<key>": {...}}` 裡，也可能直接是物件
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Created<T> {
    Enrollment { inscripcion: T },
    Course { curso: T },
    Bare(T),
}

impl<T> Created<T> {
    fn into_inner(self) -> T {
        match self {
            Created::Enrollment { inscripcion } => inscripcion,
            Created::Course { curso } => curso,
            Created::Bare(value) => value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// REST 後端的客戶端，實作所有 port
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    session: Option<Session>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = validate_url("api.base_url", base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            session: None,
        })
    }

    pub fn from_config<C: ConfigProvider + Validate>(config: &C) -> Result<Self> {
        config.validate()?;
        Self::with_timeout(config.api_base_url(), config.request_timeout())
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn without_session(mut self) -> Self {
        self.session = None;
        self
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// POST /login，成功後回傳 `Session`，由呼叫端注入 `with_session`
    pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let url = self.endpoint(&["login"])?;
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(&LoginRequest {
                usuario: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await?;
        let response = Self::check(response).await?;
        let body: LoginResponse = response.json().await?;

        let role = body.rol.map(Role::from).unwrap_or(Role::Operador);
        let username = body.usuario.unwrap_or_else(|| credentials.username.clone());
        tracing::info!("Logged in as {} ({})", username, role);
        Ok(Session::new(body.token, role, username))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::config(format!("Base URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, access: Access) -> Result<RequestBuilder> {
        tracing::debug!("{} {}", method, url);
        let builder = self.client.request(method, url);
        match (&self.session, access) {
            (Some(session), _) => Ok(builder.bearer_auth(session.token())),
            (None, Access::Public) => Ok(builder),
            (None, Access::Authenticated) => Err(AppError::auth(NO_SESSION_MESSAGE)),
        }
    }

    /// 將非 2xx 回應轉成錯誤分類；後端訊息盡量原樣保留
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        tracing::debug!("Response status: {}", status);
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or_else(|_| text.trim().to_string());
        let message_or = |fallback: &str| {
            if message.is_empty() {
                fallback.to_string()
            } else {
                message.clone()
            }
        };

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AppError::auth(message_or("Sesión expirada"))
            }
            StatusCode::NOT_FOUND => AppError::not_found("resource", message_or("Recurso no encontrado")),
            StatusCode::CONFLICT => AppError::Conflict {
                message: message_or("La persona ya está inscrita en este curso"),
            },
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                AppError::validation("request", message_or("Datos inválidos"))
            }
            other => AppError::Api {
                status: other.as_u16(),
                message: message_or(other.canonical_reason().unwrap_or("Error del servidor")),
            },
        })
    }

    async fn fetch_roster(&self, course_id: &str, access: Access) -> Result<Vec<Enrollment>> {
        let mut url = self.endpoint(&["inscripciones"])?;
        url.query_pairs_mut().append_pair("cursoId", course_id);

        let response = self.request(Method::GET, url, access)?.send().await?;
        let enrollments: Vec<Enrollment> = Self::check(response).await?.json().await?;

        // 後端可能忽略篩選條件，這裡再過濾一次
        Ok(enrollments
            .into_iter()
            .filter(|e| same_course_id(&e.course_id, course_id))
            .collect())
    }

    /// 匯出用的名單，需要登入
    pub async fn roster(&self, course_id: &str) -> Result<Vec<Enrollment>> {
        self.fetch_roster(course_id, Access::Authenticated).await
    }
}

#[async_trait]
impl PersonDirectory for ApiClient {
    async fn find_person(&self, cuil: &str) -> Result<Option<Person>> {
        let url = self.endpoint(&["persona", cuil])?;
        let response = self.request(Method::GET, url, Access::Public)?.send().await?;

        let response = match Self::check(response).await {
            Ok(response) => response,
            Err(AppError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let text = response.text().await?;
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "null" || trimmed == "{}" {
            return Ok(None);
        }

        let person: Person = serde_json::from_str(trimmed)?;
        if person.cuil.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(person))
    }
}

#[async_trait]
impl EnrollmentQuery for ApiClient {
    async fn list_enrollments(&self, course_id: &str) -> Result<Vec<Enrollment>> {
        self.fetch_roster(course_id, Access::Public).await
    }
}

#[async_trait]
impl EnrollmentCommand for ApiClient {
    async fn enroll(&self, course_id: &str, cuil: &str) -> Result<Enrollment> {
        let url = self.endpoint(&["inscripciones"])?;
        let body = CreateEnrollmentRequest {
            cuil,
            curso_id: CourseIdValue::from_id(course_id),
        };

        let response = self
            .request(Method::POST, url, Access::Public)?
            .json(&body)
            .send()
            .await?;
        let created: Created<Enrollment> = Self::check(response).await?.json().await?;
        Ok(created.into_inner())
    }
}

#[async_trait]
impl CourseDirectory for ApiClient {
    async fn list_courses(&self) -> Result<Vec<Course>> {
        let url = self.endpoint(&["cursos"])?;
        let response = self.request(Method::GET, url, Access::Public)?.send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn create_course(&self, course: &NewCourse) -> Result<Course> {
        course.validate()?;

        let url = self.endpoint(&["curso"])?;
        let response = self
            .request(Method::POST, url, Access::Authenticated)?
            .json(&CreateCourseRequest::from(course))
            .send()
            .await?;
        let created: Created<Course> = Self::check(response).await?.json().await?;
        let created = created.into_inner();
        tracing::info!("Course {} created: {}", created.id, created.title);
        Ok(created)
    }

    async fn delete_course(&self, course_id: &str) -> Result<()> {
        let url = self.endpoint(&["cursos", course_id])?;
        let response = self
            .request(Method::DELETE, url, Access::Authenticated)?
            .send()
            .await?;
        match Self::check(response).await {
            Ok(_) => Ok(()),
            Err(AppError::NotFound { message, .. }) => Err(AppError::not_found("curso", message)),
            Err(e) => Err(e),
        }
    }
}
