//! Two-step registration (search, then confirm) shared by the manual form and
//! the public QR form.
//!
//! Every async step is split into `begin_*` (synchronous state change that
//! hands out a ticket), the network call, and `complete_*` (applies the result
//! only if the ticket still belongs to the current input). Editing the
//! identifier invalidates every outstanding ticket, so a late response for a
//! stale identifier is dropped instead of being rendered next to new input.

use crate::core::registration::{EnrollOutcome, RegistrationService, SearchOutcome};
use crate::domain::model::{Enrollment, Person};
use crate::domain::ports::RegistrationBackend;
use crate::utils::error::{AppError, ErrorCategory, Result};
use crate::utils::validation::{validate_cuil, CUIL_FIELD};
use std::sync::Arc;

pub const NOT_FOUND_MESSAGE: &str = "No se encontró un usuario con ese CUIL";
pub const SEARCH_ERROR_MESSAGE: &str = "Error al buscar el usuario";
pub const ENROLL_ERROR_MESSAGE: &str = "Error al inscribir alumno";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub category: ErrorCategory,
    pub message: String,
}

impl Failure {
    fn from_error(err: &AppError, fallback: &str) -> Self {
        let message = match err {
            AppError::Network(_) => fallback.to_string(),
            other => {
                let message = other.user_friendly_message();
                if message.trim().is_empty() {
                    fallback.to_string()
                } else {
                    message
                }
            }
        };
        Self {
            category: err.category(),
            message,
        }
    }

    /// 需要重新登入，而不是單純重試
    pub fn requires_login(&self) -> bool {
        self.category == ErrorCategory::Auth
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    Idle { field_error: Option<String> },
    Searching { cuil: String },
    Found { person: Person, already_enrolled: bool },
    NotFound { cuil: String },
    SearchError { cuil: String, failure: Failure },
    Enrolling { person: Person },
    EnrollSuccess { person: Person, enrollment: Enrollment },
    EnrollConflict { person: Person, message: String },
    EnrollError { person: Person, failure: Failure },
}

impl RegistrationState {
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            RegistrationState::Searching { .. } | RegistrationState::Enrolling { .. }
        )
    }

    pub fn person(&self) -> Option<&Person> {
        match self {
            RegistrationState::Found { person, .. }
            | RegistrationState::Enrolling { person }
            | RegistrationState::EnrollSuccess { person, .. }
            | RegistrationState::EnrollConflict { person, .. }
            | RegistrationState::EnrollError { person, .. } => Some(person),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
    course_id: String,
    cuil: String,
}

impl SearchTicket {
    pub fn cuil(&self) -> &str {
        &self.cuil
    }

    pub async fn execute<B: RegistrationBackend>(
        &self,
        service: &RegistrationService<B>,
    ) -> Result<SearchOutcome> {
        service
            .search_and_check_membership(&self.course_id, &self.cuil)
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollTicket {
    generation: u64,
    course_id: String,
    person: Person,
}

impl EnrollTicket {
    pub fn cuil(&self) -> &str {
        &self.person.cuil
    }

    pub async fn execute<B: RegistrationBackend>(
        &self,
        service: &RegistrationService<B>,
    ) -> Result<EnrollOutcome> {
        service.confirm(&self.course_id, &self.person.cuil).await
    }
}

pub struct RegistrationWorkflow<B> {
    service: RegistrationService<B>,
    course_id: String,
    input: String,
    state: RegistrationState,
    generation: u64,
}

impl<B: RegistrationBackend> RegistrationWorkflow<B> {
    pub fn new(backend: B, course_id: impl Into<String>) -> Self {
        Self::with_service(RegistrationService::new(backend), course_id)
    }

    pub fn shared(backend: Arc<B>, course_id: impl Into<String>) -> Self {
        Self::with_service(RegistrationService::from_shared(backend), course_id)
    }

    pub fn with_service(service: RegistrationService<B>, course_id: impl Into<String>) -> Self {
        Self {
            service,
            course_id: course_id.into(),
            input: String::new(),
            state: RegistrationState::Idle { field_error: None },
            generation: 0,
        }
    }

    pub fn service(&self) -> &RegistrationService<B> {
        &self.service
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn state(&self) -> &RegistrationState {
        &self.state
    }

    pub fn can_submit(&self) -> bool {
        !self.state.is_busy()
    }

    pub fn can_confirm(&self) -> bool {
        matches!(
            self.state,
            RegistrationState::Found {
                already_enrolled: false,
                ..
            } | RegistrationState::EnrollError { .. }
        )
    }

    /// 使用者修改了輸入欄位：清除先前的結果並讓所有進行中的請求失效
    pub fn edit(&mut self, value: impl Into<String>) {
        let value = value.into();
        if value == self.input {
            return;
        }
        self.input = value;
        self.generation += 1;
        self.state = RegistrationState::Idle { field_error: None };
    }

    /// 格式不符時停在 Idle 並標示欄位錯誤，不發出任何請求
    pub fn begin_search(&mut self) -> Option<SearchTicket> {
        if !self.can_submit() {
            tracing::debug!("Search ignored: a request is already in flight");
            return None;
        }

        let cuil = self.input.clone();
        if let Err(err) = validate_cuil(&cuil) {
            self.state = RegistrationState::Idle {
                field_error: Some(err.user_friendly_message()),
            };
            return None;
        }

        self.generation += 1;
        self.state = RegistrationState::Searching { cuil: cuil.clone() };
        Some(SearchTicket {
            generation: self.generation,
            course_id: self.course_id.clone(),
            cuil,
        })
    }

    /// 回傳 false 表示結果已過期並被丟棄
    pub fn complete_search(&mut self, ticket: SearchTicket, result: Result<SearchOutcome>) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!("Discarding stale search result for CUIL {}", ticket.cuil);
            return false;
        }

        self.state = match result {
            Ok(SearchOutcome::Found {
                person,
                already_enrolled,
            }) => RegistrationState::Found {
                person,
                already_enrolled,
            },
            Ok(SearchOutcome::NotFound { cuil }) => RegistrationState::NotFound { cuil },
            // 只有本地的 CUIL 格式檢查回到 Idle；後端 400/422 屬於查詢失敗
            Err(AppError::Validation { field, message }) if field == CUIL_FIELD => {
                RegistrationState::Idle {
                    field_error: Some(message),
                }
            }
            Err(err) => {
                tracing::warn!("Search for CUIL {} failed: {}", ticket.cuil, err);
                RegistrationState::SearchError {
                    cuil: ticket.cuil,
                    failure: Failure::from_error(&err, SEARCH_ERROR_MESSAGE),
                }
            }
        };
        true
    }

    pub fn begin_confirm(&mut self) -> Option<EnrollTicket> {
        if !self.can_confirm() {
            tracing::debug!("Confirm ignored in state {:?}", self.state);
            return None;
        }

        let person = self.state.person()?.clone();
        self.generation += 1;
        self.state = RegistrationState::Enrolling {
            person: person.clone(),
        };
        Some(EnrollTicket {
            generation: self.generation,
            course_id: self.course_id.clone(),
            person,
        })
    }

    pub fn complete_confirm(&mut self, ticket: EnrollTicket, result: Result<EnrollOutcome>) -> bool {
        if ticket.generation != self.generation {
            tracing::info!(
                "Discarding enrollment result for CUIL {}: input changed meanwhile",
                ticket.person.cuil
            );
            return false;
        }

        let person = ticket.person;
        self.state = match result {
            Ok(EnrollOutcome::Enrolled(enrollment)) => {
                RegistrationState::EnrollSuccess { person, enrollment }
            }
            Ok(EnrollOutcome::AlreadyEnrolled { message }) => {
                RegistrationState::EnrollConflict { person, message }
            }
            Err(err) => {
                tracing::warn!("Enrollment for CUIL {} failed: {}", person.cuil, err);
                RegistrationState::EnrollError {
                    person,
                    failure: Failure::from_error(&err, ENROLL_ERROR_MESSAGE),
                }
            }
        };
        true
    }

    pub async fn submit(&mut self) -> &RegistrationState {
        if let Some(ticket) = self.begin_search() {
            let result = ticket.execute(&self.service).await;
            self.complete_search(ticket, result);
        }
        &self.state
    }

    pub async fn confirm(&mut self) -> &RegistrationState {
        if let Some(ticket) = self.begin_confirm() {
            let result = ticket.execute(&self.service).await;
            self.complete_confirm(ticket, result);
        }
        &self.state
    }
}
