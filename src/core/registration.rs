use crate::domain::model::{Enrollment, Person};
use crate::domain::ports::RegistrationBackend;
use crate::utils::error::{AppError, Result};
use crate::utils::validation::validate_cuil;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found {
        person: Person,
        already_enrolled: bool,
    },
    NotFound {
        cuil: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollOutcome {
    Enrolled(Enrollment),
    /// 後端回 409：最終狀態（已報名）本來就成立
    AlreadyEnrolled { message: String },
}

/// 報名流程的兩個複合操作。後端以 `Arc` 共享，可以 clone 進背景任務。
pub struct RegistrationService<B> {
    backend: Arc<B>,
}

impl<B> Clone for RegistrationService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: RegistrationBackend> RegistrationService<B> {
    pub fn new(backend: B) -> Self {
        Self::from_shared(Arc::new(backend))
    }

    pub fn from_shared(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 查詢人員，找到後「接著」檢查是否已報名；兩個請求依序執行，不並行
    pub async fn search_and_check_membership(
        &self,
        course_id: &str,
        cuil: &str,
    ) -> Result<SearchOutcome> {
        validate_cuil(cuil)?;

        tracing::debug!("Looking up person {} for course {}", cuil, course_id);
        let person = match self.backend.find_person(cuil).await? {
            Some(person) => person,
            None => {
                tracing::info!("No person registered with CUIL {}", cuil);
                return Ok(SearchOutcome::NotFound {
                    cuil: cuil.to_string(),
                });
            }
        };

        let already_enrolled = self.backend.is_enrolled(course_id, cuil).await?;
        tracing::info!(
            "Found {} (CUIL {}), already enrolled in course {}: {}",
            person.full_name(),
            cuil,
            course_id,
            already_enrolled
        );

        Ok(SearchOutcome::Found {
            person,
            already_enrolled,
        })
    }

    pub async fn confirm(&self, course_id: &str, cuil: &str) -> Result<EnrollOutcome> {
        let cuil = cuil.trim();
        validate_cuil(cuil)?;

        match self.backend.enroll(course_id, cuil).await {
            Ok(enrollment) => {
                tracing::info!(
                    "Enrollment {} created for CUIL {} in course {}",
                    enrollment.id,
                    cuil,
                    course_id
                );
                Ok(EnrollOutcome::Enrolled(enrollment))
            }
            Err(AppError::Conflict { message }) => {
                tracing::info!(
                    "CUIL {} already enrolled in course {} (backend conflict)",
                    cuil,
                    course_id
                );
                Ok(EnrollOutcome::AlreadyEnrolled { message })
            }
            Err(e) => Err(e),
        }
    }
}
