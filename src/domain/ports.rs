use crate::domain::model::{same_course_id, Course, Enrollment, NewCourse, Person};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn remove_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn api_base_url(&self) -> &str;
    fn public_base_url(&self) -> &str;
    fn output_path(&self) -> &str;
    fn request_timeout(&self) -> Duration;
}

#[async_trait]
pub trait PersonDirectory: Send + Sync {
    /// `Ok(None)` 代表查無此人，與網路錯誤分開
    async fn find_person(&self, cuil: &str) -> Result<Option<Person>>;
}

#[async_trait]
pub trait EnrollmentQuery: Send + Sync {
    async fn list_enrollments(&self, course_id: &str) -> Result<Vec<Enrollment>>;

    /// 取回整份名單再逐筆比對；名單通常只有數十到數百筆
    async fn is_enrolled(&self, course_id: &str, cuil: &str) -> Result<bool> {
        let enrollments = self.list_enrollments(course_id).await?;
        Ok(enrollments.iter().any(|e| e.matches(course_id, cuil)))
    }
}

#[async_trait]
pub trait EnrollmentCommand: Send + Sync {
    /// 重複的 (課程, 人員) 會回傳 `AppError::Conflict`
    async fn enroll(&self, course_id: &str, cuil: &str) -> Result<Enrollment>;
}

#[async_trait]
pub trait CourseDirectory: Send + Sync {
    async fn list_courses(&self) -> Result<Vec<Course>>;

    async fn find_course(&self, course_id: &str) -> Result<Option<Course>> {
        let courses = self.list_courses().await?;
        Ok(courses.into_iter().find(|c| same_course_id(&c.id, course_id)))
    }

    async fn create_course(&self, course: &NewCourse) -> Result<Course>;

    async fn delete_course(&self, course_id: &str) -> Result<()>;
}

/// 報名流程需要的三個後端能力
pub trait RegistrationBackend: PersonDirectory + EnrollmentQuery + EnrollmentCommand {}

impl<T> RegistrationBackend for T where T: PersonDirectory + EnrollmentQuery + EnrollmentCommand {}
