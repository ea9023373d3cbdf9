pub mod export;
pub mod links;
pub mod registration;
pub mod session;
pub mod workflow;

pub use crate::domain::model::{Course, Enrollment, NewCourse, Person};
pub use crate::domain::ports::{
    ConfigProvider, CourseDirectory, EnrollmentCommand, EnrollmentQuery, PersonDirectory,
    RegistrationBackend, Storage,
};
pub use crate::utils::error::Result;
