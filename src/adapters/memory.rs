use crate::domain::model::{same_course_id, Course, Enrollment, Modality, NewCourse, Person};
use crate::domain::ports::{CourseDirectory, EnrollmentCommand, EnrollmentQuery, PersonDirectory};
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub person_lookups: usize,
    pub enrollment_queries: usize,
    pub enroll_commands: usize,
    pub course_calls: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.person_lookups + self.enrollment_queries + self.enroll_commands + self.course_calls
    }
}

/// 只保留最近的呼叫紀錄；展示模式可能長時間執行
pub const CALL_LOG_CAPACITY: usize = 64;

#[derive(Default)]
struct Store {
    people: HashMap<String, Person>,
    courses: Vec<Course>,
    enrollments: Vec<Enrollment>,
    next_enrollment_id: u64,
    next_course_id: u64,
    available: bool,
    calls: CallCounts,
    call_log: VecDeque<&'static str>,
}

/// 記憶體內的後端，規則與正式後端相同：同一 (課程, CUIL) 只能報名一次，重複時回傳衝突
pub struct InMemoryBackend {
    store: Mutex<Store>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store {
                next_enrollment_id: 1,
                next_course_id: 1,
                available: true,
                ..Store::default()
            }),
        }
    }

    /// 展示用資料
    pub fn with_demo_data() -> Self {
        let backend = Self::new();

        let demo_courses = [
            ("1", "Introducción a la Programación", "Curso básico de programación para principiantes", (2024, 6, 1), (2024, 7, 30), 30, Modality::Presencial),
            ("2", "Desarrollo Web Frontend", "HTML, CSS y JavaScript para crear sitios web interactivos", (2024, 6, 15), (2024, 8, 15), 25, Modality::Virtual),
            ("3", "Bases de Datos SQL", "Fundamentos de bases de datos relacionales y SQL", (2024, 7, 1), (2024, 8, 30), 20, Modality::Presencial),
            ("4", "Desarrollo de Aplicaciones Móviles", "Creación de apps para iOS y Android", (2024, 7, 15), (2024, 9, 15), 15, Modality::Virtual),
        ];
        for (id, title, description, start, end, capacity, modality) in demo_courses {
            let mut course = Self::sample_course(id, title);
            course.description = description.to_string();
            course.start_date = ymd(start);
            course.end_date = ymd(end);
            course.capacity = capacity;
            course.modality = modality;
            backend.add_course(course);
        }

        let demo_people = [
            ("20123456789", "Juan", "Pérez", "juan.perez@example.com", "1123456789"),
            ("27987654321", "María", "González", "maria.gonzalez@example.com", "1187654321"),
            ("20456789012", "Carlos", "Rodríguez", "carlos.rodriguez@example.com", "1145678901"),
            ("27345678901", "Laura", "Fernández", "laura.fernandez@example.com", "1134567890"),
            ("20127872903", "Lucía", "Gómez", "lucia.gomez@example.com", "1122334455"),
        ];
        for (cuil, first, last, email, phone) in demo_people {
            let mut person = Self::sample_person(cuil, first, last);
            person.email = Some(email.to_string());
            person.phone = Some(phone.to_string());
            backend.add_person(person);
        }

        for (course_id, cuil) in [
            ("1", "20123456789"),
            ("2", "27987654321"),
            ("1", "20456789012"),
            ("3", "27345678901"),
            ("3", "20123456789"),
        ] {
            backend.add_enrollment(course_id, cuil);
        }

        backend
    }

    pub fn sample_person(cuil: &str, first_name: &str, last_name: &str) -> Person {
        Person {
            cuil: cuil.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: None,
            phone: None,
        }
    }

    pub fn sample_course(id: &str, title: &str) -> Course {
        Course {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            start_date: ymd((2025, 6, 1)),
            end_date: ymd((2025, 7, 1)),
            capacity: 30,
            enrolled: 0,
            duration_minutes: Some(120),
            location: None,
            modality: Modality::Presencial,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_person(&self, person: Person) {
        self.lock().people.insert(person.cuil.clone(), person);
    }

    pub fn add_course(&self, course: Course) {
        let mut store = self.lock();
        if let Ok(numeric) = course.id.parse::<u64>() {
            store.next_course_id = store.next_course_id.max(numeric + 1);
        }
        store.courses.push(course);
    }

    /// 直接寫入一筆報名（不經過衝突檢查也不計入呼叫次數）
    pub fn add_enrollment(&self, course_id: &str, cuil: &str) {
        let mut store = self.lock();
        Self::insert_enrollment(&mut store, course_id, cuil);
    }

    /// 模擬後端或網路中斷
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    pub fn call_counts(&self) -> CallCounts {
        self.lock().calls
    }

    pub fn call_log(&self) -> Vec<&'static str> {
        self.lock().call_log.iter().copied().collect()
    }

    pub fn enrollment_count(&self, course_id: &str, cuil: &str) -> usize {
        self.lock()
            .enrollments
            .iter()
            .filter(|e| e.matches(course_id, cuil))
            .count()
    }

    fn insert_enrollment(store: &mut Store, course_id: &str, cuil: &str) -> Enrollment {
        let person = store.people.get(cuil).cloned();
        let course = store.courses.iter_mut().find(|c| same_course_id(&c.id, course_id));
        let course_name = course.map(|c| {
            c.enrolled += 1;
            c.title.clone()
        });

        let enrollment = Enrollment {
            id: store.next_enrollment_id.to_string(),
            course_id: course_id.to_string(),
            cuil: cuil.to_string(),
            course_name,
            first_name: person.as_ref().map(|p| p.first_name.clone()),
            last_name: person.as_ref().map(|p| p.last_name.clone()),
            enrolled_at: Some(Utc::now()),
        };
        store.next_enrollment_id += 1;
        store.enrollments.push(enrollment.clone());
        enrollment
    }

    fn record_call(&self, name: &'static str) -> Result<MutexGuard<'_, Store>> {
        let mut store = self.lock();
        match name {
            "find_person" => store.calls.person_lookups += 1,
            "list_enrollments" => store.calls.enrollment_queries += 1,
            "enroll" => store.calls.enroll_commands += 1,
            _ => store.calls.course_calls += 1,
        }
        if store.call_log.len() == CALL_LOG_CAPACITY {
            store.call_log.pop_front();
        }
        store.call_log.push_back(name);

        if !store.available {
            return Err(AppError::Api {
                status: 503,
                message: "Servicio no disponible".to_string(),
            });
        }
        Ok(store)
    }
}

fn ymd((year, month, day): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

#[async_trait]
impl PersonDirectory for InMemoryBackend {
    async fn find_person(&self, cuil: &str) -> Result<Option<Person>> {
        let store = self.record_call("find_person")?;
        Ok(store.people.get(cuil).cloned())
    }
}

#[async_trait]
impl EnrollmentQuery for InMemoryBackend {
    async fn list_enrollments(&self, course_id: &str) -> Result<Vec<Enrollment>> {
        let store = self.record_call("list_enrollments")?;
        Ok(store
            .enrollments
            .iter()
            .filter(|e| same_course_id(&e.course_id, course_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EnrollmentCommand for InMemoryBackend {
    async fn enroll(&self, course_id: &str, cuil: &str) -> Result<Enrollment> {
        let mut store = self.record_call("enroll")?;

        if !store.people.contains_key(cuil) {
            return Err(AppError::not_found(
                "persona",
                "Persona no encontrada en padrón provincial",
            ));
        }
        if !store.courses.iter().any(|c| same_course_id(&c.id, course_id)) {
            return Err(AppError::not_found("curso", "Curso no encontrado"));
        }
        if store.enrollments.iter().any(|e| e.matches(course_id, cuil)) {
            return Err(AppError::Conflict {
                message: "La persona ya está inscrita en este curso".to_string(),
            });
        }

        Ok(Self::insert_enrollment(&mut store, course_id, cuil))
    }
}

#[async_trait]
impl CourseDirectory for InMemoryBackend {
    async fn list_courses(&self) -> Result<Vec<Course>> {
        let store = self.record_call("list_courses")?;
        Ok(store.courses.clone())
    }

    async fn create_course(&self, course: &NewCourse) -> Result<Course> {
        let mut store = self.record_call("create_course")?;
        let created = Course {
            id: store.next_course_id.to_string(),
            title: course.title.trim().to_string(),
            description: course.description.clone().unwrap_or_default(),
            start_date: course.start_date,
            end_date: course.end_date,
            capacity: course.capacity,
            enrolled: 0,
            duration_minutes: Some(course.duration_minutes),
            location: None,
            modality: course.modality.clone(),
        };
        store.next_course_id += 1;
        store.courses.push(created.clone());
        Ok(created)
    }

    async fn delete_course(&self, course_id: &str) -> Result<()> {
        let mut store = self.record_call("delete_course")?;
        let before = store.courses.len();
        store.courses.retain(|c| c.id != course_id);
        if store.courses.len() == before {
            return Err(AppError::not_found("curso", "Curso no encontrado"));
        }
        store.enrollments.retain(|e| e.course_id != course_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::Validate;

    #[tokio::test]
    async fn test_demo_data_matches_seeded_enrollments() {
        let backend = InMemoryBackend::with_demo_data();

        assert!(backend.is_enrolled("1", "20123456789").await.unwrap());
        assert!(!backend.is_enrolled("2", "20123456789").await.unwrap());
        assert_eq!(backend.list_enrollments("3").await.unwrap().len(), 2);
        assert_eq!(backend.list_courses().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_call_log_keeps_only_recent_calls() {
        let backend = InMemoryBackend::with_demo_data();

        for _ in 0..CALL_LOG_CAPACITY {
            backend.find_person("20127872903").await.unwrap();
        }
        backend.list_enrollments("1").await.unwrap();

        let log = backend.call_log();
        assert_eq!(log.len(), CALL_LOG_CAPACITY);
        assert_eq!(log.last(), Some(&"list_enrollments"));
        assert_eq!(backend.call_counts().person_lookups, CALL_LOG_CAPACITY);
    }

    #[tokio::test]
    async fn test_zero_padded_course_id_matches_numeric_id() {
        let backend = InMemoryBackend::with_demo_data();

        assert!(backend.is_enrolled("01", "20123456789").await.unwrap());
        assert!(matches!(
            backend.enroll("01", "20123456789").await,
            Err(AppError::Conflict { .. })
        ));
        assert!(backend.find_course("03").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_enroll_rejects_duplicates_and_unknown_records() {
        let backend = InMemoryBackend::with_demo_data();

        let created = backend.enroll("2", "20127872903").await.unwrap();
        assert_eq!(created.course_name.as_deref(), Some("Desarrollo Web Frontend"));
        assert_eq!(created.first_name.as_deref(), Some("Lucía"));

        assert!(matches!(
            backend.enroll("2", "20127872903").await,
            Err(AppError::Conflict { .. })
        ));
        assert!(matches!(
            backend.enroll("2", "20439985140").await,
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            backend.enroll("99", "20127872903").await,
            Err(AppError::NotFound { .. })
        ));
        assert_eq!(backend.enrollment_count("2", "20127872903"), 1);
    }

    #[tokio::test]
    async fn test_create_and_delete_course() {
        let backend = InMemoryBackend::with_demo_data();
        let new_course = NewCourse {
            title: "  Backend con Rust ".to_string(),
            description: None,
            start_date: ymd((2025, 8, 1)),
            end_date: ymd((2025, 8, 30)),
            duration_minutes: 90,
            capacity: 20,
            modality: Modality::Virtual,
        };
        assert!(new_course.validate().is_ok());

        let created = backend.create_course(&new_course).await.unwrap();
        assert_eq!(created.id, "5");
        assert_eq!(created.title, "Backend con Rust");
        assert!(backend.find_course("5").await.unwrap().is_some());

        backend.delete_course("5").await.unwrap();
        assert!(backend.find_course("5").await.unwrap().is_none());
        assert!(matches!(
            backend.delete_course("5").await,
            Err(AppError::NotFound { .. })
        ));
    }
}
