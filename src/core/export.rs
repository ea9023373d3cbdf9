use crate::domain::model::Enrollment;
use crate::domain::ports::Storage;
use crate::utils::error::{AppError, Result};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use zip::write::{SimpleFileOptions, ZipWriter};

pub const EMPTY_ROSTER_MESSAGE: &str = "No hay inscripciones registradas para este curso.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Zip,
}

impl ExportFormat {
    pub const ALL: [&'static str; 3] = ["csv", "json", "zip"];

    fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Zip => "zip",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "zip" => Ok(ExportFormat::Zip),
            other => Err(AppError::validation(
                "format",
                format!("Formato no soportado: {} ({})", other, Self::ALL.join(", ")),
            )),
        }
    }
}

/// 匯出檔案的一列，欄位名稱與試算表匯出相同
#[derive(Debug, Serialize)]
struct RosterRow<'a> {
    #[serde(rename = "CUIL")]
    cuil: &'a str,
    #[serde(rename = "Nombre")]
    first_name: &'a str,
    #[serde(rename = "Apellido")]
    last_name: &'a str,
    #[serde(rename = "FechaInscripcion")]
    enrolled_at: String,
    #[serde(rename = "NombreCurso")]
    course_name: &'a str,
    #[serde(rename = "IDCurso")]
    course_id: &'a str,
}

impl<'a> From<&'a Enrollment> for RosterRow<'a> {
    fn from(e: &'a Enrollment) -> Self {
        Self {
            cuil: &e.cuil,
            first_name: e.first_name.as_deref().unwrap_or(""),
            last_name: e.last_name.as_deref().unwrap_or(""),
            enrolled_at: e
                .enrolled_at
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_default(),
            course_name: e.course_name.as_deref().unwrap_or(""),
            course_id: &e.course_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportReport {
    Written { path: String, records: usize },
    Empty,
}

pub struct RosterExporter<S: Storage> {
    storage: S,
}

impl<S: Storage> RosterExporter<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn file_name(course_id: &str, format: ExportFormat) -> String {
        let safe_id: String = course_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("inscripciones_curso_{}.{}", safe_id, format.extension())
    }

    pub fn to_csv(enrollments: &[Enrollment]) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for enrollment in enrollments {
            writer.serialize(RosterRow::from(enrollment))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| AppError::config(format!("Invalid UTF-8 in CSV: {}", e)))
    }

    pub fn to_json(enrollments: &[Enrollment]) -> Result<String> {
        Ok(serde_json::to_string_pretty(enrollments)?)
    }

    fn to_zip(course_id: &str, enrollments: &[Enrollment]) -> Result<Vec<u8>> {
        let csv_output = Self::to_csv(enrollments)?;
        let json_output = Self::to_json(enrollments)?;

        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

        zip.start_file(
            Self::file_name(course_id, ExportFormat::Csv),
            SimpleFileOptions::default(),
        )?;
        zip.write_all(csv_output.as_bytes())?;

        zip.start_file(
            Self::file_name(course_id, ExportFormat::Json),
            SimpleFileOptions::default(),
        )?;
        zip.write_all(json_output.as_bytes())?;

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }

    /// 名單為空時不產生檔案
    pub async fn export(
        &self,
        course_id: &str,
        enrollments: &[Enrollment],
        format: ExportFormat,
    ) -> Result<ExportReport> {
        if enrollments.is_empty() {
            tracing::info!("Course {} has no enrollments, nothing to export", course_id);
            return Ok(ExportReport::Empty);
        }

        let data = match format {
            ExportFormat::Csv => Self::to_csv(enrollments)?.into_bytes(),
            ExportFormat::Json => Self::to_json(enrollments)?.into_bytes(),
            ExportFormat::Zip => Self::to_zip(course_id, enrollments)?,
        };

        let path = Self::file_name(course_id, format);
        tracing::debug!("Writing {} ({} bytes) to storage", path, data.len());
        self.storage.write_file(&path, &data).await?;

        Ok(ExportReport::Written {
            path,
            records: enrollments.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().await.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.get_file(path).await.ok_or_else(|| {
                AppError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn remove_file(&self, path: &str) -> Result<()> {
            self.files.lock().await.remove(path);
            Ok(())
        }
    }

    fn roster() -> Vec<Enrollment> {
        vec![
            Enrollment {
                id: "1".to_string(),
                course_id: "3".to_string(),
                cuil: "27345678901".to_string(),
                course_name: Some("Bases de Datos SQL".to_string()),
                first_name: Some("Laura".to_string()),
                last_name: Some("Fernández".to_string()),
                enrolled_at: Some(Utc.with_ymd_and_hms(2024, 5, 18, 9, 0, 0).unwrap()),
            },
            Enrollment {
                id: "2".to_string(),
                course_id: "3".to_string(),
                cuil: "20123456789".to_string(),
                course_name: Some("Bases de Datos SQL".to_string()),
                first_name: Some("Juan".to_string()),
                last_name: Some("Pérez, hijo".to_string()),
                enrolled_at: None,
            },
        ]
    }

    #[test]
    fn test_csv_header_and_quoting() {
        let csv_output = RosterExporter::<MockStorage>::to_csv(&roster()).unwrap();
        let lines: Vec<&str> = csv_output.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "CUIL,Nombre,Apellido,FechaInscripcion,NombreCurso,IDCurso");
        assert_eq!(
            lines[1],
            "27345678901,Laura,Fernández,2024-05-18T09:00:00+00:00,Bases de Datos SQL,3"
        );
        assert_eq!(lines[2], "20123456789,Juan,\"Pérez, hijo\",,Bases de Datos SQL,3");
    }

    #[test]
    fn test_file_name_sanitizes_course_id() {
        assert_eq!(
            RosterExporter::<MockStorage>::file_name("3", ExportFormat::Csv),
            "inscripciones_curso_3.csv"
        );
        assert_eq!(
            RosterExporter::<MockStorage>::file_name("../x", ExportFormat::Zip),
            "inscripciones_curso____x.zip"
        );
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }

    #[tokio::test]
    async fn test_empty_roster_writes_nothing() {
        let storage = MockStorage::default();
        let exporter = RosterExporter::new(storage.clone());

        let report = exporter.export("3", &[], ExportFormat::Csv).await.unwrap();

        assert_eq!(report, ExportReport::Empty);
        assert!(storage.files.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_zip_bundle_contains_csv_and_json() {
        let storage = MockStorage::default();
        let exporter = RosterExporter::new(storage.clone());

        let report = exporter.export("3", &roster(), ExportFormat::Zip).await.unwrap();
        assert_eq!(
            report,
            ExportReport::Written {
                path: "inscripciones_curso_3.zip".to_string(),
                records: 2
            }
        );

        let data = storage.get_file("inscripciones_curso_3.zip").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();
        assert_eq!(archive.len(), 2);
        assert!(archive.by_name("inscripciones_curso_3.csv").is_ok());
        assert!(archive.by_name("inscripciones_curso_3.json").is_ok());
    }

    #[tokio::test]
    async fn test_json_export_round_trips_records() {
        let storage = MockStorage::default();
        let exporter = RosterExporter::new(storage.clone());

        exporter.export("3", &roster(), ExportFormat::Json).await.unwrap();

        let data = storage.get_file("inscripciones_curso_3.json").await.unwrap();
        let parsed: Vec<Enrollment> = serde_json::from_slice(&data).unwrap();
        assert_eq!(parsed, roster());
    }
}
