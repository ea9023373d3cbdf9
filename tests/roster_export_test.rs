use anyhow::Result;
use httpmock::prelude::*;
use inscripciones_admin::core::export::ExportReport;
use inscripciones_admin::core::session::{Role, Session};
use inscripciones_admin::domain::model::Credentials;
use inscripciones_admin::utils::error::AppError;
use inscripciones_admin::{ApiClient, ExportFormat, LocalStorage, RosterExporter, SessionStore};
use serde_json::json;
use tempfile::TempDir;

/// 登入 → 保存 session → 以 token 取得名單 → 匯出 CSV
#[tokio::test]
async fn test_login_then_export_roster_to_csv() -> Result<()> {
    let server = MockServer::start_async().await;
    let state_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;

    let login_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/login")
                .json_body(json!({"usuario": "admin", "password": "admin"}));
            then.status(200)
                .json_body(json!({"token": "demo-token", "rol": "admin", "usuario": "admin"}));
        })
        .await;
    let roster_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/inscripciones")
                .query_param("cursoId", "3")
                .header("authorization", "Bearer demo-token");
            then.status(200).json_body(json!([
                {
                    "ID": 4,
                    "CursoID": 3,
                    "NombreCurso": "Bases de Datos SQL",
                    "Cuil": "27345678901",
                    "Nombre": "Laura",
                    "Apellido": "Fernández",
                    "FechaInscripcion": "2024-05-18T09:00:00Z"
                },
                {
                    "ID": 5,
                    "CursoID": 1,
                    "Cuil": "20123456789"
                }
            ]));
        })
        .await;

    let client = ApiClient::new(&server.url("/api"))?;
    let session = client.login(&Credentials::new("admin", "admin")).await?;
    assert!(session.is_admin());

    let sessions = SessionStore::new(LocalStorage::new(
        state_dir.path().to_string_lossy().to_string(),
    ));
    sessions.save(&session).await?;
    let restored = sessions.load().await?.expect("session should be saved");

    let client = client.with_session(restored);
    let enrollments = client.roster("3").await?;
    assert_eq!(enrollments.len(), 1);

    let exporter = RosterExporter::new(LocalStorage::new(
        output_dir.path().to_string_lossy().to_string(),
    ));
    let report = exporter.export("3", &enrollments, ExportFormat::Csv).await?;
    assert_eq!(
        report,
        ExportReport::Written {
            path: "inscripciones_curso_3.csv".to_string(),
            records: 1
        }
    );

    let csv_content = std::fs::read_to_string(output_dir.path().join("inscripciones_curso_3.csv"))?;
    assert!(csv_content.starts_with("CUIL,Nombre,Apellido,FechaInscripcion,NombreCurso,IDCurso"));
    assert!(csv_content.contains("27345678901,Laura,Fernández"));

    tokio_test::assert_ok!(sessions.clear().await);
    assert!(sessions.load().await?.is_none());

    login_mock.assert_async().await;
    roster_mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_roster_requires_session() -> Result<()> {
    let server = MockServer::start_async().await;
    let roster_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/inscripciones");
            then.status(200).json_body(json!([]));
        })
        .await;

    let err = ApiClient::new(&server.url("/api"))?
        .roster("3")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Auth { .. }));
    roster_mock.assert_hits_async(0).await;
    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_reported_as_auth_error() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/inscripciones");
            then.status(401).json_body(json!({"error": "token inválido"}));
        })
        .await;

    let client = ApiClient::new(&server.url("/api"))?
        .with_session(Session::new("expired", Role::Admin, "admin"));
    let err = client.roster("3").await.unwrap_err();

    assert!(matches!(err, AppError::Auth { .. }));
    assert!(err.recovery_suggestion().contains("login"));
    Ok(())
}

#[tokio::test]
async fn test_empty_roster_produces_no_file() -> Result<()> {
    let output_dir = TempDir::new()?;
    let exporter = RosterExporter::new(LocalStorage::new(
        output_dir.path().to_string_lossy().to_string(),
    ));

    let report = exporter.export("9", &[], ExportFormat::Zip).await?;

    assert_eq!(report, ExportReport::Empty);
    assert_eq!(std::fs::read_dir(output_dir.path())?.count(), 0);
    Ok(())
}
