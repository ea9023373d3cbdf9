use crate::core::workflow::{RegistrationState, RegistrationWorkflow, NOT_FOUND_MESSAGE};
use crate::domain::ports::RegistrationBackend;
use crate::utils::error::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub const SESSION_EXPIRED_HINT: &str =
    "Sesión expirada. Inicie sesión nuevamente con `inscripciones-admin login`.";

/// 管理員手動報名與公開 QR 報名共用同一個流程，只差在文案
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormVariant {
    Manual,
    Qr,
}

impl FormVariant {
    pub fn success_message(&self) -> &'static str {
        match self {
            FormVariant::Manual => "Alumno inscripto con éxito",
            FormVariant::Qr => "Ha sido inscripto correctamente al curso.",
        }
    }

    pub fn conflict_message(&self) -> &'static str {
        match self {
            FormVariant::Manual => "Este alumno ya está inscripto en este curso",
            FormVariant::Qr => "Ya está inscripto",
        }
    }

    pub fn already_enrolled_message(&self) -> &'static str {
        match self {
            FormVariant::Manual => "Este alumno ya está inscripto en este curso",
            FormVariant::Qr => "Usted ya se encuentra inscripto en este curso.",
        }
    }

    fn prompt(&self) -> &'static str {
        match self {
            FormVariant::Manual => "CUIL del alumno (vacío para salir): ",
            FormVariant::Qr => "Ingrese su CUIL (vacío para salir): ",
        }
    }
}

/// 把狀態轉成要顯示的文字行；不含輸入提示
pub fn render_state(state: &RegistrationState, variant: FormVariant) -> Vec<String> {
    match state {
        RegistrationState::Idle { field_error: None } => Vec::new(),
        RegistrationState::Idle {
            field_error: Some(message),
        } => vec![format!("✗ {}", message)],
        RegistrationState::Searching { cuil } => vec![format!("Buscando {}...", cuil)],
        RegistrationState::Found {
            person,
            already_enrolled,
        } => {
            let mut lines = vec![
                format!("Nombre: {}", person.first_name),
                format!("Apellido: {}", person.last_name),
            ];
            if variant == FormVariant::Manual {
                if let Some(email) = &person.email {
                    lines.push(format!("Email: {}", email));
                }
                if let Some(phone) = &person.phone {
                    lines.push(format!("Teléfono: {}", phone));
                }
            }
            if *already_enrolled {
                lines.push(format!("ℹ {}", variant.already_enrolled_message()));
            }
            lines
        }
        RegistrationState::NotFound { .. } => vec![format!("✗ {}", NOT_FOUND_MESSAGE)],
        RegistrationState::SearchError { failure, .. }
        | RegistrationState::EnrollError { failure, .. } => {
            let mut lines = vec![format!("✗ {}", failure.message)];
            if failure.requires_login() {
                lines.push(SESSION_EXPIRED_HINT.to_string());
            }
            lines
        }
        RegistrationState::Enrolling { person } => {
            vec![format!("Inscribiendo a {}...", person.full_name())]
        }
        RegistrationState::EnrollSuccess { .. } => {
            vec![format!("✓ {}", variant.success_message())]
        }
        RegistrationState::EnrollConflict { .. } => {
            vec![format!("ℹ {}", variant.conflict_message())]
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSummary {
    pub enrolled: usize,
    pub already_enrolled: usize,
    pub not_found: usize,
    pub invalid: usize,
    pub skipped: usize,
    pub failed: usize,
    pub session_expired: bool,
}

impl FormSummary {
    fn record(&mut self, state: &RegistrationState) {
        match state {
            RegistrationState::EnrollSuccess { .. } => self.enrolled += 1,
            RegistrationState::EnrollConflict { .. }
            | RegistrationState::Found {
                already_enrolled: true,
                ..
            } => self.already_enrolled += 1,
            RegistrationState::NotFound { .. } => self.not_found += 1,
            RegistrationState::Idle { .. } => self.invalid += 1,
            RegistrationState::Found { .. } => self.skipped += 1,
            RegistrationState::SearchError { failure, .. }
            | RegistrationState::EnrollError { failure, .. } => {
                self.failed += 1;
                self.session_expired |= failure.requires_login();
            }
            RegistrationState::Searching { .. } | RegistrationState::Enrolling { .. } => {}
        }
    }
}

/// 逐行讀取 CUIL 的互動式報名表單
pub struct RegistrationForm<B, R, W> {
    workflow: RegistrationWorkflow<B>,
    variant: FormVariant,
    auto_confirm: bool,
    input: R,
    output: W,
    summary: FormSummary,
}

impl<B, R, W> RegistrationForm<B, R, W>
where
    B: RegistrationBackend,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(workflow: RegistrationWorkflow<B>, variant: FormVariant, input: R, output: W) -> Self {
        Self {
            workflow,
            variant,
            auto_confirm: false,
            input,
            output,
            summary: FormSummary::default(),
        }
    }

    pub fn auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    pub fn summary(&self) -> &FormSummary {
        &self.summary
    }

    pub fn into_output(self) -> W {
        self.output
    }

    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn show(&mut self, state: &RegistrationState) -> Result<()> {
        for line in render_state(state, self.variant) {
            writeln!(self.output, "{}", line)?;
        }
        Ok(())
    }

    /// 處理單一 CUIL：查詢、顯示資料、視需要確認報名
    pub async fn process(&mut self, cuil: &str) -> Result<RegistrationState> {
        self.workflow.edit(cuil);
        let state = self.workflow.submit().await.clone();
        self.show(&state)?;

        if self.workflow.can_confirm() {
            let confirmed = if self.auto_confirm {
                true
            } else {
                let answer = self
                    .read_line("¿Confirmar inscripción? [s/N]: ")
                    .await?
                    .unwrap_or_default();
                matches!(answer.to_lowercase().as_str(), "s" | "si" | "sí" | "y" | "yes")
            };

            if confirmed {
                let state = self.workflow.confirm().await.clone();
                self.show(&state)?;
            } else {
                writeln!(self.output, "Inscripción cancelada")?;
            }
        }

        let state = self.workflow.state().clone();
        self.summary.record(&state);
        Ok(state)
    }

    /// 空白行、`q` 或輸入結束時停止；session 失效時也會停止
    pub async fn run(&mut self) -> Result<FormSummary> {
        writeln!(
            self.output,
            "Inscripción al curso {}",
            self.workflow.course_id()
        )?;

        loop {
            let prompt = self.variant.prompt();
            let line = match self.read_line(prompt).await? {
                Some(line) if !line.is_empty() && !line.eq_ignore_ascii_case("q") => line,
                _ => break,
            };

            self.process(&line).await?;
            if self.summary.session_expired {
                tracing::warn!("Session rejected by the backend, stopping the form");
                break;
            }
        }

        Ok(self.summary.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBackend;
    use std::sync::Arc;

    const COURSE: &str = "2";

    fn backend() -> Arc<InMemoryBackend> {
        let backend = InMemoryBackend::new();
        backend.add_course(InMemoryBackend::sample_course(COURSE, "Introducción a Go"));
        backend.add_person(InMemoryBackend::sample_person("20127872903", "Lucía", "Gómez"));
        backend.add_person(InMemoryBackend::sample_person("27987654321", "María", "González"));
        backend.add_enrollment(COURSE, "27987654321");
        Arc::new(backend)
    }

    fn form<'a>(
        backend: &Arc<InMemoryBackend>,
        variant: FormVariant,
        input: &'a [u8],
    ) -> RegistrationForm<InMemoryBackend, &'a [u8], Vec<u8>> {
        let workflow = RegistrationWorkflow::shared(Arc::clone(backend), COURSE);
        RegistrationForm::new(workflow, variant, input, Vec::new())
    }

    fn output(form: RegistrationForm<InMemoryBackend, &[u8], Vec<u8>>) -> String {
        String::from_utf8(form.into_output()).unwrap()
    }

    #[tokio::test]
    async fn test_manual_form_confirms_and_enrolls() {
        let backend = backend();
        let mut form = form(&backend, FormVariant::Manual, b"20127872903\ns\n\n");

        let summary = form.run().await.unwrap();

        assert_eq!(summary.enrolled, 1);
        assert_eq!(backend.enrollment_count(COURSE, "20127872903"), 1);
        let text = output(form);
        assert!(text.contains("Nombre: Lucía"));
        assert!(text.contains("✓ Alumno inscripto con éxito"));
    }

    #[tokio::test]
    async fn test_declined_confirmation_does_not_enroll() {
        let backend = backend();
        let mut form = form(&backend, FormVariant::Manual, b"20127872903\nn\nq\n");

        let summary = form.run().await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(backend.enrollment_count(COURSE, "20127872903"), 0);
        assert!(output(form).contains("Inscripción cancelada"));
    }

    #[tokio::test]
    async fn test_qr_form_reports_existing_enrollment_without_prompt() {
        let backend = backend();
        let mut form = form(&backend, FormVariant::Qr, b"27987654321\n");

        let summary = form.run().await.unwrap();

        assert_eq!(summary.already_enrolled, 1);
        assert_eq!(backend.call_counts().enroll_commands, 0);
        let text = output(form);
        assert!(text.contains("Usted ya se encuentra inscripto en este curso."));
        assert!(!text.contains("¿Confirmar"));
    }

    #[tokio::test]
    async fn test_invalid_and_unknown_identifiers() {
        let backend = backend();
        let mut form = form(&backend, FormVariant::Qr, b"123\n20439985140\n");

        let summary = form.run().await.unwrap();

        assert_eq!(summary.invalid, 1);
        assert_eq!(summary.not_found, 1);
        let text = output(form);
        assert!(text.contains("El CUIL debe contener 11 dígitos numéricos"));
        assert!(text.contains(NOT_FOUND_MESSAGE));
    }

    #[tokio::test]
    async fn test_auto_confirm_processes_single_identifier() {
        let backend = backend();
        let mut form = form(&backend, FormVariant::Qr, b"").auto_confirm(true);

        let state = form.process("20127872903").await.unwrap();

        assert!(matches!(state, RegistrationState::EnrollSuccess { .. }));
        assert!(output(form).contains("Ha sido inscripto correctamente al curso."));
    }

    #[tokio::test]
    async fn test_backend_outage_is_reported() {
        let backend = backend();
        backend.set_available(false);
        let mut form = form(&backend, FormVariant::Manual, b"20127872903\n");

        let summary = form.run().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert!(!summary.session_expired);
        assert!(output(form).contains("✗ "));
    }
}
