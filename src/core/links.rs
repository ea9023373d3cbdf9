use crate::utils::error::{AppError, Result};
use crate::utils::validation::validate_url;
use url::Url;

/// 公開報名頁的網址，也是 QR code 的內容：`{base}/qr/inscripcion/curso/{id}`
pub fn registration_link(public_base_url: &str, course_id: &str) -> Result<Url> {
    if course_id.trim().is_empty() {
        return Err(AppError::validation("courseId", "El curso es obligatorio"));
    }

    let mut url = validate_url("public.base_url", public_base_url)?;
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| AppError::config(format!("Base URL cannot be a base: {}", public_base_url)))?
        .pop_if_empty()
        .extend(["qr", "inscripcion", "curso", course_id]);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_link() {
        let url = registration_link("https://inscripciones.example.gob.ar", "5").unwrap();
        assert_eq!(
            url.as_str(),
            "https://inscripciones.example.gob.ar/qr/inscripcion/curso/5"
        );
    }

    #[test]
    fn test_registration_link_keeps_base_path_and_encodes_id() {
        let url = registration_link("http://localhost:3000/app/?x=1", "a b").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/app/qr/inscripcion/curso/a%20b");
    }

    #[test]
    fn test_registration_link_requires_course() {
        assert!(registration_link("http://localhost:3000", " ").is_err());
        assert!(registration_link("not a url", "5").is_err());
    }
}
