pub mod registration_form;

pub use registration_form::{render_state, FormSummary, FormVariant, RegistrationForm};
