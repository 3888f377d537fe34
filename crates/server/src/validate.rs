use validator::{Validate, ValidationError};

use crate::db::{ROLE_STUDENT, ROLE_TEACHER};
use crate::error::AppError;

/// Run declarative validation on a request body before any store mutation.
/// Failures become a 400 carrying the structured per-field error list.
pub fn validate<T: Validate>(req: &T) -> Result<(), AppError> {
    req.validate().map_err(AppError::from)
}

/// Registration may only request the non-elevated roles; `admin` is granted
/// by the server, never by the caller.
pub fn validate_role(role: &str) -> Result<(), ValidationError> {
    if role == ROLE_STUDENT || role == ROLE_TEACHER {
        Ok(())
    } else {
        let mut err = ValidationError::new("role");
        err.message = Some("Role must be 'student' or 'teacher'".into());
        Err(err)
    }
}
