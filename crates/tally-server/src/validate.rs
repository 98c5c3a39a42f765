//! Request-body validation helpers
//!
//! DTOs declare their rules with `validator` derive macros; this module turns
//! the resulting error set into the flat field-keyed `details` map the API
//! returns on 400 responses.

use std::collections::BTreeMap;

use validator::{Validate, ValidationErrors};

use crate::AppError;

/// Flatten validator output into a field -> message map
///
/// Only the first message per field is kept; clients key on field names, not
/// message lists.
pub fn error_details(errors: &ValidationErrors) -> BTreeMap<String, String> {
    let mut details = BTreeMap::new();
    for (field, field_errors) in errors.field_errors() {
        if let Some(first) = field_errors.first() {
            let message = first
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{} is invalid", field));
            details.insert(field.to_string(), message);
        }
    }
    details
}

/// Validate a DTO, returning the 400 validation error on failure
pub fn check<T: Validate>(dto: &T) -> Result<(), AppError> {
    match dto.validate() {
        Ok(()) => Ok(()),
        Err(errors) => Err(AppError::validation(error_details(&errors))),
    }
}
