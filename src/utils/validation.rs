//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para validación de datos
//! de estudiantes, buses, conductores y rutas.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use validator::ValidationError;

/// Grados escolares aceptados
pub const VALID_GRADES: [&str; 14] = [
    "Pre-K", "K", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12",
];

lazy_static! {
    static ref PHONE_PATTERN: Regex =
        Regex::new(r"^\(?([0-9]{3})\)?[-. ]?([0-9]{3})[-. ]?([0-9]{4})$").unwrap();
    static ref ZIP_PATTERN: Regex = Regex::new(r"^\d{5}(-\d{4})?$").unwrap();
}

/// Validar que un string no esté vacío
pub fn validate_not_empty(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("not_empty");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar grado escolar
pub fn validate_grade(value: &str) -> Result<(), ValidationError> {
    if !VALID_GRADES.contains(&value) {
        let mut error = ValidationError::new("grade");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar formato de teléfono (NNN-NNN-NNNN, (NNN) NNN-NNNN, ...)
pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    if !PHONE_PATTERN.is_match(value) {
        let mut error = ValidationError::new("phone");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar código postal (NNNNN o NNNNN-NNNN)
pub fn validate_zip(value: &str) -> Result<(), ValidationError> {
    if !ZIP_PATTERN.is_match(value) {
        let mut error = ValidationError::new("zip");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar abreviatura de estado de 2 letras
pub fn validate_state(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() != 2 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
        let mut error = ValidationError::new("state");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar que un valor sea positivo
pub fn validate_positive<T: PartialOrd + std::fmt::Display + num_traits::Zero + Serialize>(
    value: T,
) -> Result<(), ValidationError> {
    if value <= T::zero() {
        let mut error = ValidationError::new("positive");
        error.add_param("value".into(), &value);
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_grade() {
        assert!(validate_grade("K").is_ok());
        assert!(validate_grade("12").is_ok());
        assert!(validate_grade("13").is_err());
        assert!(validate_grade("k").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("970-555-0101").is_ok());
        assert!(validate_phone("(970) 555-0101").is_ok());
        assert!(validate_phone("9705550101").is_ok());
        assert!(validate_phone("555-0101").is_err());
    }

    #[test]
    fn test_validate_zip() {
        assert!(validate_zip("81092").is_ok());
        assert!(validate_zip("81092-1234").is_ok());
        assert!(validate_zip("8109").is_err());
    }

    #[test]
    fn test_validate_state() {
        assert!(validate_state("CO").is_ok());
        assert!(validate_state("Colorado").is_err());
        assert!(validate_state("C1").is_err());
    }

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive(72).is_ok());
        assert!(validate_positive(0).is_err());
        assert!(validate_positive(-5).is_err());
    }

    #[test]
    fn test_validate_not_empty() {
        assert!(validate_not_empty("East").is_ok());
        assert!(validate_not_empty("   ").is_err());
    }
}
