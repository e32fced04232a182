use std::fmt::Display;
use std::str::FromStr;

use uuid::Uuid;

use crate::errors::AppError;

/// Ids are stored as hyphenated TEXT; anything else is a corrupt row.
pub fn parse_uuid(column: &str, value: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(value.trim()).map_err(|e| AppError::internal(format!("invalid uuid in {}: {}", column, e)))
}

pub fn parse_opt_uuid(column: &str, value: Option<&str>) -> Result<Option<Uuid>, AppError> {
    match value.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(Some(parse_uuid(column, s)?)),
        _ => Ok(None),
    }
}

/// Parses a TEXT column holding one of the crate's closed enums (role, status, ...).
pub fn parse_enum<T>(column: &str, value: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse::<T>()
        .map_err(|e| AppError::internal(format!("invalid value in {}: {}", column, e)))
}
