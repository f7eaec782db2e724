//! Checks done before a request is sent. A failed check never reaches the
//! server.

use std::time::Duration;

use crate::error::{ApiError, ApiResult};

pub fn non_empty(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

pub fn non_empty_list<T>(field: &str, values: &[T]) -> ApiResult<()> {
    if values.is_empty() {
        return Err(ApiError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

pub fn password(value: &str) -> ApiResult<()> {
    if value.is_empty() {
        return Err(ApiError::validation("password must not be empty"));
    }
    Ok(())
}

pub fn upload_body(body: &[u8]) -> ApiResult<()> {
    if body.is_empty() {
        return Err(ApiError::validation("upload must not be empty"));
    }
    Ok(())
}

pub fn scan_timeout(timeout: Duration, max: Duration) -> ApiResult<()> {
    if timeout.is_zero() || timeout > max {
        return Err(ApiError::validation(format!(
            "scan timeout must be between 0 and {:?}, got {:?}",
            max, timeout
        )));
    }
    Ok(())
}
