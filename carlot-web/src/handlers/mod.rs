//! Request handlers for the public and record-management endpoints

pub mod cars;
pub mod health;
pub mod users;

use crate::error::{ApiError, ApiResult};

/// Empty listings are reported as 404
fn non_empty<T>(items: Vec<T>, message: &str) -> ApiResult<Vec<T>> {
    if items.is_empty() {
        return Err(ApiError::NotFound(message.to_string()));
    }
    Ok(items)
}

/// Exactly one affected row, or 422
fn single_row(affected: u64, message: &str) -> ApiResult<()> {
    if affected == 1 {
        Ok(())
    } else {
        Err(ApiError::Unprocessable(message.to_string()))
    }
}
