//! Result alias shared by every fcpmgr crate.

use crate::error::AppError;

/// `Result` carrying an [`AppError`] unless another error type is named.
///
/// Service operations return `AppResult<T>`; store-level helpers that
/// surface a foreign error can still spell `AppResult<T, sqlx::Error>`.
pub type AppResult<T, E = AppError> = Result<T, E>;
