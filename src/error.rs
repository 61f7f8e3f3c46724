use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Failure kinds every [`FilmRepository`](crate::repository::FilmRepository)
/// implementation reports.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("film not found")]
    NotFound,
    #[error("repository failure: {0}")]
    Failure(#[from] sea_orm::DbErr),
    #[error("query aborted: context canceled")]
    Cancelled,
}

/// Error returned by HTTP handlers.
///
/// `message` is what the client sees; `source` carries the internal detail and
/// is only ever logged.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: &'static str,
    source: Option<anyhow::Error>,
}

impl AppError {
    pub fn not_found(message: &'static str) -> Self {
        Self { status: StatusCode::NOT_FOUND, message, source: None }
    }

    pub fn internal(message: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message, source: Some(source.into()) }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {source:#}", self.message),
            None => f.write_str(self.message),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self, "request failed");
        }
        (self.status, self.message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
