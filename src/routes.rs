use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{HeaderValue, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use crate::{
    AppState,
    error::{AppError, AppResult, RepositoryError},
    filter::FilmFilter,
    models::{Film, FilmQuery},
};

/// Cancellation scope of one request.
///
/// Child of the server shutdown token, and cancelled as soon as the handler
/// returns or is dropped (client went away, request timed out).
pub struct RequestCancel {
    token: CancellationToken,
    _guard: DropGuard,
}

impl FromRequestParts<Arc<AppState>> for RequestCancel {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = state.shutdown.child_token();
        Ok(Self { _guard: token.clone().drop_guard(), token })
    }
}

/// JSON body with two-space indentation.
pub struct PrettyJson<T>(pub T);

impl<T: Serialize> IntoResponse for PrettyJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec_pretty(&self.0) {
            Ok(body) => (
                [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                body,
            )
                .into_response(),
            Err(err) => AppError::internal("Error encoding response", err).into_response(),
        }
    }
}

pub async fn ping() -> &'static str {
    "."
}

pub async fn list_films(
    State(state): State<Arc<AppState>>,
    cancel: RequestCancel,
    Query(query): Query<FilmQuery>,
) -> AppResult<PrettyJson<Vec<Film>>> {
    let filter = FilmFilter::resolve(query);
    debug!(?filter, "listing films");

    let films = filter
        .fetch(state.films.as_ref(), &cancel.token)
        .await
        .map_err(|err| AppError::internal("Error getting films", err))?;

    debug!(count = films.len(), "films fetched");
    Ok(PrettyJson(films))
}

pub async fn get_film(
    State(state): State<Arc<AppState>>,
    cancel: RequestCancel,
    Path(film_id): Path<String>,
) -> AppResult<PrettyJson<Film>> {
    let id: i32 = film_id
        .parse()
        .map_err(|err| AppError::internal("Error converting film id to int", err))?;

    let film = state.films.get_by_id(&cancel.token, id).await.map_err(|err| match err {
        RepositoryError::NotFound => AppError::not_found("Film Not Found"),
        err => AppError::internal("Error getting film", err),
    })?;

    Ok(PrettyJson(film))
}
