use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{error::RepositoryError, models::Film, repository::FilmRepository};

/// Process-local film store over a fixed sequence.
///
/// Results keep the order the films were supplied in; nothing is sorted.
/// Filtered scans hold `scan` for their whole duration. `get_all` reads
/// `films` without it, which is only sound because `films` is never mutated
/// after construction. Revisit that if the store ever grows writes.
pub struct MemoryFilmRepository {
    films: Vec<Film>,
    scan: Mutex<()>,
}

impl MemoryFilmRepository {
    pub fn new(films: Vec<Film>) -> Self {
        Self { films, scan: Mutex::new(()) }
    }

    pub fn len(&self) -> usize {
        self.films.len()
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), a panicked holder leaves nothing inconsistent.
        self.scan.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn filter_by(
        &self,
        cancel: &CancellationToken,
        keep: impl Fn(&Film) -> bool,
    ) -> Result<Vec<Film>, RepositoryError> {
        let _guard = self.lock();
        let mut out = Vec::new();
        for film in &self.films {
            if cancel.is_cancelled() {
                return Err(RepositoryError::Cancelled);
            }
            if keep(film) {
                out.push(film.clone());
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl FilmRepository for MemoryFilmRepository {
    async fn get_all(&self, cancel: &CancellationToken) -> Result<Vec<Film>, RepositoryError> {
        if cancel.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }
        Ok(self.films.clone())
    }

    async fn get_by_id(
        &self,
        cancel: &CancellationToken,
        id: i32,
    ) -> Result<Film, RepositoryError> {
        if cancel.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }
        let _guard = self.lock();
        self.films.iter().find(|f| f.film_id == id).cloned().ok_or(RepositoryError::NotFound)
    }

    async fn get_all_by_rating(
        &self,
        cancel: &CancellationToken,
        rating: &str,
    ) -> Result<Vec<Film>, RepositoryError> {
        if cancel.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }
        self.filter_by(cancel, |f| f.rating == rating)
    }

    async fn get_all_by_category(
        &self,
        cancel: &CancellationToken,
        category: &str,
    ) -> Result<Vec<Film>, RepositoryError> {
        if cancel.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }
        self.filter_by(cancel, |f| f.category == category)
    }
}
