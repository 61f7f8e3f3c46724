use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{error::RepositoryError, models::Film};

/// Read access to the film catalog, independent of the backing store.
///
/// Every call observes `cancel`: a token that is already cancelled, or that
/// becomes cancelled before the call completes, yields
/// [`RepositoryError::Cancelled`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FilmRepository: Send + Sync {
    /// Every film in the store. An empty store is an empty list.
    async fn get_all(&self, cancel: &CancellationToken) -> Result<Vec<Film>, RepositoryError>;

    /// The film with `id`, or [`RepositoryError::NotFound`].
    async fn get_by_id(&self, cancel: &CancellationToken, id: i32)
    -> Result<Film, RepositoryError>;

    /// Films whose rating equals `rating` exactly.
    async fn get_all_by_rating(
        &self,
        cancel: &CancellationToken,
        rating: &str,
    ) -> Result<Vec<Film>, RepositoryError>;

    /// Films that belong to the category named `category`.
    async fn get_all_by_category(
        &self,
        cancel: &CancellationToken,
        category: &str,
    ) -> Result<Vec<Film>, RepositoryError>;
}
