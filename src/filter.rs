use tokio_util::sync::CancellationToken;

use crate::{
    error::RepositoryError,
    models::{Film, FilmQuery},
    repository::FilmRepository,
};

/// The single repository read a listing request resolves to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FilmFilter {
    All,
    Rating(String),
    Category(String),
}

impl FilmFilter {
    /// `rating` wins over `category`; an empty value counts as absent.
    pub fn resolve(query: FilmQuery) -> Self {
        let present = |v: Option<String>| v.filter(|s| !s.is_empty());

        if let Some(rating) = present(query.rating) {
            FilmFilter::Rating(rating)
        } else if let Some(category) = present(query.category) {
            FilmFilter::Category(category)
        } else {
            FilmFilter::All
        }
    }

    pub async fn fetch(
        &self,
        repo: &dyn FilmRepository,
        cancel: &CancellationToken,
    ) -> Result<Vec<Film>, RepositoryError> {
        match self {
            FilmFilter::All => repo.get_all(cancel).await,
            FilmFilter::Rating(rating) => repo.get_all_by_rating(cancel, rating).await,
            FilmFilter::Category(category) => repo.get_all_by_category(cancel, category).await,
        }
    }
}
