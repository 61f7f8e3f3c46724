use std::future::Future;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbBackend, DbErr, FromQueryResult, Statement, Value};
use tokio_util::sync::CancellationToken;

use crate::{error::RepositoryError, models::Film, repository::FilmRepository};

// `rating` is the `mpaa_rating` enum and `release_year` the `year` domain in
// the catalog schema; both are cast so they decode as plain text / int4.
pub const SQL_BY_ID: &str = "SELECT film_id, title, description, release_year::int4 AS release_year, rating::text AS rating FROM film WHERE film_id = $1 ORDER BY title ASC";
pub const SQL_GET_ALL: &str = "SELECT film_id, title, description, release_year::int4 AS release_year, rating::text AS rating FROM film ORDER BY title ASC";
pub const SQL_GET_BY_RATING: &str = "SELECT film_id, title, description, release_year::int4 AS release_year FROM film WHERE rating::text = $1 ORDER BY title ASC";
pub const SQL_GET_BY_CATEGORY: &str = "SELECT film_id, title, description, release_year::int4 AS release_year, rating::text AS rating FROM film WHERE film_id IN (SELECT DISTINCT film_id FROM film_category WHERE category_id = (SELECT category_id FROM category WHERE category.name = $1)) ORDER BY title ASC";

#[derive(Debug, FromQueryResult)]
struct FilmRow {
    film_id: i32,
    title: Option<String>,
    description: Option<String>,
    release_year: Option<i32>,
    rating: Option<String>,
}

/// Row shape of the rating query, which does not read the rating back.
#[derive(Debug, FromQueryResult)]
struct UnratedFilmRow {
    film_id: i32,
    title: Option<String>,
    description: Option<String>,
    release_year: Option<i32>,
}

impl From<FilmRow> for Film {
    fn from(row: FilmRow) -> Self {
        Film {
            film_id: row.film_id,
            title: row.title.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            release_year: row.release_year.unwrap_or_default(),
            rating: row.rating.unwrap_or_default(),
            category: String::new(),
        }
    }
}

impl From<UnratedFilmRow> for Film {
    fn from(row: UnratedFilmRow) -> Self {
        Film {
            film_id: row.film_id,
            title: row.title.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            release_year: row.release_year.unwrap_or_default(),
            ..Default::default()
        }
    }
}

/// Film catalog backed by a Postgres pool.
pub struct PostgresFilmRepository {
    db: DatabaseConnection,
}

impl PostgresFilmRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn statement(sql: &str, values: impl IntoIterator<Item = Value>) -> Statement {
    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}

/// Runs `query` unless `cancel` fires first. The token is checked before the
/// query is first polled, so a cancelled token never reaches the database.
/// Losing the race drops the query future, which hands its connection back
/// to the pool.
async fn cancellable<T>(
    cancel: &CancellationToken,
    query: impl Future<Output = Result<T, DbErr>>,
) -> Result<T, RepositoryError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RepositoryError::Cancelled),
        res = query => res.map_err(RepositoryError::from),
    }
}

#[async_trait]
impl FilmRepository for PostgresFilmRepository {
    async fn get_all(&self, cancel: &CancellationToken) -> Result<Vec<Film>, RepositoryError> {
        let rows = cancellable(
            cancel,
            FilmRow::find_by_statement(statement(SQL_GET_ALL, [])).all(&self.db),
        )
        .await?;
        Ok(rows.into_iter().map(Film::from).collect())
    }

    async fn get_by_id(
        &self,
        cancel: &CancellationToken,
        id: i32,
    ) -> Result<Film, RepositoryError> {
        let row = cancellable(
            cancel,
            FilmRow::find_by_statement(statement(SQL_BY_ID, [id.into()])).one(&self.db),
        )
        .await?;
        row.map(Film::from).ok_or(RepositoryError::NotFound)
    }

    async fn get_all_by_rating(
        &self,
        cancel: &CancellationToken,
        rating: &str,
    ) -> Result<Vec<Film>, RepositoryError> {
        let rows = cancellable(
            cancel,
            UnratedFilmRow::find_by_statement(statement(SQL_GET_BY_RATING, [rating.into()]))
                .all(&self.db),
        )
        .await?;
        // The predicate is exact equality, so every row carries `rating`.
        Ok(rows
            .into_iter()
            .map(|row| Film { rating: rating.to_string(), ..Film::from(row) })
            .collect())
    }

    async fn get_all_by_category(
        &self,
        cancel: &CancellationToken,
        category: &str,
    ) -> Result<Vec<Film>, RepositoryError> {
        let rows = cancellable(
            cancel,
            FilmRow::find_by_statement(statement(SQL_GET_BY_CATEGORY, [category.into()]))
                .all(&self.db),
        )
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| Film { category: category.to_string(), ..Film::from(row) })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, time::Duration};

    use sea_orm::{DatabaseBackend, MockDatabase, Transaction};

    use super::*;

    type Row = BTreeMap<&'static str, Value>;

    fn expected() -> Film {
        Film {
            film_id: 1,
            title: "title".to_string(),
            description: "description".to_string(),
            release_year: 2021,
            rating: "rating".to_string(),
            category: String::new(),
        }
    }

    fn full_row(film: &Film) -> Row {
        BTreeMap::from([
            ("film_id", film.film_id.into()),
            ("title", film.title.clone().into()),
            ("description", film.description.clone().into()),
            ("release_year", film.release_year.into()),
            ("rating", film.rating.clone().into()),
        ])
    }

    fn unrated_row(film: &Film) -> Row {
        let mut row = full_row(film);
        row.remove("rating");
        row
    }

    fn repo_with(rows: Vec<Row>) -> PostgresFilmRepository {
        PostgresFilmRepository::new(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([rows]).into_connection(),
        )
    }

    fn log(repo: PostgresFilmRepository) -> Vec<Transaction> {
        repo.db.into_transaction_log()
    }

    #[tokio::test]
    async fn get_all_maps_rows_in_query_order() {
        let second = Film { film_id: 2, title: "zebra".to_string(), ..expected() };
        let repo = repo_with(vec![full_row(&expected()), full_row(&second)]);

        let films = repo.get_all(&CancellationToken::new()).await.unwrap();

        assert_eq!(films, [expected(), second]);
        assert_eq!(
            log(repo),
            [Transaction::from_sql_and_values(DatabaseBackend::Postgres, SQL_GET_ALL, [])]
        );
    }

    #[tokio::test]
    async fn get_all_on_empty_table_is_empty_list() {
        let repo = repo_with(vec![]);

        let films = repo.get_all(&CancellationToken::new()).await.unwrap();

        assert!(films.is_empty());
    }

    #[test]
    fn every_query_orders_by_title() {
        for sql in [SQL_BY_ID, SQL_GET_ALL, SQL_GET_BY_RATING, SQL_GET_BY_CATEGORY] {
            assert!(sql.ends_with("ORDER BY title ASC"), "{sql}");
        }
    }

    #[tokio::test]
    async fn get_by_id_binds_the_id() {
        let repo = repo_with(vec![full_row(&expected())]);

        let film = repo.get_by_id(&CancellationToken::new(), 1).await.unwrap();

        assert_eq!(film, expected());
        assert_eq!(
            log(repo),
            [Transaction::from_sql_and_values(DatabaseBackend::Postgres, SQL_BY_ID, [1i32.into()])]
        );
    }

    #[tokio::test]
    async fn get_by_id_without_row_is_not_found() {
        let repo = repo_with(vec![]);

        let err = repo.get_by_id(&CancellationToken::new(), 999).await.unwrap_err();

        assert!(matches!(err, RepositoryError::NotFound), "{err}");
    }

    #[tokio::test]
    async fn rating_comes_from_the_parameter() {
        let repo = repo_with(vec![unrated_row(&expected())]);

        let films = repo.get_all_by_rating(&CancellationToken::new(), "PG-13").await.unwrap();

        assert_eq!(films, [Film { rating: "PG-13".to_string(), ..expected() }]);
        assert_eq!(
            log(repo),
            [Transaction::from_sql_and_values(
                DatabaseBackend::Postgres,
                SQL_GET_BY_RATING,
                ["PG-13".into()]
            )]
        );
    }

    #[tokio::test]
    async fn category_comes_from_the_parameter() {
        let repo = repo_with(vec![full_row(&expected())]);

        let films = repo.get_all_by_category(&CancellationToken::new(), "Horror").await.unwrap();

        assert_eq!(films, [Film { category: "Horror".to_string(), ..expected() }]);
        assert_eq!(
            log(repo),
            [Transaction::from_sql_and_values(
                DatabaseBackend::Postgres,
                SQL_GET_BY_CATEGORY,
                ["Horror".into()]
            )]
        );
    }

    #[tokio::test]
    async fn filtered_queries_without_rows_are_empty_lists() {
        let cancel = CancellationToken::new();

        assert!(repo_with(vec![]).get_all_by_rating(&cancel, "G").await.unwrap().is_empty());
        assert!(repo_with(vec![]).get_all_by_category(&cancel, "Music").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn undecodable_row_is_a_failure() {
        let mut row = full_row(&expected());
        row.insert("film_id", "not a number".into());
        let repo = repo_with(vec![row]);

        let err = repo.get_all(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, RepositoryError::Failure(_)), "{err}");
    }

    #[tokio::test]
    async fn database_errors_are_failures_not_not_found() {
        let repo = PostgresFilmRepository::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Custom("connection reset".to_string())])
                .into_connection(),
        );

        let err = repo.get_by_id(&CancellationToken::new(), 1).await.unwrap_err();

        assert!(matches!(err, RepositoryError::Failure(_)), "{err}");
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn cancelled_token_never_reaches_the_database() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let repo = repo_with(vec![full_row(&expected())]);
        let results = [
            repo.get_all(&cancel).await.map(|_| ()),
            repo.get_by_id(&cancel, 1).await.map(|_| ()),
            repo.get_all_by_rating(&cancel, "G").await.map(|_| ()),
            repo.get_all_by_category(&cancel, "Horror").await.map(|_| ()),
        ];

        for res in results {
            let err = res.unwrap_err();
            assert!(matches!(err, RepositoryError::Cancelled));
            assert!(err.to_string().contains("context canceled"));
        }
        assert!(log(repo).is_empty());
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_running_query() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let res = cancellable(&cancel, std::future::pending::<Result<(), DbErr>>()).await;

        assert!(matches!(res, Err(RepositoryError::Cancelled)));
    }
}
