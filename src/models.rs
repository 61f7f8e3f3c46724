use serde::{Deserialize, Serialize};

/// One catalog item.
///
/// `category` is only filled in by category-filtered lookups; unfiltered
/// listings leave it empty. Zero-valued fields are left out of the JSON form.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Film {
    pub film_id: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub release_year: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rating: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

/// Query-string filters accepted by `GET /v1/films`.
#[derive(Debug, Default, Deserialize)]
pub struct FilmQuery {
    pub rating: Option<String>,
    pub category: Option<String>,
}
