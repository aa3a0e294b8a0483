use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::error::AppResult;

/// One row of the catalog file: `movieId,title,genres`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CatalogRow {
    pub movie_id: i32,
    pub title: String,
    pub genres: String,
}

/// One row of the id mapping file: `movieId,imdbId`. Any trailing columns are ignored.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LinkRow {
    pub movie_id: i32,
    pub imdb_id: i64,
}

/// One row of the ratings file: `userId,movieId,rating,timestamp`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RatingRow {
    pub user_id: i32,
    pub movie_id: i32,
    pub rating: f64,
    pub timestamp: i64,
}

pub async fn read_catalog(path: &Path) -> AppResult<Vec<CatalogRow>> {
    read_csv(path).await
}

pub async fn read_links(path: &Path) -> AppResult<Vec<LinkRow>> {
    read_csv(path).await
}

pub async fn read_ratings(path: &Path) -> AppResult<Vec<RatingRow>> {
    read_csv(path).await
}

/// Reads every record of a headed CSV file, mapping columns by position.
async fn read_csv<T>(path: &Path) -> AppResult<Vec<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_csv_blocking(&path)).await?
}

fn read_csv_blocking<T: DeserializeOwned>(path: &Path) -> AppResult<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut out = Vec::new();
    for (index, record) in reader.records().enumerate() {
        // header is line 1
        let line = index + 2;
        let record = record.with_context(|| format!("{}:{line}", path.display()))?;
        let row = record
            .deserialize(None)
            .with_context(|| format!("{}:{line}: malformed row {record:?}", path.display()))?;
        out.push(row);
    }

    debug!(path = %path.display(), rows = out.len(), "read csv");
    Ok(out)
}
