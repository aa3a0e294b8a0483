use std::{num::NonZeroUsize, path::PathBuf};

use anyhow::Context;

use crate::pipeline::{Checkpoint, Stage};

#[derive(Clone, Debug)]
pub struct Config {
    pub catalog_path: PathBuf,
    pub mapping_path: PathBuf,
    pub rating_path: PathBuf,
    pub external_metadata_path: PathBuf,
    pub external_rating_path: PathBuf,
    pub database_path: PathBuf,
    pub chunk_size: usize,
    pub workers: usize,
    pub stop_after: Option<Stage>,
    pub confirm_stages: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let path = |key: &str, default: &str| -> PathBuf {
            std::env::var(key).unwrap_or_else(|_| default.to_string()).into()
        };

        let chunk_size: usize = match std::env::var("MERGE_CHUNK_SIZE") {
            Ok(s) => s.parse().context("MERGE_CHUNK_SIZE")?,
            Err(_) => 1000,
        };

        let workers: usize = match std::env::var("MERGE_WORKERS") {
            Ok(s) => s.parse().context("MERGE_WORKERS")?,
            Err(_) => default_workers(),
        };

        let stop_after = std::env::var("STOP_AFTER")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<Stage>())
            .transpose()
            .context("STOP_AFTER")?;

        let confirm_stages = std::env::var("CONFIRM_STAGES")
            .ok()
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            catalog_path: path("CATALOG_PATH", "data/ml-latest-small/movies.csv"),
            mapping_path: path("MAPPING_PATH", "data/ml-latest-small/links.csv"),
            rating_path: path("RATING_PATH", "data/ml-latest-small/ratings.csv"),
            external_metadata_path: path("IMDB_METADATA_PATH", "data/imdb/title.basics.tsv"),
            external_rating_path: path("IMDB_RATING_PATH", "data/imdb/title.ratings.tsv"),
            database_path: path("DATABASE_PATH", "movie_recommender.db"),
            chunk_size: chunk_size.max(1),
            workers: workers.max(1),
            stop_after,
            confirm_stages,
        })
    }

    pub fn database_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.database_path.display())
    }

    /// Like `database_url`, but connecting fails instead of creating a missing file.
    pub fn existing_database_url(&self) -> String {
        format!("sqlite://{}?mode=rw", self.database_path.display())
    }

    /// Interactive confirmation wins over `STOP_AFTER` when both are set.
    pub fn checkpoint(&self) -> Checkpoint {
        if self.confirm_stages {
            Checkpoint::Prompt
        } else if let Some(stage) = self.stop_after {
            Checkpoint::StopAfter(stage)
        } else {
            Checkpoint::Continue
        }
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1)
}
