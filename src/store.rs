use std::collections::HashSet;

use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
    sea_query::Expr,
};

use crate::{
    entities::{movie, rating},
    error::AppResult,
    imdb::MergeUpdate,
    sources::{CatalogRow, LinkRow, RatingRow},
};

/// Rows per multi-row INSERT; keeps bound parameters well under SQLite's limit.
const INSERT_CHUNK: usize = 500;
/// Ids per `IN (...)` lookup.
const LOOKUP_CHUNK: usize = 500;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ApplyOutcome {
    /// Rows the UPDATE statements actually changed.
    pub updated: usize,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct MovieStore {
    db: DatabaseConnection,
}

impl MovieStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn close(self) -> AppResult<()> {
        Ok(self.db.close().await?)
    }

    /// Inserts catalog rows with no external id. Fails on an existing `movie_id`.
    pub async fn insert_movies(&self, rows: &[CatalogRow]) -> AppResult<usize> {
        let txn = self.db.begin().await?;

        for chunk in rows.chunks(INSERT_CHUNK) {
            let models = chunk.iter().map(|row| movie::ActiveModel {
                movie_id: Set(row.movie_id),
                title: Set(row.title.clone()),
                genres: Set(row.genres.clone()),
                ..Default::default()
            });
            movie::Entity::insert_many(models).exec_without_returning(&txn).await?;
        }

        txn.commit().await?;
        Ok(rows.len())
    }

    /// Sets `imdb_id` by primary key. Returns the number of movies that matched.
    pub async fn set_imdb_ids(&self, links: &[LinkRow]) -> AppResult<usize> {
        let txn = self.db.begin().await?;

        let mut matched = 0;
        for link in links {
            let res = movie::Entity::update_many()
                .col_expr(movie::Column::ImdbId, Expr::value(link.imdb_id))
                .filter(movie::Column::MovieId.eq(link.movie_id))
                .exec(&txn)
                .await?;
            matched += res.rows_affected as usize;
        }

        txn.commit().await?;
        Ok(matched)
    }

    pub async fn insert_ratings(&self, rows: &[RatingRow]) -> AppResult<usize> {
        let txn = self.db.begin().await?;

        for chunk in rows.chunks(INSERT_CHUNK) {
            let models = chunk.iter().map(|row| rating::ActiveModel {
                id: Default::default(),
                user_id: Set(row.user_id),
                movie_id: Set(row.movie_id),
                rating: Set(row.rating),
                timestamp: Set(row.timestamp),
            });
            rating::Entity::insert_many(models).exec_without_returning(&txn).await?;
        }

        txn.commit().await?;
        Ok(rows.len())
    }

    /// Returns the subset of `ids` present in the external id column.
    pub async fn existing_imdb_ids(&self, ids: &[i64]) -> AppResult<HashSet<i64>> {
        let mut found = HashSet::with_capacity(ids.len());
        for chunk in ids.chunks(LOOKUP_CHUNK) {
            let rows: Vec<Option<i64>> = movie::Entity::find()
                .select_only()
                .column(movie::Column::ImdbId)
                .filter(movie::Column::ImdbId.is_in(chunk.iter().copied()))
                .into_tuple()
                .all(&self.db)
                .await?;
            found.extend(rows.into_iter().flatten());
        }
        Ok(found)
    }

    /// Writes one batch of merge updates in a single transaction.
    ///
    /// Rows with every field absent are skipped; otherwise both columns are written,
    /// so an absent field clears whatever was stored before.
    pub async fn apply_updates(&self, updates: &[MergeUpdate]) -> AppResult<ApplyOutcome> {
        let txn = self.db.begin().await?;

        let mut outcome = ApplyOutcome::default();
        for update in updates {
            if update.is_empty() {
                outcome.skipped += 1;
                continue;
            }
            let stmt = match *update {
                MergeUpdate::Ratings { avg_rating, num_votes, .. } => movie::Entity::update_many()
                    .col_expr(movie::Column::AvgRatingImdb, Expr::value(avg_rating))
                    .col_expr(movie::Column::NumVotesImdb, Expr::value(num_votes)),
                MergeUpdate::Metadata { is_adult, runtime_min, .. } => movie::Entity::update_many()
                    .col_expr(movie::Column::IsAdult, Expr::value(is_adult))
                    .col_expr(movie::Column::RuntimeMin, Expr::value(runtime_min)),
            };
            let res = stmt.filter(movie::Column::ImdbId.eq(update.imdb_id())).exec(&txn).await?;
            outcome.updated += res.rows_affected as usize;
        }

        txn.commit().await?;
        Ok(outcome)
    }

    pub async fn movie(&self, movie_id: i32) -> AppResult<Option<movie::Model>> {
        Ok(movie::Entity::find_by_id(movie_id).one(&self.db).await?)
    }

    pub async fn rating_count(&self) -> AppResult<u64> {
        Ok(rating::Entity::find().count(&self.db).await?)
    }

    /// Non-null `(avg_rating_imdb, avg_rating_users)` columns, in that order.
    pub async fn rating_columns(&self) -> AppResult<(Vec<f64>, Vec<f64>)> {
        let rows: Vec<(Option<f64>, Option<f64>)> = movie::Entity::find()
            .select_only()
            .column(movie::Column::AvgRatingImdb)
            .column(movie::Column::AvgRatingUsers)
            .into_tuple()
            .all(&self.db)
            .await?;

        let imdb = rows.iter().filter_map(|(imdb, _)| *imdb).collect();
        let users = rows.iter().filter_map(|(_, users)| *users).collect();
        Ok((imdb, users))
    }
}
