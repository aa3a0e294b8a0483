use std::{
    path::Path,
    time::{Duration, Instant},
};

use futures::TryStreamExt;
use tracing::{debug, info};

use crate::{
    chunks::read_chunks,
    config::Config,
    db,
    error::{AppError, AppResult},
    imdb::{MergeKind, MergeUpdate, parse_imdb_id},
    store::MovieStore,
};

#[derive(Clone, Copy, Debug)]
pub struct MergeOptions {
    pub chunk_size: usize,
    pub workers: usize,
}

impl From<&Config> for MergeOptions {
    fn from(config: &Config) -> Self {
        Self { chunk_size: config.chunk_size, workers: config.workers }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MergeReport {
    pub batches: usize,
    pub lines: usize,
    pub matched: usize,
    pub updated: usize,
    pub skipped: usize,
    pub elapsed: Duration,
}

/// Keeps the rows of one batch whose external id is already on a movie.
///
/// Opens a private read connection; nothing is written. Only kept rows have their
/// value columns parsed.
pub async fn filter_batch(
    database_url: &str,
    kind: MergeKind,
    lines: &[String],
) -> AppResult<Vec<MergeUpdate>> {
    let ids = lines.iter().map(|line| parse_imdb_id(line)).collect::<Result<Vec<_>, _>>()?;

    let reader = MovieStore::new(db::connect_reader(database_url).await?);
    let present = reader.existing_imdb_ids(&ids).await;
    reader.close().await?;
    let present = present?;

    let mut out = Vec::with_capacity(present.len());
    for (line, imdb_id) in lines.iter().zip(ids) {
        if present.contains(&imdb_id) {
            out.push(kind.parse_update(imdb_id, line)?);
        }
    }
    Ok(out)
}

/// Merges one external TSV file into the movie table.
///
/// Batches are filtered by up to `options.workers` spawned tasks while the
/// previous batch is being written. Results are consumed in file order and each
/// batch is written in its own transaction, so the last row for an id wins.
pub async fn merge_file(
    store: &MovieStore,
    database_url: &str,
    path: &Path,
    kind: MergeKind,
    options: MergeOptions,
) -> AppResult<MergeReport> {
    let start = Instant::now();
    let workers = options.workers.max(1);

    info!(
        kind = kind.as_str(),
        path = %path.display(),
        workers,
        chunk_size = options.chunk_size,
        "starting merge"
    );

    let batches = read_chunks(path, options.chunk_size).await?;
    let filtered = batches
        .map_ok(|lines| {
            let database_url = database_url.to_string();
            async move {
                let count = lines.len();
                let updates =
                    tokio::spawn(async move { filter_batch(&database_url, kind, &lines).await })
                        .await??;
                Ok::<_, AppError>((count, updates))
            }
        })
        .try_buffered(workers);
    let mut filtered = std::pin::pin!(filtered);

    let mut report = MergeReport::default();
    while let Some((count, updates)) = filtered.try_next().await? {
        let outcome = store.apply_updates(&updates).await?;

        report.batches += 1;
        report.lines += count;
        report.matched += updates.len();
        report.updated += outcome.updated;
        report.skipped += outcome.skipped;

        debug!(
            kind = kind.as_str(),
            batch = report.batches,
            lines = report.lines,
            matched = report.matched,
            "flushed batch"
        );
    }

    report.elapsed = start.elapsed();
    info!(
        kind = kind.as_str(),
        lines = report.lines,
        matched = report.matched,
        updated = report.updated,
        skipped = report.skipped,
        elapsed_s = format!("{:.2}", report.elapsed.as_secs_f64()),
        "finished merge"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::store::tests::{catalog, link, temp_store};

    const BASICS_HEADER: &str = "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\t\
                                 startYear\tendYear\truntimeMinutes\tgenres";

    fn basics(imdb_id: i64, is_adult: &str, runtime: &str) -> String {
        format!("tt{imdb_id:07}\tmovie\tT\tT\t{is_adult}\t1999\t\\N\t{runtime}\tDrama")
    }

    fn write_tsv(dir: &Path, name: &str, header: &str, lines: &[String]) -> PathBuf {
        let path = dir.join(name);
        let mut contents = format!("{header}\n");
        for line in lines {
            contents.push_str(line);
            contents.push('\n');
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    async fn seeded() -> (tempfile::TempDir, String, MovieStore) {
        let (dir, url, store) = temp_store().await;
        store
            .insert_movies(&catalog(&[(1, "A", "Comedy"), (2, "B", "Drama"), (3, "C", "Horror")]))
            .await
            .unwrap();
        store.set_imdb_ids(&[link(1, 101), link(2, 202)]).await.unwrap();
        (dir, url, store)
    }

    #[tokio::test]
    async fn filter_keeps_only_known_ids() {
        let (_dir, url, _store) = seeded().await;
        let lines = vec![
            "tt0000101\t7.1\t10".to_string(),
            "tt0000303\t5.0\t3".to_string(),
            "tt0000202\t6.4\t99".to_string(),
            // unmatched rows are never field-parsed
            "tt0000404\tbogus\tbogus".to_string(),
        ];

        let kept = filter_batch(&url, MergeKind::Ratings, &lines).await.unwrap();

        assert_eq!(
            kept,
            vec![
                MergeUpdate::Ratings { imdb_id: 101, avg_rating: Some(7.1), num_votes: Some(10) },
                MergeUpdate::Ratings { imdb_id: 202, avg_rating: Some(6.4), num_votes: Some(99) },
            ]
        );
    }

    #[tokio::test]
    async fn filter_fails_on_bad_identifier() {
        let (_dir, url, _store) = seeded().await;
        let lines = vec!["tt0000101\t7.1\t10".to_string(), "ttXYZ\t1.0\t1".to_string()];
        assert!(filter_batch(&url, MergeKind::Ratings, &lines).await.is_err());
    }

    #[tokio::test]
    async fn metadata_merge_respects_null_rules() {
        let (dir, url, store) = seeded().await;
        store
            .apply_updates(&[MergeUpdate::Metadata {
                imdb_id: 202,
                is_adult: Some(false),
                runtime_min: Some(120),
            }])
            .await
            .unwrap();

        let path = write_tsv(
            dir.path(),
            "title.basics.tsv",
            BASICS_HEADER,
            &[basics(101, "\\N", "\\N"), basics(202, "1", "\\N"), basics(9999, "0", "90")],
        );

        let report = merge_file(
            &store,
            &url,
            &path,
            MergeKind::Metadata,
            MergeOptions { chunk_size: 2, workers: 2 },
        )
        .await
        .unwrap();

        assert_eq!((report.batches, report.lines, report.matched), (2, 3, 2));
        assert_eq!((report.updated, report.skipped), (1, 1));

        let untouched = store.movie(1).await.unwrap().unwrap();
        assert_eq!((untouched.is_adult, untouched.runtime_min), (None, None));

        let partial = store.movie(2).await.unwrap().unwrap();
        assert_eq!((partial.is_adult, partial.runtime_min), (Some(true), None));
    }

    #[tokio::test]
    async fn later_rows_win_across_batches() {
        let (dir, url, store) = seeded().await;
        let lines: Vec<String> =
            (1..=40).map(|votes| format!("tt0000101\t5.5\t{votes}")).collect();
        let path =
            write_tsv(dir.path(), "title.ratings.tsv", "tconst\taverageRating\tnumVotes", &lines);

        let report = merge_file(
            &store,
            &url,
            &path,
            MergeKind::Ratings,
            MergeOptions { chunk_size: 3, workers: 4 },
        )
        .await
        .unwrap();

        assert_eq!(report.batches, 14);
        assert_eq!(report.updated, 40);
        let movie = store.movie(1).await.unwrap().unwrap();
        assert_eq!(movie.num_votes_imdb, Some(40));
        assert_eq!(movie.avg_rating_imdb, Some(5.5));
    }

    #[tokio::test]
    async fn missing_file_aborts_merge() {
        let (dir, url, store) = seeded().await;
        let path = dir.path().join("absent.tsv");
        let options = MergeOptions { chunk_size: 10, workers: 1 };
        assert!(merge_file(&store, &url, &path, MergeKind::Ratings, options).await.is_err());
    }
}
