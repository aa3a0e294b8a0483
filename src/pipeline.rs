use std::{
    fmt,
    str::FromStr,
    time::{Duration, Instant},
};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tracing::info;

use crate::{
    config::Config,
    error::AppResult,
    imdb::MergeKind,
    merge::{self, MergeOptions, MergeReport},
    sources,
    store::MovieStore,
};

/// The answer that lets an interactive run go on; anything else stops it.
pub const CONTINUE_SENTINEL: &str = "y";

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Stage {
    Catalog,
    Links,
    Ratings,
    ImdbRatings,
    ImdbMetadata,
}

impl Stage {
    pub const ALL: [Stage; 5] =
        [Stage::Catalog, Stage::Links, Stage::Ratings, Stage::ImdbRatings, Stage::ImdbMetadata];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Catalog => "catalog",
            Stage::Links => "links",
            Stage::Ratings => "ratings",
            Stage::ImdbRatings => "imdb-ratings",
            Stage::ImdbMetadata => "imdb-metadata",
        }
    }

    /// Whether a checkpoint follows this stage. The catalog is always linked
    /// straight away and nothing follows the last stage.
    pub fn is_checkpoint(self) -> bool {
        !matches!(self, Stage::Catalog | Stage::ImdbMetadata)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == normalized)
            .ok_or_else(|| anyhow::anyhow!("unknown stage {s:?}"))
    }
}

/// Decides at each checkpoint whether the pipeline goes on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Checkpoint {
    Continue,
    /// Stops at the first checkpoint at or after the given stage.
    StopAfter(Stage),
    /// Asks on the terminal.
    Prompt,
}

impl Checkpoint {
    /// `answers` is read only by `Prompt`, one line per checkpoint. The same reader
    /// must be passed to every call so lines it has buffered are not lost.
    pub async fn proceed<R>(
        &self,
        finished: &StageReport,
        answers: &mut Lines<R>,
    ) -> AppResult<bool>
    where
        R: AsyncBufRead + Unpin,
    {
        match self {
            Checkpoint::Continue => Ok(true),
            Checkpoint::StopAfter(stage) => Ok(finished.stage < *stage),
            Checkpoint::Prompt => prompt(finished.stage, answers).await,
        }
    }
}

async fn prompt<R>(stage: Stage, answers: &mut Lines<R>) -> AppResult<bool>
where
    R: AsyncBufRead + Unpin,
{
    let question = format!("{stage} done, continue? ({CONTINUE_SENTINEL} to continue) ");
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;

    let answer = answers.next_line().await?;
    Ok(is_continue(answer.as_deref()))
}

fn is_continue(answer: Option<&str>) -> bool {
    answer.is_some_and(|a| a.trim() == CONTINUE_SENTINEL)
}

#[derive(Clone, Debug, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    pub rows: usize,
    pub merge: Option<MergeReport>,
    pub elapsed: Duration,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineReport {
    pub completed: Vec<StageReport>,
    /// Set when a checkpoint ended the run before the last stage.
    pub stopped_after: Option<Stage>,
}

pub async fn run_stage(
    stage: Stage,
    config: &Config,
    store: &MovieStore,
) -> AppResult<StageReport> {
    let start = Instant::now();

    let mut merge = None;
    let rows = match stage {
        Stage::Catalog => {
            let rows = sources::read_catalog(&config.catalog_path).await?;
            store.insert_movies(&rows).await?
        },
        Stage::Links => {
            let links = sources::read_links(&config.mapping_path).await?;
            store.set_imdb_ids(&links).await?
        },
        Stage::Ratings => {
            let rows = sources::read_ratings(&config.rating_path).await?;
            store.insert_ratings(&rows).await?
        },
        Stage::ImdbRatings | Stage::ImdbMetadata => {
            let (path, kind) = if stage == Stage::ImdbRatings {
                (&config.external_rating_path, MergeKind::Ratings)
            } else {
                (&config.external_metadata_path, MergeKind::Metadata)
            };
            let report = merge::merge_file(
                store,
                &config.database_url(),
                path,
                kind,
                MergeOptions::from(config),
            )
            .await?;
            merge = Some(report);
            report.updated
        },
    };

    let report = StageReport { stage, rows, merge, elapsed: start.elapsed() };
    info!(
        stage = %stage,
        rows,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "stage complete"
    );
    Ok(report)
}

/// Runs every stage in order against a fresh store, taking prompt answers from stdin.
///
/// Not idempotent: a second run fails on the movies primary key.
pub async fn run(
    config: &Config,
    store: &MovieStore,
    checkpoint: &Checkpoint,
) -> AppResult<PipelineReport> {
    let mut answers = BufReader::new(tokio::io::stdin()).lines();
    run_with_answers(config, store, checkpoint, &mut answers).await
}

pub async fn run_with_answers<R>(
    config: &Config,
    store: &MovieStore,
    checkpoint: &Checkpoint,
    answers: &mut Lines<R>,
) -> AppResult<PipelineReport>
where
    R: AsyncBufRead + Unpin,
{
    let mut report = PipelineReport::default();

    for stage in Stage::ALL {
        let done = run_stage(stage, config, store).await?;
        let pause = stage.is_checkpoint();
        let proceed = !pause || checkpoint.proceed(&done, answers).await?;
        report.completed.push(done);

        if !proceed {
            info!(stage = %stage, "stopping at checkpoint");
            report.stopped_after = Some(stage);
            break;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::store::tests::temp_store;

    fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn fixture_config(dir: &Path) -> Config {
        Config {
            catalog_path: write(
                dir,
                "movies.csv",
                "movieId,title,genres\n1,A,Comedy\n2,B,Drama\n",
            ),
            mapping_path: write(dir, "links.csv", "movieId,imdbId,tmdbId\n1,101,\n"),
            rating_path: write(
                dir,
                "ratings.csv",
                "userId,movieId,rating,timestamp\n1,1,4.0,964982703\n2,2,3.5,964982224\n",
            ),
            external_metadata_path: write(
                dir,
                "title.basics.tsv",
                "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\t\
                 startYear\tendYear\truntimeMinutes\tgenres\n\
                 tt000101\tmovie\tA\tA\t0\t1995\t\\N\t95\tComedy\n",
            ),
            external_rating_path: write(
                dir,
                "title.ratings.tsv",
                "tconst\taverageRating\tnumVotes\ntt000101\t7.3\t1500\ntt000777\t2.0\t4\n",
            ),
            database_path: dir.join("store.db"),
            chunk_size: 1000,
            workers: 2,
            stop_after: None,
            confirm_stages: false,
        }
    }

    #[test]
    fn stage_names_round_trip() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
        assert_eq!("IMDB_RATINGS".parse::<Stage>().unwrap(), Stage::ImdbRatings);
        assert!("everything".parse::<Stage>().is_err());
    }

    #[test]
    fn only_the_sentinel_continues() {
        assert!(is_continue(Some("y")));
        assert!(is_continue(Some(" y ")));
        assert!(!is_continue(Some("n")));
        assert!(!is_continue(Some("yes")));
        assert!(!is_continue(Some("")));
        assert!(!is_continue(None));
    }

    #[tokio::test]
    async fn full_run_merges_matched_movies_only() {
        let (dir, _url, store) = temp_store().await;
        let config = fixture_config(dir.path());

        let report = run(&config, &store, &Checkpoint::Continue).await.unwrap();

        assert_eq!(report.stopped_after, None);
        let stages: Vec<Stage> = report.completed.iter().map(|r| r.stage).collect();
        assert_eq!(stages, Stage::ALL);
        assert_eq!(report.completed[1].rows, 1);
        assert_eq!(report.completed[2].rows, 2);

        let matched = store.movie(1).await.unwrap().unwrap();
        assert_eq!(matched.imdb_id, Some(101));
        assert_eq!(matched.is_adult, Some(false));
        assert_eq!(matched.runtime_min, Some(95));
        assert_eq!(matched.avg_rating_imdb, Some(7.3));
        assert_eq!(matched.num_votes_imdb, Some(1500));

        let unmatched = store.movie(2).await.unwrap().unwrap();
        assert_eq!(unmatched.title, "B");
        assert_eq!(unmatched.imdb_id, None);
        assert_eq!(unmatched.is_adult, None);
        assert_eq!(unmatched.runtime_min, None);
        assert_eq!(unmatched.avg_rating_imdb, None);
    }

    #[tokio::test]
    async fn stop_after_halts_at_the_next_checkpoint() {
        let (dir, _url, store) = temp_store().await;
        let config = fixture_config(dir.path());

        let report =
            run(&config, &store, &Checkpoint::StopAfter(Stage::Catalog)).await.unwrap();

        assert_eq!(report.stopped_after, Some(Stage::Links));
        assert_eq!(report.completed.len(), 2);
        assert_eq!(store.movie(1).await.unwrap().unwrap().imdb_id, Some(101));
        assert_eq!(store.rating_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stop_after_ratings_skips_merges() {
        let (dir, _url, store) = temp_store().await;
        let config = fixture_config(dir.path());

        let report =
            run(&config, &store, &Checkpoint::StopAfter(Stage::Ratings)).await.unwrap();

        assert_eq!(report.stopped_after, Some(Stage::Ratings));
        assert_eq!(store.rating_count().await.unwrap(), 2);
        assert_eq!(store.movie(1).await.unwrap().unwrap().avg_rating_imdb, None);
    }

    fn report(stage: Stage) -> StageReport {
        StageReport { stage, rows: 0, merge: None, elapsed: Duration::ZERO }
    }

    #[tokio::test]
    async fn prompt_reads_one_answer_per_checkpoint_from_a_shared_reader() {
        let mut answers = BufReader::new(&b"y\ny\ny\n"[..]).lines();

        for stage in [Stage::Links, Stage::Ratings, Stage::ImdbRatings] {
            let proceed = Checkpoint::Prompt.proceed(&report(stage), &mut answers).await.unwrap();
            assert!(proceed, "{stage} should continue");
        }
        // input exhausted
        let proceed =
            Checkpoint::Prompt.proceed(&report(Stage::ImdbRatings), &mut answers).await.unwrap();
        assert!(!proceed);
    }

    #[tokio::test]
    async fn prompted_run_stops_at_the_first_refusal() {
        let (dir, _url, store) = temp_store().await;
        let config = fixture_config(dir.path());
        let mut answers = BufReader::new(&b"y\nn\n"[..]).lines();

        let report =
            run_with_answers(&config, &store, &Checkpoint::Prompt, &mut answers).await.unwrap();

        assert_eq!(report.stopped_after, Some(Stage::Ratings));
        let stages: Vec<Stage> = report.completed.iter().map(|r| r.stage).collect();
        assert_eq!(stages, [Stage::Catalog, Stage::Links, Stage::Ratings]);
        assert_eq!(store.rating_count().await.unwrap(), 2);
        assert_eq!(store.movie(1).await.unwrap().unwrap().avg_rating_imdb, None);
    }

    #[tokio::test]
    async fn rerun_against_populated_store_fails() {
        let (dir, _url, store) = temp_store().await;
        let config = fixture_config(dir.path());

        run(&config, &store, &Checkpoint::Continue).await.unwrap();
        assert!(run(&config, &store, &Checkpoint::Continue).await.is_err());
    }
}
