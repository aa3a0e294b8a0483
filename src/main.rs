use movie_import::{config::Config, db, pipeline, store::MovieStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    movie_import::init_tracing();

    let config = Config::from_env()?;
    tracing::info!(
        database = %config.database_path.display(),
        workers = config.workers,
        chunk_size = config.chunk_size,
        "starting import"
    );

    let conn = db::connect_and_migrate(&config.database_url()).await?;
    let store = MovieStore::new(conn);

    let report = pipeline::run(&config, &store, &config.checkpoint()).await?;
    match report.stopped_after {
        Some(stage) => tracing::info!(stage = %stage, "import stopped at checkpoint"),
        None => tracing::info!(stages = report.completed.len(), "database created and populated"),
    }

    store.close().await?;
    Ok(())
}
