use movie_import::{
    config::Config,
    db,
    histogram::{DEFAULT_BINS, Histogram},
    store::MovieStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    movie_import::init_tracing();

    let config = Config::from_env()?;
    let store = MovieStore::new(db::connect_reader(&config.existing_database_url()).await?);

    let (imdb, users) = store.rating_columns().await?;
    tracing::debug!(imdb = imdb.len(), users = users.len(), "loaded rating columns");

    println!("{}", Histogram::from_values(&imdb, DEFAULT_BINS).render("IMDb Ratings"));
    println!("{}", Histogram::from_values(&users, DEFAULT_BINS).render("User Ratings"));

    store.close().await?;
    Ok(())
}
