pub mod chunks;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod histogram;
pub mod imdb;
pub mod merge;
pub mod pipeline;
pub mod sources;
pub mod store;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,movie_import=debug,sqlx=warn".to_string()),
        )
        .init();
}
