use std::path::Path;

use anyhow::Context;
use futures::{Stream, stream};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};

use crate::error::{AppError, AppResult};

/// Streams the data lines of `path` in batches of `chunk_size`, skipping the header.
///
/// Only the last batch may be short. An empty or header-only file yields nothing.
pub async fn read_chunks(
    path: &Path,
    chunk_size: usize,
) -> AppResult<impl Stream<Item = AppResult<Vec<String>>>> {
    let file = File::open(path).await.with_context(|| format!("opening {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    lines.next_line().await.with_context(|| format!("reading header of {}", path.display()))?;

    let chunk_size = chunk_size.max(1);

    Ok(stream::try_unfold(lines, move |mut lines| async move {
        let mut chunk = Vec::with_capacity(chunk_size);
        while chunk.len() < chunk_size {
            match lines.next_line().await? {
                Some(line) => chunk.push(line),
                None => break,
            }
        }
        if chunk.is_empty() {
            return Ok::<_, AppError>(None);
        }
        Ok(Some((chunk, lines)))
    }))
}
