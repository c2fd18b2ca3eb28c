use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

/// Read up to the last `max_chars` bytes of the file at `path`. Log-read
/// errors are non-fatal to the coordinator: on any failure this returns an
/// empty string and the caller proceeds as if the tail were unreadable.
pub async fn tail(path: &Path, max_chars: usize) -> String {
    match tail_inner(path, max_chars).await {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "log tail read failed, continuing with empty tail");
            String::new()
        }
    }
}

async fn tail_inner(path: &Path, max_chars: usize) -> std::io::Result<String> {
    let mut file = File::open(path).await?;
    let len = file.metadata().await?.len();
    let start = len.saturating_sub(max_chars as u64);
    file.seek(SeekFrom::Start(start)).await?;
    let mut buf = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
