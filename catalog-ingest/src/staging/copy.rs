//! Streaming COPY of one flat file into its staging table

use super::tables::StagingTable;
use catalog_common::Result;
use sqlx::postgres::PgPool;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// Bytes buffered before each COPY message
const CHUNK_BYTES: usize = 1 << 20;

/// Rows between progress log lines
pub const PROGRESS_ROWS: u64 = 1_000_000;

/// Stream `path` into `schema.table` with text-format COPY.
///
/// The file is read line by line into bounded chunks; it is never held in
/// memory as a whole. On any error the COPY is aborted so the connection
/// returns to the pool in a usable state. Returns the rows loaded.
pub async fn copy_file(pool: &PgPool, schema: &str, table: &StagingTable, path: &Path) -> Result<u64> {
    let file = tokio::fs::File::open(path).await?;
    let mut reader = BufReader::with_capacity(CHUNK_BYTES, file);

    let mut conn = pool.acquire().await?;
    let mut copy = conn.copy_in_raw(&table.copy_sql(schema)).await?;

    let mut chunk: Vec<u8> = Vec::with_capacity(CHUNK_BYTES + 4096);
    let mut line: Vec<u8> = Vec::new();
    let mut rows: u64 = 0;

    loop {
        line.clear();
        let read = match reader.read_until(b'\n', &mut line).await {
            Ok(read) => read,
            Err(e) => {
                let _ = copy.abort(format!("read failed: {}", e)).await;
                return Err(e.into());
            }
        };
        if read == 0 {
            break;
        }

        chunk.extend_from_slice(&line);
        if !line.ends_with(b"\n") {
            chunk.push(b'\n');
        }
        rows += 1;

        if chunk.len() >= CHUNK_BYTES {
            let sent = copy.send(chunk.as_slice()).await.map(|_| ());
            if let Err(e) = sent {
                let _ = copy.abort(format!("send failed: {}", e)).await;
                return Err(e.into());
            }
            chunk.clear();
        }

        if rows % PROGRESS_ROWS == 0 {
            info!(table = table.name, rows, "COPY progress");
        }
    }

    if !chunk.is_empty() {
        let sent = copy.send(chunk.as_slice()).await.map(|_| ());
        if let Err(e) = sent {
            let _ = copy.abort(format!("send failed: {}", e)).await;
            return Err(e.into());
        }
    }

    let loaded = copy.finish().await?;
    info!(table = table.name, rows = loaded, "COPY complete");
    Ok(loaded)
}
