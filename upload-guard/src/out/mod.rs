use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Reads a JSON document from `path`, or from stdin when `path` is `-`.
pub async fn read_document(path: &Path) -> Result<serde_json::Value> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await.context("reading stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?
    };
    serde_json::from_str(&raw).context("input is not valid JSON")
}

/// Writes the invocation result to stdout; logs go to stderr.
pub fn emit_stdout<T: Serialize>(result: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
