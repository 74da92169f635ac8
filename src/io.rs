use std::path::Path;
use anyhow::{bail, Context};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

/// Reads a whole file into memory, failing if it does not exist.
pub async fn read_io_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<u8>> {
    let path = path.as_ref();
    if !path.exists() {
        bail!("Tried to read nonexistent file `{}`!", path.display())
    }
    let file = File::open(path)
        .await
        .with_context(|| format!("could not open `{}`", path.display()))?;
    let mut bytes = Vec::new();
    BufReader::new(file).read_to_end(&mut bytes).await?;
    Ok(bytes)
}
