use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use crate::runtime::Runtime;

/// Resolve the storage root, falling back to [`default_storage_root`]
#[tracing::instrument(skip(runtime))]
pub fn storage_root<R: Runtime>(runtime: &R, root: Option<PathBuf>) -> Result<PathBuf> {
    let root = match root {
        Some(path) => path,
        None => default_storage_root(runtime)?,
    };
    info!("Using storage root: {}", root.display());
    Ok(root)
}

/// `<data_dir>/appdist`
#[tracing::instrument(skip(runtime))]
pub fn default_storage_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    let data_dir = runtime
        .data_dir()
        .context("Could not find data directory; pass --root")?;
    Ok(data_dir.join("appdist"))
}
