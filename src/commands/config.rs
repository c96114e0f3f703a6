use anyhow::Result;
use std::path::PathBuf;

use crate::runtime::Runtime;
use crate::storage::UploadRepository;

use super::paths::storage_root;

/// Default public address install links are built from
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

pub struct Config<R: Runtime> {
    pub runtime: R,
    pub root: PathBuf,
    pub base_url: String,
}

impl<R: Runtime> Config<R> {
    pub fn new(runtime: R, root: Option<PathBuf>, base_url: Option<String>) -> Result<Self> {
        let root = storage_root(&runtime, root)?;
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self {
            runtime,
            root,
            base_url,
        })
    }

    pub fn repository(&self) -> UploadRepository<'_, R> {
        UploadRepository::new(&self.runtime, self.root.clone())
    }
}
