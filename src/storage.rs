//! On-disk storage for uploaded builds.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<upload_id>/app.ipa | app.apk
//! <root>/<upload_id>/build_info.json
//! <root>/<upload_id>/app_info.json     (first storage version, read-only)
//! <root>/_latest/<bundle_id>           (latest upload id for the bundle)
//! ```

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::build_info::{BuildInfo, LegacyAppInfo, validate_bundle_id};
use crate::error::Error;
use crate::platform::Platform;
use crate::runtime::Runtime;

const BUILD_INFO_FILE: &str = "build_info.json";
const LEGACY_INFO_FILE: &str = "app_info.json";
const LATEST_DIR: &str = "_latest";
const LATEST_TMP_FILE: &str = "latest.tmp";

/// Check an upload id against `[A-Za-z0-9-]+`.
///
/// Ids end up as directory names, so anything else is refused before a
/// path is built from it.
pub fn validate_upload_id(upload_id: &str) -> crate::error::Result<()> {
    let valid = !upload_id.is_empty()
        && upload_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidUploadId(upload_id.to_string()))
    }
}

/// Bundle ids name files under `_latest/`, so `.` and `..` are refused on
/// top of [`validate_bundle_id`].
fn validate_index_name(bundle_id: &str) -> crate::error::Result<()> {
    validate_bundle_id(bundle_id)?;
    if bundle_id.chars().all(|c| c == '.') {
        return Err(Error::InvalidBundleId(bundle_id.to_string()));
    }
    Ok(())
}

/// Repository of uploaded builds rooted at one directory.
pub struct UploadRepository<'a, R: Runtime> {
    runtime: &'a R,
    root: PathBuf,
}

impl<'a, R: Runtime> UploadRepository<'a, R> {
    pub fn new(runtime: &'a R, root: PathBuf) -> Self {
        Self { runtime, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns: `<root>/<upload_id>`
    pub fn upload_dir(&self, upload_id: &str) -> PathBuf {
        self.root.join(upload_id)
    }

    /// Returns: `<root>/_latest/<bundle_id>`
    pub fn latest_path(&self, bundle_id: &str) -> PathBuf {
        self.root.join(LATEST_DIR).join(bundle_id)
    }

    /// Persist the package, its metadata and point the bundle's latest
    /// index at it. A failed save leaves no upload directory behind.
    #[tracing::instrument(
        skip(self, build_info, app_file),
        fields(upload_id = %build_info.upload_id)
    )]
    pub fn save_upload(&self, build_info: &BuildInfo, app_file: &[u8]) -> Result<()> {
        validate_upload_id(&build_info.upload_id)?;
        validate_index_name(&build_info.bundle_id)?;

        let upload_dir = self.upload_dir(&build_info.upload_id);
        self.runtime.create_dir_all(&upload_dir)?;

        if let Err(e) = self.write_upload(build_info, app_file, &upload_dir) {
            if let Err(cleanup) = self.runtime.remove_dir_all(&upload_dir) {
                warn!("Failed to remove {:?}: {:#}", upload_dir, cleanup);
            }
            return Err(e);
        }

        info!(
            "Saved {} build {} ({} {})",
            build_info.platform.display_name(),
            build_info.upload_id,
            build_info.bundle_id,
            build_info.bundle_version
        );
        Ok(())
    }

    fn write_upload(
        &self,
        build_info: &BuildInfo,
        app_file: &[u8],
        upload_dir: &Path,
    ) -> Result<()> {
        let app_path = upload_dir.join(build_info.platform.app_file_name());
        self.runtime
            .write(&app_path, app_file)
            .with_context(|| format!("Failed to save package to {:?}", app_path))?;

        let info_path = upload_dir.join(BUILD_INFO_FILE);
        let content = serde_json::to_string_pretty(build_info).map_err(Error::from)?;
        self.runtime
            .write(&info_path, content.as_bytes())
            .with_context(|| format!("Failed to save build info to {:?}", info_path))?;

        self.set_latest_upload_id(&build_info.bundle_id, &build_info.upload_id, upload_dir)
    }

    /// Load the metadata of an upload, migrating first-version records.
    #[tracing::instrument(skip(self))]
    pub fn load_build_info(&self, upload_id: &str) -> Result<BuildInfo> {
        validate_upload_id(upload_id)?;
        let upload_dir = self.upload_dir(upload_id);

        let info_path = upload_dir.join(BUILD_INFO_FILE);
        if self.runtime.exists(&info_path) {
            let content = self.runtime.read_to_string(&info_path)?;
            let build_info: BuildInfo = serde_json::from_str(&content)
                .map_err(Error::from)
                .with_context(|| format!("Failed to parse {:?}", info_path))?;
            return Ok(build_info);
        }

        let legacy_path = upload_dir.join(LEGACY_INFO_FILE);
        if self.runtime.exists(&legacy_path) {
            debug!("Migrating legacy record {:?}", legacy_path);
            let content = self.runtime.read_to_string(&legacy_path)?;
            let legacy: LegacyAppInfo = serde_json::from_str(&content)
                .map_err(Error::from)
                .with_context(|| format!("Failed to parse {:?}", legacy_path))?;
            let file_size = self
                .runtime
                .file_size(&upload_dir.join(Platform::Ios.app_file_name()))?;
            return Ok(BuildInfo::from_legacy(upload_id, legacy, file_size));
        }

        Err(Error::NotFound(format!("upload {}", upload_id)).into())
    }

    /// The platform whose package file is present for the upload.
    #[tracing::instrument(skip(self))]
    pub fn get_upload_asserted_platform(&self, upload_id: &str) -> Result<Platform> {
        validate_upload_id(upload_id)?;
        let upload_dir = self.upload_dir(upload_id);

        Platform::ALL
            .into_iter()
            .find(|p| self.runtime.is_file(&upload_dir.join(p.app_file_name())))
            .ok_or_else(|| Error::NotFound(format!("package for upload {}", upload_id)).into())
    }

    /// Path of the stored package file for the upload.
    pub fn app_file_path(&self, upload_id: &str) -> Result<PathBuf> {
        let platform = self.get_upload_asserted_platform(upload_id)?;
        Ok(self.upload_dir(upload_id).join(platform.app_file_name()))
    }

    /// The most recent upload for a bundle id, if any.
    #[tracing::instrument(skip(self))]
    pub fn get_latest_upload_id_by_bundle_id(&self, bundle_id: &str) -> Result<Option<String>> {
        validate_index_name(bundle_id)?;

        let latest_path = self.latest_path(bundle_id);
        if !self.runtime.exists(&latest_path) {
            return Ok(None);
        }
        let upload_id = self.runtime.read_to_string(&latest_path)?;
        let upload_id = upload_id.trim();
        if upload_id.is_empty() {
            return Ok(None);
        }
        Ok(Some(upload_id.to_string()))
    }

    fn set_latest_upload_id(
        &self,
        bundle_id: &str,
        upload_id: &str,
        upload_dir: &Path,
    ) -> Result<()> {
        let latest_path = self.latest_path(bundle_id);
        if let Some(parent) = latest_path.parent()
            && !self.runtime.exists(parent)
        {
            self.runtime.create_dir_all(parent)?;
        }

        // Readers never observe a half-written id
        let tmp_path = upload_dir.join(LATEST_TMP_FILE);
        self.runtime.write(&tmp_path, upload_id.as_bytes())?;
        self.runtime
            .rename(&tmp_path, &latest_path)
            .with_context(|| format!("Failed to update {:?}", latest_path))
    }
}
