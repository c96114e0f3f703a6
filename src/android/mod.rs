//! Build info extraction for Android `.apk` packages.
//!
//! The package is written to a scoped temporary directory and handed to a
//! [`PackageReader`]. The directory is removed on every exit path.
//!
//! # Structure
//!
//! - `reader` - The [`PackageReader`] seam and its [`ApkReader`] implementation
//! - `axml` - Binary XML manifest decoding
//! - `arsc` - Resource table lookups for `@string/...` references
//! - `chunk` - Chunk framing and string pools shared by both formats

pub mod arsc;
pub mod axml;
mod chunk;
mod reader;

#[cfg(test)]
pub(crate) mod test_support;

use log::{debug, warn};
use std::fs;

use crate::build_info::{BuildInfo, PackageIdentity};
use crate::error::{Error, Result};
use crate::platform::Platform;

pub use reader::{ApkReader, PackageReader};

#[cfg(test)]
pub use reader::MockPackageReader;

pub fn get_build_info_from_apk(
    upload_id: &str,
    apk_file: &[u8],
    changelog_file: Option<&[u8]>,
    web: Option<String>,
) -> Result<BuildInfo> {
    get_build_info_from_apk_with(&ApkReader, upload_id, apk_file, changelog_file, web)
}

/// Same as [`get_build_info_from_apk`] with an explicit package reader
pub fn get_build_info_from_apk_with<P: PackageReader>(
    reader: &P,
    upload_id: &str,
    apk_file: &[u8],
    changelog_file: Option<&[u8]>,
    web: Option<String>,
) -> Result<BuildInfo> {
    debug!("Extracting build info from {:?}", upload_id);

    let tempdir = tempfile::Builder::new()
        .prefix("appdist-apk-")
        .tempdir()
        .map_err(|e| Error::io("creating temporary directory", e))?;
    let file_path = tempdir.path().join(Platform::Android.app_file_name());

    let identity = fs::write(&file_path, apk_file)
        .map_err(|e| Error::io(format!("writing {}", file_path.display()), e))
        .and_then(|()| {
            let (bundle_id, bundle_version) = reader.read_package_id(&file_path)?;
            let app_title = reader.read_app_title(&file_path)?;
            Ok(PackageIdentity {
                app_title,
                bundle_id,
                bundle_version,
            })
        });

    let tempdir_path = tempdir.path().to_path_buf();
    if let Err(e) = tempdir.close() {
        warn!("Failed to remove {:?}: {}", tempdir_path, e);
    }

    BuildInfo::from_package(
        upload_id,
        Platform::Android,
        identity?,
        apk_file.len() as u64,
        changelog_file,
        web,
    )
}
