//! Over-the-air install links.
//!
//! iOS devices install through an `itms-services` link pointing at a
//! property list manifest; Android devices download the `.apk` directly.

use serde::Serialize;

use crate::build_info::BuildInfo;
use crate::error::{Error, Result};
use crate::platform::Platform;

/// File name the iOS manifest is served under, next to the package
pub const MANIFEST_FILE_NAME: &str = "app.plist";

#[derive(Serialize)]
struct Manifest<'a> {
    items: Vec<ManifestItem<'a>>,
}

#[derive(Serialize)]
struct ManifestItem<'a> {
    assets: Vec<ManifestAsset>,
    metadata: ManifestMetadata<'a>,
}

#[derive(Serialize)]
struct ManifestAsset {
    kind: &'static str,
    url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ManifestMetadata<'a> {
    bundle_identifier: &'a str,
    bundle_version: &'a str,
    kind: &'static str,
    title: &'a str,
}

/// `<base>/get/<upload_id>/<file_name>`
pub fn download_url(base_url: &str, upload_id: &str, file_name: &str) -> String {
    format!(
        "{}/get/{}/{}",
        base_url.trim_end_matches('/'),
        upload_id,
        file_name
    )
}

/// Link a device follows to install the upload.
pub fn install_url(platform: Platform, upload_id: &str, base_url: &str) -> String {
    match platform {
        Platform::Ios => format!(
            "itms-services://?action=download-manifest&url={}",
            download_url(base_url, upload_id, MANIFEST_FILE_NAME)
        ),
        Platform::Android => download_url(base_url, upload_id, Platform::Android.app_file_name()),
    }
}

/// XML manifest an `itms-services` link resolves to.
pub fn ios_manifest(build_info: &BuildInfo, base_url: &str) -> Result<Vec<u8>> {
    if build_info.platform != Platform::Ios {
        return Err(Error::invalid_file_type(format!(
            "no install manifest for {} builds",
            build_info.platform.display_name()
        )));
    }

    let manifest = Manifest {
        items: vec![ManifestItem {
            assets: vec![ManifestAsset {
                kind: "software-package",
                url: download_url(
                    base_url,
                    &build_info.upload_id,
                    Platform::Ios.app_file_name(),
                ),
            }],
            metadata: ManifestMetadata {
                bundle_identifier: &build_info.bundle_id,
                bundle_version: &build_info.bundle_version,
                kind: "software",
                title: &build_info.app_title,
            },
        }],
    };

    let mut buf = Vec::new();
    plist::to_writer_xml(&mut buf, &manifest)
        .map_err(|e| Error::io("encoding install manifest", std::io::Error::other(e)))?;
    Ok(buf)
}
