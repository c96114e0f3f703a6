//! Build info extraction for iOS `.ipa` archives.
//!
//! An `.ipa` is a zip archive with the application bundle under
//! `Payload/<Name>.app/`. The bundle's `Info.plist` (binary or XML) holds
//! the identifier, display name and marketing version.

use log::{debug, error};
use serde::Deserialize;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use crate::build_info::{BuildInfo, PackageIdentity};
use crate::error::{Error, Result};
use crate::platform::Platform;

const INFO_PLIST_SUFFIX: &str = ".app/Info.plist";

/// The subset of `Info.plist` keys needed to identify a build
#[derive(Deserialize, Debug, Default)]
struct InfoPlist {
    #[serde(rename = "CFBundleIdentifier")]
    bundle_identifier: Option<String>,
    #[serde(rename = "CFBundleName")]
    bundle_name: Option<String>,
    #[serde(rename = "CFBundleShortVersionString")]
    short_version: Option<String>,
}

pub fn get_build_info_from_ipa(
    upload_id: &str,
    ipa_file: &[u8],
    changelog_file: Option<&[u8]>,
    web: Option<String>,
) -> Result<BuildInfo> {
    debug!("Extracting build info from {:?}", upload_id);

    let plist_content = read_info_plist(ipa_file)?;
    let identity = parse_info_plist(&plist_content)?;

    BuildInfo::from_package(
        upload_id,
        Platform::Ios,
        identity,
        ipa_file.len() as u64,
        changelog_file,
        web,
    )
}

/// Read the main bundle's `Info.plist` out of the archive.
///
/// Nested bundles (e.g. `Payload/App.app/Watch/WatchApp.app/Info.plist`)
/// match the same suffix, so the shallowest candidate wins.
fn read_info_plist(ipa_file: &[u8]) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(ipa_file))
        .map_err(|e| Error::invalid_file_type(format!("not a zip archive: {}", e)))?;

    let mut best: Option<(usize, usize)> = None;
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|e| {
            Error::invalid_file_type(format!("unreadable zip entry {}: {}", i, e))
        })?;
        let name = entry.name();
        if !name.ends_with(INFO_PLIST_SUFFIX) {
            continue;
        }
        let depth = name.matches('/').count();
        if best.is_none_or(|(_, best_depth)| depth < best_depth) {
            best = Some((i, depth));
        }
    }

    let Some((index, _)) = best else {
        error!("Could not find plist file in bundle");
        return Err(Error::invalid_file_type(
            "no application Info.plist in archive",
        ));
    };

    let mut entry = archive
        .by_index(index)
        .map_err(|e| Error::invalid_file_type(format!("unreadable Info.plist: {}", e)))?;
    debug!("Reading {}", entry.name());

    let mut content = Vec::new();
    entry
        .read_to_end(&mut content)
        .map_err(|e| Error::invalid_file_type(format!("unreadable Info.plist: {}", e)))?;
    Ok(content)
}

fn parse_info_plist(content: &[u8]) -> Result<PackageIdentity> {
    let info: InfoPlist = plist::from_bytes(content)
        .map_err(|e| Error::invalid_file_type(format!("malformed Info.plist: {}", e)))?;

    match (info.bundle_identifier, info.bundle_name, info.short_version) {
        (Some(bundle_id), Some(app_title), Some(bundle_version)) => Ok(PackageIdentity {
            app_title,
            bundle_id,
            bundle_version,
        }),
        _ => {
            error!("Failed to extract plist file information");
            Err(Error::invalid_file_type(
                "Info.plist lacks CFBundleIdentifier, CFBundleName or CFBundleShortVersionString",
            ))
        }
    }
}
