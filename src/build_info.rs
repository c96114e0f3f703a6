use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::{android, ios};

const MAX_BUNDLE_ID_LEN: usize = 256;

/// Check a bundle id against `[A-Za-z0-9._-]{1,256}`
pub fn validate_bundle_id(bundle_id: &str) -> Result<()> {
    let valid = !bundle_id.is_empty()
        && bundle_id.len() <= MAX_BUNDLE_ID_LEN
        && bundle_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidBundleId(bundle_id.to_string()))
    }
}

fn deserialize_bundle_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let bundle_id = String::deserialize(deserializer)?;
    validate_bundle_id(&bundle_id).map_err(serde::de::Error::custom)?;
    Ok(bundle_id)
}

/// The identifying fields every package must carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    pub app_title: String,
    pub bundle_id: String,
    pub bundle_version: String,
}

/// Record layout of the first storage version (`app_info.json`).
/// Left as-is so old uploads can still be migrated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LegacyAppInfo {
    pub app_title: String,
    #[serde(deserialize_with = "deserialize_bundle_id")]
    pub bundle_id: String,
    pub bundle_version: String,
}

/// Metadata extracted from one uploaded build
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BuildInfo {
    pub upload_id: String,
    pub app_title: String,
    #[serde(deserialize_with = "deserialize_bundle_id")]
    pub bundle_id: String,
    pub bundle_version: String,
    pub file_size: u64,
    /// Absent for records migrated from [`LegacyAppInfo`]
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub platform: Platform,
    #[serde(default)]
    pub web: Option<String>,
    #[serde(default)]
    pub changelog_content: Option<String>,
}

impl BuildInfo {
    /// Build a fresh record for a package whose identity has been fully
    /// recovered. Rejects bundle ids that could not be used in URLs or paths.
    pub fn from_package(
        upload_id: &str,
        platform: Platform,
        identity: PackageIdentity,
        file_size: u64,
        changelog: Option<&[u8]>,
        web: Option<String>,
    ) -> Result<Self> {
        validate_bundle_id(&identity.bundle_id)
            .map_err(|e| Error::invalid_file_type(e.to_string()))?;

        Ok(Self {
            upload_id: upload_id.to_string(),
            app_title: identity.app_title,
            bundle_id: identity.bundle_id,
            bundle_version: identity.bundle_version,
            file_size,
            created_at: Some(Utc::now()),
            platform,
            web,
            changelog_content: changelog.map(|c| String::from_utf8_lossy(c).into_owned()),
        })
    }

    /// Upgrade a v1 record. v1 only ever stored iOS builds.
    pub fn from_legacy(upload_id: &str, legacy: LegacyAppInfo, file_size: u64) -> Self {
        Self {
            upload_id: upload_id.to_string(),
            app_title: legacy.app_title,
            bundle_id: legacy.bundle_id,
            bundle_version: legacy.bundle_version,
            file_size,
            created_at: None,
            platform: Platform::Ios,
            web: None,
            changelog_content: None,
        }
    }

    pub fn human_file_size(&self) -> String {
        human_file_size(self.file_size)
    }
}

/// Format a byte count with binary prefixes, e.g. `2048` -> `"2.00KB"`
pub fn human_file_size(size: u64) -> String {
    const ONE_KB: u64 = 1024;
    const ONE_MB: u64 = ONE_KB * 1024;
    const ONE_GB: u64 = ONE_MB * 1024;

    if size < ONE_KB {
        return format!("{}B", size);
    }
    if size < ONE_MB {
        return format!("{:.2}KB", size as f64 / ONE_KB as f64);
    }
    if size < ONE_GB {
        return format!("{:.2}MB", size as f64 / ONE_MB as f64);
    }
    format!("{:.2}GB", size as f64 / ONE_GB as f64)
}

/// Inspect an uploaded package and return its metadata under a new upload id.
pub fn get_build_info(
    platform: Platform,
    app_file_content: &[u8],
    app_changelog_content: Option<&[u8]>,
    web: Option<String>,
) -> Result<BuildInfo> {
    let upload_id = Uuid::new_v4().to_string();

    debug!("Obtaining build info from {:?}", upload_id);
    debug!("Platform: {}", platform.platform_name());

    match platform {
        Platform::Ios => {
            ios::get_build_info_from_ipa(&upload_id, app_file_content, app_changelog_content, web)
        }
        Platform::Android => android::get_build_info_from_apk(
            &upload_id,
            app_file_content,
            app_changelog_content,
            web,
        ),
    }
}
