use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Mobile platform an uploaded build targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Ios, Platform::Android];

    /// Canonical lowercase name, as used in URLs and stored records
    pub fn platform_name(self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Ios => "iOS",
            Platform::Android => "Android",
        }
    }

    /// File name the uploaded artifact is stored under
    pub fn app_file_name(self) -> &'static str {
        match self {
            Platform::Ios => "app.ipa",
            Platform::Android => "app.apk",
        }
    }

    /// Guess the platform from a package file extension (`.ipa` / `.apk`)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "ipa" => Some(Platform::Ios),
            "apk" => Some(Platform::Android),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.platform_name())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.platform_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown platform '{}', expected 'ios' or 'android'", s))
    }
}
