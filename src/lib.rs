//! Metadata extraction and storage for mobile build uploads.
//!
//! Given the bytes of an iOS `.ipa` or Android `.apk`, [`get_build_info`]
//! recovers the application title, bundle identifier and version and wraps
//! them in a [`BuildInfo`] record under a fresh upload id.

pub mod android;
pub mod build_info;
pub mod commands;
pub mod error;
pub mod install;
pub mod ios;
pub mod platform;
pub mod runtime;
pub mod storage;

pub use build_info::{BuildInfo, LegacyAppInfo, get_build_info, human_file_size};
pub use error::{Error, Result};
pub use install::{install_url, ios_manifest};
pub use platform::Platform;
pub use storage::UploadRepository;
