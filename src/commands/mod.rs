use anyhow::{Context, Result};
use log::{debug, info};
use std::io::Write;
use std::path::PathBuf;

use crate::build_info::{BuildInfo, get_build_info};
use crate::error::Error;
use crate::install::{install_url, ios_manifest};
use crate::platform::Platform;
use crate::runtime::Runtime;

pub mod config;
mod paths;
mod show;

pub use show::show;

use config::Config;

/// A package file named on the command line, with its optional extras
#[derive(Debug, Clone, Default)]
pub struct PackageInput {
    pub file: PathBuf,
    /// Guessed from the file extension when absent
    pub platform: Option<Platform>,
    pub changelog: Option<PathBuf>,
    pub web: Option<String>,
}

impl PackageInput {
    pub fn platform(&self) -> Result<Platform> {
        match self.platform {
            Some(platform) => Ok(platform),
            None => Platform::from_path(&self.file).with_context(|| {
                format!(
                    "Cannot tell the platform of {:?} from its extension; pass --platform",
                    self.file
                )
            }),
        }
    }
}

/// Print the build info of a package without storing it
#[tracing::instrument(skip(runtime, input), fields(file = ?input.file))]
pub fn inspect<R: Runtime>(runtime: R, input: &PackageInput) -> Result<()> {
    let (build_info, _) = read_package(&runtime, input)?;
    println!("{}", serde_json::to_string_pretty(&build_info)?);
    Ok(())
}

/// Inspect a package and store it under a new upload id
#[tracing::instrument(skip(runtime, input, root, base_url), fields(file = ?input.file))]
pub fn upload<R: Runtime>(
    runtime: R,
    input: &PackageInput,
    root: Option<PathBuf>,
    base_url: Option<String>,
) -> Result<()> {
    let config = Config::new(runtime, root, base_url)?;
    let build_info = run_upload(&config, input)?;

    println!("Upload ID: {}", build_info.upload_id);
    println!(
        "{} {} ({}) {}",
        build_info.app_title,
        build_info.bundle_version,
        build_info.bundle_id,
        build_info.platform.display_name()
    );
    println!("Size: {}", build_info.human_file_size());
    println!(
        "Install URL: {}",
        install_url(build_info.platform, &build_info.upload_id, &config.base_url)
    );
    Ok(())
}

/// Print the latest upload id for a bundle id
#[tracing::instrument(skip(runtime, root))]
pub fn latest<R: Runtime>(runtime: R, bundle_id: &str, root: Option<PathBuf>) -> Result<()> {
    let config = Config::new(runtime, root, None)?;
    println!("{}", run_latest(&config, bundle_id)?);
    Ok(())
}

/// Print the iOS install manifest of an upload
#[tracing::instrument(skip(runtime, root, base_url))]
pub fn manifest<R: Runtime>(
    runtime: R,
    upload_id: &str,
    root: Option<PathBuf>,
    base_url: Option<String>,
) -> Result<()> {
    let config = Config::new(runtime, root, base_url)?;
    let content = run_manifest(&config, upload_id)?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&content)
        .context("Failed to write manifest")?;
    stdout.flush()?;
    Ok(())
}

fn read_package<R: Runtime>(runtime: &R, input: &PackageInput) -> Result<(BuildInfo, Vec<u8>)> {
    let platform = input.platform()?;
    debug!("Reading {} package {:?}", platform.display_name(), input.file);

    let app_file = runtime.read(&input.file)?;
    let changelog = match &input.changelog {
        Some(path) => Some(runtime.read(path)?),
        None => None,
    };

    let build_info = get_build_info(platform, &app_file, changelog.as_deref(), input.web.clone())
        .with_context(|| format!("Failed to inspect {:?}", input.file))?;
    Ok((build_info, app_file))
}

fn run_upload<R: Runtime>(config: &Config<R>, input: &PackageInput) -> Result<BuildInfo> {
    let (build_info, app_file) = read_package(&config.runtime, input)?;
    config.repository().save_upload(&build_info, &app_file)?;
    info!("Uploaded {:?} as {}", input.file, build_info.upload_id);
    Ok(build_info)
}

fn run_latest<R: Runtime>(config: &Config<R>, bundle_id: &str) -> Result<String> {
    config
        .repository()
        .get_latest_upload_id_by_bundle_id(bundle_id)?
        .ok_or_else(|| Error::NotFound(format!("no uploads for {}", bundle_id)).into())
}

fn run_manifest<R: Runtime>(config: &Config<R>, upload_id: &str) -> Result<Vec<u8>> {
    let build_info = config.repository().load_build_info(upload_id)?;
    Ok(ios_manifest(&build_info, &config.base_url)?)
}
