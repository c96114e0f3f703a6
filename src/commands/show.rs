use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::build_info::BuildInfo;
use crate::install::install_url;
use crate::runtime::Runtime;

use super::config::Config;

/// Show detailed information about an upload
#[tracing::instrument(skip(runtime, root, base_url))]
pub fn show<R: Runtime>(
    runtime: R,
    upload_id: &str,
    root: Option<PathBuf>,
    base_url: Option<String>,
) -> Result<()> {
    let config = Config::new(runtime, root, base_url)?;
    let repository = config.repository();

    let build_info = repository.load_build_info(upload_id)?;
    let app_path = repository.app_file_path(upload_id)?;
    debug!("Package file: {:?}", app_path);

    print!("{}", render(&build_info, &config.base_url));
    println!("File: {}", app_path.display());
    Ok(())
}

fn render(build_info: &BuildInfo, base_url: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("App: {}\n", build_info.app_title));
    out.push_str(&format!("Bundle ID: {}\n", build_info.bundle_id));
    out.push_str(&format!("Version: {}\n", build_info.bundle_version));
    out.push_str(&format!(
        "Platform: {}\n",
        build_info.platform.display_name()
    ));
    out.push_str(&format!("Size: {}\n", build_info.human_file_size()));

    match build_info.created_at {
        Some(created_at) => out.push_str(&format!(
            "Uploaded: {}\n",
            created_at.format("%Y-%m-%d %H:%M:%S UTC")
        )),
        None => out.push_str("Uploaded: unknown\n"),
    }
    if let Some(web) = &build_info.web {
        out.push_str(&format!("Web: {}\n", web));
    }
    out.push_str(&format!(
        "Install URL: {}\n",
        install_url(build_info.platform, &build_info.upload_id, base_url)
    ));

    if let Some(changelog) = build_info
        .changelog_content
        .as_deref()
        .filter(|c| !c.trim().is_empty())
    {
        out.push_str("\nChangelog:\n");
        for line in changelog.lines() {
            out.push_str(&format!("  {}\n", line));
        }
    }
    out
}
