use log::debug;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;
use zip::result::ZipError;

use super::arsc::ResourceTable;
use super::axml::{ATTR_LABEL, ATTR_VERSION_NAME, AttributeValue, XmlDocument};
use crate::error::{Error, Result};

const MANIFEST_ENTRY: &str = "AndroidManifest.xml";
const RESOURCES_ENTRY: &str = "resources.arsc";

/// Reads identifying fields out of an Android package on disk
#[cfg_attr(test, mockall::automock)]
pub trait PackageReader {
    /// `(package, versionName)` from the manifest
    fn read_package_id(&self, path: &Path) -> Result<(String, String)>;

    /// The application's display name
    fn read_app_title(&self, path: &Path) -> Result<String>;
}

/// [`PackageReader`] backed by the compiled manifest and resource table
pub struct ApkReader;

impl PackageReader for ApkReader {
    #[tracing::instrument(skip(self))]
    fn read_package_id(&self, path: &Path) -> Result<(String, String)> {
        let mut apk = open_apk(path)?;
        let manifest = read_manifest(&mut apk)?;
        let root = manifest
            .find("manifest")
            .ok_or_else(|| Error::invalid_file_type("manifest has no <manifest> element"))?;

        let package = match root.attribute("package", None) {
            Some(AttributeValue::String(package)) => package.clone(),
            _ => return Err(Error::invalid_file_type("manifest has no package attribute")),
        };

        let version_name = match root.attribute("versionName", Some(ATTR_VERSION_NAME)) {
            Some(AttributeValue::Reference(id)) => resolve_reference(&mut apk, *id)?,
            Some(value) => value.as_text(),
            None => None,
        }
        .ok_or_else(|| Error::invalid_file_type("manifest has no versionName"))?;

        debug!("Package {} version {}", package, version_name);
        Ok((package, version_name))
    }

    #[tracing::instrument(skip(self))]
    fn read_app_title(&self, path: &Path) -> Result<String> {
        let mut apk = open_apk(path)?;
        let manifest = read_manifest(&mut apk)?;

        // The application label, else the first labelled activity
        let labels = manifest
            .find_all("application")
            .chain(manifest.find_all("activity"))
            .chain(manifest.find_all("activity-alias"))
            .filter_map(|e| e.attribute("label", Some(ATTR_LABEL)));

        for label in labels {
            let title = match label {
                AttributeValue::Reference(id) => resolve_reference(&mut apk, *id)?,
                value => value.as_text(),
            };
            if let Some(title) = title.filter(|t| !t.is_empty()) {
                return Ok(title);
            }
        }
        Err(Error::invalid_file_type("could not resolve application label"))
    }
}

fn open_apk(path: &Path) -> Result<ZipArchive<File>> {
    let file =
        File::open(path).map_err(|e| Error::io(format!("opening {}", path.display()), e))?;
    ZipArchive::new(file)
        .map_err(|e| Error::invalid_file_type(format!("not a zip archive: {}", e)))
}

fn read_entry(apk: &mut ZipArchive<File>, name: &str) -> Result<Option<Vec<u8>>> {
    let mut entry = match apk.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(Error::invalid_file_type(format!(
                "unreadable {}: {}",
                name, e
            )));
        }
    };
    let mut content = Vec::new();
    entry
        .read_to_end(&mut content)
        .map_err(|e| Error::invalid_file_type(format!("unreadable {}: {}", name, e)))?;
    Ok(Some(content))
}

fn read_manifest(apk: &mut ZipArchive<File>) -> Result<XmlDocument> {
    let content = read_entry(apk, MANIFEST_ENTRY)?
        .ok_or_else(|| Error::invalid_file_type("no AndroidManifest.xml in package"))?;
    XmlDocument::parse(&content)
}

fn resolve_reference(apk: &mut ZipArchive<File>, id: u32) -> Result<Option<String>> {
    let Some(content) = read_entry(apk, RESOURCES_ENTRY)? else {
        debug!("No resources.arsc to resolve {:#010x}", id);
        return Ok(None);
    };
    ResourceTable::parse(&content)?.resolve_string(id)
}
