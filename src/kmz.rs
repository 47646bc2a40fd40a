//! KMZ packaging: the WPML document pair (plus resources) in a ZIP archive.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use serde::Serialize;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::converter;
use crate::error::{PackagingError, Result};
use crate::options::ConvertOptions;
use crate::parser::{unmarshal_template, unmarshal_waylines};
use crate::serializer::{marshal_template, marshal_waylines};
use crate::validator;
use crate::waylines::Waylines;
use crate::wpml_types::WpmlMission;

pub const TEMPLATE_ENTRY: &str = "wpmz/template.kml";
pub const WAYLINES_ENTRY: &str = "wpmz/waylines.wpml";
pub const RESOURCE_DIR: &str = "wpmz/res/";

const TEMPLATE_SUFFIX: &str = "template.kml";
const WAYLINES_SUFFIX: &str = "waylines.wpml";

/// Size and compression of one archive entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KmzEntry {
    pub name: String,
    pub size: u64,
    pub compressed_size: u64,
    pub compression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KmzInfo {
    pub total_size: usize,
    pub entries: Vec<KmzEntry>,
}

/// Package a mission as KMZ bytes with indented XML.
pub fn create_kmz_buffer(mission: &WpmlMission) -> Result<Vec<u8>, PackagingError> {
    create_kmz_buffer_with(mission, true)
}

/// Package a mission as KMZ bytes. Both documents must be present.
pub fn create_kmz_buffer_with(
    mission: &WpmlMission,
    indent: bool,
) -> Result<Vec<u8>, PackagingError> {
    let template = mission
        .template
        .as_ref()
        .ok_or(PackagingError::MissingDocument("template"))?;
    let waylines = mission
        .waylines
        .as_ref()
        .ok_or(PackagingError::MissingDocument("waylines"))?;

    let template_xml = marshal_template(template, indent)?;
    let waylines_xml = marshal_waylines(waylines, indent)?;

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    zip.start_file(TEMPLATE_ENTRY, options)?;
    zip.write_all(&template_xml)?;
    zip.start_file(WAYLINES_ENTRY, options)?;
    zip.write_all(&waylines_xml)?;
    for (name, data) in &mission.resources {
        zip.start_file(format!("{RESOURCE_DIR}{name}"), options)?;
        zip.write_all(data)?;
    }

    let bytes = zip.finish()?.into_inner();
    debug!(
        bytes = bytes.len(),
        resources = mission.resources.len(),
        "packaged KMZ"
    );
    Ok(bytes)
}

/// Package a mission and write it to `path`, creating parent directories.
pub fn create_kmz(mission: &WpmlMission, path: impl AsRef<Path>) -> Result<(), PackagingError> {
    let path = path.as_ref();
    let bytes = create_kmz_buffer(mission)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    debug!(path = %path.display(), "wrote KMZ");
    Ok(())
}

/// Name of a resource entry relative to its `res/` directory.
fn resource_name(entry: &str) -> Option<&str> {
    if let Some(rest) = entry.strip_prefix("res/") {
        return Some(rest);
    }
    entry.find("/res/").map(|i| &entry[i + "/res/".len()..])
}

/// Parse KMZ bytes. The documents are found by path suffix so archives
/// from other tools with a different directory layout still open.
pub fn parse_kmz_buffer(bytes: &[u8]) -> Result<WpmlMission, PackagingError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut mission = WpmlMission::default();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        // The declared size comes from the archive and is not trusted.
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        if name.ends_with(TEMPLATE_SUFFIX) {
            mission.template = Some(unmarshal_template(&data)?);
        } else if name.ends_with(WAYLINES_SUFFIX) {
            mission.waylines = Some(unmarshal_waylines(&data)?);
        } else if let Some(resource) = resource_name(&name).filter(|r| !r.is_empty()) {
            mission.resources.insert(resource.to_string(), data);
        } else {
            debug!(entry = %name, "ignoring KMZ entry");
        }
    }

    if mission.template.is_none() {
        return Err(PackagingError::KmzFormatIncorrect {
            missing: TEMPLATE_SUFFIX,
        });
    }
    if mission.waylines.is_none() {
        return Err(PackagingError::KmzFormatIncorrect {
            missing: WAYLINES_SUFFIX,
        });
    }
    Ok(mission)
}

pub fn parse_kmz_file(path: impl AsRef<Path>) -> Result<WpmlMission, PackagingError> {
    let bytes = fs::read(path)?;
    parse_kmz_buffer(&bytes)
}

/// Package `mission` and report what ended up in the archive.
pub fn get_kmz_info(mission: &WpmlMission) -> Result<KmzInfo, PackagingError> {
    let bytes = create_kmz_buffer(mission)?;
    let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        entries.push(KmzEntry {
            name: file.name().to_string(),
            size: file.size(),
            compressed_size: file.compressed_size(),
            compression: format!("{:?}", file.compression()),
        });
    }

    Ok(KmzInfo {
        total_size: bytes.len(),
        entries,
    })
}

/// Waylines JSON model to KMZ bytes with default options.
pub fn convert_waylines_to_kmz_buffer(w: &Waylines) -> Result<Vec<u8>> {
    convert_waylines_to_kmz_buffer_with(w, &ConvertOptions::default())
}

/// Defaults, validation, conversion and packaging in one call. The error
/// names the stage that failed.
pub fn convert_waylines_to_kmz_buffer_with(
    w: &Waylines,
    opts: &ConvertOptions,
) -> Result<Vec<u8>> {
    let mut w = w.clone();
    w.apply_defaults();

    if opts.validate {
        validator::validate_with_context(&w, w.drone_model, w.payload_model)?;
    }
    let mission = converter::convert_with_options(&w, opts)?;
    let bytes = create_kmz_buffer_with(&mission, opts.indent)?;

    debug!(
        mission = %w.name,
        waypoints = w.waypoints.len(),
        bytes = bytes.len(),
        "converted waylines to KMZ"
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wpml_types::{TemplateDocument, WaylinesDocument};

    fn write_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    const EMPTY_DOC: &str = "<kml><Document/></kml>";

    #[test]
    fn test_resource_name() {
        assert_eq!(resource_name("res/a.png"), Some("a.png"));
        assert_eq!(resource_name("wpmz/res/dir/a.png"), Some("dir/a.png"));
        assert_eq!(resource_name("wpmz/template.kml"), None);
        assert_eq!(resource_name("wpmz/resources.txt"), None);
    }

    #[test]
    fn test_missing_documents() {
        let mut mission = WpmlMission::default();
        assert!(matches!(
            create_kmz_buffer(&mission),
            Err(PackagingError::MissingDocument("template"))
        ));
        mission.template = Some(TemplateDocument::default());
        assert!(matches!(
            create_kmz_buffer(&mission),
            Err(PackagingError::MissingDocument("waylines"))
        ));
    }

    #[test]
    fn test_suffix_matching_tolerates_layout() {
        let bytes = write_zip(&[
            ("mission/other/template.kml", EMPTY_DOC),
            ("waylines.wpml", EMPTY_DOC),
            ("res/", ""),
            ("readme.txt", "hello"),
        ]);
        let mission = parse_kmz_buffer(&bytes).unwrap();
        assert!(mission.template.is_some());
        assert!(mission.waylines.is_some());
        assert!(mission.resources.is_empty());
    }

    #[test]
    fn test_missing_waylines_entry() {
        let bytes = write_zip(&[("wpmz/template.kml", EMPTY_DOC)]);
        match parse_kmz_buffer(&bytes) {
            Err(PackagingError::KmzFormatIncorrect { missing }) => {
                assert_eq!(missing, "waylines.wpml")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_template_entry() {
        let bytes = write_zip(&[("wpmz/waylines.wpml", EMPTY_DOC)]);
        assert!(matches!(
            parse_kmz_buffer(&bytes),
            Err(PackagingError::KmzFormatIncorrect { missing: "template.kml" })
        ));
    }

    #[test]
    fn test_oversized_declared_entry() {
        let mut bytes = write_zip(&[
            ("wpmz/template.kml", EMPTY_DOC),
            ("wpmz/waylines.wpml", EMPTY_DOC),
        ]);
        // Uncompressed size of the first central directory record
        let cd = bytes
            .windows(4)
            .position(|w| w == b"PK\x01\x02")
            .unwrap();
        bytes[cd + 24..cd + 28].copy_from_slice(&0x8000_0000u32.to_le_bytes());

        // The entry is read as far as its data goes, whatever size it claims
        if let Ok(mission) = parse_kmz_buffer(&bytes) {
            assert!(mission.template.is_some());
        }
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            parse_kmz_buffer(b"definitely not a zip"),
            Err(PackagingError::Zip(_))
        ));
    }

    #[test]
    fn test_resources_round_trip() {
        let mut mission =
            WpmlMission::new(TemplateDocument::default(), WaylinesDocument::default());
        mission.add_resource("target.jpg", vec![0xFF, 0xD8, 0xFF]);

        let bytes = create_kmz_buffer(&mission).unwrap();
        let back = parse_kmz_buffer(&bytes).unwrap();
        assert_eq!(back.resources.get("target.jpg"), Some(&vec![0xFF, 0xD8, 0xFF]));

        let info = get_kmz_info(&mission).unwrap();
        let names: Vec<_> = info.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![TEMPLATE_ENTRY, WAYLINES_ENTRY, "wpmz/res/target.jpg"]);
        assert_eq!(info.total_size, bytes.len());
    }
}
