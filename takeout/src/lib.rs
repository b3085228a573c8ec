#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod export;
mod records;

use std::io::{Cursor, Read};
use std::path::Path;

use anyhow::{Context, Result};
use zip::ZipArchive;

pub use records::{RawPosition, RawRecord};

/// Reads a location-history export from disk. Plain `.json` files and Takeout `.zip` archives are
/// both understood; the record order of the file is preserved.
pub fn load_path<P: AsRef<Path>>(path: P) -> Result<Vec<RawRecord>> {
    let path = path.as_ref();
    let bytes = fs_err::read(path)?;
    let is_zip = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);
    let records = if is_zip {
        load_zip_bytes(bytes)
    } else {
        load_json_bytes(&bytes)
    }
    .with_context(|| format!("reading {}", path.display()))?;
    info!("Read {} raw records from {}", records.len(), path.display());
    Ok(records)
}

pub fn load_json_bytes(bytes: &[u8]) -> Result<Vec<RawRecord>> {
    let export: export::Export = serde_json::from_slice(bytes)?;
    Ok(export.into_records())
}

/// Every `.json` entry in the archive is treated as a separate export. Takeout archives carry
/// other JSON files (settings, per-device metadata); those just contribute no records, or are
/// skipped with a warning if they aren't even a JSON object.
pub fn load_zip_bytes(bytes: Vec<u8>) -> Result<Vec<RawRecord>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut records = Vec::new();
    let mut json_files = 0;
    for idx in 0..archive.len() {
        let mut file = archive.by_index(idx)?;
        if file.is_dir() || !file.name().to_ascii_lowercase().ends_with(".json") {
            continue;
        }
        let name = file.name().to_string();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .map_err(|err| anyhow!("{name}: {err}"))?;
        json_files += 1;

        match load_json_bytes(&contents) {
            Ok(list) => {
                debug!("{name}: {} records", list.len());
                records.extend(list);
            }
            Err(err) => {
                warn!("Skipping {name}, not a location-history export: {err}");
            }
        }
    }
    if json_files == 0 {
        bail!("Archive doesn't contain any .json files");
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::{FileOptions, ZipWriter};

    use super::*;

    fn zip_of(files: Vec<(&str, &str)>) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut writer = ZipWriter::new(Cursor::new(&mut out));
            for (name, contents) in files {
                writer.start_file(name, FileOptions::default()).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        out
    }

    #[test]
    fn zip_concatenates_every_export() {
        let bytes = zip_of(vec![
            (
                "Takeout/Location History/Records.json",
                r#"{"locations": [{"latitudeE7": 1, "longitudeE7": 2, "timestamp": "2022-01-01T00:00:00Z"}]}"#,
            ),
            (
                "Takeout/Location History/Semantic/2022_JANUARY.json",
                r#"{"timelineObjects": [{"placeVisit": {"location": {"latitudeE7": 3, "longitudeE7": 4}, "duration": {"startTimestamp": "2022-01-02T00:00:00Z"}}}]}"#,
            ),
            ("Takeout/archive_browser.html", "<html></html>"),
            ("Takeout/broken.json", "[1, 2, 3]"),
        ]);
        let records = load_zip_bytes(bytes).unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], RawRecord::Location(_)));
        assert!(matches!(records[1], RawRecord::PlaceVisit(_)));
    }

    #[test]
    fn zip_without_json_is_an_error() {
        let bytes = zip_of(vec![("readme.txt", "nothing here")]);
        assert!(load_zip_bytes(bytes).is_err());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(load_json_bytes(b"{not json").is_err());
    }
}
