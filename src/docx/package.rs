use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Cursor, Read};

use crate::error::Error;
use crate::images::{MAX_IMAGE_SIZE, too_large_error};

/// XML parts are never expected anywhere near this size.
const MAX_XML_PART_SIZE: u64 = 256 * 1024 * 1024;

/// The opened container. XML parts are inflated up front; every other part
/// stays compressed in the archive until it is asked for.
pub(crate) struct Package<'a> {
    archive: RefCell<zip::ZipArchive<Cursor<&'a [u8]>>>,
    xml: HashMap<String, Vec<u8>>,
    /// Binary parts: archive index and declared size.
    media: HashMap<String, (usize, u64)>,
    /// Parts that were not read because their size is over the limit.
    oversized: HashMap<String, u64>,
}

fn is_xml_part(name: &str) -> bool {
    name.ends_with(".xml") || name.ends_with(".rels")
}

/// Read at most `limit` bytes of an entry. The declared size can lie, so
/// the cap applies to the inflated stream.
fn read_capped(entry: impl Read, declared: u64, limit: u64) -> Result<Vec<u8>, ReadError> {
    let mut data = Vec::with_capacity(declared.min(limit) as usize);
    entry
        .take(limit + 1)
        .read_to_end(&mut data)
        .map_err(|e| ReadError::Io(e.to_string()))?;
    if data.len() as u64 > limit {
        return Err(ReadError::TooLarge(data.len() as u64));
    }
    Ok(data)
}

enum ReadError {
    TooLarge(u64),
    Io(String),
}

impl<'a> Package<'a> {
    pub(crate) fn open(bytes: &'a [u8]) -> Result<Package<'a>, Error> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|_| Error::Package("file is not a ZIP archive".into()))?;

        let mut xml = HashMap::new();
        let mut media = HashMap::new();
        let mut oversized = HashMap::new();
        for i in 0..zip.len() {
            let mut entry = match zip.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable archive entry #{i}: {e}");
                    continue;
                }
            };
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().trim_start_matches('/').to_string();
            let size = entry.size();
            if !is_xml_part(&name) {
                if size > MAX_IMAGE_SIZE as u64 {
                    log::warn!("Part {name} declares {size} bytes; not extracted");
                    oversized.insert(name, size);
                } else {
                    media.insert(name, (i, size));
                }
                continue;
            }
            if size > MAX_XML_PART_SIZE {
                log::warn!("Part {name} declares {size} bytes; not extracted");
                oversized.insert(name, size);
                continue;
            }
            match read_capped(&mut entry, size, MAX_XML_PART_SIZE) {
                Ok(data) => {
                    xml.insert(name, data);
                }
                Err(ReadError::TooLarge(len)) => {
                    oversized.insert(name, len);
                }
                Err(ReadError::Io(e)) => log::warn!("Failed to read part {name}: {e}"),
            }
        }

        log::debug!(
            "Package opened: {} XML parts, {} media parts",
            xml.len(),
            media.len()
        );
        Ok(Package {
            archive: RefCell::new(zip),
            xml,
            media,
            oversized,
        })
    }

    /// Inflate a binary part on demand. The error is a user-facing reason.
    pub(crate) fn read_media(&self, name: &str) -> Result<Vec<u8>, String> {
        if let Some(size) = self.oversized(name) {
            return Err(too_large_error(size));
        }
        let &(index, size) = self
            .media
            .get(name)
            .ok_or_else(|| "Image part could not be read".to_string())?;
        let mut zip = self.archive.borrow_mut();
        let entry = zip.by_index(index).map_err(|e| e.to_string())?;
        match read_capped(entry, size, MAX_IMAGE_SIZE as u64) {
            Ok(data) => Ok(data),
            Err(ReadError::TooLarge(len)) => Err(too_large_error(len)),
            Err(ReadError::Io(e)) => Err(format!("Image part could not be read: {e}")),
        }
    }

    pub(crate) fn bytes(&self, name: &str) -> Option<&[u8]> {
        self.xml.get(name).map(Vec::as_slice)
    }

    /// Part content as UTF-8 text, with any byte-order mark removed.
    pub(crate) fn text(&self, name: &str) -> Option<&str> {
        let data = self.bytes(name)?;
        let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
        match std::str::from_utf8(data) {
            Ok(s) => Some(s),
            Err(e) => {
                log::warn!("Part {name} is not valid UTF-8: {e}");
                None
            }
        }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.xml.contains_key(name)
            || self.media.contains_key(name)
            || self.oversized.contains_key(name)
    }

    pub(crate) fn oversized(&self, name: &str) -> Option<u64> {
        self.oversized.get(name).copied()
    }

    /// First part (in name order) whose path starts with `prefix` and ends with `suffix`.
    pub(crate) fn find_part(&self, prefix: &str, suffix: &str) -> Option<&str> {
        let mut names: Vec<&str> = self
            .xml
            .keys()
            .map(String::as_str)
            .filter(|n| n.starts_with(prefix) && n.ends_with(suffix))
            .collect();
        names.sort_unstable();
        names.first().copied()
    }
}

/// Parse an optional XML part. Missing or malformed parts yield `None`.
pub(crate) fn parse_optional<'a>(
    package: &'a Package<'_>,
    name: &str,
) -> Option<roxmltree::Document<'a>> {
    let text = package.text(name)?;
    match roxmltree::Document::parse(text) {
        Ok(doc) => Some(doc),
        Err(e) => {
            log::warn!("Ignoring malformed part {name}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn archive(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in parts {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn media_parts_are_read_on_request() {
        let bytes = archive(&[
            ("word/document.xml", b"\xEF\xBB\xBF<doc/>"),
            ("word/media/image1.png", b"\x89PNG data"),
        ]);
        let package = Package::open(&bytes).unwrap();
        assert_eq!(package.text("word/document.xml"), Some("<doc/>"));

        assert!(package.contains("word/media/image1.png"));
        assert_eq!(package.bytes("word/media/image1.png"), None);
        assert_eq!(
            package.read_media("word/media/image1.png").unwrap(),
            b"\x89PNG data"
        );
        assert!(package.read_media("word/media/missing.png").is_err());
    }

    #[test]
    fn non_zip_input_is_rejected() {
        assert!(matches!(Package::open(b"plain text"), Err(Error::Package(_))));
    }
}
