// Page counts for formats that expose one without rendering

use std::{fs::File, io::Read, path::Path};

use anyhow::Context;
use serde::{Deserialize, de::IgnoredAny};
use zip::ZipArchive;

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Number of pages the reader's position string can address.
///
/// For EPUB this is the spine length, since `DocFragment[N]` indexes spine
/// items. Other formats and unreadable archives give `None`.
pub fn count_pages(path: &Path) -> Option<i32> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    if ext != "epub" {
        return None;
    }
    match epub_spine_len(path) {
        Ok(len) => i32::try_from(len).ok().filter(|pages| *pages > 0),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = ?e, "no page count for epub");
            None
        }
    }
}

fn epub_spine_len(path: &Path) -> anyhow::Result<usize> {
    let mut archive = ZipArchive::new(File::open(path)?)?;

    let container: Container = quick_xml::de::from_str(&read_entry(&mut archive, CONTAINER_PATH)?)?;
    let package_path = container
        .rootfiles
        .rootfile
        .into_iter()
        .next()
        .map(|r| r.full_path)
        .context("container lists no package document")?;

    let package: Package = quick_xml::de::from_str(&read_entry(&mut archive, &package_path)?)?;
    Ok(package.spine.itemref.len())
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> anyhow::Result<String> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("missing {name}"))?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(content)
}

// OCF container and OPF package, only the parts needed to reach the spine

#[derive(Debug, Deserialize)]
struct Container {
    rootfiles: Rootfiles,
}

#[derive(Debug, Deserialize)]
struct Rootfiles {
    #[serde(default)]
    rootfile: Vec<Rootfile>,
}

#[derive(Debug, Deserialize)]
struct Rootfile {
    #[serde(rename = "@full-path")]
    full_path: String,
}

#[derive(Debug, Deserialize)]
struct Package {
    spine: Spine,
}

#[derive(Debug, Deserialize)]
struct Spine {
    #[serde(default)]
    itemref: Vec<IgnoredAny>,
}

#[cfg(test)]
pub(crate) fn write_epub(path: &Path, chapters: usize) {
    use std::io::Write;
    use zip::{ZipWriter, write::SimpleFileOptions};

    let manifest: String = (0..chapters)
        .map(|i| format!(r#"<item id="c{i}" href="c{i}.xhtml" media-type="application/xhtml+xml"/>"#))
        .collect();
    let spine: String = (0..chapters)
        .map(|i| format!(r#"<itemref idref="c{i}"/>"#))
        .collect();
    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Test</dc:title></metadata>
  <manifest>{manifest}</manifest>
  <spine>{spine}</spine>
</package>"#
    );
    let container = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    zip.start_file("mimetype", options).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    zip.start_file(CONTAINER_PATH, options).unwrap();
    zip.write_all(container.as_bytes()).unwrap();
    zip.start_file("OEBPS/content.opf", options).unwrap();
    zip.write_all(opf.as_bytes()).unwrap();
    zip.finish().unwrap();
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn epub_pages_follow_spine() {
        let dir = tempdir().unwrap();
        let book = dir.path().join("book.epub");
        write_epub(&book, 7);
        assert_eq!(count_pages(&book), Some(7));
    }

    #[test]
    fn extension_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let book = dir.path().join("BOOK.EPUB");
        write_epub(&book, 3);
        assert_eq!(count_pages(&book), Some(3));
    }

    #[test]
    fn broken_epub_has_no_count() {
        let dir = tempdir().unwrap();
        let book = dir.path().join("broken.epub");
        fs::write(&book, b"not a zip archive").unwrap();
        assert_eq!(count_pages(&book), None);
    }

    #[test]
    fn other_formats_have_no_count() {
        let dir = tempdir().unwrap();
        let book = dir.path().join("book.pdf");
        fs::write(&book, b"%PDF-1.7").unwrap();
        assert_eq!(count_pages(&book), None);
    }
}
