// Partial MD5 over 1 KiB samples at power-of-four offsets, as the reader computes it

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::Path,
};

use md5::{Digest, Md5};

use super::models::DocumentIdentity;

const STEP: u64 = 1024;
const SIZE: u64 = 1024;
/// Sample indices run from -1 to this value inclusive.
const LAST_SAMPLE: i32 = 10;

/// Byte offset of sample `i`.
///
/// The reader computes `STEP << (2 * i)` with 32-bit shifts, so `i = -1` shifts
/// out of range and lands on zero. We clamp that sample to the file start.
fn sample_offset(i: i32) -> u64 {
    if i < 0 { 0 } else { STEP << (2 * i as u32) }
}

/// Hash an already opened stream.
pub fn partial_md5<R: Read + Seek>(reader: &mut R) -> io::Result<DocumentIdentity> {
    let mut md5 = Md5::new();
    let mut buffer = Vec::with_capacity(SIZE as usize);

    for i in -1..=LAST_SAMPLE {
        reader.seek(SeekFrom::Start(sample_offset(i)))?;
        buffer.clear();
        // `take` keeps reading across short reads until SIZE bytes or EOF
        let read = reader.by_ref().take(SIZE).read_to_end(&mut buffer)?;
        if read == 0 {
            break;
        }
        md5.update(&buffer[..read]);
    }

    Ok(DocumentIdentity::from_digest(&md5.finalize()))
}

/// Fingerprint the file at `path`.
///
/// Missing files, empty paths and read failures all yield `None`: the caller
/// must treat the file as unmatchable, never substitute another identity.
pub fn hash_contents(path: &Path) -> Option<DocumentIdentity> {
    if path.as_os_str().is_empty() || !path.is_file() {
        return None;
    }

    let result = File::open(path).and_then(|mut file| partial_md5(&mut file));
    match result {
        Ok(identity) => Some(identity),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to hash document");
            None
        }
    }
}

/// Identity by file name, the reader's alternative matching mode.
pub fn hash_title(path: &Path) -> Option<String> {
    let name = path.file_name()?;
    let digest = Md5::digest(name.to_string_lossy().as_bytes());
    Some(hex::encode_upper(digest))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use tempfile::tempdir;

    use super::*;

    fn md5_upper(bytes: &[u8]) -> String {
        hex::encode_upper(Md5::digest(bytes))
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn sample_offsets_follow_reader_schedule() {
        let offsets: Vec<u64> = (-1..=LAST_SAMPLE).map(sample_offset).collect();
        assert_eq!(offsets[0], 0);
        assert_eq!(offsets[1], 1024);
        assert_eq!(offsets[2], 4096);
        assert_eq!(offsets[3], 16384);
        assert_eq!(*offsets.last().unwrap(), 1024 << 20);
    }

    #[test]
    fn small_file_hashes_whole_content() {
        let id = partial_md5(&mut Cursor::new(b"hello".to_vec())).unwrap();
        assert_eq!(id.as_str(), "5D41402ABC4B2A76B9719D911017C592");
    }

    #[test]
    fn stops_at_first_empty_sample() {
        // 3000 bytes: samples at 0 and 1024 are read, 4096 is past the end
        let data = patterned(3000);
        let id = partial_md5(&mut Cursor::new(data.clone())).unwrap();
        assert_eq!(id.as_str(), md5_upper(&data[..2048]));
    }

    #[test]
    fn samples_concatenate_in_order() {
        let data = patterned(20_000);
        let mut expected = Vec::new();
        expected.extend_from_slice(&data[0..1024]);
        expected.extend_from_slice(&data[1024..2048]);
        expected.extend_from_slice(&data[4096..5120]);
        expected.extend_from_slice(&data[16384..17408]);
        let id = partial_md5(&mut Cursor::new(data)).unwrap();
        assert_eq!(id.as_str(), md5_upper(&expected));
    }

    #[test]
    fn empty_stream_is_md5_of_nothing() {
        let id = partial_md5(&mut Cursor::new(Vec::new())).unwrap();
        assert_eq!(id.as_str(), "D41D8CD98F00B204E9800998ECF8427E");
    }

    #[test]
    fn unsampled_bytes_do_not_change_identity() {
        let a = patterned(300_000);
        let mut b = a.clone();
        // between the 1 KiB and 4 KiB samples, and between 4 KiB and 16 KiB
        b[3000] ^= 0xff;
        b[10_000] ^= 0xff;
        // past the last sample of a 300 KB file
        b[299_999] ^= 0xff;
        let ha = partial_md5(&mut Cursor::new(a)).unwrap();
        let hb = partial_md5(&mut Cursor::new(b)).unwrap();
        assert_eq!(ha, hb);
    }

    #[test]
    fn sampled_bytes_change_identity() {
        let a = patterned(300_000);
        let mut b = a.clone();
        b[4096] ^= 0xff;
        let ha = partial_md5(&mut Cursor::new(a)).unwrap();
        let hb = partial_md5(&mut Cursor::new(b)).unwrap();
        assert_ne!(ha, hb);
    }

    #[test]
    fn hash_contents_is_deterministic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.epub");
        let mut file = File::create(&path).unwrap();
        file.write_all(&patterned(70_000)).unwrap();
        drop(file);

        let first = hash_contents(&path).unwrap();
        let second = hash_contents(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), DocumentIdentity::LEN);
    }

    #[test]
    fn missing_file_has_no_identity() {
        let dir = tempdir().unwrap();
        assert!(hash_contents(&dir.path().join("missing.epub")).is_none());
        assert!(hash_contents(Path::new("")).is_none());
        assert!(hash_contents(dir.path()).is_none());
    }

    #[test]
    fn title_hash_uses_file_name_only() {
        let a = hash_title(Path::new("/library/a/Dune.epub")).unwrap();
        let b = hash_title(Path::new("/elsewhere/Dune.epub")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, md5_upper(b"Dune.epub"));
    }
}
