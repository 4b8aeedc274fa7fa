//! Document Codec
//!
//! Loads world documents from disk and writes them back with an atomic
//! replace. A save never exposes a partially written or zero-length file:
//! the full encoded document goes to a temporary file next to the target,
//! is synced, and is then renamed over the target in one step.

use crate::error::{Result, WorldError};
use crate::nbt::{self, Document, Encoding};
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, trace};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Guess the compression wrapper from the first bytes of a file
pub fn detect_encoding(bytes: &[u8]) -> Encoding {
    match bytes {
        [a, b, ..] if [*a, *b] == GZIP_MAGIC => Encoding::Gzip,
        [0x78, b, ..] if (0x78u16 * 256 + u16::from(*b)) % 31 == 0 => Encoding::Zlib,
        _ => Encoding::Uncompressed,
    }
}

fn inflate(raw: &[u8], encoding: Encoding) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len() * 4);
    match encoding {
        Encoding::Gzip => {
            GzDecoder::new(raw).read_to_end(&mut out)?;
        }
        Encoding::Zlib => {
            ZlibDecoder::new(raw).read_to_end(&mut out)?;
        }
        Encoding::Uncompressed => out.extend_from_slice(raw),
    }
    Ok(out)
}

/// Decode a document from raw file bytes, detecting compression
pub fn from_bytes(raw: &[u8]) -> Result<Document> {
    let encoding = detect_encoding(raw);
    let plain = inflate(raw, encoding)
        .map_err(|e| WorldError::Malformed(format!("{:?} stream could not be inflated: {}", encoding, e)))?;
    let mut doc = nbt::decode(&plain)?;
    doc.encoding = encoding;
    Ok(doc)
}

/// Encode a document into file bytes using its own encoding
pub fn to_bytes(doc: &Document) -> Result<Vec<u8>> {
    let plain = nbt::encode(doc)?;
    let bytes = match doc.encoding {
        Encoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&plain)?;
            encoder.finish()?
        }
        Encoding::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&plain)?;
            encoder.finish()?
        }
        Encoding::Uncompressed => plain,
    };
    Ok(bytes)
}

/// Load a document from `path`
///
/// Every failure, including a missing file, is reported as
/// [`WorldError::CorruptDocument`] carrying the path.
pub fn load(path: &Path) -> Result<Document> {
    let raw = fs::read(path).map_err(|e| WorldError::corrupt(path, e.to_string()))?;
    let doc = from_bytes(&raw).map_err(|e| WorldError::corrupt(path, e.to_string()))?;
    debug!("Loaded {:?} ({} bytes, {:?})", path, raw.len(), doc.encoding);
    Ok(doc)
}

/// Atomically replace `path` with the encoded document
///
/// On any failure the temporary file is removed and the previous contents
/// of `path` are left untouched.
pub fn save(path: &Path, doc: &Document) -> Result<()> {
    save_with_hook(path, doc, |_| Ok(()))
}

/// Same as [`save`] with a callback run after the temporary file is fully
/// written and synced but before it is renamed over the target
pub(crate) fn save_with_hook<F>(path: &Path, doc: &Document, before_persist: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let bytes = to_bytes(doc)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| WorldError::invalid(format!("not a file path: {:?}", path)))?
        .to_string_lossy()
        .into_owned();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(parent)?;
    trace!("Writing {} bytes to {:?}", bytes.len(), temp.path());

    temp.write_all(&bytes)?;
    temp.flush()?;
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(temp.path(), meta.permissions())?;
    }
    temp.as_file().sync_all()?;

    before_persist(temp.path())?;

    temp.persist(path).map_err(|e| WorldError::Io(e.error))?;
    debug!("Saved {:?} ({} bytes)", path, bytes.len());
    Ok(())
}
