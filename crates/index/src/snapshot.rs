//! On-disk index snapshot
//!
//! A built index is persisted as a single `index.qidx` file inside the index
//! directory:
//! - 4 magic bytes (`QIDX`)
//! - u32 little-endian format version
//! - MessagePack payload (`IndexData`)
//!
//! Written atomically via temp + rename.

use crate::memory::IndexData;
use std::io;
use std::path::Path;

/// File name of the snapshot inside an index directory
pub const INDEX_FILE_NAME: &str = "index.qidx";

/// Magic bytes for index snapshots
const SNAPSHOT_MAGIC: &[u8; 4] = b"QIDX";
/// Current snapshot version
const SNAPSHOT_VERSION: u32 = 1;

/// Write index data to a file atomically (temp + rename).
pub(crate) fn write_snapshot(path: &Path, data: &IndexData) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;

    let payload = rmp_serde::to_vec(data)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("serialize error: {}", e)))?;

    let mut buf = Vec::with_capacity(8 + payload.len());
    buf.extend_from_slice(SNAPSHOT_MAGIC);
    buf.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    buf.extend_from_slice(&payload);

    let tmp_path = path.with_extension("qidx.tmp");
    {
        use std::io::Write;
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Load index data from a file.
pub(crate) fn load_snapshot(path: &Path) -> io::Result<IndexData> {
    let buf = std::fs::read(path)?;
    if buf.len() < 8 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "index snapshot too small",
        ));
    }
    if &buf[0..4] != SNAPSHOT_MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "bad index snapshot magic",
        ));
    }
    let mut version_bytes = [0u8; 4];
    version_bytes.copy_from_slice(&buf[4..8]);
    let version = u32::from_le_bytes(version_bytes);
    if version != SNAPSHOT_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported index snapshot version {}", version),
        ));
    }
    rmp_serde::from_slice(&buf[8..])
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("decode error: {}", e)))
}
