/// Level catalog — decodes the fixed-record binary level format.
///
/// A catalog file is a bare concatenation of 1536-byte records, no
/// header. Each record is a 60x24 row-major tile grid (one byte per
/// cell) followed by a metadata block:
///
///   [0, 1440)     tile codes, row-major, y * 60 + x
///   1444          gravity flag (nonzero = on)
///   [1446, 1469)  title, 23 bytes, space padded
///   1469          freeze-rocks flag (nonzero = on)
///   1470          required pickup count
///
/// Bytes not listed are padding kept for layout compatibility. The
/// record count is file length / 1536; a truncated trailing record is
/// ignored. Decoding raw bytes cannot fail, so only I/O and index
/// lookups return errors.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const RECORD_SIZE: usize = 1536;
pub const RAW_WIDTH: usize = 60;
pub const RAW_HEIGHT: usize = 24;

const TILE_BYTES: usize = RAW_WIDTH * RAW_HEIGHT;
const GRAVITY_OFFSET: usize = 1444;
const TITLE_OFFSET: usize = 1446;
const TITLE_LEN: usize = 23;
const FREEZE_OFFSET: usize = 1469;
const REQUIRED_OFFSET: usize = 1470;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read level catalog {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("level {requested} is out of range: catalog holds {available} levels")]
    OutOfRange { requested: usize, available: usize },
}

/// One decoded level record. Tile codes are kept raw; population maps
/// them to entities.
#[derive(Clone, Debug)]
pub struct LevelRecord {
    tiles: Vec<u8>,
    pub title: String,
    pub gravity: bool,
    pub freeze_rocks: bool,
    pub required_pickups: u8,
}

impl LevelRecord {
    /// Decode one full record. Callers guarantee the length.
    fn parse(bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), RECORD_SIZE);
        let title = String::from_utf8_lossy(&bytes[TITLE_OFFSET..TITLE_OFFSET + TITLE_LEN])
            .trim()
            .to_string();
        LevelRecord {
            tiles: bytes[..TILE_BYTES].to_vec(),
            title,
            gravity: bytes[GRAVITY_OFFSET] != 0,
            freeze_rocks: bytes[FREEZE_OFFSET] != 0,
            required_pickups: bytes[REQUIRED_OFFSET],
        }
    }

    /// Raw tile code at raw-grid column/row (before border stripping).
    #[inline]
    pub fn tile_at(&self, col: usize, row: usize) -> u8 {
        self.tiles[row * RAW_WIDTH + col]
    }
}

#[derive(Debug)]
pub struct Catalog {
    records: Vec<LevelRecord>,
}

impl Catalog {
    /// Decode every whole record in `bytes`; a partial tail is dropped.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let records = bytes
            .chunks_exact(RECORD_SIZE)
            .map(LevelRecord::parse)
            .collect();
        Catalog { records }
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let bytes = fs::read(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, index: usize) -> Result<&LevelRecord, CatalogError> {
        self.records.get(index).ok_or(CatalogError::OutOfRange {
            requested: index,
            available: self.records.len(),
        })
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    /// Assemble one raw record from placed tiles and metadata.
    fn record_bytes(tiles: &[(usize, usize, u8)], title: &str, meta: [u8; 3]) -> Vec<u8> {
        let mut b = vec![0u8; RECORD_SIZE];
        for &(col, row, code) in tiles {
            b[row * RAW_WIDTH + col] = code;
        }
        b[GRAVITY_OFFSET] = meta[0];
        b[FREEZE_OFFSET] = meta[1];
        b[REQUIRED_OFFSET] = meta[2];
        let t = title.as_bytes();
        for (i, slot) in b[TITLE_OFFSET..TITLE_OFFSET + TITLE_LEN].iter_mut().enumerate() {
            *slot = if i < t.len() { t[i] } else { b' ' };
        }
        b
    }

    // ── record decoding ──

    #[test]
    fn decodes_tiles_and_metadata() {
        let bytes = record_bytes(
            &[(1, 1, 0x06), (5, 10, 0x03), (30, 12, 0x04)],
            "FIRST STEPS",
            [1, 0, 7],
        );
        let cat = Catalog::from_bytes(&bytes);
        assert_eq!(cat.len(), 1);

        let rec = cat.record(0).unwrap();
        assert_eq!(rec.tile_at(1, 1), 0x06);
        assert_eq!(rec.tile_at(5, 10), 0x03);
        assert_eq!(rec.tile_at(30, 12), 0x04);
        assert_eq!(rec.tile_at(0, 0), 0x00);
        assert!(rec.gravity);
        assert!(!rec.freeze_rocks);
        assert_eq!(rec.required_pickups, 7);
        assert_eq!(rec.title, "FIRST STEPS");
    }

    #[test]
    fn title_keeps_interior_spaces_only() {
        let bytes = record_bytes(&[], "  A B  C", [0, 0, 0]);
        let cat = Catalog::from_bytes(&bytes);
        assert_eq!(cat.record(0).unwrap().title, "A B  C");
    }

    #[test]
    fn flags_accept_any_nonzero_byte() {
        let bytes = record_bytes(&[], "X", [0xff, 2, 0]);
        let rec = Catalog::from_bytes(&bytes);
        let rec = rec.record(0).unwrap();
        assert!(rec.gravity);
        assert!(rec.freeze_rocks);
    }

    // ── catalog slicing ──

    #[test]
    fn two_records_decode_independently() {
        let mut bytes = record_bytes(&[(2, 2, 0x01)], "ONE", [0, 0, 1]);
        bytes.extend(record_bytes(&[(3, 3, 0x05)], "TWO", [0, 1, 2]));
        let cat = Catalog::from_bytes(&bytes);
        assert_eq!(cat.len(), 2);
        assert_eq!(cat.record(0).unwrap().title, "ONE");
        assert_eq!(cat.record(1).unwrap().title, "TWO");
        assert_eq!(cat.record(1).unwrap().tile_at(3, 3), 0x05);
        assert!(cat.record(1).unwrap().freeze_rocks);
    }

    #[test]
    fn truncated_tail_is_ignored() {
        let mut bytes = record_bytes(&[], "WHOLE", [0, 0, 0]);
        bytes.extend(record_bytes(&[], "ALSO WHOLE", [0, 0, 0]));
        bytes.extend_from_slice(&[0u8; 100]);
        let cat = Catalog::from_bytes(&bytes);
        assert_eq!(cat.len(), 2);
    }

    #[test]
    fn empty_input_decodes_to_empty_catalog() {
        let cat = Catalog::from_bytes(&[]);
        assert!(cat.is_empty());
    }

    #[test]
    fn out_of_range_is_a_typed_error() {
        let mut bytes = record_bytes(&[], "ONE", [0, 0, 0]);
        bytes.extend(record_bytes(&[], "TWO", [0, 0, 0]));
        let cat = Catalog::from_bytes(&bytes);
        match cat.record(2) {
            Err(CatalogError::OutOfRange { requested, available }) => {
                assert_eq!(requested, 2);
                assert_eq!(available, 2);
            }
            other => panic!("expected OutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Catalog::load(Path::new("/no/such/catalog.dat")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
