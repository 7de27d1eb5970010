//! Native .bhmap binary format for map persistence.
//!
//! Format (all values little-endian):
//! - Header (32 bytes):
//!   - Magic: "BHMAP" (5 bytes)
//!   - Version: u8 (1 byte)
//!   - Eviction code: u8 (1 byte)
//!   - Reserved: u8 (1 byte)
//!   - Point count: u32 (4 bytes)
//!   - Resolution: f32 (4 bytes)
//!   - Max points: u32 (4 bytes)
//!   - Map version: u64 (8 bytes)
//!   - Reserved: 4 bytes
//! - Point data: point count * 16 bytes (x, y, z, confidence as f32),
//!   oldest observation first

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{
    EvictionPolicy, MAX_POINT_LIMIT, MAX_RESOLUTION, MIN_RESOLUTION, MapPolicy, SettingsError,
};
use crate::core::Point3D;
use crate::map::{MapSnapshot, SpatialMap};

/// Magic bytes for .bhmap format
const MAGIC: &[u8; 5] = b"BHMAP";

/// Current format version
pub const FORMAT_VERSION: u8 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 32;

/// Size of one point record in bytes
pub const RECORD_SIZE: usize = 16;

/// File extension of persisted maps
pub const FILE_EXTENSION: &str = "bhmap";

/// Error type for map persistence
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// Nothing has been saved yet (missing file or empty input)
    #[error("No saved map")]
    NeverSaved,

    /// Input is not a well-formed map
    #[error("Corrupt map data: {0}")]
    Corrupt(String),

    /// Written by an incompatible format version
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected format version
        expected: u8,
        /// Found format version
        found: u8,
    },

    /// The caller's map policy is invalid
    #[error("Invalid map policy: {0}")]
    InvalidPolicy(#[from] SettingsError),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError::Io(e.to_string())
    }
}

/// Decoded header fields
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapHeader {
    /// Format version
    pub format_version: u8,
    /// Eviction strategy of the saved map
    pub eviction: EvictionPolicy,
    /// Number of point records
    pub point_count: u32,
    /// Grid resolution (meters)
    pub resolution: f32,
    /// Capacity of the saved map
    pub max_points: u32,
    /// Map version at save time
    pub map_version: u64,
}

impl MapHeader {
    fn of(snapshot: &MapSnapshot) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            eviction: snapshot.eviction(),
            point_count: snapshot.len() as u32,
            resolution: snapshot.resolution(),
            max_points: snapshot.capacity() as u32,
            map_version: snapshot.version(),
        }
    }

    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut header = [0u8; HEADER_SIZE];
        header[0..5].copy_from_slice(MAGIC);
        header[5] = self.format_version;
        header[6] = self.eviction.code();
        // header[7] reserved
        header[8..12].copy_from_slice(&self.point_count.to_le_bytes());
        header[12..16].copy_from_slice(&self.resolution.to_le_bytes());
        header[16..20].copy_from_slice(&self.max_points.to_le_bytes());
        header[20..28].copy_from_slice(&self.map_version.to_le_bytes());
        // header[28..32] reserved
        header
    }

    fn decode(header: &[u8; HEADER_SIZE]) -> Result<Self, PersistenceError> {
        if &header[0..5] != MAGIC {
            return Err(PersistenceError::Corrupt("bad magic".to_string()));
        }

        let format_version = header[5];
        if format_version != FORMAT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: FORMAT_VERSION,
                found: format_version,
            });
        }

        let eviction = EvictionPolicy::from_code(header[6]).ok_or_else(|| {
            PersistenceError::Corrupt(format!("unknown eviction code {}", header[6]))
        })?;

        let point_count = read_u32(&header[8..12]);
        let resolution = read_f32(&header[12..16]);
        let max_points = read_u32(&header[16..20]);
        let map_version = u64::from_le_bytes([
            header[20], header[21], header[22], header[23], header[24], header[25], header[26],
            header[27],
        ]);

        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(PersistenceError::Corrupt(format!(
                "invalid resolution {}",
                resolution
            )));
        }
        if !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&resolution) {
            return Err(PersistenceError::Corrupt(format!(
                "resolution {} outside [{}, {}]",
                resolution, MIN_RESOLUTION, MAX_RESOLUTION
            )));
        }
        if max_points as usize > MAX_POINT_LIMIT || point_count > max_points {
            return Err(PersistenceError::Corrupt(format!(
                "point count {} exceeds capacity {}",
                point_count, max_points
            )));
        }

        Ok(Self {
            format_version,
            eviction,
            point_count,
            resolution,
            max_points,
            map_version,
        })
    }
}

#[inline]
fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
fn read_f32(bytes: &[u8]) -> f32 {
    f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Fill `buf` as far as the reader allows; returns bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, PersistenceError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

fn encode_record(point: &Point3D) -> [u8; RECORD_SIZE] {
    let mut record = [0u8; RECORD_SIZE];
    record[0..4].copy_from_slice(&point.x.to_le_bytes());
    record[4..8].copy_from_slice(&point.y.to_le_bytes());
    record[8..12].copy_from_slice(&point.z.to_le_bytes());
    record[12..16].copy_from_slice(&point.confidence.to_le_bytes());
    record
}

fn decode_record(record: &[u8; RECORD_SIZE], index: u32) -> Result<Point3D, PersistenceError> {
    let point = Point3D::new(
        read_f32(&record[0..4]),
        read_f32(&record[4..8]),
        read_f32(&record[8..12]),
        read_f32(&record[12..16]),
    );
    if !point.is_finite() {
        return Err(PersistenceError::Corrupt(format!(
            "point {} is not finite",
            index
        )));
    }
    if !(0.0..=1.0).contains(&point.confidence) {
        return Err(PersistenceError::Corrupt(format!(
            "point {} has confidence {} outside [0, 1]",
            index, point.confidence
        )));
    }
    Ok(point)
}

/// Write a map snapshot in .bhmap format
pub fn write_map<W: Write>(snapshot: &MapSnapshot, writer: &mut W) -> Result<(), PersistenceError> {
    writer.write_all(&MapHeader::of(snapshot).encode())?;
    for point in snapshot.iter() {
        writer.write_all(&encode_record(point))?;
    }
    Ok(())
}

/// Read only the header of a .bhmap stream
pub fn read_header<R: Read>(reader: &mut R) -> Result<MapHeader, PersistenceError> {
    let mut header = [0u8; HEADER_SIZE];
    match read_full(reader, &mut header)? {
        0 => return Err(PersistenceError::NeverSaved),
        n if n < HEADER_SIZE => {
            return Err(PersistenceError::Corrupt(format!(
                "truncated header: {} of {} bytes",
                n, HEADER_SIZE
            )));
        }
        _ => {}
    }
    MapHeader::decode(&header)
}

/// Read the point records that follow a header, rejecting trailing data
pub fn read_points<R: Read>(
    reader: &mut R,
    header: &MapHeader,
) -> Result<Vec<Point3D>, PersistenceError> {
    let mut points = Vec::with_capacity(header.point_count as usize);
    let mut record = [0u8; RECORD_SIZE];
    for index in 0..header.point_count {
        let n = read_full(reader, &mut record)?;
        if n < RECORD_SIZE {
            return Err(PersistenceError::Corrupt(format!(
                "truncated at point {} of {}",
                index, header.point_count
            )));
        }
        points.push(decode_record(&record, index)?);
    }

    let mut probe = [0u8; 1];
    if read_full(reader, &mut probe)? != 0 {
        return Err(PersistenceError::Corrupt(
            "trailing bytes after point data".to_string(),
        ));
    }
    Ok(points)
}

/// Read a map in .bhmap format.
///
/// The result keeps the saved resolution; capacity and eviction come from
/// `policy`. If the saved map holds more points than `policy` allows, the
/// excess is evicted per policy in stored order.
pub fn read_map<R: Read>(reader: &mut R, policy: &MapPolicy) -> Result<SpatialMap, PersistenceError> {
    policy.validate()?;
    let header = read_header(reader)?;
    let points = read_points(reader, &header)?;

    let mut map = SpatialMap::new(policy.clone().with_resolution(header.resolution))?;
    let stats = map.insert_batch(points, 0.0);
    map.raise_version(header.map_version);

    if stats.evicted > 0 || stats.discarded > 0 {
        log::debug!(
            "[{}] Loaded {} of {} points ({} evicted, {} duplicate)",
            policy.name,
            map.len(),
            header.point_count,
            stats.evicted,
            stats.discarded
        );
    }
    Ok(map)
}

/// Encode a snapshot to bytes
pub fn encode_map(snapshot: &MapSnapshot) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_SIZE + snapshot.len() * RECORD_SIZE);
    bytes.extend_from_slice(&MapHeader::of(snapshot).encode());
    for point in snapshot.iter() {
        bytes.extend_from_slice(&encode_record(point));
    }
    bytes
}

/// Decode a map from bytes
pub fn decode_map(bytes: &[u8], policy: &MapPolicy) -> Result<SpatialMap, PersistenceError> {
    let mut reader = bytes;
    read_map(&mut reader, policy)
}

/// Path of a map artifact inside a directory
pub fn artifact_path(dir: &Path, artifact: &str) -> PathBuf {
    dir.join(format!("{}.{}", artifact, FILE_EXTENSION))
}

/// Save a snapshot to a .bhmap file.
///
/// Writes to a temporary sibling and renames it into place, so a crash
/// never leaves a half-written map under `path`.
pub fn save_map(snapshot: &MapSnapshot, path: &Path) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = (|| -> Result<(), PersistenceError> {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        write_map(snapshot, &mut writer)?;
        let file = writer
            .into_inner()
            .map_err(|e| PersistenceError::Io(e.error().to_string()))?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Load a map from a .bhmap file
pub fn load_map(path: &Path, policy: &MapPolicy) -> Result<SpatialMap, PersistenceError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(PersistenceError::NeverSaved),
        Err(e) => return Err(e.into()),
    };
    read_map(&mut BufReader::new(file), policy)
}

/// Load a map, falling back to an empty one.
///
/// Returns the map and the error that caused the fallback, if any. Only an
/// invalid `policy` fails outright.
pub fn load_or_empty(
    path: &Path,
    policy: &MapPolicy,
) -> Result<(SpatialMap, Option<PersistenceError>), SettingsError> {
    match load_map(path, policy) {
        Ok(map) => Ok((map, None)),
        Err(PersistenceError::InvalidPolicy(e)) => Err(e),
        Err(e) => Ok((SpatialMap::new(policy.clone())?, Some(e))),
    }
}
