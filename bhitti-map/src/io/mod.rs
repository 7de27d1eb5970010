//! Map persistence.
//!
//! Supports the native .bhmap binary format.

mod bhitti_format;

pub use bhitti_format::{
    FILE_EXTENSION, FORMAT_VERSION, HEADER_SIZE, MapHeader, PersistenceError, RECORD_SIZE,
    artifact_path, decode_map, encode_map, load_map, load_or_empty, read_header, read_map,
    read_points, save_map, write_map,
};
