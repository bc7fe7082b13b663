//! Binary model format for HNSW indexes.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! magic "HKIX" | version u32 | saved_at_ms i64 | dimension u32 | distance u8
//! max_elements u32 | count u32 | m u32 | m_max0 u32 | ef_construction u32
//! ef_search u32 | normalize u8 | seed u64 | max_level u32 | entry_point u32
//! per node: label u32 | index (len u32 + utf-8) | level u32 | vector f32 * dimension
//!           per layer 0..=level: count u32 | neighbor u32 * count
//! crc32 u32 over every preceding byte
//! ```
//!
//! Files are written to a sibling temp file and renamed into place.

use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::graph::{HnswConfig, HnswIndex, MAX_LEVEL, Node};
use crate::error::{HnswkitError, Result};
use crate::space::{DistanceKind, Space};

const MAGIC: &[u8; 4] = b"HKIX";
const VERSION: u32 = 1;
const NO_ENTRY: u32 = u32::MAX;

impl HnswIndex {
    /// Serialize the index to `path`, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut buf = Vec::with_capacity(self.estimated_size());
        self.encode(&mut buf)?;
        let crc = crc32fast::hash(&buf);
        buf.write_u32::<LittleEndian>(crc)?;

        let tmp_path = path.with_file_name(format!(
            "{}.{}.tmp",
            path.file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("model"),
            uuid::Uuid::new_v4()
        ));
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        tracing::debug!(
            path = %path.display(),
            nodes = self.len(),
            bytes = buf.len(),
            "Saved HNSW model, CRC32 {:#010x}",
            crc
        );
        Ok(())
    }

    /// Load an index from `path` into `space`.
    ///
    /// The stored dimension and distance kind must match `space`.
    pub fn load(path: &Path, space: Space) -> Result<Self> {
        if !path.exists() {
            return Err(HnswkitError::path(format!(
                "model file not found: {}",
                path.display()
            )));
        }
        let bytes = fs::read(path)?;
        if bytes.len() < MAGIC.len() + 4 {
            return Err(HnswkitError::corrupt("model file is truncated"));
        }

        let (payload, footer) = bytes.split_at(bytes.len() - 4);
        let stored_crc = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
        let computed_crc = crc32fast::hash(payload);
        if stored_crc != computed_crc {
            return Err(HnswkitError::corrupt(format!(
                "checksum mismatch: stored {stored_crc:#010x}, computed {computed_crc:#010x}"
            )));
        }

        let index = Self::decode(&mut Cursor::new(payload), space).map_err(|e| match e {
            HnswkitError::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
                HnswkitError::corrupt("model file is truncated")
            }
            other => other,
        })?;

        tracing::debug!(path = %path.display(), nodes = index.len(), "Loaded HNSW model");
        Ok(index)
    }

    fn estimated_size(&self) -> usize {
        let per_node = 16 + self.dimension() * 4 + self.config.m_max0 * 4 * 2;
        64 + self.nodes.len() * per_node
    }

    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(MAGIC)?;
        w.write_u32::<LittleEndian>(VERSION)?;
        w.write_i64::<LittleEndian>(chrono::Utc::now().timestamp_millis())?;
        w.write_u32::<LittleEndian>(self.dimension() as u32)?;
        w.write_u8(self.space.kind().tag())?;
        w.write_u32::<LittleEndian>(self.config.max_elements as u32)?;
        w.write_u32::<LittleEndian>(self.nodes.len() as u32)?;
        w.write_u32::<LittleEndian>(self.config.m as u32)?;
        w.write_u32::<LittleEndian>(self.config.m_max0 as u32)?;
        w.write_u32::<LittleEndian>(self.config.ef_construction as u32)?;
        w.write_u32::<LittleEndian>(self.config.ef_search as u32)?;
        w.write_u8(u8::from(self.config.normalize))?;
        w.write_u64::<LittleEndian>(self.config.seed)?;
        w.write_u32::<LittleEndian>(self.max_level as u32)?;
        w.write_u32::<LittleEndian>(self.entry_point.unwrap_or(NO_ENTRY))?;

        for (label, node) in self.nodes.iter().enumerate() {
            w.write_u32::<LittleEndian>(label as u32)?;
            let index = node.index.as_bytes();
            w.write_u32::<LittleEndian>(index.len() as u32)?;
            w.write_all(index)?;
            w.write_u32::<LittleEndian>(node.level as u32)?;
            for &value in &node.vector {
                w.write_f32::<LittleEndian>(value)?;
            }
            for layer in &node.neighbors {
                w.write_u32::<LittleEndian>(layer.len() as u32)?;
                for &neighbor in layer {
                    w.write_u32::<LittleEndian>(neighbor)?;
                }
            }
        }
        Ok(())
    }

    fn decode<R: Read>(r: &mut R, space: Space) -> Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(HnswkitError::corrupt("not an hnswkit model file"));
        }
        let version = r.read_u32::<LittleEndian>()?;
        if version != VERSION {
            return Err(HnswkitError::corrupt(format!(
                "unsupported model version {version}"
            )));
        }
        let saved_at = r.read_i64::<LittleEndian>()?;

        let dimension = r.read_u32::<LittleEndian>()? as usize;
        if dimension != space.dimension() {
            return Err(HnswkitError::param(format!(
                "model dimension {dimension} does not match configured dimension {}",
                space.dimension()
            )));
        }
        let kind = DistanceKind::from_tag(r.read_u8()?)?;
        if kind != space.kind() {
            return Err(HnswkitError::param(format!(
                "model distance {kind} does not match configured distance {}",
                space.kind()
            )));
        }

        let max_elements = r.read_u32::<LittleEndian>()? as usize;
        let count = r.read_u32::<LittleEndian>()? as usize;
        let config = HnswConfig {
            m: r.read_u32::<LittleEndian>()? as usize,
            m_max0: r.read_u32::<LittleEndian>()? as usize,
            ef_construction: r.read_u32::<LittleEndian>()? as usize,
            ef_search: r.read_u32::<LittleEndian>()? as usize,
            normalize: r.read_u8()? != 0,
            seed: r.read_u64::<LittleEndian>()?,
            max_elements,
        };
        if count > max_elements {
            return Err(HnswkitError::corrupt(format!(
                "model holds {count} nodes but capacity is {max_elements}"
            )));
        }
        let max_level = r.read_u32::<LittleEndian>()? as usize;
        let entry_point = match r.read_u32::<LittleEndian>()? {
            NO_ENTRY => None,
            label if (label as usize) < count => Some(label),
            label => {
                return Err(HnswkitError::corrupt(format!(
                    "entry point {label} out of range"
                )));
            }
        };

        let mut nodes = Vec::with_capacity(count);
        for expected in 0..count as u32 {
            let label = r.read_u32::<LittleEndian>()?;
            if label != expected {
                return Err(HnswkitError::corrupt(format!(
                    "node {expected} stored with label {label}"
                )));
            }
            let len = r.read_u32::<LittleEndian>()? as usize;
            let mut raw = vec![0u8; len];
            r.read_exact(&mut raw)?;
            let index = String::from_utf8(raw)
                .map_err(|_| HnswkitError::corrupt(format!("node {label} index is not utf-8")))?;

            let level = r.read_u32::<LittleEndian>()? as usize;
            if level > MAX_LEVEL {
                return Err(HnswkitError::corrupt(format!("node {label} level {level}")));
            }
            let mut vector = vec![0f32; dimension];
            r.read_f32_into::<LittleEndian>(&mut vector)?;

            let mut node = Node::new(index, vector, level);
            for layer in node.neighbors.iter_mut() {
                let degree = r.read_u32::<LittleEndian>()? as usize;
                if degree > config.m_max0 {
                    return Err(HnswkitError::corrupt(format!(
                        "node {label} has {degree} neighbors"
                    )));
                }
                layer.reserve(degree);
                for _ in 0..degree {
                    let neighbor = r.read_u32::<LittleEndian>()?;
                    if neighbor as usize >= count {
                        return Err(HnswkitError::corrupt(format!(
                            "node {label} links to missing node {neighbor}"
                        )));
                    }
                    layer.push(neighbor);
                }
            }
            nodes.push(node);
        }

        let mut trailing = [0u8; 1];
        if r.read(&mut trailing)? != 0 {
            return Err(HnswkitError::corrupt("trailing bytes after last node"));
        }

        if let Some(saved) = chrono::DateTime::from_timestamp_millis(saved_at) {
            tracing::trace!(saved_at = %saved.to_rfc3339(), "Decoded model header");
        }

        HnswIndex::from_parts(space, config, nodes, entry_point, max_level)
    }
}
