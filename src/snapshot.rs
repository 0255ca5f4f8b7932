//! Whole-session snapshots as a chunked byte stream.
//!
//! Layout:
//!
//! ```text
//! "ORRY" | version: u16 LE | payload length: u32 LE | payload | FNV-1a: u32 LE
//! ```
//!
//! The payload is the bincode encoding of the running [`Plugin`].

use crate::error::{PluginError, PluginResult};
use crate::plugin::{Phase, Plugin};
use tracing::info;

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"ORRY";
pub const SNAPSHOT_VERSION: u16 = 1;
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

const HEADER_SIZE: usize = 4 + 2 + 4;
const CHECKSUM_SIZE: usize = 4;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

pub fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME))
}

fn corrupt(context: &'static str, reason: impl Into<String>) -> PluginError {
    PluginError::CorruptSnapshot { context, reason: reason.into() }
}

/// Encodes a running plugin into a complete stream.
pub fn serialize_plugin(plugin: &Plugin) -> PluginResult<Vec<u8>> {
    if plugin.phase() != Phase::Running {
        return Err(PluginError::WrongPhase { operation: "serialize_plugin", phase: plugin.phase() });
    }
    let payload = bincode::serde::encode_to_vec(plugin, bincode::config::standard())
        .map_err(|e| PluginError::SnapshotEncoding(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| PluginError::SnapshotEncoding(alloc::format!("payload of {} bytes", payload.len())))?;

    let mut stream = Vec::with_capacity(HEADER_SIZE + payload.len() + CHECKSUM_SIZE);
    stream.extend_from_slice(&SNAPSHOT_MAGIC);
    stream.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    stream.extend_from_slice(&length.to_le_bytes());
    stream.extend_from_slice(&payload);
    stream.extend_from_slice(&fnv1a(&payload).to_le_bytes());
    info!("serialized plugin into {} bytes", stream.len());
    Ok(stream)
}

/// Rebuilds a plugin from a complete stream. The result is always running.
pub fn deserialize_plugin(stream: &[u8]) -> PluginResult<Plugin> {
    if stream.len() < HEADER_SIZE + CHECKSUM_SIZE {
        return Err(corrupt("header", alloc::format!("stream of {} bytes is truncated", stream.len())));
    }
    let (header, rest) = stream.split_at(HEADER_SIZE);
    if header[0..4] != SNAPSHOT_MAGIC {
        return Err(corrupt("magic", "not an orrery snapshot"));
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != SNAPSHOT_VERSION {
        return Err(corrupt("version", alloc::format!("unsupported version {version}")));
    }
    let length = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;
    if rest.len() != length + CHECKSUM_SIZE {
        return Err(corrupt(
            "length",
            alloc::format!("header announces {} payload bytes, stream carries {}", length, rest.len().saturating_sub(CHECKSUM_SIZE)),
        ));
    }

    let (payload, checksum) = rest.split_at(length);
    let expected = u32::from_le_bytes([checksum[0], checksum[1], checksum[2], checksum[3]]);
    let actual = fnv1a(payload);
    if expected != actual {
        return Err(corrupt("checksum", alloc::format!("expected {expected:#010x}, computed {actual:#010x}")));
    }

    let (plugin, consumed): (Plugin, usize) = bincode::serde::decode_from_slice(payload, bincode::config::standard())
        .map_err(|e| corrupt("payload", e.to_string()))?;
    if consumed != payload.len() {
        return Err(corrupt("payload", alloc::format!("{} trailing byte(s)", payload.len() - consumed)));
    }
    if plugin.phase() != Phase::Running {
        return Err(corrupt("phase", alloc::format!("snapshot of a {} plugin", plugin.phase())));
    }
    info!("deserialized plugin at t = {} s", plugin.current_time());
    Ok(plugin)
}

/// Hands out a serialized plugin one chunk at a time.
#[derive(Debug)]
pub struct PluginSerializer {
    stream: Vec<u8>,
    position: usize,
    chunk_size: usize,
}

impl PluginSerializer {
    pub fn new(plugin: &Plugin, chunk_size: usize) -> PluginResult<Self> {
        if chunk_size == 0 {
            return Err(PluginError::invalid("chunk_size", "must be at least 1"));
        }
        Ok(Self { stream: serialize_plugin(plugin)?, position: 0, chunk_size })
    }

    pub fn total_size(&self) -> usize {
        self.stream.len()
    }

    /// Next chunk, or `None` once the whole stream has been handed out.
    pub fn next_chunk(&mut self) -> Option<&[u8]> {
        if self.position >= self.stream.len() {
            return None;
        }
        let end = (self.position + self.chunk_size).min(self.stream.len());
        let chunk = &self.stream[self.position..end];
        self.position = end;
        Some(chunk)
    }
}

/// Accumulates chunks until the stream is complete.
#[derive(Debug, Default)]
pub struct PluginDeserializer {
    buffer: Vec<u8>,
}

impl PluginDeserializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    pub fn received(&self) -> usize {
        self.buffer.len()
    }

    pub fn finish(self) -> PluginResult<Plugin> {
        deserialize_plugin(&self.buffer)
    }
}
