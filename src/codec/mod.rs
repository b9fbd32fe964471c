//! Cache Codec
//!
//! Values are stored inside a small versioned envelope:
//!
//! ```text
//! +-------+----------+-----------------------------+
//! | "OCz" | protocol | payload                     |
//! +-------+----------+-----------------------------+
//! ```
//!
//! Protocol 1 carries the raw bincode serialization. Protocol 2 (current)
//! carries the same bytes zlib-compressed. Any decode failure is reported as
//! a [`CodecError`] and callers treat it as a cache miss.

pub mod migration;

pub use migration::{MigrationReport, Migrator};

use crate::error::CodecError;
use bincode::Options;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

/// Leading bytes of every envelope.
pub const MAGIC: &[u8; 3] = b"OCz";

/// Protocol written by [`CacheCodec::encode`].
pub const PROTOCOL_VERSION: u8 = 2;

/// Uncompressed protocol still accepted on read.
pub const LEGACY_PROTOCOL: u8 = 1;

/// Upper bound on a decoded payload; guards against corrupt length prefixes.
const MAX_PAYLOAD_BYTES: u64 = 256 * 1024 * 1024;

const HEADER_LEN: usize = MAGIC.len() + 1;

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_PAYLOAD_BYTES)
}

/// Serializes values into cache envelopes and back.
pub struct CacheCodec;

impl CacheCodec {
    /// Encode `value` with the current protocol.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
        Self::encode_with_protocol(value, PROTOCOL_VERSION)
    }

    /// Encode `value` with an explicit protocol version.
    pub fn encode_with_protocol<T: Serialize + ?Sized>(
        value: &T,
        protocol: u8,
    ) -> Result<Vec<u8>, CodecError> {
        let raw = bincode_options().serialize(value)?;
        Self::wrap(protocol, &raw)
    }

    /// Decode an envelope written with any supported protocol.
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        let raw = Self::unwrap(bytes)?;
        Ok(bincode_options().deserialize(&raw)?)
    }

    /// Protocol version recorded in an envelope header.
    pub fn protocol_of(bytes: &[u8]) -> Result<u8, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::Truncated(bytes.len()));
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(CodecError::BadMagic);
        }
        match bytes[MAGIC.len()] {
            p @ (LEGACY_PROTOCOL | PROTOCOL_VERSION) => Ok(p),
            other => Err(CodecError::UnknownProtocol(other)),
        }
    }

    /// Re-wrap an envelope in the current protocol without decoding the value.
    pub fn upgrade(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        let raw = Self::unwrap(bytes)?;
        Self::wrap(PROTOCOL_VERSION, &raw)
    }

    fn wrap(protocol: u8, raw: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(HEADER_LEN + raw.len());
        out.extend_from_slice(MAGIC);
        out.push(protocol);
        match protocol {
            LEGACY_PROTOCOL => out.extend_from_slice(raw),
            PROTOCOL_VERSION => {
                let mut encoder = ZlibEncoder::new(out, Compression::default());
                encoder.write_all(raw).map_err(CodecError::Compression)?;
                out = encoder.finish().map_err(CodecError::Compression)?;
            }
            other => return Err(CodecError::UnknownProtocol(other)),
        }
        Ok(out)
    }

    fn unwrap(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        let protocol = Self::protocol_of(bytes)?;
        let payload = &bytes[HEADER_LEN..];
        match protocol {
            LEGACY_PROTOCOL => Ok(payload.to_vec()),
            _ => {
                let mut raw = Vec::new();
                ZlibDecoder::new(payload)
                    .take(MAX_PAYLOAD_BYTES)
                    .read_to_end(&mut raw)
                    .map_err(CodecError::Compression)?;
                Ok(raw)
            }
        }
    }
}
