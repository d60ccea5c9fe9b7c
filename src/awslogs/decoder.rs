use std::io::Read;

use base64::prelude::*;
use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
use serde_json::Value;
use tracing::debug;

use crate::awslogs::{LogBatch, LogBundle};

/// A batch that could not be turned into a [`LogBundle`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload has no awslogs.data field")]
    MissingData,
    #[error("invalid base64 in awslogs.data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to inflate {framing:?} payload: {source}")]
    Inflate {
        framing: Framing,
        source: std::io::Error,
    },
    #[error("invalid log batch document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Compression framing of a batch, detected from its first bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Gzip,
    Zlib,
    Deflate,
}

impl Framing {
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Framing {
        match bytes {
            [0x1f, 0x8b, ..] => Framing::Gzip,
            [cmf, flg, ..]
                if cmf & 0x0f == 8 && ((u16::from(*cmf) << 8) | u16::from(*flg)) % 31 == 0 =>
            {
                Framing::Zlib
            }
            _ => Framing::Deflate,
        }
    }
}

/// Decodes `awslogs.data` into a bundle: base64, inflate, JSON.
pub fn decode(batch: &LogBatch) -> Result<LogBundle, DecodeError> {
    let compressed = BASE64_STANDARD.decode(batch.data.trim())?;
    let raw = inflate(&compressed)?;
    let bundle: LogBundle = serde_json::from_slice(&raw)?;
    debug!(
        "Decoded {} log events from {}",
        bundle.log_events.len(),
        bundle.log_group
    );
    Ok(bundle)
}

/// Decodes a whole invocation payload of the form `{"awslogs": {"data": ...}}`.
pub fn decode_payload(payload: &Value) -> Result<LogBundle, DecodeError> {
    let data = payload
        .get("awslogs")
        .and_then(|awslogs| awslogs.get("data"))
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingData)?;
    decode(&LogBatch {
        data: data.to_string(),
    })
}

fn inflate(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let framing = Framing::detect(bytes);
    let mut inflated = Vec::new();
    let result = match framing {
        Framing::Gzip => MultiGzDecoder::new(bytes).read_to_end(&mut inflated),
        Framing::Zlib => ZlibDecoder::new(bytes).read_to_end(&mut inflated),
        Framing::Deflate => DeflateDecoder::new(bytes).read_to_end(&mut inflated),
    };
    result.map_err(|source| DecodeError::Inflate { framing, source })?;
    Ok(inflated)
}
