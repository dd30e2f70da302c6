//! Wire codec for remote-read messages: protobuf framed with raw snappy.
//!
//! Remote-read uses snappy's block format (no stream framing). Size checks run
//! against the declared length, the compressed body, and the decompressed
//! length announced in the snappy header, all before decompression allocates.

use bytes::Bytes;
use prost::Message;

use crate::error::{Error, Result};
use crate::proto::{ReadRequest, ReadResponse};

/// Default ceiling for request bodies.
///
/// Queries are matchers plus time ranges and should never get into megabytes.
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Decodes a snappy-compressed protobuf message under a size ceiling.
///
/// `declared_len` is the length announced by the transport (e.g. the
/// `Content-Length` header), if any.
pub fn decode_message<M: Message + Default>(
    body: &[u8],
    declared_len: Option<usize>,
    max_size: usize,
) -> Result<M> {
    if let Some(declared) = declared_len.filter(|&len| len > max_size) {
        return Err(Error::PayloadTooLarge {
            size: declared,
            limit: max_size,
        });
    }
    if body.len() > max_size {
        return Err(Error::PayloadTooLarge {
            size: body.len(),
            limit: max_size,
        });
    }

    let decompressed_len = snap::raw::decompress_len(body)
        .map_err(|e| Error::MalformedPayload(format!("invalid snappy header: {}", e)))?;
    if decompressed_len > max_size {
        return Err(Error::PayloadTooLarge {
            size: decompressed_len,
            limit: max_size,
        });
    }

    let raw = snap::raw::Decoder::new()
        .decompress_vec(body)
        .map_err(|e| Error::MalformedPayload(format!("snappy decompression failed: {}", e)))?;

    M::decode(raw.as_slice())
        .map_err(|e| Error::MalformedPayload(format!("invalid protobuf: {}", e)))
}

/// Encodes a protobuf message and compresses it with raw snappy.
pub fn encode_message<M: Message>(message: &M) -> Result<Bytes> {
    let raw = message.encode_to_vec();
    let compressed = snap::raw::Encoder::new()
        .compress_vec(&raw)
        .map_err(|e| Error::Encoding(format!("snappy compression failed: {}", e)))?;
    Ok(Bytes::from(compressed))
}

/// Decodes an inbound remote-read request.
pub fn decode_read_request(
    body: &[u8],
    declared_len: Option<usize>,
    max_size: usize,
) -> Result<ReadRequest> {
    decode_message(body, declared_len, max_size)
}

/// Encodes an outbound remote-read response.
pub fn encode_read_response(response: &ReadResponse) -> Result<Bytes> {
    encode_message(response)
}

/// Encodes a remote-read request, as a client would.
pub fn encode_read_request(request: &ReadRequest) -> Result<Bytes> {
    encode_message(request)
}

/// Decodes a remote-read response, as a client would.
pub fn decode_read_response(body: &[u8], max_size: usize) -> Result<ReadResponse> {
    decode_message(body, None, max_size)
}
