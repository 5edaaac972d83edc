//! NDJSON decoding of a streamed /api/chat response body

use crate::types::OllamaChunk;
use futures::{future, Stream, StreamExt, TryStreamExt};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

/// Longest NDJSON line accepted before the stream is failed.
pub const MAX_LINE_BYTES: usize = 8 * 1024 * 1024;

/// Failure while reading or decoding one chunk.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("{0}")]
    Read(#[from] LinesCodecError),

    #[error("invalid chunk: {0}")]
    Decode(#[from] serde_json::Error),

    /// In-band `{"error": "..."}` line sent by the server.
    #[error("{0}")]
    Remote(String),
}

/// Split a byte stream into lines and parse each non-blank one as a chunk.
pub fn decode_chunks<S, E>(
    bytes_stream: S,
) -> impl Stream<Item = Result<OllamaChunk, ChunkError>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    decode_chunks_with_limit(bytes_stream, MAX_LINE_BYTES)
}

/// Like [`decode_chunks`], failing with [`LinesCodecError::MaxLineLengthExceeded`]
/// once a line grows past `max_line_bytes` without a newline.
pub fn decode_chunks_with_limit<S, E>(
    bytes_stream: S,
    max_line_bytes: usize,
) -> impl Stream<Item = Result<OllamaChunk, ChunkError>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let reader = StreamReader::new(bytes_stream.map_err(std::io::Error::other));

    FramedRead::new(reader, LinesCodec::new_with_max_length(max_line_bytes))
        .try_filter(|line| future::ready(!line.trim().is_empty()))
        .map(|line| parse_line(&line?))
}

fn parse_line(line: &str) -> Result<OllamaChunk, ChunkError> {
    let chunk: OllamaChunk = serde_json::from_str(line)?;
    match chunk.error {
        Some(message) => Err(ChunkError::Remote(message)),
        None => Ok(chunk),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn body(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send {
        futures::stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn lines_split_across_reads() {
        let chunks: Vec<_> = decode_chunks(body(&[
            "{\"message\":{\"content\":\"He",
            "llo\"}}\n\n{\"eval_count\":3}",
        ]))
        .collect()
        .await;

        assert_eq!(chunks.len(), 2);
        let first = chunks[0].as_ref().unwrap();
        assert_eq!(first.content(), Some("Hello"));
        let second = chunks[1].as_ref().unwrap();
        assert_eq!(second.eval_count, Some(3));
    }

    #[tokio::test]
    async fn error_line_becomes_remote_error() {
        let chunks: Vec<_> = decode_chunks(body(&["{\"error\":\"model crashed\"}\n"]))
            .collect()
            .await;
        match &chunks[0] {
            Err(ChunkError::Remote(m)) => assert_eq!(m, "model crashed"),
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn overlong_line_is_read_error() {
        let chunks: Vec<_> = decode_chunks_with_limit(
            body(&["{\"message\":{\"content\":\"", "aaaaaaaaaaaaaaaaaaaaaaaa"]),
            16,
        )
        .collect()
        .await;

        assert!(matches!(
            chunks.first(),
            Some(Err(ChunkError::Read(LinesCodecError::MaxLineLengthExceeded)))
        ));
    }

    #[tokio::test]
    async fn garbage_line_is_decode_error() {
        let chunks: Vec<_> = decode_chunks(body(&["not json\n"])).collect().await;
        let err = chunks[0].as_ref().unwrap_err();
        assert!(matches!(err, ChunkError::Decode(_)));
        assert!(err.to_string().starts_with("invalid chunk"));
    }
}
