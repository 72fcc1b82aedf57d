//! `tokio_util` codec for use with `FramedRead`/`FramedWrite`.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_next_limited, encode_frame, enforce_buffer_limit, Frame, FrameConfig};
use crate::error::FrameError;

/// Frame codec for async byte streams (PTY handles, stdio, sockets).
#[derive(Debug, Clone)]
pub struct OscCodec {
    max_buffer_size: Option<usize>,
}

impl OscCodec {
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            max_buffer_size: config.max_buffer_size,
        }
    }
}

impl Default for OscCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for OscCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let frame = decode_next_limited(src, self.max_buffer_size);
        if let (None, Some(max)) = (&frame, self.max_buffer_size) {
            enforce_buffer_limit(src, max);
        }
        Ok(frame)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = decode_next_limited(src, self.max_buffer_size) {
            return Ok(Some(frame));
        }
        if !src.is_empty() {
            tracing::trace!(discarded = src.len(), "discarding partial frame at end of stream");
            src.clear();
        }
        Ok(None)
    }
}

impl Encoder<Frame> for OscCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(item.channel, &item.payload, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::channel::{CONTROLLED, SUPERVISOR};
    use crate::codec::encode_to_vec;

    #[tokio::test]
    async fn framed_read_skips_noise_and_ends_cleanly() {
        let mut wire = b"Last login: today\r\n".to_vec();
        wire.extend_from_slice(&encode_to_vec(SUPERVISOR, b"ping"));
        wire.extend_from_slice(b"\x1b]9999;!!!\x07");
        wire.extend_from_slice(&encode_to_vec(CONTROLLED, b"pong"));
        wire.extend_from_slice(b"\x1b]9998;dHJ1bmNhdGVk");

        let mut framed = FramedRead::new(wire.as_slice(), OscCodec::new());
        let mut frames = Vec::new();
        while let Some(frame) = framed.next().await {
            frames.push(frame.unwrap());
        }

        assert_eq!(
            frames,
            vec![Frame::new(SUPERVISOR, "ping"), Frame::new(CONTROLLED, "pong")]
        );
    }

    #[tokio::test]
    async fn framed_write_then_read() {
        let mut framed = FramedWrite::new(Vec::new(), OscCodec::new());
        framed.send(Frame::new(CONTROLLED, "one")).await.unwrap();
        framed.send(Frame::new(CONTROLLED, "")).await.unwrap();
        let wire = framed.into_inner();

        let frames: Vec<Frame> = FramedRead::new(wire.as_slice(), OscCodec::new())
            .map(|frame| frame.unwrap())
            .collect()
            .await;
        assert_eq!(
            frames,
            vec![Frame::new(CONTROLLED, "one"), Frame::new(CONTROLLED, "")]
        );
    }

    #[test]
    fn decode_bounds_buffer() {
        let cfg = FrameConfig {
            max_buffer_size: Some(16),
            ..FrameConfig::default()
        };
        let mut codec = OscCodec::with_config(&cfg);
        let mut src = BytesMut::from(&[b'.'; 64][..]);

        assert!(codec.decode(&mut src).unwrap().is_none());
        assert!(src.is_empty());
    }
}
