use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Escape byte that opens the operating system command introducer.
pub const ESC: u8 = 0x1B;

/// Bell byte that terminates every frame.
pub const BEL: u8 = 0x07;

/// Operating system command introducer: `ESC ]`.
pub const OSC_INTRODUCER: [u8; 2] = [ESC, b']'];

/// Separator between the channel id and the payload text.
pub const SEPARATOR: u8 = b';';

/// A control message carried on one channel of the terminal stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The channel this message belongs to.
    pub channel: u32,
    /// The raw message payload (already base64-decoded).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(channel: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame once encoded.
    pub fn wire_size(&self) -> usize {
        encoded_size(self.channel, self.payload.len())
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────────┬─────┬──────────────────┬──────┐
/// │ ESC ']'  │ channel (ASCII   │ ';' │ base64(payload)  │ BEL  │
/// │ 1B 5D    │ decimal digits)  │ 3B  │ standard, padded │ 07   │
/// └──────────┴──────────────────┴─────┴──────────────────┴──────┘
/// ```
///
/// The base64 alphabet never contains BEL or ESC, so the payload cannot end
/// the frame early. Encoding cannot fail.
pub fn encode_frame(channel: u32, payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(encoded_size(channel, payload.len()));
    dst.put_slice(&OSC_INTRODUCER);
    dst.put_slice(channel.to_string().as_bytes());
    dst.put_u8(SEPARATOR);
    dst.put_slice(STANDARD.encode(payload).as_bytes());
    dst.put_u8(BEL);
}

/// Encode a frame into a freshly allocated byte vector.
pub fn encode_to_vec(channel: u32, payload: &[u8]) -> Vec<u8> {
    let mut dst = BytesMut::with_capacity(encoded_size(channel, payload.len()));
    encode_frame(channel, payload, &mut dst);
    dst.to_vec()
}

fn encoded_size(channel: u32, payload_len: usize) -> usize {
    let text = base64::encoded_len(payload_len, true).unwrap_or(usize::MAX - 16);
    OSC_INTRODUCER.len() + decimal_len(channel) + 1 + text + 1
}

fn decimal_len(mut n: u32) -> usize {
    let mut len = 1;
    while n >= 10 {
        n /= 10;
        len += 1;
    }
    len
}

/// Decode every complete frame in `buf`.
///
/// Returns the decoded frames in stream order together with the bytes after
/// the last delimiter, which may hold a frame still in flight. A buffer
/// without a BEL comes back unchanged as the remainder.
///
/// Each BEL ends one candidate whether or not it is valid; malformed
/// candidates are skipped and never reported as errors.
pub fn decode(mut buf: &[u8]) -> (Vec<Frame>, &[u8]) {
    let mut frames = Vec::new();
    while let Some(end) = find_delimiter(buf) {
        if let Some(frame) = decode_candidate(&buf[..end]) {
            frames.push(frame);
        }
        buf = &buf[end + 1..];
    }
    (frames, buf)
}

/// Decode the next valid frame from a buffer.
///
/// Consumes every candidate up to and including the first valid one.
/// Returns `None` once no delimiter remains; the unconsumed tail is left
/// in `src`.
pub fn decode_next(src: &mut BytesMut) -> Option<Frame> {
    decode_next_limited(src, None)
}

/// Like [`decode_next`], but drops frames whose encoding is longer than
/// `limit` bytes.
///
/// The length counted runs from the frame's `ESC ]` up to, not including,
/// the BEL. This is the same span [`enforce_buffer_limit`] keeps for a frame
/// still in flight, so a frame is kept or dropped the same way whether it
/// arrives whole or in pieces.
pub fn decode_next_limited(src: &mut BytesMut, limit: Option<usize>) -> Option<Frame> {
    while let Some(end) = find_delimiter(src) {
        let candidate = src.split_to(end);
        src.advance(1);
        if limit.is_some_and(|max| frame_span(&candidate) > max) {
            tracing::trace!(
                len = candidate.len(),
                "dropping candidate longer than buffer limit"
            );
            continue;
        }
        if let Some(frame) = decode_candidate(&candidate) {
            return Some(frame);
        }
    }
    None
}

/// Decode every complete frame from a buffer, leaving the partial tail.
pub fn decode_frames(src: &mut BytesMut) -> Vec<Frame> {
    std::iter::from_fn(|| decode_next(src)).collect()
}

/// Validate one candidate: the bytes preceding a BEL.
///
/// The frame starts at the last `ESC ]` in the candidate. Anything before it
/// is terminal output that happened to share the candidate and is ignored.
pub fn decode_candidate(candidate: &[u8]) -> Option<Frame> {
    let Some(start) = rfind_introducer(candidate) else {
        tracing::trace!(len = candidate.len(), "dropping candidate without OSC introducer");
        return None;
    };
    let body = &candidate[start + OSC_INTRODUCER.len()..];

    let Some(sep) = body.iter().position(|&b| b == SEPARATOR) else {
        tracing::trace!(len = body.len(), "dropping candidate without separator");
        return None;
    };

    let Some(channel) = parse_channel(&body[..sep]) else {
        tracing::trace!(len = sep, "dropping candidate with invalid channel id");
        return None;
    };

    match STANDARD.decode(&body[sep + 1..]) {
        Ok(payload) => Some(Frame::new(channel, payload)),
        Err(err) => {
            tracing::trace!(channel, error = %err, "dropping candidate with malformed payload");
            None
        }
    }
}

/// Discard buffered bytes that can no longer become part of a frame.
///
/// Only applies once `src` exceeds `max`. Nothing before the last ESC can
/// belong to a frame, so that prefix goes first; if a single unfinished
/// frame is still larger than `max` it is dropped too. Returns the number
/// of bytes discarded.
pub fn enforce_buffer_limit(src: &mut BytesMut, max: usize) -> usize {
    if src.len() <= max {
        return 0;
    }

    let before = src.len();
    match src.iter().rposition(|&b| b == ESC) {
        Some(pos) => src.advance(pos),
        None => src.clear(),
    }
    if src.len() > max {
        src.clear();
    }

    let discarded = before - src.len();
    tracing::debug!(discarded, max, "parse buffer over limit, discarded noise");
    discarded
}

fn frame_span(candidate: &[u8]) -> usize {
    rfind_introducer(candidate).map_or(0, |start| candidate.len() - start)
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == BEL)
}

fn rfind_introducer(candidate: &[u8]) -> Option<usize> {
    candidate
        .windows(OSC_INTRODUCER.len())
        .rposition(|w| w == OSC_INTRODUCER)
}

fn parse_channel(digits: &[u8]) -> Option<u32> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    digits.iter().try_fold(0u32, |acc, &d| {
        acc.checked_mul(10)?.checked_add(u32::from(d - b'0'))
    })
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum unconsumed bytes a reader retains. `None` (the default)
    /// buffers without bound, so payloads of any length get through.
    ///
    /// With a limit, frames longer than the limit are dropped however the
    /// stream is chunked.
    pub max_buffer_size: Option<usize>,
    /// Append `\n` after each BEL when writing, for line-buffered terminals.
    pub trailing_newline: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: None,
            trailing_newline: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{CONTROLLED, SUPERVISOR};

    #[test]
    fn test_encode_wire_format() {
        let wire = encode_to_vec(SUPERVISOR, b"ping");
        assert_eq!(wire, b"\x1b]9998;cGluZw==\x07");
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"hello, osclink!";

        encode_frame(CONTROLLED, payload, &mut buf);
        assert_eq!(buf.len(), Frame::new(CONTROLLED, Bytes::from_static(payload)).wire_size());

        let frame = decode_next(&mut buf).unwrap();
        assert_eq!(frame.channel, CONTROLLED);
        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let wire = encode_to_vec(0, b"");
        assert_eq!(wire, b"\x1b]0;\x07");

        let (frames, rest) = decode(&wire);
        assert_eq!(frames, vec![Frame::new(0, Bytes::new())]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_payload_with_control_bytes() {
        let payload = [BEL, ESC, b']', b';', 0x00, 0xFF];
        let wire = encode_to_vec(7, &payload);
        assert_eq!(wire.iter().filter(|&&b| b == BEL).count(), 1);

        let (frames, rest) = decode(&wire);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), payload);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_decode_without_delimiter_is_unchanged() {
        let input = b"\x1b]9998;cGlu";
        let (frames, rest) = decode(input);
        assert!(frames.is_empty());
        assert_eq!(rest, input);

        let mut buf = BytesMut::from(&input[..]);
        assert!(decode_frames(&mut buf).is_empty());
        assert_eq!(buf.as_ref(), input);
    }

    #[test]
    fn test_decode_retains_partial_tail() {
        let mut wire = encode_to_vec(SUPERVISOR, b"one");
        wire.extend_from_slice(b"\x1b]9999;dH");

        let (frames, rest) = decode(&wire);
        assert_eq!(frames, vec![Frame::new(SUPERVISOR, &b"one"[..])]);
        assert_eq!(rest, b"\x1b]9999;dH");
    }

    #[test]
    fn test_multiple_frames_in_order() {
        let mut buf = BytesMut::new();
        encode_frame(SUPERVISOR, b"first", &mut buf);
        encode_frame(CONTROLLED, b"second", &mut buf);
        encode_frame(42, b"third", &mut buf);

        let frames = decode_frames(&mut buf);
        let got: Vec<_> = frames
            .iter()
            .map(|f| (f.channel, f.payload.as_ref()))
            .collect();
        assert_eq!(
            got,
            vec![
                (SUPERVISOR, b"first".as_ref()),
                (CONTROLLED, b"second".as_ref()),
                (42, b"third".as_ref()),
            ]
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_malformed_base64_is_dropped() {
        let mut input = b"\x1b]9999;!!!not-base64!!!\x07followed-by-".to_vec();
        input.extend_from_slice(&encode_to_vec(SUPERVISOR, b"x"));

        let (frames, rest) = decode(&input);
        assert_eq!(frames, vec![Frame::new(SUPERVISOR, &b"x"[..])]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_lone_delimiters_are_dropped() {
        let (frames, rest) = decode(b"\x07");
        assert!(frames.is_empty());
        assert!(rest.is_empty());

        let mut input = b"\x07\x07".to_vec();
        input.extend_from_slice(&encode_to_vec(CONTROLLED, b"after"));
        let (frames, rest) = decode(&input);
        assert_eq!(frames, vec![Frame::new(CONTROLLED, &b"after"[..])]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_invalid_candidates() {
        assert!(decode_candidate(b"").is_none());
        assert!(decode_candidate(b"9998;cGluZw==").is_none());
        assert!(decode_candidate(b"\x1b]9998cGluZw==").is_none());
        assert!(decode_candidate(b"\x1b];cGluZw==").is_none());
        assert!(decode_candidate(b"\x1b]+9998;cGluZw==").is_none());
        assert!(decode_candidate(b"\x1b]99a8;cGluZw==").is_none());
        assert!(decode_candidate(b"\x1b]4294967296;cGluZw==").is_none());
        assert!(decode_candidate(b"\x1b]9998;cGluZw").is_none());
        assert!(decode_candidate(b"\x1b]0;window title").is_none());
    }

    #[test]
    fn test_channel_id_bounds() {
        let frame = decode_candidate(b"\x1b]4294967295;eA==").unwrap();
        assert_eq!(frame.channel, u32::MAX);

        let frame = decode_candidate(b"\x1b]007;eA==").unwrap();
        assert_eq!(frame.channel, 7);
    }

    #[test]
    fn test_noise_before_introducer_is_ignored() {
        let frame = decode_candidate(b"\nsome output\x1b[0m\x1b]9999;eA==").unwrap();
        assert_eq!(frame, Frame::new(CONTROLLED, &b"x"[..]));
    }

    #[test]
    fn test_trailing_newline_between_frames() {
        let mut input = encode_to_vec(CONTROLLED, b"a");
        input.push(b'\n');
        input.extend_from_slice(&encode_to_vec(CONTROLLED, b"b"));
        input.push(b'\n');

        let (frames, rest) = decode(&input);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].payload.as_ref(), b"b");
        assert_eq!(rest, b"\n");
    }

    #[test]
    fn test_buffer_limit_keeps_from_last_escape() {
        let mut buf = BytesMut::from(&b"0123456789\x1b]99"[..]);
        assert_eq!(enforce_buffer_limit(&mut buf, 64), 0);

        let discarded = enforce_buffer_limit(&mut buf, 8);
        assert_eq!(discarded, 10);
        assert_eq!(buf.as_ref(), b"\x1b]99");
    }

    #[test]
    fn test_buffer_limit_clears_noise_without_escape() {
        let mut buf = BytesMut::from(&b"plain terminal output"[..]);
        assert_eq!(enforce_buffer_limit(&mut buf, 4), 21);
        assert!(buf.is_empty());

        let mut buf = BytesMut::from(&b"\x1b]9998;AAAAAAAAAAAA"[..]);
        enforce_buffer_limit(&mut buf, 4);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_limited_decode_drops_only_oversized_frames() {
        let mut input = b"noise well past the limit".to_vec();
        input.extend_from_slice(&encode_to_vec(SUPERVISOR, b"ok"));
        input.extend_from_slice(&encode_to_vec(SUPERVISOR, &[b'A'; 64]));
        input.extend_from_slice(&encode_to_vec(CONTROLLED, b"after"));

        let mut buf = BytesMut::from(&input[..]);
        let mut frames = Vec::new();
        while let Some(frame) = decode_next_limited(&mut buf, Some(24)) {
            frames.push(frame);
        }

        assert_eq!(
            frames,
            vec![
                Frame::new(SUPERVISOR, Bytes::from_static(b"ok")),
                Frame::new(CONTROLLED, Bytes::from_static(b"after")),
            ]
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_limit_counts_frame_span_without_delimiter() {
        let wire = encode_to_vec(SUPERVISOR, b"ping");
        let span = wire.len() - 1;

        let mut buf = BytesMut::from(&wire[..]);
        assert!(decode_next_limited(&mut buf, Some(span)).is_some());

        let mut buf = BytesMut::from(&wire[..]);
        assert!(decode_next_limited(&mut buf, Some(span - 1)).is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_default_config_is_unbounded() {
        assert_eq!(FrameConfig::default().max_buffer_size, None);
    }

    #[test]
    fn test_frame_wire_size() {
        assert_eq!(Frame::new(9998, Bytes::from_static(b"ping")).wire_size(), 16);
        assert_eq!(Frame::new(0, Bytes::new()).wire_size(), 5);
    }
}
