//! Byte stream to line stream splitting.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use memchr::memchr;

/// Split a byte stream into `\n`-terminated lines.
///
/// Chunk boundaries may fall anywhere, including inside a multi-byte UTF-8
/// sequence; bytes are buffered until a full line is available. A trailing
/// `\r` is removed. The final unterminated line is yielded at end of stream.
/// Transport errors are passed through and end the stream.
pub fn line_stream<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    futures_util::stream::unfold(
        (Box::pin(byte_stream), Vec::<u8>::new(), 0usize, false),
        |(mut stream, mut buffer, mut scan_from, mut finished)| async move {
            loop {
                if let Some(rel) = memchr(b'\n', &buffer[scan_from..]) {
                    let end = scan_from + rel;
                    let line = decode_line(&buffer[..end]);
                    buffer.drain(..=end);
                    scan_from = 0;
                    return Some((Ok(line), (stream, buffer, scan_from, finished)));
                }
                scan_from = buffer.len();

                if finished {
                    if buffer.is_empty() {
                        return None;
                    }
                    let line = decode_line(&buffer);
                    buffer.clear();
                    return Some((Ok(line), (stream, buffer, 0, finished)));
                }

                match stream.as_mut().next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(&bytes),
                    Some(Err(err)) => {
                        buffer.clear();
                        return Some((Err(err), (stream, buffer, 0, true)));
                    }
                    None => finished = true,
                }
            }
        },
    )
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
