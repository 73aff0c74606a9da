//! Stream reading logic for the interpreter subprocess

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::LOG_TARGET;
use crate::protocol::{ScannedLine, Stream, StreamEvent, scan_line};
use crate::types::identifiers::MarkerToken;

/// Spawn a background task that splits one interpreter stream at markers
///
/// Lines are buffered until a marker for `token` arrives; the marker and the
/// buffered lines are then sent as one [`StreamEvent::Marker`]. At end of
/// stream whatever is still buffered is sent as [`StreamEvent::Closed`].
pub fn spawn_reader<R>(
    stream: Stream,
    reader: R,
    token: MarkerToken,
    events: mpsc::UnboundedSender<StreamEvent>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buffer: Vec<String> = Vec::new();
        let mut raw = Vec::new();

        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    let line = decode_line(&raw);
                    match scan_line(&line, &token) {
                        ScannedLine::Text(text) => buffer.push(text.to_string()),
                        ScannedLine::Marker { prefix, marker } => {
                            if let Some(prefix) = prefix {
                                buffer.push(prefix.to_string());
                            }
                            let lines = std::mem::take(&mut buffer);
                            if events
                                .send(StreamEvent::Marker {
                                    stream,
                                    marker,
                                    lines,
                                })
                                .is_err()
                            {
                                // Correlator gone, session is shutting down
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    log::warn!(
                        target: LOG_TARGET,
                        "read from interpreter {} failed: {e}",
                        stream.name()
                    );
                    break;
                }
            }
        }

        log::debug!(
            target: LOG_TARGET,
            "interpreter {} closed with {} unclaimed line(s)",
            stream.name(),
            buffer.len()
        );
        let _ = events.send(StreamEvent::Closed {
            stream,
            unclaimed: buffer,
        });
    })
}

/// Decode one raw line lossily, without its line terminator
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
