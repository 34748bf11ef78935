/*
 * This file is part of Peripheral Hub.
 *
 * Copyright (C) 2025 Peripheral Hub contributors
 *
 * Peripheral Hub is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Peripheral Hub is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Peripheral Hub. If not, see <https://www.gnu.org/licenses/>.
 */

//! JSON-lines request intake
//!
//! Each input line is one request envelope, each answer one response
//! envelope on the output, in the same order:
//!
//! ```text
//! > {"id":1,"type":"Set Channel","value":"R,50"}
//! < {"id":1,"message":"Setting R to 50%","status":200}
//! ```
//!
//! Requests are validated and queued by the [`CommandProducer`]; nothing
//! here waits for the command to run.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, trace, warn};

use ph_core::CommandProducer;
use ph_protocol::{decode_request, Response, ResponseEnvelope, MAX_MESSAGE_SIZE, STATUS_BAD_REQUEST};

enum Line {
    Eof,
    Complete,
    TooLarge,
}

/// Read up to the next newline without buffering more than `max_len` bytes
///
/// An oversized line is consumed to its end and reported as `TooLarge` so the
/// next read starts on a fresh request.
async fn read_line_bounded<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    out: &mut Vec<u8>,
    max_len: usize,
) -> std::io::Result<Line> {
    out.clear();
    let mut overflow = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(match (overflow, out.is_empty()) {
                (true, _) => Line::TooLarge,
                (false, true) => Line::Eof,
                (false, false) => Line::Complete,
            });
        }

        let (take_len, found_newline) = match available.iter().position(|b| *b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };

        if !overflow && out.len() + take_len > max_len + 1 {
            overflow = true;
            out.clear();
        }
        if !overflow {
            out.extend_from_slice(&available[..take_len]);
        }
        reader.consume(take_len);

        if found_newline {
            return Ok(if overflow { Line::TooLarge } else { Line::Complete });
        }
    }
}

/// Answer one request line; blank lines get no answer
pub fn handle_line(line: &str, producer: &CommandProducer) -> Option<ResponseEnvelope> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let envelope = match decode_request(line) {
        Ok(envelope) => envelope,
        Err(rejection) => {
            debug!(id = rejection.id, reason = %rejection.response.message, "Rejected undecodable request");
            return Some(rejection);
        }
    };

    trace!(id = envelope.id, request = envelope.request.type_name(), "Request received");
    let response = producer.submit(&envelope.request);
    Some(ResponseEnvelope::new(envelope.id, response))
}

async fn send_response<W: AsyncWrite + Unpin>(writer: &mut W, envelope: &ResponseEnvelope) -> std::io::Result<()> {
    let json = serde_json::to_string(envelope).unwrap_or_else(|_| {
        format!(r#"{{"id":{},"message":"Serialization error","status":500}}"#, envelope.id)
    });
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Serve requests until the input closes; returns the number of answers sent
pub async fn serve<R, W>(reader: R, mut writer: W, producer: &CommandProducer) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line: Vec<u8> = Vec::with_capacity(MAX_MESSAGE_SIZE);
    let mut answered = 0;

    loop {
        let envelope = match read_line_bounded(&mut reader, &mut line, MAX_MESSAGE_SIZE).await? {
            Line::Eof => break,
            Line::TooLarge => {
                warn!("Request larger than {} bytes discarded", MAX_MESSAGE_SIZE);
                ResponseEnvelope::new(
                    0,
                    Response::rejected(format!("Message too large (max {} bytes)", MAX_MESSAGE_SIZE), STATUS_BAD_REQUEST),
                )
            }
            Line::Complete => match std::str::from_utf8(&line) {
                Ok(text) => match handle_line(text, producer) {
                    Some(envelope) => envelope,
                    None => continue,
                },
                Err(e) => {
                    debug!(error = %e, "Non-UTF8 request");
                    ResponseEnvelope::new(0, Response::rejected("Invalid request encoding", STATUS_BAD_REQUEST))
                }
            },
        };

        send_response(&mut writer, &envelope).await?;
        answered += 1;
    }

    debug!(answered, "Request stream closed");
    Ok(answered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_reader_skips_oversized_line() {
        let input = format!("{}\nshort\n", "x".repeat(64));
        let mut reader = BufReader::with_capacity(8, input.as_bytes());
        let mut out = Vec::new();

        assert!(matches!(read_line_bounded(&mut reader, &mut out, 16).await.unwrap(), Line::TooLarge));
        assert!(matches!(read_line_bounded(&mut reader, &mut out, 16).await.unwrap(), Line::Complete));
        assert_eq!(out, b"short\n");
        assert!(matches!(read_line_bounded(&mut reader, &mut out, 16).await.unwrap(), Line::Eof));
    }

    #[tokio::test]
    async fn test_last_line_without_newline() {
        let mut reader = BufReader::new(&b"tail"[..]);
        let mut out = Vec::new();
        assert!(matches!(read_line_bounded(&mut reader, &mut out, 16).await.unwrap(), Line::Complete));
        assert_eq!(out, b"tail");
    }
}
