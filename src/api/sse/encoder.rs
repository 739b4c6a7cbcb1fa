//! Server-sent event framing

use bytes::Bytes;
use serde::Serialize;

/// Frame one event as `event: <name>\r\ndata: <json>\r\n\r\n`
pub fn encode_event<T: Serialize + ?Sized>(event: &str, data: &T) -> serde_json::Result<Bytes> {
    let data = serde_json::to_string(data)?;
    Ok(Bytes::from(format!("event: {event}\r\ndata: {data}\r\n\r\n")))
}
