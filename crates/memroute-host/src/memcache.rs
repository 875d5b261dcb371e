//! Minimal memcache text-protocol client.
//!
//! Only `get` is implemented: one connection per request, bounded by a
//! timeout on both the connect and the request phases.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{HostError, HostResult};
use crate::host::{Item, Transport};

/// Longest key the text protocol accepts.
pub const MAX_KEY_LEN: usize = 250;

/// Talks to a memcache-compatible node at `addr`.
#[derive(Debug, Clone)]
pub struct MemcacheTransport {
    addr: String,
    timeout: Duration,
}

impl MemcacheTransport {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Transport for MemcacheTransport {
    async fn get(&self, key: &str) -> HostResult<Option<Item>> {
        validate_key(key)?;

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| HostError::Timeout(self.addr.clone()))?
            .map_err(|source| HostError::Connect {
                addr: self.addr.clone(),
                source,
            })?;

        let result = tokio::time::timeout(self.timeout, request(stream, key))
            .await
            .map_err(|_| HostError::Timeout(self.addr.clone()))?;

        if let Err(e) = &result {
            debug!(addr = %self.addr, %key, error = %e, "get failed");
        }
        result
    }
}

fn validate_key(key: &str) -> HostResult<()> {
    if key.is_empty()
        || key.len() > MAX_KEY_LEN
        || key.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control())
    {
        return Err(HostError::InvalidKey(key.to_string()));
    }
    Ok(())
}

async fn request(mut stream: TcpStream, key: &str) -> HostResult<Option<Item>> {
    stream.write_all(format!("get {key}\r\n").as_bytes()).await?;
    stream.flush().await?;

    let mut reader = BufReader::new(stream);
    let header = read_line(&mut reader).await?;

    if header == "END" {
        return Ok(None);
    }
    if let Some(msg) = header
        .strip_prefix("SERVER_ERROR ")
        .or_else(|| header.strip_prefix("CLIENT_ERROR "))
    {
        return Err(HostError::Server(msg.to_string()));
    }
    if header == "ERROR" {
        return Err(HostError::Server(header));
    }

    let (flags, len) = parse_value_header(&header, key)?;

    // Data block plus its trailing CRLF.
    let mut data = vec![0u8; len + 2];
    reader.read_exact(&mut data).await?;
    if !data.ends_with(b"\r\n") {
        return Err(HostError::Protocol("data block not terminated by CRLF".into()));
    }
    data.truncate(len);

    let trailer = read_line(&mut reader).await?;
    if trailer != "END" {
        return Err(HostError::Protocol(format!("expected END, got {trailer:?}")));
    }

    Ok(Some(Item {
        flags,
        body: Bytes::from(data),
    }))
}

async fn read_line(reader: &mut BufReader<TcpStream>) -> HostResult<String> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Err(HostError::Protocol("connection closed mid-response".into()));
    }
    if !buf.ends_with(b"\r\n") {
        return Err(HostError::Protocol("line not terminated by CRLF".into()));
    }
    buf.truncate(buf.len() - 2);
    String::from_utf8(buf).map_err(|_| HostError::Protocol("non-utf8 response line".into()))
}

/// Parse `VALUE <key> <flags> <bytes> [<cas>]`.
fn parse_value_header(header: &str, key: &str) -> HostResult<(u32, usize)> {
    let mut parts = header.split(' ');
    if parts.next() != Some("VALUE") {
        return Err(HostError::Protocol(format!("unexpected reply {header:?}")));
    }
    if parts.next() != Some(key) {
        return Err(HostError::Protocol(format!("reply for wrong key: {header:?}")));
    }
    let flags = parts
        .next()
        .and_then(|f| f.parse::<u32>().ok())
        .ok_or_else(|| HostError::Protocol(format!("bad flags in {header:?}")))?;
    let len = parts
        .next()
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or_else(|| HostError::Protocol(format!("bad length in {header:?}")))?;
    Ok((flags, len))
}
