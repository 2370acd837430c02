//! Protocol clients for the load engine
//!
//! One worker owns one client; clients are never shared. The protocol is a
//! tagged capability: each arm carries its transport's native client and
//! `send` dispatches on the tag, so workers stay free of dynamic dispatch.

pub mod http;
pub mod websocket;

pub use http::HttpTransport;
pub use websocket::WsTransport;

use ::http::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use url::Url;

use crate::errors::{ErrorContext, Result};
use crate::job::{HttpType, JobDescriptor};

/// What one completed `send` reports back.
#[derive(Debug, Clone, Copy)]
pub struct SendOutcome {
    pub status_code: u16,
    pub bytes_read: u64,
}

/// Per-worker protocol client.
#[derive(Debug)]
pub enum ProtocolClient {
    Http1(HttpTransport),
    Http2(HttpTransport),
    Http3(HttpTransport),
    Ws(WsTransport),
}

impl ProtocolClient {
    /// Build the transport selected by the descriptor tag.
    ///
    /// `handshake_url` is the rendered URL a WebSocket worker dials once;
    /// HTTP arms take their URL per request instead.
    pub async fn connect(
        descriptor: &JobDescriptor,
        handshake_url: &str,
        proxy: Option<&Url>,
    ) -> Result<Self> {
        match descriptor.request_http_type {
            HttpType::Http1 => Ok(Self::Http1(HttpTransport::http1(descriptor, proxy)?)),
            HttpType::Http2 => Ok(Self::Http2(HttpTransport::http2(descriptor)?)),
            HttpType::Http3 => Ok(Self::Http3(HttpTransport::http3(descriptor)?)),
            HttpType::Ws => Ok(Self::Ws(
                WsTransport::connect(descriptor, handshake_url).await?,
            )),
        }
    }

    /// Issue one request with the rendered URL and body.
    pub async fn send(&mut self, url: &str, body: &str) -> Result<SendOutcome> {
        match self {
            Self::Http1(transport) | Self::Http2(transport) | Self::Http3(transport) => {
                transport.send(url, body).await
            }
            Self::Ws(transport) => transport.send(body).await,
        }
    }

    /// Release the transport on worker shutdown.
    pub async fn close(&mut self) {
        match self {
            // Dropping the pooled client closes its idle connections.
            Self::Http1(_) | Self::Http2(_) | Self::Http3(_) => {}
            Self::Ws(transport) => transport.close().await,
        }
    }
}

/// Convert descriptor headers into a typed header map; shared by the HTTP
/// request path and the WebSocket handshake.
pub(crate) fn build_header_map(headers: &HashMap<String, Vec<String>>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, values) in headers {
        let header_name: HeaderName = name
            .parse()
            .with_config_context(&format!("Invalid header name: {}", name))?;
        for value in values {
            let header_value: HeaderValue = value
                .parse()
                .with_config_context(&format!("Invalid header value: {}", value))?;
            map.append(header_name.clone(), header_value);
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_map_keeps_ordered_value_lists() {
        let mut headers = HashMap::new();
        headers.insert(
            "Accept".to_string(),
            vec!["text/html".to_string(), "application/json".to_string()],
        );
        let map = build_header_map(&headers).unwrap();
        let values: Vec<_> = map.get_all("accept").iter().collect();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], "text/html");
        assert_eq!(values[1], "application/json");
    }

    #[test]
    fn bad_header_names_are_config_errors() {
        let mut headers = HashMap::new();
        headers.insert("bad name".to_string(), vec!["v".to_string()]);
        assert!(build_header_map(&headers).is_err());
    }
}
