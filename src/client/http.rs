//! HTTP transport construction and request issuing
//!
//! Three builders, one per protocol generation. HTTP/1.1 keeps a small idle
//! pool per host and suppresses ALPN to h2; HTTP/2 and HTTP/3 speak their
//! protocol with prior knowledge. All accept self-signed targets.

use reqwest::header::HeaderMap;
use reqwest::Method;
use url::Url;

use crate::client::{build_header_map, SendOutcome};
use crate::constants::{IDLE_CONNS_PER_HOST, IDLE_CONN_TIMEOUT, TCP_KEEPALIVE};
use crate::errors::{BarrageError, Result};
use crate::job::JobDescriptor;

/// Request shape shared by every call a worker issues.
#[derive(Debug, Clone)]
struct RequestSpec {
    method: Method,
    headers: HeaderMap,
    auth: Option<(String, String)>,
}

impl RequestSpec {
    fn from_descriptor(descriptor: &JobDescriptor) -> Result<Self> {
        let method = Method::from_bytes(descriptor.request_method.as_bytes()).map_err(|_| {
            BarrageError::config(format!(
                "Invalid request method '{}'",
                descriptor.request_method
            ))
        })?;
        let auth = if descriptor.auth_username.is_empty() {
            None
        } else {
            Some((
                descriptor.auth_username.clone(),
                descriptor.auth_password.clone(),
            ))
        };
        Ok(Self {
            method,
            headers: build_header_map(&descriptor.headers)?,
            auth,
        })
    }
}

/// A pooled reqwest client plus the job's request shape.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    request: RequestSpec,
}

impl HttpTransport {
    /// TCP+TLS with an idle pool of 10 per host, 90 s idle timeout and 60 s
    /// TCP keepalive; ALPN upgrade to h2 is suppressed.
    pub fn http1(descriptor: &JobDescriptor, proxy: Option<&Url>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(descriptor.timeout())
            .connect_timeout(descriptor.timeout())
            .danger_accept_invalid_certs(true)
            .http1_only()
            .pool_max_idle_per_host(if descriptor.disable_keepalives {
                0
            } else {
                IDLE_CONNS_PER_HOST
            })
            .pool_idle_timeout(IDLE_CONN_TIMEOUT)
            .tcp_keepalive(TCP_KEEPALIVE)
            .gzip(!descriptor.disable_compression);
        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }
        Ok(Self {
            client: builder.build()?,
            request: RequestSpec::from_descriptor(descriptor)?,
        })
    }

    /// TLS with h2 prior knowledge.
    pub fn http2(descriptor: &JobDescriptor) -> Result<Self> {
        let builder = reqwest::Client::builder()
            .timeout(descriptor.timeout())
            .connect_timeout(descriptor.timeout())
            .danger_accept_invalid_certs(true)
            .http2_prior_knowledge()
            .gzip(!descriptor.disable_compression);
        Ok(Self {
            client: builder.build()?,
            request: RequestSpec::from_descriptor(descriptor)?,
        })
    }

    /// QUIC. Rides reqwest's unstable HTTP/3 stack behind the crate's
    /// `http3` feature.
    #[cfg(feature = "http3")]
    pub fn http3(descriptor: &JobDescriptor) -> Result<Self> {
        let builder = reqwest::Client::builder()
            .timeout(descriptor.timeout())
            .danger_accept_invalid_certs(true)
            .http3_prior_knowledge();
        Ok(Self {
            client: builder.build()?,
            request: RequestSpec::from_descriptor(descriptor)?,
        })
    }

    #[cfg(not(feature = "http3"))]
    pub fn http3(_descriptor: &JobDescriptor) -> Result<Self> {
        Err(BarrageError::config(
            "HTTP/3 support is not compiled in; rebuild with \
             RUSTFLAGS=\"--cfg reqwest_unstable\" and --features http3",
        ))
    }

    /// One request: rendered method/URL/body plus the job's headers and
    /// basic auth. The body is read to EOF so the byte count is real.
    pub async fn send(&self, url: &str, body: &str) -> Result<SendOutcome> {
        let mut request = self
            .client
            .request(self.request.method.clone(), url)
            .headers(self.request.headers.clone());
        if let Some((username, password)) = &self.request.auth {
            request = request.basic_auth(username, Some(password));
        }
        if !body.is_empty() {
            request = request.body(body.to_string());
        }

        let response = request.send().await?;
        let status_code = response.status().as_u16();
        let content_length = response.content_length();
        let payload = response.bytes().await?;
        let bytes_read = content_length
            .filter(|n| *n > 0)
            .unwrap_or(payload.len() as u64);

        Ok(SendOutcome {
            status_code,
            bytes_read,
        })
    }
}
