use async_trait::async_trait;
use config::Config;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::dto::IssSample;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: StatusCode },
    #[error("malformed position document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{field} {value:?} is not a decimal number")]
    InvalidCoordinate { field: &'static str, value: String },
}

#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn fetch(&self) -> Result<IssSample, FetchError>;
}

#[derive(Debug, Deserialize)]
struct IssNowResponse {
    timestamp: i64,
    iss_position: IssNowPosition,
}

#[derive(Debug, Deserialize)]
struct IssNowPosition {
    latitude: String,
    longitude: String,
}

/// One request per fetch, no retries.
pub struct HttpPositionSource {
    client: Client,
    url: String,
}

impl HttpPositionSource {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, FetchError> {
        let url = url.into();
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        Ok(HttpPositionSource { client, url })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let url = config.get_string("source_url")?;
        let request_timeout = Duration::from_secs(config.get_int("request_timeout_secs")?.try_into()?);

        Ok(HttpPositionSource::new(url, request_timeout)?)
    }

    fn transport_error(&self, source: reqwest::Error) -> FetchError {
        FetchError::Transport {
            url: self.url.clone(),
            source,
        }
    }
}

#[async_trait]
impl PositionSource for HttpPositionSource {
    async fn fetch(&self) -> Result<IssSample, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status,
            });
        }

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let sample = parse_position_document(&body)?;
        debug!(
            "Fetched ISS position {}, {} at {}",
            sample.latitude, sample.longitude, sample.timestamp
        );

        Ok(sample)
    }
}

pub fn parse_position_document(body: &[u8]) -> Result<IssSample, FetchError> {
    let document: IssNowResponse = serde_json::from_slice(body)?;
    let IssNowPosition {
        latitude,
        longitude,
    } = document.iss_position;

    ensure_decimal("latitude", &latitude)?;
    ensure_decimal("longitude", &longitude)?;

    Ok(IssSample {
        latitude,
        longitude,
        timestamp: document.timestamp,
    })
}

fn ensure_decimal(field: &'static str, value: &str) -> Result<(), FetchError> {
    match value.parse::<f64>() {
        Ok(degrees) if degrees.is_finite() => Ok(()),
        _ => Err(FetchError::InvalidCoordinate {
            field,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // Answers a single request with `response` and returns the URL to hit
    async fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}/iss-now.json", addr)
    }

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        )
    }

    fn source(url: String) -> HttpPositionSource {
        HttpPositionSource::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetch_reads_a_successful_response() {
        let body = r#"{"message": "success", "timestamp": 1717245120, "iss_position": {"latitude": "-51.6413", "longitude": "108.0270"}}"#;
        let url = serve_once(http_response("200 OK", body)).await;

        let sample = source(url).fetch().await.unwrap();

        assert_eq!(sample.latitude, "-51.6413");
        assert_eq!(sample.longitude, "108.0270");
        assert_eq!(sample.timestamp, 1717245120);
    }

    #[tokio::test]
    async fn fetch_rejects_non_200_status() {
        let url = serve_once(http_response("503 Service Unavailable", "")).await;

        match source(url.clone()).fetch().await {
            Err(FetchError::Status { url: failed, status }) => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(failed, url);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn fetch_rejects_other_success_codes() {
        let body = r#"{"timestamp": 1, "iss_position": {"latitude": "0.0", "longitude": "0.0"}}"#;
        let url = serve_once(http_response("203 Non-Authoritative Information", body)).await;

        assert!(matches!(
            source(url).fetch().await,
            Err(FetchError::Status { status, .. }) if status == StatusCode::NON_AUTHORITATIVE_INFORMATION
        ));
    }

    #[tokio::test]
    async fn fetch_reports_malformed_body() {
        let url = serve_once(http_response("200 OK", r#"{"timestamp": 1}"#)).await;

        assert!(matches!(
            source(url).fetch().await,
            Err(FetchError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn fetch_reports_unreachable_host() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/iss-now.json", listener.local_addr().unwrap());
        drop(listener);

        assert!(matches!(
            source(url).fetch().await,
            Err(FetchError::Transport { .. })
        ));
    }

    #[test]
    fn parses_open_notify_document() {
        let body = br#"{
            "message": "success",
            "timestamp": 1717245120,
            "iss_position": {"latitude": "-51.6413", "longitude": "108.0270"}
        }"#;

        let sample = parse_position_document(body).unwrap();

        assert_eq!(
            sample,
            IssSample {
                latitude: "-51.6413".to_string(),
                longitude: "108.0270".to_string(),
                timestamp: 1717245120,
            }
        );
    }

    #[test]
    fn keeps_reported_precision() {
        let body = br#"{"timestamp": 1, "iss_position": {"latitude": "12.3000", "longitude": "-0.0010"}}"#;

        let sample = parse_position_document(body).unwrap();

        assert_eq!(sample.latitude, "12.3000");
        assert_eq!(sample.longitude, "-0.0010");
    }

    #[test]
    fn missing_position_is_malformed() {
        let body = br#"{"message": "success", "timestamp": 1717245120}"#;

        assert!(matches!(
            parse_position_document(body),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn numeric_coordinates_are_malformed() {
        let body = br#"{"timestamp": 1717245120, "iss_position": {"latitude": -51.6, "longitude": 108.0}}"#;

        assert!(matches!(
            parse_position_document(body),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn non_decimal_coordinates_are_rejected() {
        let body = br#"{"timestamp": 1717245120, "iss_position": {"latitude": "-51.6", "longitude": "east"}}"#;

        match parse_position_document(body) {
            Err(FetchError::InvalidCoordinate { field, value }) => {
                assert_eq!(field, "longitude");
                assert_eq!(value, "east");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn garbage_body_is_malformed() {
        assert!(matches!(
            parse_position_document(b"<html>503</html>"),
            Err(FetchError::Malformed(_))
        ));
    }
}
