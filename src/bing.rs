//! # Bing API Client
//!
//! Handles communication with the Bing Homepage Image Archive API to fetch
//! the daily picture metadata and download the actual image.
//!
//! ## API Endpoint
//! ```text
//! https://www.bing.com/HPImageArchive.aspx?format=js&idx=0&n=1&nc=1409879295618&pid=hp
//! ```
//! An optional `&mkt=<market>` selects a regional market (e.g. "en-US").
//!
//! ## Image URLs
//! The API usually returns a partial URL such as
//! `/th?id=OHR.SummerLake_EN-US1234567_1920x1080.jpg&pid=hp`, which needs
//! `https://www.bing.com` prepended. The `OHR.<name>_` part names the file
//! on disk.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{Error, Result};

/// Origin prepended to relative image URLs.
const BING_ORIGIN: &str = "https://www.bing.com";

/// Everything we need comes from this one request, see issue #7.
const BING_API_URL: &str =
    "https://www.bing.com/HPImageArchive.aspx?format=js&idx=0&n=1&nc=1409879295618&pid=hp";

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Raw API response from Bing.
#[derive(Debug, Clone, Deserialize)]
pub struct BingApiResponse {
    pub images: Vec<BingImageData>,
}

/// Raw image entry as returned by the Bing API.
#[derive(Debug, Clone, Deserialize)]
pub struct BingImageData {
    /// Relative or absolute image URL
    pub url: String,
    /// Copyright line, which doubles as the picture story
    pub copyright: String,
}

/// Metadata for today's picture, ready for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    /// Absolute download URL
    pub url: String,
    /// File name on disk, e.g. `SummerLake.jpg`
    pub identifier: String,
    /// The picture story
    pub caption: String,
}

impl TryFrom<BingImageData> for ImageMetadata {
    type Error = Error;

    fn try_from(data: BingImageData) -> Result<Self> {
        let url = absolute_url(&data.url);
        let identifier = extract_identifier(&url)?;
        Ok(Self { url, identifier, caption: data.copyright })
    }
}

impl BingApiResponse {
    /// Takes the first (today's) image of the response.
    pub fn into_metadata(self) -> Result<ImageMetadata> {
        self.images
            .into_iter()
            .next()
            .ok_or_else(|| Error::Parse("no images in Bing response".to_string()))?
            .try_into()
    }
}

/// Prefixes scheme-less URLs with the Bing origin.
pub fn absolute_url(url: &str) -> String {
    if url.starts_with("http") {
        url.to_string()
    } else {
        format!("{BING_ORIGIN}{url}")
    }
}

/// Derives the on-disk file name from the `?id=OHR.<name>_...` part of an
/// image URL, e.g. `.../th?id=OHR.SummerLake_EN-US1234567.jpg` gives
/// `SummerLake.jpg`.
pub fn extract_identifier(url: &str) -> Result<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"\?id=OHR\.(\w+?)_.+").expect("identifier pattern is valid")
    });

    pattern
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|name| format!("{}.jpg", name.as_str()))
        .ok_or_else(|| Error::Parse(format!("no picture name in image URL '{url}'")))
}

/// Where pictures come from. Implemented by [`BingClient`]; tests use fakes.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Fetches today's picture metadata.
    async fn fetch_metadata(&self) -> Result<ImageMetadata>;

    /// Streams the image at `url` into `sink`, returning the byte count.
    async fn download(&self, url: &str, sink: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64>;
}

/// HTTP client for the Bing image archive.
#[derive(Debug, Clone)]
pub struct BingClient {
    client: reqwest::Client,
    endpoint: String,
}

impl BingClient {
    /// Creates a client for the given regional market, or Bing's default
    /// market when `None`.
    pub fn new(market: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        let endpoint = match market {
            Some(market) => format!("{BING_API_URL}&mkt={market}"),
            None => BING_API_URL.to_string(),
        };

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ImageSource for BingClient {
    async fn fetch_metadata(&self) -> Result<ImageMetadata> {
        debug!(endpoint = %self.endpoint, "fetching picture metadata");
        let response: BingApiResponse = self
            .client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_metadata()
    }

    async fn download(&self, url: &str, sink: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            sink.write_all(&chunk)
                .await
                .map_err(|e| Error::io(url, e))?;
            written += chunk.len() as u64;
        }
        sink.flush().await.map_err(|e| Error::io(url, e))?;

        debug!(bytes = written, "download complete");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_from_ohr_url() {
        let url = "https://www.bing.com/th?id=OHR.SummerLake_EN-US1234567.jpg";
        assert_eq!(extract_identifier(url).unwrap(), "SummerLake.jpg");
    }

    #[test]
    fn identifier_stops_at_first_underscore() {
        let url = "https://www.bing.com/th?id=OHR.FoxPups_ZH-CN0123_1920x1080.jpg&rf=x_y.jpg&pid=hp";
        assert_eq!(extract_identifier(url).unwrap(), "FoxPups.jpg");
    }

    #[test]
    fn identifier_ends_at_first_underscore_for_rest_of_world_urls() {
        let url = "https://www.bing.com/th?id=OHR.Name_ROW1234_1920x1080.jpg&pid=hp";
        assert_eq!(extract_identifier(url).unwrap(), "Name.jpg");
    }

    #[test]
    fn identifier_missing_is_parse_error() {
        let err = extract_identifier("https://www.bing.com/az/hprichbg/rb/Lake.jpg").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn relative_url_gets_origin() {
        assert_eq!(
            absolute_url("/th?id=OHR.A_B.jpg"),
            "https://www.bing.com/th?id=OHR.A_B.jpg"
        );
        assert_eq!(
            absolute_url("https://cdn.example.com/th?id=OHR.A_B.jpg"),
            "https://cdn.example.com/th?id=OHR.A_B.jpg"
        );
    }

    #[test]
    fn parses_api_response() {
        let json = r#"{
            "images": [{
                "startdate": "20240615",
                "url": "/th?id=OHR.SummerLake_EN-US1234567_1920x1080.jpg&rf=LaDigue_1920x1080.jpg&pid=hp",
                "copyright": "A \"quiet\" lake (© Someone)",
                "title": "Summer"
            }],
            "tooltips": {}
        }"#;
        let response: BingApiResponse = serde_json::from_str(json).unwrap();
        let metadata = response.into_metadata().unwrap();

        assert_eq!(metadata.identifier, "SummerLake.jpg");
        assert!(metadata.url.starts_with("https://www.bing.com/th?id=OHR.SummerLake_"));
        assert_eq!(metadata.caption, "A \"quiet\" lake (© Someone)");
    }

    #[test]
    fn empty_images_is_parse_error() {
        let response: BingApiResponse = serde_json::from_str(r#"{"images": []}"#).unwrap();
        assert!(matches!(response.into_metadata(), Err(Error::Parse(_))));
    }

    #[test]
    fn market_is_appended_to_endpoint() {
        let client = BingClient::new(Some("de-DE")).unwrap();
        assert!(client.endpoint.ends_with("&pid=hp&mkt=de-DE"));
        let client = BingClient::new(None).unwrap();
        assert_eq!(client.endpoint, BING_API_URL);
    }

    mod http {
        use super::super::*;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        /// Serves one connection, writing `parts` with a pause between them so
        /// the client sees separate chunks.
        async fn serve_once(parts: Vec<Vec<u8>>) -> String {
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
                for part in parts {
                    socket.write_all(&part).await.unwrap();
                    socket.flush().await.unwrap();
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                let _ = socket.shutdown().await;
            });
            format!("http://{addr}")
        }

        fn client(endpoint: &str) -> BingClient {
            BingClient {
                client: reqwest::Client::builder().no_proxy().build().unwrap(),
                endpoint: endpoint.to_string(),
            }
        }

        fn status_only(status: &str) -> Vec<Vec<u8>> {
            vec![format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").into_bytes()]
        }

        #[tokio::test]
        async fn error_status_is_upstream_and_not_retried() {
            let base = serve_once(status_only("503 Service Unavailable")).await;

            let err = client(&format!("{base}/HPImageArchive.aspx")).fetch_metadata().await.unwrap_err();

            assert!(matches!(err, Error::Upstream(_)), "got {err:?}");
            assert!(!err.is_transient());
        }

        #[tokio::test]
        async fn download_error_status_is_upstream() {
            let base = serve_once(status_only("404 Not Found")).await;
            let mut sink: Vec<u8> = Vec::new();

            let err = client(&base)
                .download(&format!("{base}/th?id=OHR.Gone_EN-US1.jpg"), &mut sink)
                .await
                .unwrap_err();

            assert!(matches!(err, Error::Upstream(_)), "got {err:?}");
            assert!(sink.is_empty());
        }

        #[tokio::test]
        async fn closed_port_is_network_error() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);

            let err = client(&format!("http://{addr}/HPImageArchive.aspx"))
                .fetch_metadata()
                .await
                .unwrap_err();

            assert!(matches!(err, Error::Network(_)), "got {err:?}");
            assert!(err.is_transient());
        }

        #[tokio::test]
        async fn fetches_metadata_from_endpoint() {
            let body = r#"{"images":[{"url":"/th?id=OHR.SummerLake_EN-US1234567_1920x1080.jpg&pid=hp","copyright":"Lake (© Someone)"}]}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let base = serve_once(vec![response.into_bytes()]).await;

            let metadata = client(&format!("{base}/HPImageArchive.aspx")).fetch_metadata().await.unwrap();

            assert_eq!(metadata.identifier, "SummerLake.jpg");
            assert_eq!(metadata.caption, "Lake (© Someone)");
            assert!(metadata.url.starts_with("https://www.bing.com/th?id=OHR.SummerLake_"));
        }

        #[tokio::test]
        async fn chunked_body_is_written_byte_for_byte() {
            let picture: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
            let mut parts = vec![
                b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n".to_vec(),
            ];
            for chunk in [&picture[..1], &picture[1..2048], &picture[2048..]] {
                let mut part = format!("{:x}\r\n", chunk.len()).into_bytes();
                part.extend_from_slice(chunk);
                part.extend_from_slice(b"\r\n");
                parts.push(part);
            }
            parts.push(b"0\r\n\r\n".to_vec());
            let base = serve_once(parts).await;
            let mut sink: Vec<u8> = Vec::new();

            let written = client(&base)
                .download(&format!("{base}/th?id=OHR.Stream_EN-US1.jpg"), &mut sink)
                .await
                .unwrap();

            assert_eq!(written, picture.len() as u64);
            assert_eq!(sink, picture);
        }
    }
}
