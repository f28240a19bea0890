//! [`ImageSource`] over the backend's REST API.

use std::time::Duration;

use bessie_core::{ClusterEntry, GpsPatch, ImagePage, ImageRecord, ImageSource, SourceError};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::timing::TimingReporter;

#[derive(Debug, Clone)]
pub struct HttpImageSource {
    client: reqwest::Client,
    /// API root; always usable as a base for path segments.
    base: Url,
    token: Option<String>,
}

impl HttpImageSource {
    pub fn new(config: &ClientConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;
        let base = Url::parse(&config.api_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| SourceError::Network(format!("invalid API URL {:?}", config.api_url)))?;
        Ok(Self {
            client,
            base,
            token: config.token.clone(),
        })
    }

    /// Absolute URL for API path segments such as `["images", "clusters"]`.
    ///
    /// Each segment is percent-encoded, so an image ID containing `/`, `?`
    /// or `#` stays a single segment.
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Reporter posting to this backend's `/log-timing`, or a no-op one.
    pub fn timing_reporter(&self, enabled: bool) -> TimingReporter {
        if enabled {
            TimingReporter::new(self.client.clone(), self.url(&["log-timing"]).into())
        } else {
            TimingReporter::disabled()
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, url: &Url) -> Result<reqwest::Response, SourceError> {
        let response = builder
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;
        check_status(response.status(), url.as_str())?;
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, usize)],
    ) -> Result<T, SourceError> {
        let url = self.url(segments);
        tracing::debug!(%url, ?query, "GET");
        let response = self
            .send(self.request(Method::GET, url.clone()).query(query), &url)
            .await?;
        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }
}

/// Map a response status onto the error taxonomy the browsing layer sees.
pub(crate) fn check_status(status: StatusCode, url: &str) -> Result<(), SourceError> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SourceError::Unauthorized),
        _ => Err(SourceError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        }),
    }
}

fn not_found_as(id: &str, err: SourceError) -> SourceError {
    match err {
        SourceError::Status { status: 404, .. } => SourceError::NotFound(id.to_string()),
        other => other,
    }
}

impl ImageSource for HttpImageSource {
    async fn fetch_images(&self, offset: usize, limit: usize) -> Result<ImagePage, SourceError> {
        self.get_json(&["images"], &[("offset", offset), ("limit", limit)])
            .await
    }

    async fn fetch_clusters(&self) -> Result<Vec<ClusterEntry>, SourceError> {
        self.get_json(&["images", "clusters"], &[]).await
    }

    async fn fetch_clustered(&self, offset: usize, limit: usize) -> Result<ImagePage, SourceError> {
        self.get_json(&["images", "clustered"], &[("offset", offset), ("limit", limit)])
            .await
    }

    async fn fetch_image(&self, id: &str) -> Result<ImageRecord, SourceError> {
        self.get_json(&["images", id], &[])
            .await
            .map_err(|e| not_found_as(id, e))
    }

    async fn patch_gps(&self, id: &str, lat: f64, lon: f64) -> Result<ImageRecord, SourceError> {
        let url = self.url(&["images", id, "gps"]);
        let body = GpsPatch::new(lat, lon);
        tracing::info!(id, lat, lon, "saving GPS location");
        self.send(self.request(Method::PATCH, url.clone()).json(&body), &url)
            .await
            .map_err(|e| not_found_as(id, e))?;
        self.fetch_image(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(api_url: &str) -> HttpImageSource {
        HttpImageSource::new(&ClientConfig {
            api_url: api_url.to_string(),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let src = source("http://localhost:8000/api/");
        assert_eq!(src.url(&["images"]).as_str(), "http://localhost:8000/api/images");
        assert_eq!(
            src.url(&["images", "clusters"]).as_str(),
            "http://localhost:8000/api/images/clusters"
        );
        let root = source("http://localhost:8000");
        assert_eq!(root.url(&["images"]).as_str(), "http://localhost:8000/images");
    }

    #[test]
    fn test_image_id_escaped_as_one_segment() {
        let src = source("http://localhost:8000/api");
        assert_eq!(
            src.url(&["images", "a/b?c#d"]).as_str(),
            "http://localhost:8000/api/images/a%2Fb%3Fc%23d"
        );
        assert_eq!(
            src.url(&["images", "a/b?c#d", "gps"]).as_str(),
            "http://localhost:8000/api/images/a%2Fb%3Fc%23d/gps"
        );
    }

    #[test]
    fn test_non_base_api_url_rejected() {
        let err = HttpImageSource::new(&ClientConfig {
            api_url: "mailto:photos@example.org".to_string(),
            ..ClientConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, SourceError::Network(_)));
    }

    #[test]
    fn test_auth_statuses_map_to_unauthorized() {
        assert_eq!(
            check_status(StatusCode::UNAUTHORIZED, "u"),
            Err(SourceError::Unauthorized)
        );
        assert_eq!(
            check_status(StatusCode::FORBIDDEN, "u"),
            Err(SourceError::Unauthorized)
        );
        assert!(check_status(StatusCode::OK, "u").is_ok());
    }

    #[test]
    fn test_other_statuses_keep_code_and_url() {
        assert_eq!(
            check_status(StatusCode::BAD_GATEWAY, "http://h/api/images"),
            Err(SourceError::Status {
                status: 502,
                url: "http://h/api/images".into(),
            })
        );
    }

    #[test]
    fn test_missing_image_is_not_found() {
        let err = SourceError::Status {
            status: 404,
            url: "http://h/api/images/x".into(),
        };
        assert_eq!(not_found_as("x", err), SourceError::NotFound("x".into()));
        assert_eq!(
            not_found_as("x", SourceError::Unauthorized),
            SourceError::Unauthorized
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        // Port 9 (discard) on loopback is closed on any sane test host.
        let src = source("http://127.0.0.1:9/api");
        let err = src.fetch_images(0, 1).await.unwrap_err();
        assert!(matches!(err, SourceError::Network(_)));
    }
}
