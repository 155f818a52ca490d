//! Nominatim / OpenStreetMap geocoder client.
//!
//! Issues one free-form search per address and takes the first candidate.
//! The public instance allows **1 request per second**, so requests are
//! spaced at least `rate_limit_ms` (from the service configuration) apart.
//! The spacing is shared by every lookup on one client (and its clones),
//! so it holds however many lookups are in flight. Lookups answered by a
//! cache in front of this client never take a slot.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use layoff_map_models::Coordinate;

use crate::address::normalize_query;
use crate::service_registry::GeocoderConfig;
use crate::{AddressGeocoder, GeocodeError};

/// A Nominatim search client.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    rate_limit: Duration,
    /// Earliest time the next request may be sent.
    next_slot: Arc<tokio::sync::Mutex<Option<tokio::time::Instant>>>,
}

impl NominatimGeocoder {
    /// Wraps an existing client.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            rate_limit: Duration::ZERO,
            next_slot: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// Spaces requests at least `delay` apart.
    #[must_use]
    pub const fn with_rate_limit(mut self, delay: Duration) -> Self {
        self.rate_limit = delay;
        self
    }

    /// Builds a client with the configured per-request timeout and
    /// User-Agent.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the client cannot be built.
    pub fn from_config(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self::new(client, config.base_url.clone()).with_rate_limit(config.rate_limit()))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Claims the next send slot and sleeps until it arrives.
    async fn wait_for_slot(&self) {
        if self.rate_limit.is_zero() {
            return;
        }

        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = tokio::time::Instant::now();
            let slot = next.map_or(now, |t| t.max(now));
            *next = Some(slot + self.rate_limit);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}

#[async_trait]
impl AddressGeocoder for NominatimGeocoder {
    async fn lookup(&self, query: &str) -> Result<Option<Coordinate>, GeocodeError> {
        let q = normalize_query(query);

        self.wait_for_slot().await;

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("q", q.as_str()), ("format", "json")])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }
        if status.is_server_error() {
            return Err(GeocodeError::Server {
                status: status.as_u16(),
            });
        }
        if status.is_client_error() {
            return Err(GeocodeError::Rejected {
                status: status.as_u16(),
            });
        }

        let text = resp.text().await?;
        let body: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| GeocodeError::Parse {
                message: format!("Nominatim response is not JSON: {e}"),
            })?;

        parse_response(&body)
    }
}

/// Parses a Nominatim JSON response.
fn parse_response(body: &serde_json::Value) -> Result<Option<Coordinate>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let lat = parse_degrees(&first["lat"]).ok_or_else(|| GeocodeError::Parse {
        message: "Missing lat in Nominatim response".to_string(),
    })?;

    let lon = parse_degrees(&first["lon"]).ok_or_else(|| GeocodeError::Parse {
        message: "Missing lon in Nominatim response".to_string(),
    })?;

    Ok(Some(Coordinate::new(lat, lon)))
}

/// Nominatim sends degrees as strings; some mirrors send numbers.
fn parse_degrees(value: &serde_json::Value) -> Option<f64> {
    value
        .as_str()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .or_else(|| value.as_f64())
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;
    use tokio::time::Instant;

    use super::*;

    /// Request lines received by [`serve`], with arrival times.
    type Received = Arc<Mutex<Vec<(String, Instant)>>>;

    /// Answers every request on a local port with `status` and `body`.
    async fn serve(status: u16, body: &'static str) -> (String, Received) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let log = log.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&buf);
                    let line = request.lines().next().unwrap_or_default().to_string();
                    log.lock().unwrap().push((line, Instant::now()));

                    let response = format!(
                        "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{addr}/search"), received)
    }

    fn client(base_url: String) -> NominatimGeocoder {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        NominatimGeocoder::new(client, base_url)
    }

    #[tokio::test]
    async fn sends_normalized_query() {
        let (url, received) = serve(200, r#"[{"lat":"44.5","lon":"-69.75"}]"#).await;
        let result = client(url).lookup("  100  Main\tSt ").await.unwrap();

        assert_eq!(result, Some(Coordinate::new(44.5, -69.75)));
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0].0,
            "GET /search?q=100+Main+St&format=json HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn empty_result_is_no_match() {
        let (url, _) = serve(200, "[]").await;
        assert_eq!(client(url).lookup("9 Nowhere Rd").await.unwrap(), None);
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limited() {
        let (url, _) = serve(429, "").await;
        let err = client(url).lookup("1 Main St").await.unwrap_err();
        assert!(matches!(err, GeocodeError::RateLimited));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let (url, _) = serve(503, "").await;
        let err = client(url).lookup("1 Main St").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Server { status: 503 }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn client_errors_are_permanent() {
        let (url, _) = serve(403, "").await;
        let err = client(url).lookup("1 Main St").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Rejected { status: 403 }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn non_json_body_is_a_parse_error() {
        let (url, _) = serve(200, "<html>busy</html>").await;
        let err = client(url).lookup("1 Main St").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Parse { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn concurrent_lookups_share_the_rate_limit() {
        let (url, received) = serve(200, "[]").await;
        let geocoder = client(url).with_rate_limit(Duration::from_millis(200));
        let clone = geocoder.clone();

        let (a, b, c, d) = tokio::join!(
            geocoder.lookup("1 Main St"),
            geocoder.lookup("2 Main St"),
            clone.lookup("3 Main St"),
            clone.lookup("4 Main St"),
        );
        for result in [a, b, c, d] {
            assert_eq!(result.unwrap(), None);
        }

        let mut arrivals: Vec<Instant> = received.lock().unwrap().iter().map(|r| r.1).collect();
        arrivals.sort();
        assert_eq!(arrivals.len(), 4);
        for pair in arrivals.windows(2) {
            assert!(
                pair[1] - pair[0] >= Duration::from_millis(150),
                "requests {:?} apart",
                pair[1] - pair[0]
            );
        }
    }

    #[test]
    fn parses_nominatim_result() {
        let body = serde_json::json!([{
            "lat": "44.1004",
            "lon": "-70.2148",
            "display_name": "Lisbon Street, Lewiston, Androscoggin County, Maine, USA"
        }]);
        let result = parse_response(&body).unwrap().unwrap();
        assert!((result.latitude - 44.1004).abs() < 1e-4);
        assert!((result.longitude - -70.2148).abs() < 1e-4);
    }

    #[test]
    fn takes_first_candidate() {
        let body = serde_json::json!([
            { "lat": "1.0", "lon": "2.0" },
            { "lat": "3.0", "lon": "4.0" }
        ]);
        let result = parse_response(&body).unwrap().unwrap();
        assert_eq!(result, Coordinate::new(1.0, 2.0));
    }

    #[test]
    fn accepts_numeric_degrees() {
        let body = serde_json::json!([{ "lat": 10.5, "lon": 20.25 }]);
        let result = parse_response(&body).unwrap().unwrap();
        assert_eq!(result, Coordinate::new(10.5, 20.25));
    }

    #[test]
    fn config_sets_pacing_and_url() {
        let config = GeocoderConfig {
            base_url: "http://localhost:8080/search".to_string(),
            rate_limit_ms: 250,
            ..GeocoderConfig::embedded()
        };
        let geocoder = NominatimGeocoder::from_config(&config).unwrap();
        assert_eq!(geocoder.base_url(), "http://localhost:8080/search");
        assert_eq!(geocoder.rate_limit, Duration::from_millis(250));
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn rejects_non_array_body() {
        let body = serde_json::json!({ "error": "Bad Request" });
        let err = parse_response(&body).unwrap_err();
        assert!(matches!(err, GeocodeError::Parse { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn rejects_candidate_without_coordinates() {
        let body = serde_json::json!([{ "lat": "north", "display_name": "?" }]);
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }
}
