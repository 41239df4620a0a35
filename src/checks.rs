//! Security and health checks
//!
//! Each probe is independent and never fails: errors are logged and turned
//! into the sentinel status of the probe.

use chrono::{DateTime, Utc};
use reqwest::Client;
use rustls::ClientConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::error;

/// Google Safe Browsing API base URL
pub const SAFE_BROWSING_API_BASE: &str = "https://safebrowsing.googleapis.com";

/// Google APIs base URL (PageSpeed Insights)
pub const PAGESPEED_API_BASE: &str = "https://www.googleapis.com";

/// Port probed for the certificate check
pub const TLS_PORT: u16 = 443;

/// Connect and handshake timeout for the certificate check
const TLS_TIMEOUT_SECS: u64 = 30;

/// Certificates expiring within this many days are flagged
const EXPIRY_WARNING_DAYS: i64 = 30;

/// Result of the certificate probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CertificateProbe {
    /// Handshake succeeded
    Valid {
        /// Certificate `notAfter`
        expires_at: DateTime<Utc>,
    },
    /// Connection or handshake failed
    Invalid {
        /// Error description
        reason: String,
    },
}

impl CertificateProbe {
    /// Whether the handshake succeeded
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Traffic-light classification of certificate expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// More than 30 days left
    Green,
    /// 30 days or fewer left
    Orange,
    /// Expired or invalid
    Red,
}

impl Severity {
    /// CSS color name
    pub fn color(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Orange => "orange",
            Self::Red => "red",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.color())
    }
}

/// Classify whole days until expiry; `None` means the certificate is invalid
pub fn classify_days(days_until_expiry: Option<i64>) -> Severity {
    match days_until_expiry {
        Some(days) if days > EXPIRY_WARNING_DAYS => Severity::Green,
        Some(days) if days > 0 => Severity::Orange,
        _ => Severity::Red,
    }
}

/// Classify a certificate probe relative to `now`
pub fn classify_expiry(probe: &CertificateProbe, now: DateTime<Utc>) -> Severity {
    match probe {
        CertificateProbe::Valid { expires_at } => {
            classify_days(Some((*expires_at - now).num_days()))
        }
        CertificateProbe::Invalid { .. } => classify_days(None),
    }
}

/// Safe Browsing verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MalwareStatus {
    /// At least one threat match
    MalwareFound,
    /// No threat matches
    Clean,
    /// The scan could not be performed
    ScanFailed,
}

impl std::fmt::Display for MalwareStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalwareFound => write!(f, "Malware found"),
            Self::Clean => write!(f, "No malware detected"),
            Self::ScanFailed => write!(f, "Scan failed"),
        }
    }
}

/// PageSpeed performance score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum PerformanceScore {
    /// Score scaled to 0-100
    Score(f64),
    /// Not available
    Unavailable,
}

impl std::fmt::Display for PerformanceScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Score(score) => write!(f, "{:.0}", score),
            Self::Unavailable => write!(f, "N/A"),
        }
    }
}

/// Reachability of the site root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UptimeStatus {
    /// Site answered with a success status
    Online,
    /// Request failed or returned an error status
    Error,
}

impl std::fmt::Display for UptimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "Online"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Safe Browsing threatMatches:find request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThreatMatchRequest<'a> {
    client: ThreatClient,
    threat_info: ThreatInfo<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThreatClient {
    client_id: &'static str,
    client_version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThreatInfo<'a> {
    threat_types: [&'static str; 2],
    platform_types: [&'static str; 1],
    threat_entry_types: [&'static str; 1],
    threat_entries: [ThreatEntry<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ThreatEntry<'a> {
    url: &'a str,
}

impl<'a> ThreatMatchRequest<'a> {
    fn for_url(url: &'a str) -> Self {
        Self {
            client: ThreatClient {
                client_id: env!("CARGO_PKG_NAME"),
                client_version: env!("CARGO_PKG_VERSION"),
            },
            threat_info: ThreatInfo {
                threat_types: ["MALWARE", "SOCIAL_ENGINEERING"],
                platform_types: ["ANY_PLATFORM"],
                threat_entry_types: ["URL"],
                threat_entries: [ThreatEntry { url }],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ThreatMatchResponse {
    #[serde(default)]
    matches: Vec<serde_json::Value>,
}

/// PageSpeed response, reduced to the performance score path
#[derive(Debug, Deserialize)]
struct PageSpeedResponse {
    #[serde(rename = "lighthouseResult")]
    lighthouse_result: Option<LighthouseResult>,
}

#[derive(Debug, Deserialize)]
struct LighthouseResult {
    categories: Option<Categories>,
}

#[derive(Debug, Deserialize)]
struct Categories {
    performance: Option<Category>,
}

#[derive(Debug, Deserialize)]
struct Category {
    score: Option<f64>,
}

impl PageSpeedResponse {
    fn performance_score(&self) -> Option<f64> {
        self.lighthouse_result
            .as_ref()?
            .categories
            .as_ref()?
            .performance
            .as_ref()?
            .score
    }
}

/// Endpoints and keys used by the health checks
#[derive(Debug, Clone)]
pub struct HealthChecker {
    client: Client,
    safe_browsing_base: String,
    safe_browsing_key: Option<String>,
    pagespeed_base: String,
    pagespeed_key: Option<String>,
    tls_port: u16,
}

impl HealthChecker {
    /// Create a checker against the public Google endpoints
    pub fn new(
        client: Client,
        safe_browsing_key: Option<String>,
        pagespeed_key: Option<String>,
    ) -> Self {
        Self {
            client,
            safe_browsing_base: SAFE_BROWSING_API_BASE.to_string(),
            safe_browsing_key,
            pagespeed_base: PAGESPEED_API_BASE.to_string(),
            pagespeed_key,
            tls_port: TLS_PORT,
        }
    }

    /// Override the API base URLs
    pub fn with_api_bases(
        mut self,
        safe_browsing_base: impl Into<String>,
        pagespeed_base: impl Into<String>,
    ) -> Self {
        self.safe_browsing_base = safe_browsing_base.into();
        self.pagespeed_base = pagespeed_base.into();
        self
    }

    /// Override the port used for the certificate check
    pub fn with_tls_port(mut self, port: u16) -> Self {
        self.tls_port = port;
        self
    }

    /// Handshake with the host and read the peer certificate's expiry
    pub async fn check_certificate(&self, host: &str) -> CertificateProbe {
        match fetch_certificate_expiry(host, self.tls_port).await {
            Ok(expires_at) => CertificateProbe::Valid { expires_at },
            Err(reason) => {
                error!(host = %host, "Error checking SSL certificate for {}: {}", host, reason);
                CertificateProbe::Invalid { reason }
            }
        }
    }

    /// Look the URL up in Safe Browsing
    pub async fn scan_for_malware(&self, url: &str) -> MalwareStatus {
        let Some(key) = self.safe_browsing_key.as_deref() else {
            error!(url = %url, "Safe Browsing API key is missing");
            return MalwareStatus::ScanFailed;
        };

        let endpoint = format!("{}/v4/threatMatches:find", self.safe_browsing_base);
        let result = async {
            self.client
                .post(&endpoint)
                .query(&[("key", key)])
                .json(&ThreatMatchRequest::for_url(url))
                .send()
                .await?
                .error_for_status()?
                .json::<ThreatMatchResponse>()
                .await
        }
        .await;

        match result {
            Ok(response) if response.matches.is_empty() => MalwareStatus::Clean,
            Ok(_) => MalwareStatus::MalwareFound,
            Err(e) => {
                error!(url = %url, "Error scanning for malware on {}: {}", url, e);
                MalwareStatus::ScanFailed
            }
        }
    }

    /// Fetch the PageSpeed Insights performance score
    pub async fn performance_score(&self, url: &str) -> PerformanceScore {
        let Some(key) = self.pagespeed_key.as_deref() else {
            error!("Google PageSpeed Insights API key is missing");
            return PerformanceScore::Unavailable;
        };

        let endpoint = format!("{}/pagespeedonline/v5/runPagespeed", self.pagespeed_base);
        let result = async {
            self.client
                .get(&endpoint)
                .query(&[("url", url), ("key", key)])
                .send()
                .await?
                .error_for_status()?
                .json::<PageSpeedResponse>()
                .await
        }
        .await;

        match result {
            Ok(response) => match response.performance_score() {
                Some(score) => PerformanceScore::Score(score * 100.0),
                None => {
                    error!(url = %url, "Required data not found in PageSpeed Insights API response");
                    PerformanceScore::Unavailable
                }
            },
            Err(e) => {
                error!(url = %url, "Error fetching performance metrics for {}: {}", url, e);
                PerformanceScore::Unavailable
            }
        }
    }

    /// Request the site root
    pub async fn check_uptime(&self, url: &str) -> UptimeStatus {
        let result = async { self.client.get(url).send().await?.error_for_status() }.await;

        match result {
            Ok(_) => UptimeStatus::Online,
            Err(e) => {
                error!(url = %url, "Error checking uptime for {}: {}", url, e);
                UptimeStatus::Error
            }
        }
    }
}

/// TLS handshake against the web PKI roots, returning the leaf `notAfter`
async fn fetch_certificate_expiry(
    host: &str,
    port: u16,
) -> std::result::Result<DateTime<Utc>, String> {
    // Ensure a crypto provider is installed (ring)
    let _ =
        rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider());
    let limit = Duration::from_secs(TLS_TIMEOUT_SECS);

    let stream = timeout(limit, TcpStream::connect((host, port)))
        .await
        .map_err(|_| "connection timed out".to_string())?
        .map_err(|e| e.to_string())?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));
    let server_name = match host.parse::<std::net::IpAddr>() {
        Ok(ip) => rustls::pki_types::ServerName::IpAddress(ip.into()),
        Err(_) => rustls::pki_types::ServerName::try_from(host.to_owned())
            .map_err(|e| format!("invalid server name: {}", e))?,
    };

    let tls = timeout(limit, connector.connect(server_name, stream))
        .await
        .map_err(|_| "handshake timed out".to_string())?
        .map_err(|e| e.to_string())?;

    let end_entity = tls
        .get_ref()
        .1
        .peer_certificates()
        .and_then(|certs| certs.first())
        .ok_or_else(|| "no peer certificate".to_string())?;

    let (_, x509) =
        x509_parser::parse_x509_certificate(end_entity.as_ref()).map_err(|e| e.to_string())?;
    let not_after = x509.validity().not_after.timestamp();
    DateTime::from_timestamp(not_after, 0)
        .ok_or_else(|| format!("certificate expiry out of range: {}", not_after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn checker(server: &MockServer, keys: bool) -> HealthChecker {
        let key = keys.then(|| "k".to_string());
        HealthChecker::new(Client::new(), key.clone(), key).with_api_bases(server.uri(), server.uri())
    }

    #[test]
    fn severity_thresholds() {
        assert_eq!(classify_days(Some(45)), Severity::Green);
        assert_eq!(classify_days(Some(31)), Severity::Green);
        assert_eq!(classify_days(Some(30)), Severity::Orange);
        assert_eq!(classify_days(Some(10)), Severity::Orange);
        assert_eq!(classify_days(Some(1)), Severity::Orange);
        assert_eq!(classify_days(Some(0)), Severity::Red);
        assert_eq!(classify_days(Some(-3)), Severity::Red);
        assert_eq!(classify_days(None), Severity::Red);
    }

    #[test]
    fn classify_probe_by_days_remaining() {
        let now = Utc::now();
        let in_days = |days: i64| CertificateProbe::Valid {
            expires_at: now + TimeDelta::days(days) + TimeDelta::hours(1),
        };
        assert_eq!(classify_expiry(&in_days(45), now), Severity::Green);
        assert_eq!(classify_expiry(&in_days(10), now), Severity::Orange);
        assert_eq!(classify_expiry(&in_days(0), now), Severity::Red);
    }

    #[test]
    fn invalid_certificate_is_always_red() {
        let probe = CertificateProbe::Invalid {
            reason: "handshake failure".into(),
        };
        assert_eq!(classify_expiry(&probe, Utc::now()), Severity::Red);
        assert!(!probe.is_valid());
    }

    #[test]
    fn status_labels() {
        assert_eq!(MalwareStatus::MalwareFound.to_string(), "Malware found");
        assert_eq!(MalwareStatus::Clean.to_string(), "No malware detected");
        assert_eq!(MalwareStatus::ScanFailed.to_string(), "Scan failed");
        assert_eq!(PerformanceScore::Score(87.0).to_string(), "87");
        assert_eq!(PerformanceScore::Unavailable.to_string(), "N/A");
    }

    #[tokio::test]
    async fn handshake_failure_is_invalid() {
        // Plain HTTP server: the TLS handshake cannot succeed
        let server = MockServer::start().await;
        let port = server.address().port();
        let checker = checker(&server, true).with_tls_port(port);
        let probe = checker.check_certificate("127.0.0.1").await;
        assert!(matches!(probe, CertificateProbe::Invalid { .. }));
    }

    #[tokio::test]
    async fn malware_matches_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v4/threatMatches:find"))
            .and(query_param("key", "k"))
            .and(body_partial_json(serde_json::json!({
                "threatInfo": {"threatEntries": [{"url": "https://example.com"}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"matches": [{"threatType": "MALWARE"}]}),
            ))
            .mount(&server)
            .await;

        let status = checker(&server, true).scan_for_malware("https://example.com").await;
        assert_eq!(status, MalwareStatus::MalwareFound);
    }

    #[tokio::test]
    async fn empty_malware_response_is_clean() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let status = checker(&server, true).scan_for_malware("https://example.com").await;
        assert_eq!(status, MalwareStatus::Clean);
    }

    #[tokio::test]
    async fn malware_error_status_is_scan_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let status = checker(&server, true).scan_for_malware("https://example.com").await;
        assert_eq!(status, MalwareStatus::ScanFailed);
    }

    #[tokio::test]
    async fn performance_score_scaled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pagespeedonline/v5/runPagespeed"))
            .and(query_param("url", "https://example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "lighthouseResult": {"categories": {"performance": {"score": 0.87}}}
            })))
            .mount(&server)
            .await;

        let score = checker(&server, true).performance_score("https://example.com").await;
        assert_eq!(score.to_string(), "87");
    }

    #[tokio::test]
    async fn performance_missing_field_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"lighthouseResult": {"categories": {}}})),
            )
            .mount(&server)
            .await;

        let score = checker(&server, true).performance_score("https://example.com").await;
        assert_eq!(score, PerformanceScore::Unavailable);
    }

    #[tokio::test]
    async fn performance_without_key_sends_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let score = checker(&server, false).performance_score("https://example.com").await;
        assert_eq!(score, PerformanceScore::Unavailable);
    }

    #[tokio::test]
    async fn uptime_follows_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let checker = checker(&server, true);
        assert_eq!(checker.check_uptime(&server.uri()).await, UptimeStatus::Online);
        assert_eq!(
            checker.check_uptime(&format!("{}/down", server.uri())).await,
            UptimeStatus::Error
        );
    }
}
