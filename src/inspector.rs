//! WordPress site inspector
//!
//! Reads the installed PHP, WordPress, plugin and theme versions from the
//! site's `version-info.php` endpoint, then resolves the latest available
//! version of every plugin and theme.

use crate::directory::{DirectoryClient, ItemKind};
use crate::error::{Error, Result};
use crate::marketplace::{MarketplaceClient, premium_item};
use crate::slug;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};
use url::Url;

/// User agent for requests (standard Chrome on Windows)
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Request timeout in seconds
const TIMEOUT_SECS: u64 = 30;

/// Site-side script exposing installed versions
const VERSION_INFO_PATH: &str = "version-info.php";

/// Header carrying the shared site secret
const AUTH_HEADER: &str = "X-Auth-Key";

/// Placeholder for versions that could not be determined
pub const UNKNOWN: &str = "Unknown";

/// Build the HTTP client shared by every check
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(TIMEOUT_SECS))
        .danger_accept_invalid_certs(false)
        .build()
        .map_err(|e| Error::HttpClient(e.to_string()))
}

/// A monitored site
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Site {
    /// Normalized URL (always carries a scheme)
    url: String,
    /// Host name used for the certificate check
    #[serde(skip)]
    host: String,
}

impl Site {
    /// Normalize a configured URL or bare domain
    ///
    /// Adds `https://` when no http(s) scheme is present.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::InvalidUrl("empty site URL".to_string()));
        }

        let url = if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else {
            format!("https://{}", raw)
        };

        let parsed = Url::parse(&url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::InvalidUrl(format!("{}: missing host", url)))?
            .to_string();

        Ok(Self { url, host })
    }

    /// The normalized URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The host name
    pub fn host(&self) -> &str {
        &self.host
    }

    fn version_info_url(&self) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), VERSION_INFO_PATH)
    }
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

/// An installed plugin or theme with its resolved latest version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Component {
    /// Display name as reported by the site
    pub name: String,
    /// Installed version (or "Unknown")
    pub installed_version: String,
    /// Latest available version (or "Unknown")
    pub latest_version: String,
}

/// Installed versions of a site
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inventory {
    /// PHP version (or "Unknown")
    pub php_version: String,
    /// WordPress version (or "Unknown")
    pub wp_version: String,
    /// Installed plugins
    pub plugins: Vec<Component>,
    /// Installed themes
    pub themes: Vec<Component>,
}

impl Inventory {
    /// Inventory of a site whose version endpoint could not be read
    pub fn unknown() -> Self {
        Self {
            php_version: UNKNOWN.to_string(),
            wp_version: UNKNOWN.to_string(),
            plugins: Vec::new(),
            themes: Vec::new(),
        }
    }
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

/// Version text from a string or number; anything else is "Unknown"
fn version_text(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => unknown(),
    }
}

fn lenient_version<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Value>::deserialize(deserializer).map(version_text)
}

/// Keep the entries that decode; a non-list decodes as empty
fn lenient_items<'de, D>(deserializer: D) -> std::result::Result<Vec<InstalledItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<InstalledItem>(item).ok())
        .collect())
}

/// `version-info.php` response
///
/// Hand-written PHP endpoints emit `null` or bare numbers for missing
/// versions; one odd field must not discard the whole inventory.
#[derive(Debug, Deserialize)]
struct VersionInfoResponse {
    #[serde(default = "unknown", deserialize_with = "lenient_version")]
    php_version: String,
    #[serde(default = "unknown", deserialize_with = "lenient_version")]
    wp_version: String,
    #[serde(default, deserialize_with = "lenient_items")]
    plugins: Vec<InstalledItem>,
    #[serde(default, deserialize_with = "lenient_items")]
    themes: Vec<InstalledItem>,
}

#[derive(Debug, Deserialize)]
struct InstalledItem {
    name: String,
    #[serde(default = "unknown", deserialize_with = "lenient_version")]
    version: String,
}

/// Site inspector
#[derive(Debug, Clone)]
pub struct Inspector {
    client: Client,
    directory: DirectoryClient,
    marketplace: MarketplaceClient,
    auth_token: Option<String>,
}

impl Inspector {
    /// Create an inspector using the given lookup clients
    pub fn new(
        client: Client,
        directory: DirectoryClient,
        marketplace: MarketplaceClient,
        auth_token: Option<String>,
    ) -> Self {
        Self {
            client,
            directory,
            marketplace,
            auth_token,
        }
    }

    /// Read installed versions and resolve latest versions for a site
    ///
    /// Never fails: an unreadable endpoint degrades to [`Inventory::unknown`].
    pub async fn inspect(&self, site: &Site) -> Inventory {
        let info = match self.fetch_version_info(site).await {
            Ok(info) => info,
            Err(reason) => {
                error!(site = %site, "Error fetching version info for {}: {}", site, reason);
                return Inventory::unknown();
            }
        };

        let mut plugins = Vec::with_capacity(info.plugins.len());
        for plugin in info.plugins {
            let latest_version = self.resolve_plugin(&plugin.name).await;
            plugins.push(Component {
                name: plugin.name,
                installed_version: plugin.version,
                latest_version,
            });
        }

        let mut themes = Vec::with_capacity(info.themes.len());
        for theme in info.themes {
            let latest_version = self.resolve_theme(&theme.name, &theme.version).await;
            themes.push(Component {
                name: theme.name,
                installed_version: theme.version,
                latest_version,
            });
        }

        Inventory {
            php_version: info.php_version,
            wp_version: info.wp_version,
            plugins,
            themes,
        }
    }

    /// Fetch and decode the site's version endpoint
    async fn fetch_version_info(
        &self,
        site: &Site,
    ) -> std::result::Result<VersionInfoResponse, String> {
        let mut request = self.client.get(site.version_info_url());
        if let Some(token) = &self.auth_token {
            request = request.header(AUTH_HEADER, token);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let response = response.error_for_status().map_err(|e| e.to_string())?;
        response
            .json::<VersionInfoResponse>()
            .await
            .map_err(|e| e.to_string())
    }

    /// Latest version of a plugin, or "Unknown"
    async fn resolve_plugin(&self, name: &str) -> String {
        if let Some(item_id) = premium_item(name).and_then(|item| item.item_id)
            && let Some(version) = self.marketplace.lookup_latest(item_id).await.version()
        {
            return version;
        }

        self.resolve_from_directory(name, ItemKind::Plugin).await
    }

    /// Latest version of a theme
    ///
    /// Premium themes fall back to the installed version rather than
    /// "Unknown" when the marketplace has no answer.
    async fn resolve_theme(&self, name: &str, installed_version: &str) -> String {
        if let Some(item) = premium_item(name) {
            let latest = match item.item_id {
                Some(item_id) => self.marketplace.lookup_latest(item_id).await.version(),
                None => None,
            };
            return latest.unwrap_or_else(|| {
                info!(theme = name, "Using installed version for premium theme {}", name);
                installed_version.to_string()
            });
        }

        self.resolve_from_directory(name, ItemKind::Theme).await
    }

    async fn resolve_from_directory(&self, name: &str, kind: ItemKind) -> String {
        let candidates = slug::candidates(name);
        self.directory
            .lookup_first(&candidates, kind)
            .await
            .unwrap_or_else(unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn inspector(server: &MockServer) -> Inspector {
        let client = Client::new();
        Inspector::new(
            client.clone(),
            DirectoryClient::new(client.clone(), server.uri()),
            MarketplaceClient::new(client, server.uri(), Some("envato".into())),
            Some("site-secret".into()),
        )
    }

    async fn mount_version_info(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/version-info.php"))
            .and(header("X-Auth-Key", "site-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn site_adds_https_scheme() {
        let site = Site::parse("example.com").unwrap();
        assert_eq!(site.url(), "https://example.com");
        assert_eq!(site.host(), "example.com");
    }

    #[test]
    fn site_keeps_existing_scheme() {
        assert_eq!(
            Site::parse("http://example.com").unwrap().url(),
            "http://example.com"
        );
        assert_eq!(
            Site::parse(" https://example.com/blog ").unwrap().url(),
            "https://example.com/blog"
        );
    }

    #[test]
    fn site_rejects_empty_and_invalid() {
        assert!(Site::parse("   ").is_err());
        assert!(Site::parse("not a url").is_err());
    }

    #[test]
    fn version_info_url_appends_path() {
        let site = Site::parse("https://example.com/").unwrap();
        assert_eq!(site.version_info_url(), "https://example.com/version-info.php");
    }

    #[tokio::test]
    async fn unreachable_endpoint_degrades_to_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version-info.php"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let site = Site::parse(&server.uri()).unwrap();
        assert_eq!(inspector(&server).inspect(&site).await, Inventory::unknown());
    }

    #[tokio::test]
    async fn unresolved_plugin_is_unknown() {
        let server = MockServer::start().await;
        mount_version_info(
            &server,
            serde_json::json!({
                "php_version": "8.2",
                "wp_version": "6.5",
                "plugins": [{"name": "Some Private Plugin", "version": "1.0"}],
                "themes": []
            }),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/plugins/info/1.2/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&server)
            .await;

        let site = Site::parse(&server.uri()).unwrap();
        let inventory = inspector(&server).inspect(&site).await;
        assert_eq!(inventory.php_version, "8.2");
        assert_eq!(inventory.plugins[0].latest_version, UNKNOWN);
    }

    #[tokio::test]
    async fn missing_versions_default_to_unknown() {
        let server = MockServer::start().await;
        mount_version_info(
            &server,
            serde_json::json!({"themes": [{"name": "Avada Child"}]}),
        )
        .await;

        let site = Site::parse(&server.uri()).unwrap();
        let inventory = inspector(&server).inspect(&site).await;
        assert_eq!(inventory.php_version, UNKNOWN);
        assert_eq!(inventory.wp_version, UNKNOWN);
        assert_eq!(inventory.themes[0].installed_version, UNKNOWN);
        assert_eq!(inventory.themes[0].latest_version, UNKNOWN);
    }

    #[tokio::test]
    async fn premium_theme_falls_back_to_installed_version() {
        let server = MockServer::start().await;
        mount_version_info(
            &server,
            serde_json::json!({
                "php_version": "8.1",
                "wp_version": "6.4",
                "plugins": [],
                "themes": [{"name": "Avada", "version": "7.9"}, {"name": "Avada Child", "version": "1.0.0"}]
            }),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/v3/market/catalog/item-version"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let site = Site::parse(&server.uri()).unwrap();
        let inventory = inspector(&server).inspect(&site).await;
        assert_eq!(inventory.themes[0].latest_version, "7.9");
        assert_eq!(inventory.themes[1].latest_version, "1.0.0");
    }

    #[tokio::test]
    async fn premium_theme_uses_marketplace_version() {
        let server = MockServer::start().await;
        mount_version_info(
            &server,
            serde_json::json!({"themes": [{"name": "Avada", "version": "7.9"}]}),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/v3/market/catalog/item-version"))
            .and(query_param("id", "2833226"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"wordpress_theme_latest_version": "7.11"}),
            ))
            .mount(&server)
            .await;

        let site = Site::parse(&server.uri()).unwrap();
        let inventory = inspector(&server).inspect(&site).await;
        assert_eq!(inventory.themes[0].latest_version, "7.11");
    }

    #[tokio::test]
    async fn directory_theme_resolved_by_override() {
        let server = MockServer::start().await;
        mount_version_info(
            &server,
            serde_json::json!({"themes": [{"name": "Twenty Twenty-Four", "version": "1.0"}]}),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/themes/info/1.2/"))
            .and(query_param("request[slug]", "twentytwentyfour"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"version": "1.2"})),
            )
            .mount(&server)
            .await;

        let site = Site::parse(&server.uri()).unwrap();
        let inventory = inspector(&server).inspect(&site).await;
        assert_eq!(inventory.themes[0].latest_version, "1.2");
    }

    #[tokio::test]
    async fn null_and_numeric_versions_keep_inventory() {
        let server = MockServer::start().await;
        mount_version_info(
            &server,
            serde_json::json!({
                "php_version": "8.1",
                "wp_version": 6.4,
                "plugins": [
                    {"name": "Hello Dolly", "version": null},
                    {"name": "Akismet", "version": 5},
                    {"version": "1.0"}
                ],
                "themes": null
            }),
        )
        .await;

        let site = Site::parse(&server.uri()).unwrap();
        let inventory = inspector(&server).inspect(&site).await;
        assert_eq!(inventory.php_version, "8.1");
        assert_eq!(inventory.wp_version, "6.4");
        let installed: Vec<_> = inventory
            .plugins
            .iter()
            .map(|p| (p.name.as_str(), p.installed_version.as_str()))
            .collect();
        assert_eq!(installed, [("Hello Dolly", UNKNOWN), ("Akismet", "5")]);
        assert!(inventory.themes.is_empty());
    }
}
