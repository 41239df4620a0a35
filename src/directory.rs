//! WordPress.org plugin and theme directory client

use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info};

/// WordPress.org API base URL
pub const WP_API_BASE: &str = "https://api.wordpress.org";

/// Premium slugs that are never listed in the public directory
const EXEMPT_SLUGS: &[&str] = &[
    "avada",
    "avada-builder",
    "avada-core",
    "avada-child",
    "avadachild",
    "avada_child",
    "avadacore",
    "avada_core",
    "avadabuilder",
    "avada_builder",
];

/// Outcome of a single version lookup against an external catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Catalog knows the item and reported its latest version
    Found(String),
    /// Catalog answered but has no version for the item
    NotFound,
    /// Request failed (transport, status or decode)
    Error(String),
}

impl Lookup {
    /// The version, if one was found
    pub fn version(self) -> Option<String> {
        match self {
            Self::Found(version) => Some(version),
            Self::NotFound | Self::Error(_) => None,
        }
    }
}

/// Directory section to query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Plugin directory
    Plugin,
    /// Theme directory
    Theme,
}

impl ItemKind {
    fn section(self) -> &'static str {
        match self {
            Self::Plugin => "plugins",
            Self::Theme => "themes",
        }
    }

    fn action(self) -> &'static str {
        match self {
            Self::Plugin => "plugin_information",
            Self::Theme => "theme_information",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plugin => write!(f, "plugin"),
            Self::Theme => write!(f, "theme"),
        }
    }
}

/// WordPress.org info API response (plugins and themes share the field)
#[derive(Debug, Deserialize)]
struct InfoResponse {
    version: Option<String>,
}

/// Check whether a slug is a known premium item
pub fn is_exempt(slug: &str) -> bool {
    let slug = slug.to_lowercase();
    EXEMPT_SLUGS.contains(&slug.as_str())
}

/// Client for the plugin/theme info endpoints
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    client: Client,
    base_url: String,
}

impl DirectoryClient {
    /// Create a client against the given API base (no trailing slash)
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn info_url(&self, slug: &str, kind: ItemKind) -> String {
        format!(
            "{}/{}/info/1.2/?action={}&request[slug]={}",
            self.base_url,
            kind.section(),
            kind.action(),
            slug
        )
    }

    /// Fetch the latest version of a plugin or theme by slug
    pub async fn lookup(&self, slug: &str, kind: ItemKind) -> Lookup {
        if is_exempt(slug) {
            info!(slug = %slug, "Exempting {} from WordPress API checks", slug);
            return Lookup::NotFound;
        }

        let url = self.info_url(slug, kind);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                error!(slug = %slug, "Error fetching {} info for {}: {}", kind, slug, e);
                return Lookup::Error(e.to_string());
            }
        };

        if let Err(e) = response.error_for_status_ref() {
            error!(slug = %slug, "Error fetching {} info for {}: {}", kind, slug, e);
            return Lookup::Error(e.to_string());
        }

        match response.json::<InfoResponse>().await {
            Ok(InfoResponse {
                version: Some(version),
            }) => Lookup::Found(version),
            Ok(InfoResponse { version: None }) => Lookup::NotFound,
            Err(e) => {
                error!(slug = %slug, "Malformed {} info for {}: {}", kind, slug, e);
                Lookup::Error(e.to_string())
            }
        }
    }

    /// Try each candidate slug in order, stopping at the first version found
    pub async fn lookup_first(&self, slugs: &[String], kind: ItemKind) -> Option<String> {
        for slug in slugs {
            if let Some(version) = self.lookup(slug, kind).await.version() {
                return Some(version);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn exempt_slugs_ignore_case() {
        assert!(is_exempt("Avada"));
        assert!(is_exempt("AVADA_CORE"));
        assert!(!is_exempt("akismet"));
    }

    #[test]
    fn lookup_version_accessor() {
        assert_eq!(Lookup::Found("1.0".into()).version(), Some("1.0".into()));
        assert_eq!(Lookup::NotFound.version(), None);
        assert_eq!(Lookup::Error("boom".into()).version(), None);
    }

    #[tokio::test]
    async fn found_plugin_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plugins/info/1.2/"))
            .and(query_param("action", "plugin_information"))
            .and(query_param("request[slug]", "akismet"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"name": "Akismet", "version": "5.3"})),
            )
            .mount(&server)
            .await;

        let directory = DirectoryClient::new(Client::new(), server.uri());
        assert_eq!(
            directory.lookup("akismet", ItemKind::Plugin).await,
            Lookup::Found("5.3".into())
        );
    }

    #[tokio::test]
    async fn theme_uses_theme_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/themes/info/1.2/"))
            .and(query_param("action", "theme_information"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"version": "1.2"})),
            )
            .mount(&server)
            .await;

        let directory = DirectoryClient::new(Client::new(), server.uri());
        assert_eq!(
            directory.lookup("twentytwentyfour", ItemKind::Theme).await,
            Lookup::Found("1.2".into())
        );
    }

    #[tokio::test]
    async fn missing_version_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"error": "Plugin not found."})),
            )
            .mount(&server)
            .await;

        let directory = DirectoryClient::new(Client::new(), server.uri());
        assert_eq!(
            directory.lookup("nope", ItemKind::Plugin).await,
            Lookup::NotFound
        );
    }

    #[tokio::test]
    async fn error_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let directory = DirectoryClient::new(Client::new(), server.uri());
        assert!(matches!(
            directory.lookup("nope", ItemKind::Plugin).await,
            Lookup::Error(_)
        ));
    }

    #[tokio::test]
    async fn exempt_slug_sends_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let directory = DirectoryClient::new(Client::new(), server.uri());
        assert_eq!(
            directory.lookup("avada", ItemKind::Theme).await,
            Lookup::NotFound
        );
    }

    #[tokio::test]
    async fn lookup_first_stops_at_first_hit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("request[slug]", "wp_super_cache"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"version": "1.12"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("request[slug]", "wp-super-cache"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("request[slug]", "wpsupercache"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let directory = DirectoryClient::new(Client::new(), server.uri());
        let slugs = crate::slug::candidates("WP Super Cache");
        assert_eq!(
            directory.lookup_first(&slugs, ItemKind::Plugin).await,
            Some("1.12".into())
        );
    }
}
