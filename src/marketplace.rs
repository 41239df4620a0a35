//! Envato marketplace client for premium themes and plugins
//!
//! Premium items are not listed on WordPress.org, so their latest version is
//! read from the marketplace catalog by item id.

use crate::directory::Lookup;
use reqwest::Client;
use serde::Deserialize;
use tracing::error;

/// Envato API base URL
pub const ENVATO_API_BASE: &str = "https://api.envato.com";

/// Known premium items by lowercased display name
///
/// `None` marks items that are premium but have no catalog entry of their
/// own (child themes), so they can only fall back to the installed version.
const PREMIUM_ITEMS: &[(&str, Option<&str>)] = &[
    ("avada", Some("2833226")),
    ("avada child", None),
    ("avada builder", Some("2885264")),
    ("fusion builder", Some("2885332")),
];

/// A display name recognised as a premium marketplace item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PremiumItem {
    /// Catalog id, if the item is sold on its own
    pub item_id: Option<&'static str>,
}

/// Match a display name against the premium item table (case-insensitive)
pub fn premium_item(name: &str) -> Option<PremiumItem> {
    let name = name.to_lowercase();
    PREMIUM_ITEMS
        .iter()
        .find(|(premium, _)| *premium == name)
        .map(|(_, item_id)| PremiumItem { item_id: *item_id })
}

/// Catalog item-version response
#[derive(Debug, Deserialize)]
struct ItemVersionResponse {
    wordpress_theme_latest_version: Option<String>,
    wordpress_plugin_latest_version: Option<String>,
}

/// Client for the catalog item-version endpoint
#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl MarketplaceClient {
    /// Create a client against the given API base, authenticating with `token`
    pub fn new(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token,
        }
    }

    /// Fetch the latest version of a catalog item
    pub async fn lookup_latest(&self, item_id: &str) -> Lookup {
        let url = format!(
            "{}/v3/market/catalog/item-version?id={}",
            self.base_url, item_id
        );
        let request = self
            .client
            .get(&url)
            .bearer_auth(self.token.as_deref().unwrap_or_default());

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(item_id = %item_id, "Error fetching Envato info for item ID {}: {}", item_id, e);
                return Lookup::Error(e.to_string());
            }
        };

        if let Err(e) = response.error_for_status_ref() {
            error!(item_id = %item_id, "Error fetching Envato info for item ID {}: {}", item_id, e);
            return Lookup::Error(e.to_string());
        }

        match response.json::<ItemVersionResponse>().await {
            Ok(body) => body
                .wordpress_theme_latest_version
                .or(body.wordpress_plugin_latest_version)
                .map_or(Lookup::NotFound, Lookup::Found),
            Err(e) => {
                error!(item_id = %item_id, "Malformed Envato response for item ID {}: {}", item_id, e);
                Lookup::Error(e.to_string())
            }
        }
    }
}
