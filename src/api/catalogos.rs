//! Catalogos (lookup tables such as countries or document types) endpoints

use serde::{Deserialize, Serialize};

use super::{ApiClient, ApiError};

/// One entry of a lookup catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Stable code used by other records
    pub code: String,
    /// Human-readable label
    pub label: String,
    /// Whether the entry can still be selected
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ApiClient {
    /// Fetches every entry of the catalog `name`
    pub async fn list_catalog(&self, name: &str) -> Result<Vec<CatalogItem>, ApiError> {
        self.get_json(&format!("catalogos/{}", name)).await
    }
}
