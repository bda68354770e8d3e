//! Terceros (third parties: customers, suppliers, contacts) endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiClient, ApiError};

/// Collection path for terceros
const TERCEROS_PATH: &str = "terceros";

/// A third party as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tercero {
    /// Backend identifier
    pub id: u64,
    /// Display name
    pub name: String,
    /// Tax or national identification number, if recorded
    #[serde(default)]
    pub document: Option<String>,
    /// Contact email, if recorded
    #[serde(default)]
    pub email: Option<String>,
    /// Last modification time reported by the backend
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload for creating or updating a tercero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTercero {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

fn item_path(id: u64) -> String {
    format!("{}/{}", TERCEROS_PATH, id)
}

impl ApiClient {
    /// Fetches every tercero
    pub async fn list_terceros(&self) -> Result<Vec<Tercero>, ApiError> {
        self.get_json(TERCEROS_PATH).await
    }

    /// Fetches a single tercero by id
    pub async fn get_tercero(&self, id: u64) -> Result<Tercero, ApiError> {
        self.get_json(&item_path(id)).await
    }

    /// Creates a tercero and returns the stored record
    pub async fn create_tercero(&self, tercero: &NewTercero) -> Result<Tercero, ApiError> {
        self.post_json(TERCEROS_PATH, tercero).await
    }

    /// Replaces a tercero and returns the stored record
    pub async fn update_tercero(&self, id: u64, tercero: &NewTercero) -> Result<Tercero, ApiError> {
        self.put_json(&item_path(id), tercero).await
    }

    /// Deletes a tercero
    pub async fn delete_tercero(&self, id: u64) -> Result<(), ApiError> {
        self.delete(&item_path(id)).await
    }
}
