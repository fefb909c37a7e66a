//! Object (DML) operations: creating, updating, and deleting instances.

use std::collections::BTreeMap;

use serde_json::Value;

use integram_common::format::encode_requisites;
use integram_common::RequisiteValue;

use super::client::IntegramClient;
use super::errors::ApiError;

/// Objects created without an explicit parent attach to the root object.
const ROOT_OBJECT_ID: u64 = 1;

impl IntegramClient {
    /// Create an object of `type_id` with the given main value.
    ///
    /// Requisites with [`RequisiteValue::Empty`] are omitted from the
    /// creation form; the backend fills its own defaults.
    pub async fn create_object(
        &self,
        type_id: u64,
        value: &str,
        requisites: &BTreeMap<u32, RequisiteValue>,
        parent_id: Option<u64>,
    ) -> Result<Value, ApiError> {
        let mut fields = vec![
            (format!("t{type_id}"), value.to_string()),
            ("up".to_string(), parent_id.unwrap_or(ROOT_OBJECT_ID).to_string()),
        ];
        fields.extend(encode_requisites(requisites, false));
        self.post(&format!("_m_new/{type_id}"), &fields).await
    }

    /// Replace an object's main value and requisites.
    ///
    /// Unlike creation, [`RequisiteValue::Empty`] serializes as an empty
    /// string here: an update must be able to clear a stored value.
    pub async fn save_object(
        &self,
        object_id: u64,
        type_id: u64,
        value: &str,
        requisites: &BTreeMap<u32, RequisiteValue>,
    ) -> Result<Value, ApiError> {
        let mut fields = vec![(format!("t{type_id}"), value.to_string())];
        fields.extend(encode_requisites(requisites, true));
        self.post(&format!("_m_save/{object_id}"), &fields).await
    }

    /// Update requisites only, leaving the main value untouched.
    pub async fn set_object_requisites(
        &self,
        object_id: u64,
        requisites: &BTreeMap<u32, RequisiteValue>,
    ) -> Result<Value, ApiError> {
        let fields = encode_requisites(requisites, true);
        self.post(&format!("_m_set/{object_id}"), &fields).await
    }

    /// Delete an object.
    pub async fn delete_object(&self, object_id: u64) -> Result<Value, ApiError> {
        self.post(&format!("_m_del/{object_id}"), &[]).await
    }

    /// Move an object one position up among its siblings.
    pub async fn move_object_up(&self, object_id: u64) -> Result<Value, ApiError> {
        self.post(&format!("_m_up/{object_id}"), &[]).await
    }
}
