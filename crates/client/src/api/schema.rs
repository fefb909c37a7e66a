//! Schema (DDL) operations: types and their requisites.

use serde_json::Value;

use super::client::IntegramClient;
use super::errors::ApiError;

/// Form fields shared by type creation and type update.
fn type_fields(name: &str, base_type_id: u64, unique: bool) -> Vec<(String, String)> {
    let mut fields = vec![
        ("val".to_string(), name.to_string()),
        ("t".to_string(), base_type_id.to_string()),
    ];
    if unique {
        fields.push(("unique".to_string(), "1".to_string()));
    }
    fields
}

impl IntegramClient {
    /// Create a type named `name` derived from `base_type_id`.
    pub async fn create_type(
        &self,
        name: &str,
        base_type_id: u64,
        unique: bool,
    ) -> Result<Value, ApiError> {
        self.post("_d_new", &type_fields(name, base_type_id, unique)).await
    }

    /// Rename or re-base an existing type.
    pub async fn save_type(
        &self,
        type_id: u64,
        name: &str,
        base_type_id: u64,
        unique: bool,
    ) -> Result<Value, ApiError> {
        self.post(&format!("_d_save/{type_id}"), &type_fields(name, base_type_id, unique)).await
    }

    /// Delete a type.
    pub async fn delete_type(&self, type_id: u64) -> Result<Value, ApiError> {
        self.post(&format!("_d_del/{type_id}"), &[]).await
    }

    /// Attach a requisite of type `requisite_type_id` to `type_id`.
    pub async fn add_requisite(
        &self,
        type_id: u64,
        requisite_type_id: u64,
    ) -> Result<Value, ApiError> {
        let fields = vec![("t".to_string(), requisite_type_id.to_string())];
        self.post(&format!("_d_req/{type_id}"), &fields).await
    }

    /// Detach a requisite. `forced` also removes stored values.
    pub async fn delete_requisite(
        &self,
        requisite_id: u64,
        forced: bool,
    ) -> Result<Value, ApiError> {
        let fields = if forced {
            vec![("forced".to_string(), "1".to_string())]
        } else {
            Vec::new()
        };
        self.post(&format!("_d_del_req/{requisite_id}"), &fields).await
    }

    /// Set the display alias of a requisite.
    pub async fn save_requisite_alias(
        &self,
        requisite_id: u64,
        alias: &str,
    ) -> Result<Value, ApiError> {
        let fields = vec![("val".to_string(), alias.to_string())];
        self.post(&format!("_d_alias/{requisite_id}"), &fields).await
    }

    /// Toggle whether a requisite accepts empty values.
    pub async fn toggle_requisite_null(&self, requisite_id: u64) -> Result<Value, ApiError> {
        self.post(&format!("_d_null/{requisite_id}"), &[]).await
    }

    /// Toggle whether a requisite accepts multiple values.
    pub async fn toggle_requisite_multi(&self, requisite_id: u64) -> Result<Value, ApiError> {
        self.post(&format!("_d_multi/{requisite_id}"), &[]).await
    }

    /// Move a requisite one position up in its type's ordering.
    pub async fn move_requisite_up(&self, requisite_id: u64) -> Result<Value, ApiError> {
        self.post(&format!("_d_up/{requisite_id}"), &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_flag_is_a_form_field_only_when_set() {
        let fields = type_fields("Invoice", 3, false);
        assert_eq!(
            fields,
            vec![("val".to_string(), "Invoice".to_string()), ("t".to_string(), "3".to_string())]
        );

        let fields = type_fields("Invoice", 3, true);
        assert_eq!(fields.last(), Some(&("unique".to_string(), "1".to_string())));
    }
}
