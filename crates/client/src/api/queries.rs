//! Read-side operations: dictionary, metadata, object lists, reports, and
//! admin listings.

use serde_json::Value;

use super::client::IntegramClient;
use super::errors::ApiError;

/// Report parameter that marks a mutating, user-confirmed execution.
const CONFIRMED_PARAM: &str = "_m_confirmed";

impl IntegramClient {
    /// The database's type dictionary.
    pub async fn dictionary(&self) -> Result<Value, ApiError> {
        self.get("dict", &[]).await
    }

    /// Structural metadata of a type: requisites, ordering, flags.
    pub async fn type_metadata(&self, type_id: u64) -> Result<Value, ApiError> {
        self.get(&format!("metadata/{type_id}"), &[]).await
    }

    /// List objects of a type. `params` carry paging and filter fields
    /// through verbatim.
    pub async fn object_list(
        &self,
        type_id: u64,
        params: &[(String, String)],
    ) -> Result<Value, ApiError> {
        self.get(&format!("object/{type_id}"), params).await
    }

    /// Everything needed to render an object's edit form.
    pub async fn object_edit_data(&self, object_id: u64) -> Result<Value, ApiError> {
        self.get(&format!("edit_obj/{object_id}"), &[]).await
    }

    /// Everything needed to render the type editor.
    pub async fn type_editor_data(&self) -> Result<Value, ApiError> {
        self.get("edit_types", &[]).await
    }

    /// Run a report.
    ///
    /// A report whose parameters include `_m_confirmed` may mutate data and
    /// goes over POST; all others are plain reads.
    pub async fn execute_report(
        &self,
        report_id: u64,
        params: &[(String, String)],
    ) -> Result<Value, ApiError> {
        let endpoint = format!("report/{report_id}");
        if params.iter().any(|(name, _)| name == CONFIRMED_PARAM) {
            self.post(&endpoint, params).await
        } else {
            self.get(&endpoint, params).await
        }
    }

    /// List the server-side file directory under `path`.
    pub async fn dir_admin(&self, path: &str) -> Result<Value, ApiError> {
        let params = vec![("path".to_string(), path.to_string())];
        self.get("dir_admin", &params).await
    }

    /// Candidate values for a reference requisite on `object_id`.
    ///
    /// `restrict` narrows the candidate set; `query` switches the endpoint
    /// into search mode.
    pub async fn reference_options(
        &self,
        requisite_id: u64,
        object_id: u64,
        restrict: Option<&str>,
        query: Option<&str>,
    ) -> Result<Value, ApiError> {
        let mut params = vec![("id".to_string(), object_id.to_string())];
        if let Some(restrict) = restrict {
            params.push(("r".to_string(), restrict.to_string()));
        }
        if let Some(query) = query {
            params.push(("type".to_string(), "query".to_string()));
            params.push(("q".to_string(), query.to_string()));
        }
        self.get(&format!("_ref_reqs/{requisite_id}"), &params).await
    }

    /// Trigger a server-side backup of the active database.
    pub async fn create_backup(&self) -> Result<Value, ApiError> {
        self.post("backup", &[]).await
    }
}
