//! File management: multipart uploads into the server-side directory.

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::Value;
use tracing::instrument;

use super::client::IntegramClient;
use super::errors::ApiError;
use crate::request::{self, JSON_KV_FLAG, XSRF_FIELD};

impl IntegramClient {
    /// Upload a file into the server-side directory under `path`.
    ///
    /// Uploads are not retried after a session restore: the multipart body
    /// is consumed by the attempt, so a 401 surfaces directly as
    /// [`ApiError::SessionExpired`].
    #[instrument(skip(self, bytes), fields(file_name = %file_name, size = bytes.len()))]
    pub async fn upload_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        path: &str,
    ) -> Result<Value, ApiError> {
        if !self.is_authenticated() {
            return Err(ApiError::SessionExpired);
        }

        let (url, headers, xsrf) = {
            let store = self.session.read();
            let database = store.database().map(str::to_string);
            let url = request::build_url(
                store.server(),
                database.as_deref(),
                "dir_admin",
                &self.config,
            )?;
            (
                url,
                request::upload_headers(&store),
                store.xsrf_token().unwrap_or_default().to_string(),
            )
        };

        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new()
            .part("file", part)
            .text("path", path.to_string())
            .text(XSRF_FIELD, xsrf);

        let mut builder = self.http.request(Method::POST, &url).query(&[JSON_KV_FLAG]).multipart(form);
        for (name, value) in &headers {
            builder = builder.header(*name, value);
        }
        self.execute(builder, false).await
    }
}
