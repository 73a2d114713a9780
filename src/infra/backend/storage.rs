use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use tracing::debug;

use crate::application::gateways::{GatewayError, ImageStore, ImageUpload, StoredImage};

use super::BackendClient;
use super::util::{check_gateway_response, map_gateway_transport};

/// Public object storage bucket holding post images.
#[derive(Clone)]
pub struct HostedImageStore {
    client: BackendClient,
    bucket: String,
}

impl HostedImageStore {
    pub fn new(client: BackendClient, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    fn public_url(&self, object_name: &str) -> Result<String, GatewayError> {
        self.client
            .endpoint(&format!(
                "storage/v1/object/public/{}/{object_name}",
                self.bucket
            ))
            .map(String::from)
            .map_err(|err| GatewayError::Invalid(err.to_string()))
    }
}

#[async_trait]
impl ImageStore for HostedImageStore {
    async fn upload_image(
        &self,
        object_name: &str,
        upload: ImageUpload,
    ) -> Result<StoredImage, GatewayError> {
        let url = self
            .client
            .endpoint(&format!("storage/v1/object/{}/{object_name}", self.bucket))
            .map_err(|err| GatewayError::Invalid(err.to_string()))?;
        let content_type = HeaderValue::from_str(&upload.content_type)
            .map_err(|_| GatewayError::Invalid(format!("content type `{}`", upload.content_type)))?;
        let size = upload.bytes.len();

        let response = self
            .client
            .service()
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(upload.bytes)
            .send()
            .await
            .map_err(map_gateway_transport)?;
        check_gateway_response(response).await?;

        debug!(
            target = "blogdeck::infra::backend::storage",
            bucket = %self.bucket,
            object = object_name,
            size,
            "image uploaded"
        );

        Ok(StoredImage {
            path: object_name.to_string(),
            public_url: self.public_url(object_name)?,
        })
    }
}
