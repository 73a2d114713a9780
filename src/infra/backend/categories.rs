use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::repos::{CategoriesRepo, CategoriesWriteRepo, RepoError};
use crate::domain::entities::CategoryRecord;

use super::HostedRepositories;
use super::util::{
    check_table_response, decode_rows, decode_single, map_transport_error, url_error,
};

const TABLE: &str = "categories";

#[derive(Debug, Deserialize)]
struct CategoryRow {
    id: Uuid,
    name: String,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(Debug, Serialize)]
struct InsertCategory<'a> {
    name: &'a str,
}

#[async_trait]
impl CategoriesRepo for HostedRepositories {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let mut url = self.client.table(TABLE).map_err(url_error)?;
        url.query_pairs_mut()
            .append_pair("select", "id,name")
            .append_pair("order", "name.asc");

        let response = self
            .client
            .service()
            .get(url)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_table_response(response).await?;
        let rows: Vec<CategoryRow> = decode_rows(response).await?;
        Ok(rows.into_iter().map(CategoryRecord::from).collect())
    }
}

#[async_trait]
impl CategoriesWriteRepo for HostedRepositories {
    async fn create_category(&self, name: &str) -> Result<CategoryRecord, RepoError> {
        let mut url = self.client.table(TABLE).map_err(url_error)?;
        url.query_pairs_mut().append_pair("select", "id,name");

        let response = self
            .client
            .service()
            .post(url)
            .header("Prefer", "return=representation")
            .json(&InsertCategory { name })
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_table_response(response).await?;
        decode_single::<CategoryRow>(response)
            .await
            .map(CategoryRecord::from)
    }
}
