use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::repos::{ProfilesRepo, ProfilesWriteRepo, RepoError};
use crate::domain::entities::ProfileRecord;
use crate::domain::types::Role;

use super::HostedRepositories;
use super::util::{
    check_table_response, decode_rows, decode_single, map_transport_error, response_total,
    url_error,
};

const TABLE: &str = "profiles";
const COLUMNS: &str = "id,email,role,send_emails";

#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: Uuid,
    email: Option<String>,
    role: Option<String>,
    /// `true` means the user opted out.
    send_emails: Option<bool>,
}

impl From<ProfileRow> for ProfileRecord {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            role: Role::from_column(row.role.as_deref()),
            notifications_muted: row.send_emails.unwrap_or(false),
        }
    }
}

#[derive(Debug, Serialize)]
struct PatchMuted {
    send_emails: bool,
}

impl HostedRepositories {
    fn profile_url(&self, id: Uuid) -> Result<url::Url, RepoError> {
        let mut url = self.client.table(TABLE).map_err(url_error)?;
        url.query_pairs_mut()
            .append_pair("select", COLUMNS)
            .append_pair("id", &format!("eq.{id}"));
        Ok(url)
    }
}

#[async_trait]
impl ProfilesRepo for HostedRepositories {
    async fn find_profile(&self, id: Uuid) -> Result<Option<ProfileRecord>, RepoError> {
        let url = self.profile_url(id)?;
        let response = self
            .client
            .service()
            .get(url)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_table_response(response).await?;
        let rows: Vec<ProfileRow> = decode_rows(response).await?;
        Ok(rows.into_iter().next().map(ProfileRecord::from))
    }

    async fn list_notification_recipients(&self) -> Result<Vec<ProfileRecord>, RepoError> {
        let mut url = self.client.table(TABLE).map_err(url_error)?;
        url.query_pairs_mut()
            .append_pair("select", COLUMNS)
            .append_pair("or", "(send_emails.is.null,send_emails.eq.false)");

        let response = self
            .client
            .service()
            .get(url)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_table_response(response).await?;
        let rows: Vec<ProfileRow> = decode_rows(response).await?;
        Ok(rows.into_iter().map(ProfileRecord::from).collect())
    }

    async fn count_profiles(&self) -> Result<u64, RepoError> {
        let mut url = self.client.table(TABLE).map_err(url_error)?;
        url.query_pairs_mut().append_pair("select", "id");

        let response = self
            .client
            .service()
            .head(url)
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_table_response(response).await?;
        response_total(&response)
    }
}

#[async_trait]
impl ProfilesWriteRepo for HostedRepositories {
    async fn set_notifications_muted(
        &self,
        id: Uuid,
        muted: bool,
    ) -> Result<ProfileRecord, RepoError> {
        let url = self.profile_url(id)?;
        let response = self
            .client
            .service()
            .patch(url)
            .header("Prefer", "return=representation")
            .json(&PatchMuted { send_emails: muted })
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_table_response(response).await?;
        decode_single::<ProfileRow>(response)
            .await
            .map(ProfileRecord::from)
    }
}
