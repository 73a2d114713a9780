use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::application::pagination::PageWindow;
use crate::application::repos::{
    NewPostParams, PostChanges, PostListPage, PostListScope, PostQueryFilter, PostsRepo,
    PostsWriteRepo, RepoError,
};
use crate::domain::entities::{PostRecord, PostSummaryRecord};

use super::HostedRepositories;
use super::util::{
    check_table_response, decode_rows, decode_single, map_transport_error, response_total,
    url_error,
};

const TABLE: &str = "posts";
const SUMMARY_COLUMNS: &str = "id,title,summary,category_id,image_url,created_at,categories(name)";
const DETAIL_COLUMNS: &str =
    "id,title,summary,description,category_id,image_url,created_at,categories(name)";
const PREFER: &str = "Prefer";

#[derive(Debug, Deserialize)]
struct CategoryEmbed {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostRow {
    id: Uuid,
    title: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    category_id: Option<Uuid>,
    image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(default)]
    categories: Option<CategoryEmbed>,
}

impl PostRow {
    fn category_name(&mut self) -> Option<String> {
        self.categories.take().and_then(|embed| embed.name)
    }

    fn into_summary(mut self) -> PostSummaryRecord {
        let category_name = self.category_name();
        PostSummaryRecord {
            id: self.id,
            title: self.title,
            summary: self.summary.unwrap_or_default(),
            category_id: self.category_id,
            category_name,
            image_url: self.image_url,
            created_at: self.created_at,
        }
    }

    fn into_record(mut self) -> PostRecord {
        let category_name = self.category_name();
        PostRecord {
            id: self.id,
            title: self.title,
            summary: self.summary.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            category_id: self.category_id,
            category_name,
            image_url: self.image_url,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct InsertPost<'a> {
    title: &'a str,
    summary: &'a str,
    description: &'a str,
    category_id: Option<Uuid>,
    image_url: Option<&'a str>,
}

/// PATCH body; absent fields are left untouched by the data API.
#[derive(Debug, Default, Serialize)]
struct PatchPost {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    /// `Some(None)` serialises as `null` and clears the reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    category_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
}

impl From<PostChanges> for PatchPost {
    fn from(changes: PostChanges) -> Self {
        Self {
            title: changes.title,
            summary: changes.summary,
            description: changes.description,
            category_id: changes.category_id,
            image_url: changes.image_url,
        }
    }
}

/// Appends the category and search filters shared by list and count queries.
pub(crate) fn apply_filter(url: &mut Url, scope: PostListScope, filter: &PostQueryFilter) {
    let mut pairs = url.query_pairs_mut();
    if let Some(category_id) = filter.category.category_id() {
        pairs.append_pair("category_id", &format!("eq.{category_id}"));
    }
    if let Some(term) = filter.search.as_deref() {
        pairs.append_pair(
            scope.search_field().column(),
            &format!("ilike.*{}*", escape_like(term)),
        );
    }
}

/// Escapes characters the data API would treat as pattern syntax. `*` is the
/// URL form of `%`, so a literal asterisk becomes the one-character wildcard.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        match ch {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '*' => escaped.push('_'),
            _ => escaped.push(ch),
        }
    }
    escaped
}

impl HostedRepositories {
    fn post_url(&self, id: Uuid, columns: &str) -> Result<Url, RepoError> {
        let mut url = self.client.table(TABLE).map_err(url_error)?;
        url.query_pairs_mut()
            .append_pair("select", columns)
            .append_pair("id", &format!("eq.{id}"));
        Ok(url)
    }
}

#[async_trait]
impl PostsRepo for HostedRepositories {
    async fn list_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
        window: PageWindow,
    ) -> Result<PostListPage, RepoError> {
        let mut url = self.client.table(TABLE).map_err(url_error)?;
        url.query_pairs_mut()
            .append_pair("select", SUMMARY_COLUMNS)
            .append_pair("order", "created_at.desc");
        apply_filter(&mut url, scope, filter);
        url.query_pairs_mut()
            .append_pair("offset", &window.offset().to_string())
            .append_pair("limit", &window.size().get().to_string());

        let response = self
            .client
            .service()
            .get(url)
            .header(PREFER, "count=exact")
            .send()
            .await
            .map_err(map_transport_error)?;
        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            // Offsets at or past the total answer 416 rather than an empty list.
            let total = match response_total(&response) {
                Ok(total) => total,
                Err(_) => self.count_posts(scope, filter).await?,
            };
            debug!(
                target = "blogdeck::infra::backend::posts",
                scope = ?scope,
                page = window.page(),
                total,
                "requested page is past the end"
            );
            return Ok(PostListPage {
                items: Vec::new(),
                total,
            });
        }
        let response = check_table_response(response).await?;
        let total = response_total(&response)?;
        let rows: Vec<PostRow> = decode_rows(response).await?;

        debug!(
            target = "blogdeck::infra::backend::posts",
            scope = ?scope,
            page = window.page(),
            returned = rows.len(),
            total,
            "listed posts"
        );

        Ok(PostListPage {
            items: rows.into_iter().map(PostRow::into_summary).collect(),
            total,
        })
    }

    async fn count_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
    ) -> Result<u64, RepoError> {
        let mut url = self.client.table(TABLE).map_err(url_error)?;
        url.query_pairs_mut().append_pair("select", "id");
        apply_filter(&mut url, scope, filter);

        let response = self
            .client
            .service()
            .head(url)
            .header(PREFER, "count=exact")
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_table_response(response).await?;
        response_total(&response)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let url = self.post_url(id, DETAIL_COLUMNS)?;
        let response = self
            .client
            .service()
            .get(url)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_table_response(response).await?;
        let rows: Vec<PostRow> = decode_rows(response).await?;
        Ok(rows.into_iter().next().map(PostRow::into_record))
    }
}

#[async_trait]
impl PostsWriteRepo for HostedRepositories {
    async fn create_post(&self, params: NewPostParams) -> Result<PostRecord, RepoError> {
        let mut url = self.client.table(TABLE).map_err(url_error)?;
        url.query_pairs_mut().append_pair("select", DETAIL_COLUMNS);

        let body = InsertPost {
            title: &params.title,
            summary: &params.summary,
            description: &params.description,
            category_id: params.category_id,
            image_url: params.image_url.as_deref(),
        };
        let response = self
            .client
            .service()
            .post(url)
            .header(PREFER, "return=representation")
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_table_response(response).await?;
        decode_single::<PostRow>(response)
            .await
            .map(PostRow::into_record)
    }

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> Result<PostRecord, RepoError> {
        let url = self.post_url(id, DETAIL_COLUMNS)?;
        let response = self
            .client
            .service()
            .patch(url)
            .header(PREFER, "return=representation")
            .json(&PatchPost::from(changes))
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_table_response(response).await?;
        decode_single::<PostRow>(response)
            .await
            .map(PostRow::into_record)
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let url = self.post_url(id, "id")?;
        let response = self
            .client
            .service()
            .delete(url)
            .header(PREFER, "return=representation")
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_table_response(response).await?;
        decode_single::<serde_json::Value>(response).await.map(|_| ())
    }
}
