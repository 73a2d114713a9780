use uuid::Uuid;

use crate::application::listing::ListingQuery;
use crate::application::repos::{PostListPage, PostListScope};
use crate::application::session::SessionSnapshot;
use crate::cache::QueryKey;
use crate::domain::entities::PostRecord;

use super::service::AdminPostService;
use super::types::AdminPostError;

impl AdminPostService {
    /// Admin table listing; searches titles rather than summaries.
    pub async fn list(
        &self,
        actor: &SessionSnapshot,
        query: &ListingQuery,
    ) -> Result<PostListPage, AdminPostError> {
        actor.require_admin()?;
        let query = ListingQuery {
            scope: PostListScope::Admin,
            ..query.clone()
        };
        self.listing
            .fetch(&query)
            .await
            .map_err(AdminPostError::from)
    }

    pub async fn load_post(
        &self,
        actor: &SessionSnapshot,
        id: Uuid,
    ) -> Result<Option<PostRecord>, AdminPostError> {
        actor.require_admin()?;
        let reader = self.reader.clone();
        self.caches
            .posts
            .get_or_fetch(QueryKey::Post(id), move || async move {
                reader.find_by_id(id).await
            })
            .await
            .map_err(AdminPostError::from)
    }
}
