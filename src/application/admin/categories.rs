use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CategoriesRepo, CategoriesWriteRepo, RepoError};
use crate::application::session::{AdminRequired, SessionSnapshot};
use crate::cache::{QueryCaches, QueryGroup, QueryKey};
use crate::domain::categories::check_name;
use crate::domain::entities::CategoryRecord;
use crate::domain::error::FieldErrors;

#[derive(Debug, Error)]
pub enum AdminCategoryError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
    #[error(transparent)]
    Forbidden(#[from] AdminRequired),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct AdminCategoryService {
    reader: Arc<dyn CategoriesRepo>,
    writer: Arc<dyn CategoriesWriteRepo>,
    caches: Arc<QueryCaches>,
}

impl AdminCategoryService {
    pub fn new(
        reader: Arc<dyn CategoriesRepo>,
        writer: Arc<dyn CategoriesWriteRepo>,
        caches: Arc<QueryCaches>,
    ) -> Self {
        Self {
            reader,
            writer,
            caches,
        }
    }

    /// All categories ordered by name. Readers use this for the filter control.
    pub async fn list(&self) -> Result<Vec<CategoryRecord>, AdminCategoryError> {
        let reader = Arc::clone(&self.reader);
        self.caches
            .categories
            .get_or_fetch(QueryKey::Categories, move || async move {
                reader.list_categories().await
            })
            .await
            .map_err(AdminCategoryError::from)
    }

    pub async fn create(
        &self,
        actor: &SessionSnapshot,
        name: &str,
    ) -> Result<CategoryRecord, AdminCategoryError> {
        actor.require_admin()?;

        let errors = check_name(name);
        if !errors.is_empty() {
            return Err(AdminCategoryError::Validation(errors));
        }

        let category = self.writer.create_category(name.trim()).await?;
        self.caches.invalidate(&[QueryGroup::Categories]);
        info!(
            target = "blogdeck::application::admin::categories",
            category_id = %category.id,
            name = %category.name,
            "category created"
        );
        Ok(category)
    }
}
