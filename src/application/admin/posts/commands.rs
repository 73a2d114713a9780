use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::gateways::{ImageUpload, StoredImage};
use crate::application::pagination::page_after_removal;
use crate::application::repos::{NewPostParams, PostChanges};
use crate::application::session::SessionSnapshot;
use crate::cache::QueryGroup;
use crate::domain::entities::PostRecord;
use crate::domain::error::FieldErrors;
use crate::domain::posts::{
    check_description, check_new_post, check_summary, check_title, image_object_name,
};

use super::service::AdminPostService;
use super::types::{
    AdminPostError, CreatePostCommand, CreatedPost, DeletePostCommand, DeletedPost,
    UpdatePostCommand,
};

const TARGET: &str = "blogdeck::application::admin::posts";

impl AdminPostService {
    /// Validates, uploads the optional image, inserts the row and then notifies
    /// subscribers. Nothing is inserted when validation or the upload fails.
    pub async fn create_post(
        &self,
        actor: &SessionSnapshot,
        command: CreatePostCommand,
    ) -> Result<CreatedPost, AdminPostError> {
        actor.require_admin()?;

        let errors = check_new_post(&command.title, &command.summary, &command.description);
        if !errors.is_empty() {
            return Err(AdminPostError::Validation(errors));
        }

        let image = match command.image {
            Some(upload) => Some(self.store_image(upload).await?),
            None => None,
        };

        let params = NewPostParams {
            title: command.title.trim().to_string(),
            summary: command.summary.trim().to_string(),
            description: command.description,
            category_id: command.category_id,
            image_url: image.as_ref().map(|stored| stored.public_url.clone()),
        };

        let post = match self.writer.create_post(params).await {
            Ok(post) => post,
            Err(err) => {
                log_orphaned_image(image.as_ref());
                return Err(err.into());
            }
        };

        self.caches
            .invalidate(&[QueryGroup::Posts, QueryGroup::Stats]);

        let post_url = self.links.post_url(post.id);
        let notifications = match &self.fanout {
            Some(fanout) => Some(fanout.announce(&post.title, &post_url).await),
            None => None,
        };

        info!(
            target = TARGET,
            post_id = %post.id,
            actor = %actor.user_id,
            has_image = post.image_url.is_some(),
            "post created"
        );

        Ok(CreatedPost {
            post,
            post_url,
            notifications,
        })
    }

    pub async fn update_post(
        &self,
        actor: &SessionSnapshot,
        command: UpdatePostCommand,
    ) -> Result<PostRecord, AdminPostError> {
        actor.require_admin()?;

        let mut errors = FieldErrors::new();
        if let Some(title) = &command.title {
            check_title(title, &mut errors);
        }
        if let Some(summary) = &command.summary {
            check_summary(summary, &mut errors);
        }
        if let Some(description) = &command.description {
            check_description(description, &mut errors);
        }
        if !errors.is_empty() {
            return Err(AdminPostError::Validation(errors));
        }

        let mut changes = PostChanges {
            title: command.title.map(|title| title.trim().to_string()),
            summary: command.summary.map(|summary| summary.trim().to_string()),
            description: command.description,
            category_id: command.category_id,
            image_url: None,
        };
        if changes.is_empty() && command.image.is_none() {
            return Err(AdminPostError::NothingToUpdate);
        }

        let image = match command.image {
            Some(upload) => Some(self.store_image(upload).await?),
            None => None,
        };
        changes.image_url = image.as_ref().map(|stored| stored.public_url.clone());

        let post = match self.writer.update_post(command.id, changes).await {
            Ok(post) => post,
            Err(err) => {
                log_orphaned_image(image.as_ref());
                return Err(err.into());
            }
        };

        self.caches.invalidate(&[QueryGroup::Posts]);
        info!(
            target = TARGET,
            post_id = %post.id,
            actor = %actor.user_id,
            "post updated"
        );
        Ok(post)
    }

    /// Removes a post after explicit confirmation and reports which listing page
    /// the admin should land on.
    pub async fn delete_post(
        &self,
        actor: &SessionSnapshot,
        command: DeletePostCommand,
    ) -> Result<DeletedPost, AdminPostError> {
        actor.require_admin()?;
        if !command.confirmed {
            return Err(AdminPostError::ConfirmationRequired);
        }

        self.writer.delete_post(command.id).await?;
        self.caches
            .invalidate(&[QueryGroup::Posts, QueryGroup::Stats]);

        let landing_page = match &command.listing {
            Some(query) => match self.listing.count(query).await {
                Ok(remaining) => Some(page_after_removal(query.page, remaining, query.page_size)),
                Err(err) => {
                    warn!(
                        target = TARGET,
                        post_id = %command.id,
                        error = %err,
                        "could not recount posts after delete"
                    );
                    Some(query.page)
                }
            },
            None => None,
        };

        info!(
            target = TARGET,
            post_id = %command.id,
            actor = %actor.user_id,
            "post deleted"
        );

        Ok(DeletedPost {
            id: command.id,
            landing_page,
        })
    }

    async fn store_image(&self, upload: ImageUpload) -> Result<StoredImage, AdminPostError> {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let object_name = image_object_name(&self.image_prefix, &upload.file_name, millis);
        self.images
            .upload_image(&object_name, upload)
            .await
            .map_err(AdminPostError::Upload)
    }
}

fn log_orphaned_image(image: Option<&StoredImage>) {
    if let Some(image) = image {
        warn!(
            target = TARGET,
            path = %image.path,
            "post write failed after image upload; blob left in storage"
        );
    }
}
