//! In-memory adapters shared by application tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::gateways::{
    GatewayError, ImageStore, ImageUpload, Mailer, PostNotificationEmail, StoredImage,
};
use crate::application::pagination::PageWindow;
use crate::application::repos::{
    CategoriesRepo, CategoriesWriteRepo, NewPostParams, PostChanges, PostListPage,
    PostListScope, PostQueryFilter, PostsRepo, PostsWriteRepo, ProfilesRepo, ProfilesWriteRepo,
    RepoError,
};
use crate::domain::entities::{CategoryRecord, PostRecord, ProfileRecord};
use crate::domain::types::Role;

pub(crate) fn post(title: &str, summary: &str, category: Option<&CategoryRecord>) -> PostRecord {
    PostRecord {
        id: Uuid::new_v4(),
        title: title.to_string(),
        summary: summary.to_string(),
        description: "A markdown body that is long enough.".to_string(),
        category_id: category.map(|c| c.id),
        category_name: category.map(|c| c.name.clone()),
        image_url: None,
        created_at: OffsetDateTime::now_utc(),
    }
}

pub(crate) fn profile(email: &str, role: Role, muted: bool) -> ProfileRecord {
    ProfileRecord {
        id: Uuid::new_v4(),
        email: Some(email.to_string()),
        role,
        notifications_muted: muted,
    }
}

#[derive(Default)]
pub(crate) struct InMemoryBackend {
    posts: Mutex<Vec<PostRecord>>,
    categories: Mutex<Vec<CategoryRecord>>,
    profiles: Mutex<Vec<ProfileRecord>>,
    read_failure: Mutex<Option<String>>,
    write_failure: Mutex<Option<String>>,
    pub(crate) list_calls: AtomicUsize,
    pub(crate) write_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub(crate) fn insert_post(&self, mut record: PostRecord) -> PostRecord {
        let mut posts = self.posts.lock().unwrap();
        // Newer inserts sort first, like `created_at desc`.
        if let Some(latest) = posts.iter().map(|p| p.created_at).max()
            && record.created_at <= latest
        {
            record.created_at = latest + time::Duration::seconds(1);
        }
        posts.push(record.clone());
        record
    }

    pub(crate) fn insert_category(&self, name: &str) -> CategoryRecord {
        let record = CategoryRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.categories.lock().unwrap().push(record.clone());
        record
    }

    pub(crate) fn insert_profile(&self, record: ProfileRecord) -> ProfileRecord {
        self.profiles.lock().unwrap().push(record.clone());
        record
    }

    pub(crate) fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    pub(crate) fn find_post(&self, id: Uuid) -> Option<PostRecord> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub(crate) fn find_profile_now(&self, id: Uuid) -> Option<ProfileRecord> {
        self.profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub(crate) fn fail_reads(&self, message: &str) {
        *self.read_failure.lock().unwrap() = Some(message.to_string());
    }

    pub(crate) fn fail_writes(&self, message: &str) {
        *self.write_failure.lock().unwrap() = Some(message.to_string());
    }

    fn check_read(&self) -> Result<(), RepoError> {
        match self.read_failure.lock().unwrap().clone() {
            Some(message) => Err(RepoError::Remote {
                status: 500,
                message,
            }),
            None => Ok(()),
        }
    }

    fn check_write(&self) -> Result<(), RepoError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        match self.write_failure.lock().unwrap().clone() {
            Some(message) => Err(RepoError::Remote {
                status: 400,
                message,
            }),
            None => Ok(()),
        }
    }

    fn matching(&self, scope: PostListScope, filter: &PostQueryFilter) -> Vec<PostRecord> {
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut matches: Vec<PostRecord> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|post| match filter.category.category_id() {
                Some(id) => post.category_id == Some(id),
                None => true,
            })
            .filter(|post| match &needle {
                Some(needle) => {
                    let haystack = match scope {
                        PostListScope::Home => &post.summary,
                        PostListScope::Admin => &post.title,
                    };
                    haystack.to_lowercase().contains(needle.as_str())
                }
                None => true,
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matches
    }
}

#[async_trait]
impl PostsRepo for InMemoryBackend {
    async fn list_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
        window: PageWindow,
    ) -> Result<PostListPage, RepoError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_read()?;
        let all = self.matching(scope, filter);
        let total = all.len() as u64;
        let items = all
            .iter()
            .skip(window.offset() as usize)
            .take(window.size().get() as usize)
            .map(PostRecord::to_summary)
            .collect();
        Ok(PostListPage { items, total })
    }

    async fn count_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
    ) -> Result<u64, RepoError> {
        self.check_read()?;
        Ok(self.matching(scope, filter).len() as u64)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        self.check_read()?;
        Ok(self.find_post(id))
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryBackend {
    async fn create_post(&self, params: NewPostParams) -> Result<PostRecord, RepoError> {
        self.check_write()?;
        let category_name = params.category_id.and_then(|id| {
            self.categories
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.id == id)
                .map(|c| c.name.clone())
        });
        let record = PostRecord {
            id: Uuid::new_v4(),
            title: params.title,
            summary: params.summary,
            description: params.description,
            category_id: params.category_id,
            category_name,
            image_url: params.image_url,
            created_at: OffsetDateTime::now_utc(),
        };
        Ok(self.insert_post(record))
    }

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> Result<PostRecord, RepoError> {
        self.check_write()?;
        let mut posts = self.posts.lock().unwrap();
        let post = posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(summary) = changes.summary {
            post.summary = summary;
        }
        if let Some(description) = changes.description {
            post.description = description;
        }
        if let Some(category_id) = changes.category_id {
            post.category_id = category_id;
            post.category_name = None;
        }
        if let Some(image_url) = changes.image_url {
            post.image_url = Some(image_url);
        }
        Ok(post.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        self.check_write()?;
        let mut posts = self.posts.lock().unwrap();
        let before = posts.len();
        posts.retain(|p| p.id != id);
        if posts.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl CategoriesRepo for InMemoryBackend {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        self.check_read()?;
        let mut categories = self.categories.lock().unwrap().clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}

#[async_trait]
impl CategoriesWriteRepo for InMemoryBackend {
    async fn create_category(&self, name: &str) -> Result<CategoryRecord, RepoError> {
        self.check_write()?;
        Ok(self.insert_category(name))
    }
}

#[async_trait]
impl ProfilesRepo for InMemoryBackend {
    async fn find_profile(&self, id: Uuid) -> Result<Option<ProfileRecord>, RepoError> {
        self.check_read()?;
        Ok(self.find_profile_now(id))
    }

    async fn list_notification_recipients(&self) -> Result<Vec<ProfileRecord>, RepoError> {
        self.check_read()?;
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .filter(|p| !p.notifications_muted)
            .cloned()
            .collect())
    }

    async fn count_profiles(&self) -> Result<u64, RepoError> {
        self.check_read()?;
        Ok(self.profiles.lock().unwrap().len() as u64)
    }
}

#[async_trait]
impl ProfilesWriteRepo for InMemoryBackend {
    async fn set_notifications_muted(
        &self,
        id: Uuid,
        muted: bool,
    ) -> Result<ProfileRecord, RepoError> {
        self.check_write()?;
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepoError::NotFound)?;
        profile.notifications_muted = muted;
        Ok(profile.clone())
    }
}

#[derive(Default)]
pub(crate) struct RecordingImageStore {
    pub(crate) fail_with: Option<String>,
    pub(crate) uploaded: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageStore for RecordingImageStore {
    async fn upload_image(
        &self,
        object_name: &str,
        _upload: ImageUpload,
    ) -> Result<StoredImage, GatewayError> {
        if let Some(message) = &self.fail_with {
            return Err(GatewayError::Remote {
                status: 413,
                message: message.clone(),
            });
        }
        self.uploaded.lock().unwrap().push(object_name.to_string());
        Ok(StoredImage {
            path: object_name.to_string(),
            public_url: format!("https://cdn.example.com/images/{object_name}"),
        })
    }
}

#[derive(Default)]
pub(crate) struct RecordingMailer {
    pub(crate) failing: HashSet<String>,
    pub(crate) sent: Mutex<Vec<PostNotificationEmail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_post_notification(
        &self,
        message: &PostNotificationEmail,
    ) -> Result<(), GatewayError> {
        if self.failing.contains(&message.to_email) {
            return Err(GatewayError::Remote {
                status: 422,
                message: "mailbox unavailable".into(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
