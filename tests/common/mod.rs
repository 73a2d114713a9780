#![allow(dead_code)]

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, header};
use serde_json::Value;
use time::OffsetDateTime;
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;

use blogdeck::application::admin::{
    AdminCategoryService, AdminDashboardService, AdminPostService,
};
use blogdeck::application::detail::PostDetailService;
use blogdeck::application::gateways::{
    AuthTokens, AuthUser, GatewayError, IdentityProvider, ImageStore, ImageUpload, Mailer,
    PkceChallenge, PostNotificationEmail, StoredImage,
};
use blogdeck::application::links::PostLinks;
use blogdeck::application::listing::ListingService;
use blogdeck::application::notifications::NotificationFanout;
use blogdeck::application::pagination::PageWindow;
use blogdeck::application::preferences::NotificationPreferenceService;
use blogdeck::application::render::ComrakRenderService;
use blogdeck::application::repos::{
    CategoriesRepo, CategoriesWriteRepo, NewPostParams, PostChanges, PostListPage, PostListScope,
    PostQueryFilter, PostsRepo, PostsWriteRepo, ProfilesRepo, ProfilesWriteRepo, RepoError,
};
use blogdeck::application::session::{SessionHub, SessionService};
use blogdeck::cache::QueryCaches;
use blogdeck::domain::entities::{CategoryRecord, PostRecord, ProfileRecord};
use blogdeck::domain::types::Role;
use blogdeck::infra::http::{HttpState, SiteOptions, build_router};

pub const PUBLIC_URL: &str = "https://blog.example.com/";

#[derive(Default)]
pub struct FakeBackend {
    posts: Mutex<Vec<PostRecord>>,
    categories: Mutex<Vec<CategoryRecord>>,
    profiles: Mutex<Vec<ProfileRecord>>,
    fail_post_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FakeBackend {
    pub fn add_category(&self, name: &str) -> CategoryRecord {
        let record = CategoryRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.categories.lock().expect("lock").push(record.clone());
        record
    }

    /// Seeds `count` posts, newest last in insertion order.
    pub fn add_posts(&self, count: usize, category: Option<&CategoryRecord>) -> Vec<PostRecord> {
        let base = OffsetDateTime::now_utc() - time::Duration::days(1);
        let mut posts = self.posts.lock().expect("lock");
        let offset = posts.len();
        (0..count)
            .map(|index| {
                let record = PostRecord {
                    id: Uuid::new_v4(),
                    title: format!("Post number {}", offset + index),
                    summary: format!("Summary for post {}", offset + index),
                    description: "Some **markdown** body for the post.\nSecond line.".into(),
                    category_id: category.map(|c| c.id),
                    category_name: category.map(|c| c.name.clone()),
                    image_url: None,
                    created_at: base + time::Duration::minutes((offset + index) as i64),
                };
                posts.push(record.clone());
                record
            })
            .collect()
    }

    pub fn add_profile(&self, email: &str, role: Role, muted: bool) -> ProfileRecord {
        let record = ProfileRecord {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            role,
            notifications_muted: muted,
        };
        self.profiles.lock().expect("lock").push(record.clone());
        record
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().expect("lock").len()
    }

    pub fn profile(&self, id: Uuid) -> Option<ProfileRecord> {
        self.profiles
            .lock()
            .expect("lock")
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn fail_post_reads(&self, fail: bool) {
        self.fail_post_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_post_read(&self) -> Result<(), RepoError> {
        if self.fail_post_reads.load(Ordering::SeqCst) {
            return Err(RepoError::Remote {
                status: 503,
                message: "upstream unavailable".into(),
            });
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), RepoError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::Remote {
                status: 400,
                message: "permission denied for table".into(),
            });
        }
        Ok(())
    }

    fn matching(&self, scope: PostListScope, filter: &PostQueryFilter) -> Vec<PostRecord> {
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut matches: Vec<PostRecord> = self
            .posts
            .lock()
            .expect("lock")
            .iter()
            .filter(|post| {
                filter
                    .category
                    .category_id()
                    .is_none_or(|id| post.category_id == Some(id))
            })
            .filter(|post| {
                needle.as_ref().is_none_or(|needle| {
                    let haystack = match scope {
                        PostListScope::Home => &post.summary,
                        PostListScope::Admin => &post.title,
                    };
                    haystack.to_lowercase().contains(needle.as_str())
                })
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matches
    }
}

#[async_trait]
impl PostsRepo for FakeBackend {
    async fn list_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
        window: PageWindow,
    ) -> Result<PostListPage, RepoError> {
        self.check_post_read()?;
        let all = self.matching(scope, filter);
        Ok(PostListPage {
            total: all.len() as u64,
            items: all
                .iter()
                .skip(window.offset() as usize)
                .take(window.size().get() as usize)
                .map(PostRecord::to_summary)
                .collect(),
        })
    }

    async fn count_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
    ) -> Result<u64, RepoError> {
        self.check_post_read()?;
        Ok(self.matching(scope, filter).len() as u64)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        self.check_post_read()?;
        Ok(self
            .posts
            .lock()
            .expect("lock")
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }
}

#[async_trait]
impl PostsWriteRepo for FakeBackend {
    async fn create_post(&self, params: NewPostParams) -> Result<PostRecord, RepoError> {
        self.check_write()?;
        let category_name = params.category_id.and_then(|id| {
            self.categories
                .lock()
                .expect("lock")
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
        self.posts.lock().expect("lock").push(record.clone());
        Ok(record)
    }

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> Result<PostRecord, RepoError> {
        self.check_write()?;
        let mut posts = self.posts.lock().expect("lock");
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
        let mut posts = self.posts.lock().expect("lock");
        let before = posts.len();
        posts.retain(|p| p.id != id);
        if posts.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl CategoriesRepo for FakeBackend {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let mut categories = self.categories.lock().expect("lock").clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}

#[async_trait]
impl CategoriesWriteRepo for FakeBackend {
    async fn create_category(&self, name: &str) -> Result<CategoryRecord, RepoError> {
        self.check_write()?;
        Ok(self.add_category(name))
    }
}

#[async_trait]
impl ProfilesRepo for FakeBackend {
    async fn find_profile(&self, id: Uuid) -> Result<Option<ProfileRecord>, RepoError> {
        Ok(self.profile(id))
    }

    async fn list_notification_recipients(&self) -> Result<Vec<ProfileRecord>, RepoError> {
        Ok(self
            .profiles
            .lock()
            .expect("lock")
            .iter()
            .filter(|p| !p.notifications_muted)
            .cloned()
            .collect())
    }

    async fn count_profiles(&self) -> Result<u64, RepoError> {
        Ok(self.profiles.lock().expect("lock").len() as u64)
    }
}

#[async_trait]
impl ProfilesWriteRepo for FakeBackend {
    async fn set_notifications_muted(
        &self,
        id: Uuid,
        muted: bool,
    ) -> Result<ProfileRecord, RepoError> {
        self.check_write()?;
        let mut profiles = self.profiles.lock().expect("lock");
        let profile = profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepoError::NotFound)?;
        profile.notifications_muted = muted;
        Ok(profile.clone())
    }
}

/// Identity provider that accepts any code registered with [`FakeIdentity::register`].
#[derive(Default)]
pub struct FakeIdentity {
    codes: Mutex<HashMap<String, AuthUser>>,
    tokens: Mutex<HashMap<String, AuthUser>>,
    refresh_tokens: Mutex<HashMap<String, AuthUser>>,
    pub refreshes: Mutex<Vec<String>>,
}

impl FakeIdentity {
    pub fn register(&self, code: &str, user: &ProfileRecord) {
        self.codes.lock().expect("lock").insert(
            code.to_string(),
            AuthUser {
                id: user.id,
                email: user.email.clone(),
            },
        );
    }

    pub fn active_tokens(&self) -> usize {
        self.tokens.lock().expect("lock").len()
    }

    /// Forgets every access token, as if they all ran out.
    pub fn expire_access_tokens(&self) {
        self.tokens.lock().expect("lock").clear();
    }

    pub fn revoke_refresh_tokens(&self) {
        self.refresh_tokens.lock().expect("lock").clear();
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    fn authorize_url(
        &self,
        redirect_to: &Url,
        challenge: &PkceChallenge,
    ) -> Result<Url, GatewayError> {
        let mut url = Url::parse("https://auth.example.com/authorize").expect("url");
        url.query_pairs_mut()
            .append_pair("redirect_to", redirect_to.as_str())
            .append_pair("code_challenge", &challenge.challenge);
        Ok(url)
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<AuthTokens, GatewayError> {
        assert!(!verifier.is_empty(), "verifier must round-trip");
        let user = self
            .codes
            .lock()
            .expect("lock")
            .get(code)
            .cloned()
            .ok_or(GatewayError::Remote {
                status: 400,
                message: "invalid flow state".into(),
            })?;
        let token = format!("token-{code}");
        let refresh_token = format!("refresh-{code}");
        self.tokens
            .lock()
            .expect("lock")
            .insert(token.clone(), user.clone());
        self.refresh_tokens
            .lock()
            .expect("lock")
            .insert(refresh_token.clone(), user.clone());
        Ok(AuthTokens {
            access_token: token,
            refresh_token: Some(refresh_token),
            expires_in: Some(3600),
            user,
        })
    }

    async fn current_user(&self, access_token: &str) -> Result<Option<AuthUser>, GatewayError> {
        Ok(self.tokens.lock().expect("lock").get(access_token).cloned())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Option<AuthTokens>, GatewayError> {
        self.refreshes
            .lock()
            .expect("lock")
            .push(refresh_token.to_string());
        let Some(user) = self.refresh_tokens.lock().expect("lock").remove(refresh_token) else {
            return Ok(None);
        };
        let token = format!("{refresh_token}-access");
        let rotated = format!("{refresh_token}-next");
        self.tokens
            .lock()
            .expect("lock")
            .insert(token.clone(), user.clone());
        self.refresh_tokens
            .lock()
            .expect("lock")
            .insert(rotated.clone(), user.clone());
        Ok(Some(AuthTokens {
            access_token: token,
            refresh_token: Some(rotated),
            expires_in: Some(3600),
            user,
        }))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), GatewayError> {
        self.tokens.lock().expect("lock").remove(access_token);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeImages {
    pub uploaded: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ImageStore for FakeImages {
    async fn upload_image(
        &self,
        object_name: &str,
        upload: ImageUpload,
    ) -> Result<StoredImage, GatewayError> {
        self.uploaded
            .lock()
            .expect("lock")
            .push((object_name.to_string(), upload.content_type));
        Ok(StoredImage {
            path: object_name.to_string(),
            public_url: format!("https://cdn.example.com/images/{object_name}"),
        })
    }
}

#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<PostNotificationEmail>>,
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send_post_notification(
        &self,
        message: &PostNotificationEmail,
    ) -> Result<(), GatewayError> {
        self.sent.lock().expect("lock").push(message.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub backend: Arc<FakeBackend>,
    pub identity: Arc<FakeIdentity>,
    pub images: Arc<FakeImages>,
    pub mailer: Arc<FakeMailer>,
    pub caches: Arc<QueryCaches>,
}

impl TestApp {
    pub fn new() -> Self {
        let backend = Arc::new(FakeBackend::default());
        let identity = Arc::new(FakeIdentity::default());
        let images = Arc::new(FakeImages::default());
        let mailer = Arc::new(FakeMailer::default());
        let caches = Arc::new(QueryCaches::default());
        let hub = SessionHub::default();
        let public_url = Url::parse(PUBLIC_URL).expect("url");
        let links = PostLinks::new(&public_url);

        let fanout = NotificationFanout::new(backend.clone(), mailer.clone());
        let posts = AdminPostService::new(
            backend.clone(),
            backend.clone(),
            images.clone(),
            caches.clone(),
            links.clone(),
            "posts",
        )
        .with_fanout(Some(fanout));

        let state = HttpState {
            sessions: Arc::new(SessionService::new(
                identity.clone(),
                backend.clone(),
                caches.clone(),
                hub.clone(),
            )),
            listing: ListingService::new(backend.clone(), caches.clone()),
            detail: Arc::new(PostDetailService::new(
                backend.clone(),
                caches.clone(),
                ComrakRenderService::shared(),
                links,
            )),
            posts: Arc::new(posts),
            categories: Arc::new(AdminCategoryService::new(
                backend.clone(),
                backend.clone(),
                caches.clone(),
            )),
            dashboard: Arc::new(AdminDashboardService::new(
                backend.clone(),
                backend.clone(),
                caches.clone(),
            )),
            preferences: Arc::new(NotificationPreferenceService::new(
                backend.clone(),
                caches.clone(),
                hub,
            )),
            site: SiteOptions {
                public_url,
                home_page_size: NonZeroU32::new(9).expect("non-zero"),
                admin_page_size: NonZeroU32::new(10).expect("non-zero"),
                search_debounce: std::time::Duration::from_millis(500),
                secure_cookies: false,
            },
        };

        Self {
            router: build_router(state),
            backend,
            identity,
            images,
            mailer,
            caches,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Runs the OAuth round trip and returns the session cookie.
    pub async fn sign_in(&self, user: &ProfileRecord) -> String {
        let code = format!("code-{}", user.id);
        self.identity.register(&code, user);

        let login = self
            .send(Request::get("/auth/login").body(Body::empty()).expect("request"))
            .await;
        assert_eq!(login.status(), 303, "login redirects to the provider");
        let pending = session_cookie(&login).expect("login sets the session cookie");

        let callback = self
            .send(
                Request::get(format!("/auth/callback?code={code}"))
                    .header(header::COOKIE, &pending)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await;
        assert_eq!(callback.status(), 303, "callback redirects home");
        session_cookie(&callback).unwrap_or(pending)
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::get(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request")).await
    }

    pub async fn send_json(
        &self,
        method: &str,
        path: &str,
        cookie: &str,
        body: Value,
    ) -> Response<Body> {
        self.send(
            Request::builder()
                .method(method)
                .uri(path)
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
    }

    pub async fn send_form(
        &self,
        method: &str,
        path: &str,
        cookie: &str,
        form: MultipartForm,
    ) -> Response<Body> {
        let (content_type, body) = form.finish();
        self.send(
            Request::builder()
                .method(method)
                .uri(path)
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .expect("request"),
        )
        .await
    }
}

pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("blogdeck_session="))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

const BOUNDARY: &str = "blogdeck-test-boundary";

#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        (
            format!("multipart/form-data; boundary={BOUNDARY}"),
            self.body,
        )
    }
}
