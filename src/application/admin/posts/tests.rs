use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use bytes::Bytes;
use url::Url;
use uuid::Uuid;

use super::*;
use crate::application::gateways::ImageUpload;
use crate::application::links::PostLinks;
use crate::application::listing::ListingQuery;
use crate::application::notifications::NotificationFanout;
use crate::application::repos::{PostListScope, RepoError};
use crate::application::session::SessionSnapshot;
use crate::application::testing::{
    InMemoryBackend, RecordingImageStore, RecordingMailer, post, profile,
};
use crate::cache::{QueryCaches, QueryKey};
use crate::domain::posts::{UNCATEGORIZED_LABEL, category_label};
use crate::domain::types::Role;

struct Fixture {
    backend: Arc<InMemoryBackend>,
    images: Arc<RecordingImageStore>,
    mailer: Arc<RecordingMailer>,
    caches: Arc<QueryCaches>,
    service: AdminPostService,
}

fn fixture_with(images: RecordingImageStore) -> Fixture {
    let backend = Arc::new(InMemoryBackend::default());
    let images = Arc::new(images);
    let mailer = Arc::new(RecordingMailer::default());
    let caches = Arc::new(QueryCaches::default());
    let links = PostLinks::new(&Url::parse("https://blog.example.com").expect("url"));
    let fanout = NotificationFanout::new(backend.clone(), mailer.clone());
    let service = AdminPostService::new(
        backend.clone(),
        backend.clone(),
        images.clone(),
        caches.clone(),
        links,
        "posts",
    )
    .with_fanout(Some(fanout));
    Fixture {
        backend,
        images,
        mailer,
        caches,
        service,
    }
}

fn fixture() -> Fixture {
    fixture_with(RecordingImageStore::default())
}

fn admin() -> SessionSnapshot {
    SessionSnapshot {
        user_id: Uuid::new_v4(),
        email: Some("admin@example.com".into()),
        role: Role::Admin,
        notifications_muted: false,
    }
}

fn member() -> SessionSnapshot {
    SessionSnapshot {
        role: Role::Member,
        ..admin()
    }
}

fn valid_command() -> CreatePostCommand {
    CreatePostCommand {
        title: "Shipping the new editor".into(),
        summary: "What changed and why it matters".into(),
        description: "# Editor\n\nThe long form body of the post.".into(),
        category_id: None,
        image: None,
    }
}

fn image() -> ImageUpload {
    ImageUpload {
        file_name: "Cover.PNG".into(),
        content_type: "image/png".into(),
        bytes: Bytes::from_static(b"\x89PNG"),
    }
}

fn admin_query(page: u32) -> ListingQuery {
    ListingQuery {
        page,
        ..ListingQuery::first_page(PostListScope::Admin, NonZeroU32::new(10).expect("size"))
    }
}

#[tokio::test]
async fn create_inserts_one_post_and_notifies_subscribers() {
    let fx = fixture();
    fx.backend
        .insert_profile(profile("reader@example.com", Role::Member, false));
    fx.backend
        .insert_profile(profile("quiet@example.com", Role::Member, true));

    let created = fx
        .service
        .create_post(&admin(), valid_command())
        .await
        .expect("created");

    assert_eq!(fx.backend.post_count(), 1);
    assert_eq!(
        created.post_url,
        format!("https://blog.example.com/post/{}", created.post.id)
    );
    let report = created.notifications.expect("fan-out configured");
    assert_eq!(report.delivered, 1);
    let sent = fx.mailer.sent.lock().unwrap();
    assert_eq!(sent[0].to_email, "reader@example.com");
    assert_eq!(sent[0].title, "Shipping the new editor");
}

#[tokio::test]
async fn create_without_category_is_labelled_general() {
    let fx = fixture();

    let created = fx
        .service
        .create_post(&admin(), valid_command())
        .await
        .expect("created");

    assert_eq!(created.post.category_id, None);
    assert_eq!(
        category_label(created.post.category_name.as_deref()),
        UNCATEGORIZED_LABEL
    );
}

#[tokio::test]
async fn invalid_fields_are_reported_together_and_nothing_is_written() {
    let fx = fixture();
    let command = CreatePostCommand {
        title: "Hey".into(),
        summary: "".into(),
        ..valid_command()
    };

    let err = fx
        .service
        .create_post(&admin(), command)
        .await
        .expect_err("invalid");

    match err {
        AdminPostError::Validation(errors) => {
            assert_eq!(errors.get("title"), Some("Title must be at least 5 characters"));
            assert_eq!(errors.get("summary"), Some("Summary is required"));
            assert_eq!(errors.get("description"), None);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fx.backend.write_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upload_failure_creates_no_post() {
    let fx = fixture_with(RecordingImageStore {
        fail_with: Some("Payload too large".into()),
        ..RecordingImageStore::default()
    });
    fx.backend
        .insert_profile(profile("reader@example.com", Role::Member, false));
    let command = CreatePostCommand {
        image: Some(image()),
        ..valid_command()
    };

    let err = fx
        .service
        .create_post(&admin(), command)
        .await
        .expect_err("upload fails");

    assert!(matches!(err, AdminPostError::Upload(_)));
    assert_eq!(err.to_string(), "image upload failed: Payload too large");
    assert_eq!(fx.backend.post_count(), 0);
    assert!(fx.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn uploaded_image_address_is_stored_on_the_post() {
    let fx = fixture();
    let command = CreatePostCommand {
        image: Some(image()),
        ..valid_command()
    };

    let created = fx
        .service
        .create_post(&admin(), command)
        .await
        .expect("created");

    let uploaded = fx.images.uploaded.lock().unwrap().clone();
    assert_eq!(uploaded.len(), 1);
    assert!(uploaded[0].starts_with("posts/"));
    assert!(uploaded[0].ends_with(".png"));
    assert_eq!(
        created.post.image_url,
        Some(format!("https://cdn.example.com/images/{}", uploaded[0]))
    );
}

#[tokio::test]
async fn members_cannot_write() {
    let fx = fixture();

    let err = fx
        .service
        .create_post(&member(), valid_command())
        .await
        .expect_err("forbidden");

    assert!(matches!(err, AdminPostError::Forbidden(_)));
    assert_eq!(fx.backend.post_count(), 0);
}

#[tokio::test]
async fn insert_failure_surfaces_remote_message() {
    let fx = fixture();
    fx.backend.fail_writes("new row violates row-level security policy");

    let err = fx
        .service
        .create_post(&admin(), valid_command())
        .await
        .expect_err("insert fails");

    assert_eq!(err.to_string(), "new row violates row-level security policy");
}

#[tokio::test]
async fn create_invalidates_cached_listings() {
    let fx = fixture();
    let query = admin_query(0);
    let before = fx.service.list(&admin(), &query).await.expect("list");
    assert_eq!(before.total, 0);
    assert!(fx.caches.post_pages.is_fresh(&query.cache_key()));

    fx.service
        .create_post(&admin(), valid_command())
        .await
        .expect("created");

    assert!(!fx.caches.post_pages.is_fresh(&query.cache_key()));
    let after = fx.service.list(&admin(), &query).await.expect("list");
    assert_eq!(after.total, 1);
}

#[tokio::test]
async fn update_applies_only_supplied_fields() {
    let fx = fixture();
    let existing = fx
        .backend
        .insert_post(post("Original title", "Original summary", None));
    fx.service
        .load_post(&admin(), existing.id)
        .await
        .expect("load");

    let updated = fx
        .service
        .update_post(
            &admin(),
            UpdatePostCommand {
                id: existing.id,
                title: Some("Renamed title".into()),
                ..UpdatePostCommand::default()
            },
        )
        .await
        .expect("updated");

    assert_eq!(updated.title, "Renamed title");
    assert_eq!(updated.summary, "Original summary");
    assert!(!fx.caches.posts.is_fresh(&QueryKey::Post(existing.id)));
}

#[tokio::test]
async fn update_without_changes_is_rejected() {
    let fx = fixture();
    let existing = fx.backend.insert_post(post("Original title", "Summary text", None));

    let err = fx
        .service
        .update_post(
            &admin(),
            UpdatePostCommand {
                id: existing.id,
                ..UpdatePostCommand::default()
            },
        )
        .await
        .expect_err("empty update");

    assert!(matches!(err, AdminPostError::NothingToUpdate));
}

#[tokio::test]
async fn delete_requires_confirmation() {
    let fx = fixture();
    let existing = fx.backend.insert_post(post("Doomed post", "Summary text", None));

    let err = fx
        .service
        .delete_post(
            &admin(),
            DeletePostCommand {
                id: existing.id,
                confirmed: false,
                listing: None,
            },
        )
        .await
        .expect_err("unconfirmed");

    assert!(matches!(err, AdminPostError::ConfirmationRequired));
    assert_eq!(fx.backend.post_count(), 1);
}

#[tokio::test]
async fn deleting_last_item_on_trailing_page_steps_back() {
    let fx = fixture();
    let mut last = None;
    for i in 0..11 {
        last = Some(fx.backend.insert_post(post(&format!("Post number {i}"), "Summary text", None)));
    }
    // Oldest post sits alone on page 1 with a page size of 10.
    let oldest = fx
        .service
        .list(&admin(), &admin_query(1))
        .await
        .expect("list")
        .items[0]
        .id;
    assert_ne!(Some(oldest), last.map(|p| p.id));

    let deleted = fx
        .service
        .delete_post(
            &admin(),
            DeletePostCommand {
                id: oldest,
                confirmed: true,
                listing: Some(admin_query(1)),
            },
        )
        .await
        .expect("deleted");

    assert_eq!(deleted.landing_page, Some(0));
    assert_eq!(fx.backend.post_count(), 10);
}

#[tokio::test]
async fn deleting_missing_post_reports_not_found() {
    let fx = fixture();

    let err = fx
        .service
        .delete_post(
            &admin(),
            DeletePostCommand {
                id: Uuid::new_v4(),
                confirmed: true,
                listing: None,
            },
        )
        .await
        .expect_err("missing");

    assert!(matches!(err, AdminPostError::Repo(RepoError::NotFound)));
}
