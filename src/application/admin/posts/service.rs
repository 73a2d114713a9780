use std::sync::Arc;

use crate::application::gateways::ImageStore;
use crate::application::links::PostLinks;
use crate::application::listing::ListingService;
use crate::application::notifications::NotificationFanout;
use crate::application::repos::{PostsRepo, PostsWriteRepo};
use crate::cache::QueryCaches;

#[derive(Clone)]
pub struct AdminPostService {
    pub(crate) reader: Arc<dyn PostsRepo>,
    pub(crate) writer: Arc<dyn PostsWriteRepo>,
    pub(crate) images: Arc<dyn ImageStore>,
    pub(crate) listing: ListingService,
    pub(crate) caches: Arc<QueryCaches>,
    pub(crate) links: PostLinks,
    pub(crate) image_prefix: String,
    pub(crate) fanout: Option<NotificationFanout>,
}

impl AdminPostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        images: Arc<dyn ImageStore>,
        caches: Arc<QueryCaches>,
        links: PostLinks,
        image_prefix: impl Into<String>,
    ) -> Self {
        let listing = ListingService::new(Arc::clone(&reader), Arc::clone(&caches));
        Self {
            reader,
            writer,
            images,
            listing,
            caches,
            links,
            image_prefix: image_prefix.into(),
            fanout: None,
        }
    }

    pub fn with_fanout(mut self, fanout: Option<NotificationFanout>) -> Self {
        self.fanout = fanout;
        self
    }
}
