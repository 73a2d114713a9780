use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::application::admin::{AdminCategoryService, AdminDashboardService, AdminPostService};
use crate::application::detail::PostDetailService;
use crate::application::listing::ListingService;
use crate::application::preferences::NotificationPreferenceService;
use crate::application::session::SessionService;

/// Request-independent settings the handlers need.
#[derive(Clone, Debug)]
pub struct SiteOptions {
    pub public_url: Url,
    pub home_page_size: NonZeroU32,
    pub admin_page_size: NonZeroU32,
    /// Quiet period the browser waits after the last keystroke before searching.
    pub search_debounce: Duration,
    pub secure_cookies: bool,
}

impl SiteOptions {
    /// Address the identity provider sends the browser back to.
    pub fn callback_url(&self) -> Result<Url, url::ParseError> {
        let base = self.public_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/auth/callback"))
    }

    pub fn search_debounce_ms(&self) -> u64 {
        u64::try_from(self.search_debounce.as_millis()).unwrap_or(u64::MAX)
    }
}

#[derive(Clone)]
pub struct HttpState {
    pub sessions: Arc<SessionService>,
    pub listing: ListingService,
    pub detail: Arc<PostDetailService>,
    pub posts: Arc<AdminPostService>,
    pub categories: Arc<AdminCategoryService>,
    pub dashboard: Arc<AdminDashboardService>,
    pub preferences: Arc<NotificationPreferenceService>,
    pub site: SiteOptions,
}
