use url::Url;
use uuid::Uuid;

/// Builds shareable addresses for reader-facing pages.
#[derive(Debug, Clone)]
pub struct PostLinks {
    base: String,
}

impl PostLinks {
    pub fn new(public_url: &Url) -> Self {
        let mut base = public_url.as_str().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self { base }
    }

    pub fn post_url(&self, id: Uuid) -> String {
        format!("{}post/{id}", self.base)
    }

    pub fn home_url(&self) -> &str {
        &self.base
    }
}
