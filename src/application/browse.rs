//! Listing view-model: page, filter and search state with debounced search
//! and stale-while-revalidate results.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

use crate::application::listing::{ListingQuery, ListingService};
use crate::application::pagination::clamp_page;
use crate::application::repos::{PostListPage, RepoError};
use crate::application::toast::Toast;
use crate::domain::types::CategoryFilter;

/// What the caller should do after a fetch result was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchEffect {
    Settled,
    /// The requested page no longer exists; the page was clamped and must be fetched again.
    Refetch,
    /// The result belonged to an older request and was dropped.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingView {
    pub page: u32,
    pub category: String,
    pub search: String,
    pub loading: bool,
    pub result: Option<PostListPage>,
    pub toast: Option<Toast>,
}

#[derive(Debug, Clone)]
pub struct ListingState {
    query: ListingQuery,
    current: Option<PostListPage>,
    loading: bool,
    toast: Option<Toast>,
    generation: u64,
}

impl ListingState {
    pub fn new(query: ListingQuery) -> Self {
        Self {
            query,
            current: None,
            loading: false,
            toast: None,
            generation: 0,
        }
    }

    pub fn query(&self) -> &ListingQuery {
        &self.query
    }

    /// Applies a new search term; any change returns to the first page.
    pub fn set_search(&mut self, term: &str) -> bool {
        if self.query.search == term {
            return false;
        }
        self.query.search = term.to_string();
        self.query.page = 0;
        true
    }

    /// Applies a category filter; any change returns to the first page.
    pub fn set_category(&mut self, category: CategoryFilter) -> bool {
        if self.query.category == category {
            return false;
        }
        self.query.category = category;
        self.query.page = 0;
        true
    }

    pub fn set_page(&mut self, page: u32) -> bool {
        if self.query.page == page {
            return false;
        }
        self.query.page = page;
        true
    }

    /// Marks a request in flight; the previous result stays visible.
    pub fn begin_fetch(&mut self) -> (u64, ListingQuery) {
        self.generation += 1;
        self.loading = true;
        (self.generation, self.query.clone())
    }

    pub fn finish_fetch(
        &mut self,
        generation: u64,
        result: Result<PostListPage, RepoError>,
    ) -> FetchEffect {
        if generation != self.generation {
            return FetchEffect::Ignored;
        }
        self.loading = false;

        match result {
            Ok(page) => {
                let clamped = clamp_page(self.query.page, page.total, self.query.page_size);
                if page.items.is_empty() && clamped != self.query.page {
                    self.query.page = clamped;
                    return FetchEffect::Refetch;
                }
                self.current = Some(page);
                self.toast = None;
                FetchEffect::Settled
            }
            Err(err) => {
                self.toast = Some(Toast::error(err.to_string()));
                FetchEffect::Settled
            }
        }
    }

    pub fn view(&self) -> ListingView {
        ListingView {
            page: self.query.page,
            category: self.query.category.to_string(),
            search: self.query.search.clone(),
            loading: self.loading,
            result: self.current.clone(),
            toast: self.toast.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingEvent {
    SearchTyped(String),
    CategoryChosen(CategoryFilter),
    PageChosen(u32),
    Refresh,
}

/// Drives a [`ListingState`] from UI events on a background task.
pub struct ListingController {
    events: mpsc::UnboundedSender<ListingEvent>,
    view: watch::Receiver<ListingView>,
    task: JoinHandle<()>,
}

impl ListingController {
    pub fn spawn(service: ListingService, initial: ListingQuery, debounce: Duration) -> Self {
        let state = ListingState::new(initial);
        let (view_tx, view_rx) = watch::channel(state.view());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(service, state, debounce, events_rx, view_tx));
        Self {
            events: events_tx,
            view: view_rx,
            task,
        }
    }

    /// Returns false once the controller task has stopped.
    pub fn send(&self, event: ListingEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListingView> {
        self.view.clone()
    }

    pub fn view(&self) -> ListingView {
        self.view.borrow().clone()
    }

    pub async fn shutdown(self) {
        drop(self.events);
        let _ = self.task.await;
    }
}

async fn run(
    service: ListingService,
    mut state: ListingState,
    debounce: Duration,
    mut events: mpsc::UnboundedReceiver<ListingEvent>,
    view: watch::Sender<ListingView>,
) {
    let mut pending_search: Option<(String, Instant)> = None;
    refresh(&service, &mut state, &view).await;

    loop {
        let deadline = pending_search.as_ref().map(|(_, at)| *at);
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let changed = match event {
                    ListingEvent::SearchTyped(term) => {
                        pending_search = Some((term, Instant::now() + debounce));
                        false
                    }
                    ListingEvent::CategoryChosen(category) => state.set_category(category),
                    ListingEvent::PageChosen(page) => state.set_page(page),
                    ListingEvent::Refresh => true,
                };
                if changed {
                    refresh(&service, &mut state, &view).await;
                }
            }
            _ = wait_until(deadline) => {
                if let Some((term, _)) = pending_search.take() {
                    debug!(
                        target = "blogdeck::application::browse",
                        search = %term,
                        "debounced search settled"
                    );
                    if state.set_search(&term) {
                        refresh(&service, &mut state, &view).await;
                    }
                }
            }
        }
    }
}

async fn refresh(
    service: &ListingService,
    state: &mut ListingState,
    view: &watch::Sender<ListingView>,
) {
    loop {
        let (generation, query) = state.begin_fetch();
        view.send_replace(state.view());
        let result = service.fetch(&query).await;
        let effect = state.finish_fetch(generation, result);
        view.send_replace(state.view());
        if effect != FetchEffect::Refetch {
            break;
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
