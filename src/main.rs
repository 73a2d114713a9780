use std::{future::IntoFuture, process, sync::Arc};

use blogdeck::{
    application::{
        admin::{AdminCategoryService, AdminDashboardService, AdminPostService},
        detail::PostDetailService,
        error::AppError,
        links::PostLinks,
        listing::ListingService,
        notifications::NotificationFanout,
        preferences::NotificationPreferenceService,
        render::ComrakRenderService,
        session::{SessionHub, SessionService},
    },
    cache::{CacheConfig, QueryCaches},
    config,
    infra::{
        backend::{BackendClient, HostedIdentityProvider, HostedImageStore, HostedRepositories},
        error::InfraError,
        http::{self, HttpState, SiteOptions},
        mailer::EmailJsMailer,
        telemetry,
    },
};
use tokio::{signal, sync::watch};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

struct ApplicationContext {
    http_state: HttpState,
    caches: Arc<QueryCaches>,
    hub: SessionHub,
}

fn build_application_context(settings: &config::Settings) -> Result<ApplicationContext, AppError> {
    let client = BackendClient::new(&settings.backend)?;
    let repositories = Arc::new(HostedRepositories::new(client.clone()));
    let images = Arc::new(HostedImageStore::new(
        client.clone(),
        settings.storage.bucket.clone(),
    ));
    let identity = Arc::new(HostedIdentityProvider::new(
        client,
        settings.auth.provider.clone(),
    ));

    let caches = Arc::new(QueryCaches::new(&CacheConfig::from(&settings.cache)));
    let hub = SessionHub::default();
    let links = PostLinks::new(&settings.site.public_url);

    let fanout = match settings.mail.as_ref() {
        Some(mail) => {
            let mailer = EmailJsMailer::new(mail, settings.backend.request_timeout)?;
            Some(NotificationFanout::new(repositories.clone(), Arc::new(mailer)))
        }
        None => {
            warn!(
                target = "blogdeck::bootstrap",
                "mail relay not configured; new posts will not notify subscribers"
            );
            None
        }
    };

    let listing = ListingService::new(repositories.clone(), caches.clone());
    let posts = AdminPostService::new(
        repositories.clone(),
        repositories.clone(),
        images,
        caches.clone(),
        links.clone(),
        settings.storage.prefix.clone(),
    )
    .with_fanout(fanout);
    let detail = PostDetailService::new(
        repositories.clone(),
        caches.clone(),
        ComrakRenderService::shared(),
        links,
    );
    let categories =
        AdminCategoryService::new(repositories.clone(), repositories.clone(), caches.clone());
    let dashboard =
        AdminDashboardService::new(repositories.clone(), repositories.clone(), caches.clone());
    let preferences =
        NotificationPreferenceService::new(repositories.clone(), caches.clone(), hub.clone());
    let sessions = SessionService::new(identity, repositories, caches.clone(), hub.clone());

    let http_state = HttpState {
        sessions: Arc::new(sessions),
        listing,
        detail: Arc::new(detail),
        posts: Arc::new(posts),
        categories: Arc::new(categories),
        dashboard: Arc::new(dashboard),
        preferences: Arc::new(preferences),
        site: SiteOptions {
            public_url: settings.site.public_url.clone(),
            home_page_size: settings.site.home_page_size,
            admin_page_size: settings.site.admin_page_size,
            search_debounce: settings.site.search_debounce,
            secure_cookies: settings.site.secure_cookies,
        },
    };

    Ok(ApplicationContext {
        http_state,
        caches,
        hub,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings)?;
    let session_follower = app.caches.follow_sessions(&app.hub);

    let router = http::build_router(app.http_state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "blogdeck::bootstrap",
        addr = %settings.server.addr,
        public_url = %settings.site.public_url,
        cache_enabled = settings.cache.enabled,
        "blogdeck listening"
    );

    let grace = settings.server.graceful_shutdown;
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            let _ = stop_tx.send(true);
        },
    );
    // Open connections get `grace` to drain once the signal arrives.
    let drain_deadline = async move {
        if stop_rx.wait_for(|stopped| *stopped).await.is_ok() {
            tokio::time::sleep(grace).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    let result = tokio::select! {
        result = server.into_future() => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))
        }
        _ = drain_deadline => {
            warn!(
                target = "blogdeck::bootstrap",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    };

    session_follower.abort();
    info!(target = "blogdeck::bootstrap", "blogdeck stopped");
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(target = "blogdeck::bootstrap", error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(target = "blogdeck::bootstrap", error = %err, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(target = "blogdeck::bootstrap", "shutdown signal received");
}
