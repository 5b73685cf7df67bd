use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::mpsc,
    thread,
};

use anyhow::{Context, Result, anyhow};
use axum::{
    Router,
    response::Html,
    routing::get,
};
use tokio::{net::TcpListener, sync::oneshot};
use tower_http::services::ServeDir;
use tracing::{debug, warn};

use crate::config::CampaignSettings;
use crate::logbook::Logbook;
use crate::pages::{self, VideoSource};

/// Serves the fixed workload pages for the duration of a campaign. The
/// server owns a background thread with its own runtime; it is stopped
/// explicitly at campaign end and force-stopped on drop, so no exit path
/// leaves the port bound.
pub struct ContentServer {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
    port: u16,
}

impl ContentServer {
    /// Bind and start serving. Bind failures surface here, before any
    /// browser is launched.
    pub fn start(settings: &CampaignSettings, logbook: &Logbook) -> Result<ContentServer> {
        let media_dir = settings.resolve_media_dir()?;
        let mut sources = Vec::new();
        for file_name in &settings.video_files {
            if media_dir.join(file_name).exists() {
                sources.push(VideoSource::from_file_name(file_name));
            } else {
                logbook.record(format!(
                    "Warning: Video file not found: {}",
                    media_dir.join(file_name).display()
                ));
            }
        }

        let video_html = pages::video_page(&sources, settings.autoplay_retries);
        let router = build_router(video_html, media_dir);
        let addr = SocketAddr::from(([127, 0, 0, 1], settings.server_port));

        logbook.record(format!("Starting HTTP server at port {}", settings.server_port));

        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    let _ = ready_tx.send(Err(anyhow!(err).context("content server runtime")));
                    return;
                }
            };
            runtime.block_on(async move {
                let listener = match TcpListener::bind(addr).await {
                    Ok(listener) => listener,
                    Err(err) => {
                        let _ = ready_tx.send(Err(
                            anyhow!(err).context(format!("failed to bind content server at {addr}"))
                        ));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                debug!(listener = %addr, "content server listening");
                let serve = axum::serve(listener, router.into_make_service())
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    });
                if let Err(err) = serve.await {
                    warn!(error = %err, "content server terminated unexpectedly");
                }
            });
        });

        ready_rx
            .recv()
            .context("content server thread exited before signalling readiness")??;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
            port: settings.server_port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop serving and wait for the background thread to finish.
    pub fn stop(mut self) {
        self.shutdown_now();
    }

    fn shutdown_now(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ContentServer {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}

pub(crate) fn build_router(video_html: String, media_dir: PathBuf) -> Router {
    Router::new()
        .route(
            "/video.html",
            get(move || {
                let page = video_html.clone();
                async move { Html(page) }
            }),
        )
        .route("/animation.html", get(|| async { Html(pages::ANIMATION_HTML) }))
        .route(
            "/jscomputation.html",
            get(|| async { Html(pages::JS_COMPUTATION_HTML) }),
        )
        .route("/index.html", get(|| async { Html(pages::INDEX_HTML) }))
        .route("/", get(|| async { Html(pages::INDEX_HTML) }))
        .nest_service("/media", ServeDir::new(media_dir))
}
