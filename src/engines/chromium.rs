use super::{resolve_browser, BrowserSession, ConvertEngine};
use crate::config::{ConversionRequest, ConvertOptions, PAGE_MARGIN_INCHES};
use crate::error::{AppError, Result};
use crate::output::PdfSink;
use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::io::{CloseParams, ReadParams, StreamHandle};
use chromiumoxide::cdp::browser_protocol::network::LoaderId;
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, FrameId, NavigateParams, PrintToPdfParams, PrintToPdfTransferMode,
    SetLifecycleEventsEnabledParams,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Bytes requested per `IO.read` call while streaming the PDF.
const READ_CHUNK_SIZE: i64 = 256 * 1024;

/// Converts HTML to PDF through a headless Chromium driven over CDP.
pub struct ChromiumEngine;

impl ChromiumEngine {
    pub fn new() -> Self {
        Self
    }

    /// Everything that happens on an open page. The caller closes the page.
    async fn render(&self, page: &Page, request: &ConversionRequest) -> Result<u64> {
        let url = file_url(&request.input)?;

        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(|e| AppError::Navigation(format!("cannot enable lifecycle events: {}", e)))?;
        // Subscribe before navigating so no lifecycle event can be missed
        let events = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|e| AppError::Navigation(format!("cannot watch page lifecycle: {}", e)))?;

        info!("Navigating to {}", url);
        let navigation = page
            .execute(NavigateParams::new(url.to_string()))
            .await
            .map_err(|e| AppError::Navigation(e.to_string()))?
            .result;
        if let Some(error_text) = navigation.error_text.filter(|t| !t.is_empty()) {
            return Err(AppError::Navigation(format!("{} ({})", error_text, url)));
        }

        let mut lifecycle = Lifecycle::new(events, navigation.frame_id, navigation.loader_id);
        lifecycle.wait_for("load").await?;
        debug!("Page load complete");
        lifecycle.wait_for("networkIdle").await?;
        debug!("Network idle");

        let params = print_params(&request.options);
        info!(
            "Printing {} ({}, scale {}, {})",
            request.input.display(),
            request.options.paper,
            request.options.scale,
            if request.options.landscape { "landscape" } else { "portrait" }
        );
        let stream = page
            .execute(params)
            .await
            .map_err(|e| AppError::Render(e.to_string()))?
            .result
            .stream
            .ok_or_else(|| AppError::Render("browser returned no PDF stream".to_string()))?;

        let copied = copy_stream(page, &stream, &request.output).await;
        if let Err(e) = page.execute(CloseParams::new(stream)).await {
            warn!("Error closing PDF stream: {}", e);
        }
        copied
    }
}

impl Default for ChromiumEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConvertEngine for ChromiumEngine {
    async fn convert(&self, request: &ConversionRequest, cancel: CancellationToken) -> Result<()> {
        let source = resolve_browser(&request.options)?;
        let executable = cancellable(&cancel, source.executable()).await?;
        let session =
            cancellable(&cancel, BrowserSession::launch(&executable, request.timeout)).await?;

        let outcome = async {
            let page = cancellable(&cancel, session.new_page()).await?;
            let rendered = cancellable(&cancel, self.render(&page, request)).await;
            if let Err(e) = page.close().await {
                warn!("Error closing page: {}", e);
            }
            rendered
        }
        .await;

        session.shutdown().await;

        let written = outcome?;
        info!("Wrote {} bytes to {}", written, request.output.display());
        Ok(())
    }
}

/// Run `fut` unless `cancel` fires first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        res = fut => res,
    }
}

/// Absolute `file:///` URL for a local path.
pub(crate) fn file_url(path: &Path) -> Result<Url> {
    let absolute = std::path::absolute(path)
        .map_err(|e| AppError::Navigation(format!("failed to get absolute path: {}", e)))?;
    Url::from_file_path(&absolute).map_err(|_| {
        AppError::Navigation(format!("cannot build file URL for {}", absolute.display()))
    })
}

pub(crate) fn print_params(options: &ConvertOptions) -> PrintToPdfParams {
    let (width, height) = options.paper.dimensions();

    let mut params = PrintToPdfParams::default();
    params.landscape = Some(options.landscape);
    params.print_background = Some(options.print_background);
    params.scale = Some(options.scale);
    params.paper_width = Some(width);
    params.paper_height = Some(height);
    params.margin_top = Some(PAGE_MARGIN_INCHES);
    params.margin_bottom = Some(PAGE_MARGIN_INCHES);
    params.margin_left = Some(PAGE_MARGIN_INCHES);
    params.margin_right = Some(PAGE_MARGIN_INCHES);
    params.prefer_css_page_size = Some(true);
    params.transfer_mode = Some(PrintToPdfTransferMode::ReturnAsStream);
    params
}

async fn copy_stream(page: &Page, stream: &StreamHandle, output: &Path) -> Result<u64> {
    let mut sink = PdfSink::create(output).await?;
    loop {
        let mut read = ReadParams::new(stream.clone());
        read.size = Some(READ_CHUNK_SIZE);
        let chunk = page
            .execute(read)
            .await
            .map_err(|e| AppError::Render(format!("failed to read PDF stream: {}", e)))?
            .result;

        let bytes = decode_chunk(&chunk.data, chunk.base64_encoded.unwrap_or(false))?;
        sink.write_chunk(&bytes).await?;
        if chunk.eof {
            break;
        }
    }
    sink.commit().await
}

fn decode_chunk(data: &str, base64_encoded: bool) -> Result<Vec<u8>> {
    if base64_encoded {
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| AppError::Render(format!("invalid PDF stream chunk: {}", e)))
    } else {
        Ok(data.as_bytes().to_vec())
    }
}

/// Waits on the lifecycle event stream of one navigation.
struct Lifecycle {
    events: EventStream<EventLifecycleEvent>,
    tracker: LifecycleTracker,
}

impl Lifecycle {
    fn new(
        events: EventStream<EventLifecycleEvent>,
        frame_id: FrameId,
        loader_id: Option<LoaderId>,
    ) -> Self {
        Self {
            events,
            tracker: LifecycleTracker::new(frame_id, loader_id),
        }
    }

    async fn wait_for(&mut self, name: &str) -> Result<()> {
        while !self.tracker.has_seen(name) {
            let event = self.events.next().await.ok_or_else(|| {
                AppError::Navigation(format!("page closed before reaching '{}'", name))
            })?;
            self.tracker.observe(&event);
        }
        Ok(())
    }
}

/// Records lifecycle event names for the main frame of one navigation.
///
/// Chrome may report `networkIdle` before `load`; every matching name is
/// recorded so waits can be issued in any order.
struct LifecycleTracker {
    frame_id: FrameId,
    loader_id: Option<LoaderId>,
    seen: HashSet<String>,
}

impl LifecycleTracker {
    fn new(frame_id: FrameId, loader_id: Option<LoaderId>) -> Self {
        Self {
            frame_id,
            loader_id,
            seen: HashSet::new(),
        }
    }

    /// Record `event` if it belongs to this navigation.
    fn observe(&mut self, event: &EventLifecycleEvent) {
        if event.frame_id != self.frame_id {
            return;
        }
        if let Some(loader_id) = &self.loader_id {
            if event.loader_id != *loader_id {
                return;
            }
        }
        self.seen.insert(event.name.clone());
    }

    fn has_seen(&self, name: &str) -> bool {
        self.seen.contains(name)
    }
}
