mod chromium;
mod resolve;
mod session;

pub use chromium::ChromiumEngine;
pub use resolve::resolve_browser;
pub use session::BrowserSession;

use crate::config::ConversionRequest;
use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Trait that all conversion engines must implement
#[async_trait]
pub trait ConvertEngine: Send + Sync {
    /// Convert `request.input` into a PDF at `request.output`.
    ///
    /// The engine owns every resource it acquires and must release it before
    /// returning, including when `cancel` fires mid-conversion.
    async fn convert(&self, request: &ConversionRequest, cancel: CancellationToken) -> Result<()>;
}
