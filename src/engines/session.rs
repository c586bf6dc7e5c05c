use crate::error::{AppError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long a closed browser gets to exit before it is killed.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// A launched headless browser plus everything it needs to stay alive: the
/// CDP event loop and a private profile directory.
///
/// Call [`BrowserSession::shutdown`] to release it. Dropping an open session
/// aborts the event loop and kills the child process instead.
pub struct BrowserSession {
    browser: Option<Browser>,
    handler: JoinHandle<()>,
    profile_dir: Option<TempDir>,
}

impl BrowserSession {
    pub async fn launch(executable: &Path, request_timeout: Duration) -> Result<Self> {
        let profile_dir = tempfile::Builder::new()
            .prefix("html2pdf-profile-")
            .tempdir()
            .map_err(|e| AppError::BrowserLaunch(format!("cannot create profile dir: {}", e)))?;

        let config = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(profile_dir.path())
            .request_timeout(request_timeout)
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--disable-default-apps")
            .build()
            .map_err(|e| AppError::BrowserLaunch(format!("invalid browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            AppError::BrowserLaunch(format!("{} ({})", e, executable.display()))
        })?;

        // The CDP connection only makes progress while the handler is polled
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
        });

        info!("Launched headless browser {}", executable.display());
        Ok(Self {
            browser: Some(browser),
            handler,
            profile_dir: Some(profile_dir),
        })
    }

    pub async fn new_page(&self) -> Result<Page> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| AppError::Internal("browser session already shut down".to_string()))?;

        browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::BrowserLaunch(format!("failed to open page: {}", e)))
    }

    /// Close the browser, wait for it to exit (killing it if it lingers),
    /// stop the event loop and delete the profile. Failures are logged only.
    pub async fn shutdown(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Error closing browser: {}", e);
            }
            match tokio::time::timeout(EXIT_GRACE, browser.wait()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Error waiting for browser exit: {}", e),
                Err(_) => {
                    warn!("Browser still running after {:?}, killing it", EXIT_GRACE);
                    if let Some(Err(e)) = browser.kill().await {
                        warn!("Error killing browser: {}", e);
                    }
                }
            }
        }

        self.handler.abort();

        if let Some(dir) = self.profile_dir.take() {
            if let Err(e) = dir.close() {
                warn!("Error removing browser profile: {}", e);
            }
        }
        debug!("Browser session released");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
        let Some(mut browser) = self.browser.take() else {
            return;
        };
        warn!("Browser session dropped without shutdown, killing browser");
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let _ = browser.kill().await;
                });
            }
            Err(_) => drop(browser),
        }
    }
}
