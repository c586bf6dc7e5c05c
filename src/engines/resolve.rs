use crate::config::ConvertOptions;
use crate::error::{AppError, Result};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use std::path::{Path, PathBuf};
use tracing::info;

/// Executable names tried on `PATH` when no well-known install exists.
const PATH_EXECUTABLES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Where the browser binary for this run comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserSource {
    /// Given with `--browser`; launched as-is without fallback.
    Explicit(PathBuf),
    /// Found on disk while downloads are disallowed.
    Local(PathBuf),
    /// Fetched into (or reused from) the browser cache.
    Download { cache_dir: PathBuf },
}

impl BrowserSource {
    /// Turn the source into a launchable executable path, downloading a
    /// build first if needed.
    pub async fn executable(&self) -> Result<PathBuf> {
        match self {
            BrowserSource::Explicit(path) | BrowserSource::Local(path) => Ok(path.clone()),
            BrowserSource::Download { cache_dir } => fetch_browser(cache_dir).await,
        }
    }
}

/// Pick the browser source for a run: explicit path, then local discovery
/// when downloads are off, otherwise a managed download.
pub fn resolve_browser(options: &ConvertOptions) -> Result<BrowserSource> {
    if let Some(path) = &options.browser_path {
        info!("Using browser at: {}", path.display());
        return Ok(BrowserSource::Explicit(path.clone()));
    }

    if !options.allow_download {
        info!("Auto-download disabled, searching for local browser installation...");
        let path = discover_local(&known_install_paths(), lookup_on_path)?;
        return Ok(BrowserSource::Local(path));
    }

    let cache_dir = options.cache_dir.clone().unwrap_or_else(default_cache_dir);
    Ok(BrowserSource::Download { cache_dir })
}

/// First existing candidate wins; `lookup` is the last resort.
pub(crate) fn discover_local<F>(candidates: &[PathBuf], lookup: F) -> Result<PathBuf>
where
    F: FnOnce() -> Option<PathBuf>,
{
    if let Some(path) = candidates.iter().find(|p| p.is_file()) {
        info!("Found browser at: {}", path.display());
        return Ok(path.clone());
    }

    match lookup() {
        Some(path) => {
            info!("Found browser on PATH at: {}", path.display());
            Ok(path)
        }
        None => Err(AppError::BrowserNotFound),
    }
}

fn lookup_on_path() -> Option<PathBuf> {
    PATH_EXECUTABLES
        .iter()
        .find_map(|exe| which::which(exe).ok())
}

/// Well-known install locations for the current OS, in priority order.
pub(crate) fn known_install_paths() -> Vec<PathBuf> {
    let paths: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
            r"C:\Program Files (x86)\Chromium\Application\chrome.exe",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ]
    };
    paths.iter().map(PathBuf::from).collect()
}

fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "html2pdf")
        .map(|dirs| dirs.cache_dir().join("browsers"))
        .unwrap_or_else(|| std::env::temp_dir().join("html2pdf").join("browsers"))
}

async fn fetch_browser(cache_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(cache_dir).await.map_err(|e| {
        AppError::BrowserDownload(format!(
            "cannot create cache directory {}: {}",
            cache_dir.display(),
            e
        ))
    })?;

    let options = BrowserFetcherOptions::builder()
        .with_path(cache_dir)
        .build()
        .map_err(|e| AppError::BrowserDownload(e.to_string()))?;

    info!("Fetching browser into {}", cache_dir.display());
    let revision = BrowserFetcher::new(options)
        .fetch()
        .await
        .map_err(|e| AppError::BrowserDownload(e.to_string()))?;

    info!("Using downloaded browser at: {}", revision.executable_path.display());
    Ok(revision.executable_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_explicit_path_wins() {
        let options = ConvertOptions {
            browser_path: Some(PathBuf::from("/opt/chrome/chrome")),
            allow_download: false,
            ..Default::default()
        };
        assert_eq!(
            resolve_browser(&options).unwrap(),
            BrowserSource::Explicit(PathBuf::from("/opt/chrome/chrome"))
        );
    }

    #[test]
    fn test_download_uses_configured_cache() {
        let options = ConvertOptions {
            cache_dir: Some(PathBuf::from("/tmp/browsers")),
            ..Default::default()
        };
        assert_eq!(
            resolve_browser(&options).unwrap(),
            BrowserSource::Download {
                cache_dir: PathBuf::from("/tmp/browsers")
            }
        );
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing-chrome");
        let first = dir.path().join("chromium");
        let second = dir.path().join("google-chrome");
        fs::write(&first, b"").unwrap();
        fs::write(&second, b"").unwrap();

        let found = discover_local(&[missing, first.clone(), second], || {
            panic!("PATH lookup must not run when a candidate exists")
        })
        .unwrap();
        assert_eq!(found, first);
    }

    #[test]
    fn test_falls_back_to_path_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let found = discover_local(&[dir.path().join("nope")], || {
            Some(PathBuf::from("/usr/local/bin/chromium"))
        })
        .unwrap();
        assert_eq!(found, PathBuf::from("/usr/local/bin/chromium"));
    }

    #[test]
    fn test_nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_local(&[dir.path().join("nope")], || None).unwrap_err();
        assert!(matches!(err, AppError::BrowserNotFound));
        assert_eq!(
            err.to_string(),
            "no browser download allowed and no local browser found"
        );
    }

    #[test]
    fn test_directories_are_not_browsers() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_local(&[dir.path().to_path_buf()], || None).unwrap_err();
        assert!(matches!(err, AppError::BrowserNotFound));
    }

    #[test]
    fn test_known_paths_not_empty() {
        assert!(!known_install_paths().is_empty());
    }
}
