use crate::config::{ConversionRequest, ConvertOptions, PaperSize};
use crate::error::{AppError, Result};
use clap::{ArgAction, Parser};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for `--timeout`, one day.
const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Long flags that may also be spelled with a single dash (`-input file.html`).
const LONG_FLAGS: &[&str] = &[
    "input",
    "output",
    "landscape",
    "paper",
    "scale",
    "background",
    "browser",
    "no-download",
    "timeout",
    "cache-dir",
    "help",
    "version",
];

/// Convert a local HTML file to PDF using headless Chrome/Chromium
#[derive(Parser, Debug)]
#[command(name = "html2pdf", version, about)]
pub struct Cli {
    /// Path to the input HTML file
    #[arg(long, value_name = "HTML_FILE")]
    pub input: PathBuf,

    /// Path for the output PDF file
    #[arg(long, value_name = "PDF_FILE")]
    pub output: PathBuf,

    /// Set page orientation to landscape
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        require_equals = true
    )]
    pub landscape: bool,

    /// Paper size (A4, Letter, Legal, Tabloid/Ledger, A3, A5)
    #[arg(long, default_value = "A4")]
    pub paper: String,

    /// Scale factor for rendering
    #[arg(long, default_value_t = 1.0)]
    pub scale: f64,

    /// Print background colors and images
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true",
        require_equals = true
    )]
    pub background: bool,

    /// Path to a Chrome/Chromium executable (for airgapped environments)
    #[arg(long, env = "CHROME_PATH", value_name = "PATH")]
    pub browser: Option<PathBuf>,

    /// Prevent automatic browser download and search local installations instead
    #[arg(
        long = "no-download",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        require_equals = true
    )]
    pub no_download: bool,

    /// Timeout in seconds for the conversion process
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS))]
    pub timeout: u64,

    /// Directory where downloaded browser builds are cached
    #[arg(long, env = "HTML2PDF_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

impl Cli {
    /// Parse the process arguments, accepting single-dash long flags.
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }

    /// Freeze the parsed flags into a request.
    pub fn into_request(self) -> Result<ConversionRequest> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(AppError::InvalidArgument(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }

        let browser_path = self.browser.filter(|p| !p.as_os_str().is_empty());
        let cache_dir = self.cache_dir.filter(|p| !p.as_os_str().is_empty());

        Ok(ConversionRequest {
            input: self.input,
            output: self.output,
            options: ConvertOptions {
                landscape: self.landscape,
                paper: PaperSize::from_name_or_letter(&self.paper),
                scale: self.scale,
                print_background: self.background,
                browser_path,
                allow_download: !self.no_download,
                cache_dir,
            },
            timeout: Duration::from_secs(self.timeout),
        })
    }
}

/// Rewrite `-input` / `-scale=2` style arguments to their `--` form.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text.starts_with("--") {
                return arg;
            }
            let Some(rest) = text.strip_prefix('-') else {
                return arg;
            };
            let name = rest.split('=').next().unwrap_or(rest);
            if LONG_FLAGS.contains(&name) {
                OsString::from(format!("-{}", text))
            } else {
                arg
            }
        })
        .collect()
}
