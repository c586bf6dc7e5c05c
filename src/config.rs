use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Margin applied to all four sides of every printed page, in inches.
pub const PAGE_MARGIN_INCHES: f64 = 0.4;

/// Named paper sizes understood by `--paper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperSize {
    A4,
    Letter,
    Legal,
    Tabloid,
    A3,
    A5,
}

impl PaperSize {
    /// Case-insensitive lookup. `Ledger` is an alias of `Tabloid`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "A4" => Some(PaperSize::A4),
            "LETTER" => Some(PaperSize::Letter),
            "LEGAL" => Some(PaperSize::Legal),
            "TABLOID" | "LEDGER" => Some(PaperSize::Tabloid),
            "A3" => Some(PaperSize::A3),
            "A5" => Some(PaperSize::A5),
            _ => None,
        }
    }

    /// Unknown names fall back to Letter.
    pub fn from_name_or_letter(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            tracing::warn!("Unknown paper size '{}', using Letter", name);
            PaperSize::Letter
        })
    }

    /// Width and height in inches (portrait).
    pub fn dimensions(self) -> (f64, f64) {
        match self {
            PaperSize::A4 => (8.27, 11.69),
            PaperSize::Letter => (8.5, 11.0),
            PaperSize::Legal => (8.5, 14.0),
            PaperSize::Tabloid => (11.0, 17.0),
            PaperSize::A3 => (11.69, 16.54),
            PaperSize::A5 => (5.83, 8.27),
        }
    }
}

impl fmt::Display for PaperSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaperSize::A4 => "A4",
            PaperSize::Letter => "Letter",
            PaperSize::Legal => "Legal",
            PaperSize::Tabloid => "Tabloid",
            PaperSize::A3 => "A3",
            PaperSize::A5 => "A5",
        };
        f.write_str(name)
    }
}

/// Rendering and browser options for one conversion
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Landscape orientation
    pub landscape: bool,
    pub paper: PaperSize,
    /// Render scale factor, passed to the browser unchanged
    pub scale: f64,
    /// Print background graphics
    pub print_background: bool,
    /// Explicit browser executable; disables discovery and download
    pub browser_path: Option<PathBuf>,
    /// Whether a browser build may be downloaded when none is given
    pub allow_download: bool,
    /// Where downloaded browser builds are cached
    pub cache_dir: Option<PathBuf>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            landscape: false,
            paper: PaperSize::A4,
            scale: 1.0,
            print_background: true,
            browser_path: None,
            allow_download: true,
            cache_dir: None,
        }
    }
}

/// One conversion job, built once from the command line and never mutated.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub options: ConvertOptions,
    /// Deadline for the whole run, browser launch included
    pub timeout: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_table() {
        let table = [
            ("A4", (8.27, 11.69)),
            ("Letter", (8.5, 11.0)),
            ("Legal", (8.5, 14.0)),
            ("Tabloid", (11.0, 17.0)),
            ("Ledger", (11.0, 17.0)),
            ("A3", (11.69, 16.54)),
            ("A5", (5.83, 8.27)),
        ];
        for (name, dims) in table {
            assert_eq!(PaperSize::from_name_or_letter(name).dimensions(), dims);
            assert_eq!(
                PaperSize::from_name_or_letter(&name.to_lowercase()).dimensions(),
                dims
            );
            assert_eq!(
                PaperSize::from_name_or_letter(&name.to_uppercase()).dimensions(),
                dims
            );
        }
    }

    #[test]
    fn test_unknown_paper_falls_back_to_letter() {
        assert_eq!(PaperSize::parse("B5"), None);
        assert_eq!(PaperSize::from_name_or_letter("B5"), PaperSize::Letter);
        assert_eq!(PaperSize::from_name_or_letter("").dimensions(), (8.5, 11.0));
    }

    #[test]
    fn test_default_options() {
        let opts = ConvertOptions::default();
        assert_eq!(opts.paper, PaperSize::A4);
        assert_eq!(opts.scale, 1.0);
        assert!(opts.print_background);
        assert!(opts.allow_download);
        assert!(!opts.landscape);
    }
}
