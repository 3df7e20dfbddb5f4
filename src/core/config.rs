//! Runtime configuration
//!
//! Every setting can come from a command-line flag or an environment
//! variable; flags win.

use std::path::PathBuf;

use clap::Args;

use super::errors::{DesktopError, DesktopResult};

/// Largest encoded screenshot a tool response may carry (1 MB)
pub const DEFAULT_MAX_BYTES: usize = 1_048_576;
pub const DEFAULT_MIN_DIMENSION: u32 = 64;
pub const DEFAULT_SCALE_STEP: u32 = 50;

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Directory screenshots are saved to (defaults to the user's Downloads)
    #[arg(long, env = "COMPUTER_USE_DOWNLOADS_DIR")]
    pub downloads_dir: Option<PathBuf>,

    /// Response budget for encoded screenshots, in bytes
    #[arg(long, env = "COMPUTER_USE_MAX_BYTES", default_value_t = DEFAULT_MAX_BYTES)]
    pub max_bytes: usize,

    /// Smallest width/height the compressor may shrink a screenshot to
    #[arg(long, env = "COMPUTER_USE_MIN_DIMENSION", default_value_t = DEFAULT_MIN_DIMENSION)]
    pub min_dimension: u32,

    /// Percentage applied to both dimensions on each downscale step
    #[arg(long, env = "COMPUTER_USE_SCALE_STEP", default_value_t = DEFAULT_SCALE_STEP)]
    pub scale_step: u32,

    /// Tesseract executable used for OCR
    #[arg(long, env = "COMPUTER_USE_TESSERACT", default_value = "tesseract")]
    pub tesseract: String,

    /// Tesseract language pack
    #[arg(long, env = "COMPUTER_USE_OCR_LANG", default_value = "eng")]
    pub ocr_lang: String,

    /// ydotool executable used for input injection
    #[arg(long, env = "COMPUTER_USE_YDOTOOL", default_value = "ydotool")]
    pub ydotool: String,
}

/// Validated configuration shared by the server and the CLI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub downloads_dir: PathBuf,
    pub max_bytes: usize,
    pub min_dimension: u32,
    pub scale_step: u32,
    pub tesseract: String,
    pub ocr_lang: String,
    pub ydotool: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            downloads_dir: default_downloads_dir(),
            max_bytes: DEFAULT_MAX_BYTES,
            min_dimension: DEFAULT_MIN_DIMENSION,
            scale_step: DEFAULT_SCALE_STEP,
            tesseract: "tesseract".to_string(),
            ocr_lang: "eng".to_string(),
            ydotool: "ydotool".to_string(),
        }
    }
}

impl Config {
    pub fn from_args(args: ConfigArgs) -> DesktopResult<Self> {
        let config = Self {
            downloads_dir: args.downloads_dir.unwrap_or_else(default_downloads_dir),
            max_bytes: args.max_bytes,
            min_dimension: args.min_dimension,
            scale_step: args.scale_step,
            tesseract: args.tesseract,
            ocr_lang: args.ocr_lang,
            ydotool: args.ydotool,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DesktopResult<()> {
        if self.max_bytes == 0 {
            return Err(DesktopError::invalid("max_bytes", "must be positive"));
        }
        if self.min_dimension == 0 {
            return Err(DesktopError::invalid("min_dimension", "must be positive"));
        }
        if !(1..=99).contains(&self.scale_step) {
            return Err(DesktopError::invalid(
                "scale_step",
                format!("{} is outside 1-99", self.scale_step),
            ));
        }
        if self.tesseract.trim().is_empty() || self.ydotool.trim().is_empty() {
            return Err(DesktopError::invalid("tesseract/ydotool", "executable must be set"));
        }
        Ok(())
    }
}

/// The OS downloads directory, falling back to `~/Downloads`
pub fn default_downloads_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| std::env::temp_dir().join("Downloads"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ConfigArgs {
        ConfigArgs {
            downloads_dir: Some(PathBuf::from("/tmp/shots")),
            max_bytes: DEFAULT_MAX_BYTES,
            min_dimension: DEFAULT_MIN_DIMENSION,
            scale_step: DEFAULT_SCALE_STEP,
            tesseract: "tesseract".to_string(),
            ocr_lang: "eng".to_string(),
            ydotool: "ydotool".to_string(),
        }
    }

    #[test]
    fn test_from_args_keeps_explicit_dir() {
        let config = Config::from_args(args()).unwrap();
        assert_eq!(config.downloads_dir, PathBuf::from("/tmp/shots"));
        assert_eq!(config.max_bytes, 1_048_576);
    }

    #[test]
    fn test_rejects_bad_scale_step() {
        let mut bad = args();
        bad.scale_step = 100;
        assert!(Config::from_args(bad).is_err());

        let mut bad = args();
        bad.scale_step = 0;
        assert!(Config::from_args(bad).is_err());
    }

    #[test]
    fn test_rejects_zero_budget() {
        let mut bad = args();
        bad.max_bytes = 0;
        let err = Config::from_args(bad).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }
}
