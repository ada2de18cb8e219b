//! Process configuration: flags with environment fallbacks.
//!
//! `.env` is loaded by `main` before parsing, so every flag can also come
//! from there.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;

use crate::auth::{SupabaseTokenVerifier, TokenVerifier};
use crate::services::AnalysisMode;
use crate::vision::{openai, DisabledAnalyzer, OpenAiVisionClient, VisionAnalyzer};

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Connection URL, or a bare SQLite file path
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:gallery.db?mode=rwc")]
    pub database_url: String,

    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    pub supabase_anon_key: Option<String>,

    /// Without a key, images are stored but never described
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "VISION_BASE_URL", default_value = openai::DEFAULT_BASE_URL)]
    pub vision_base_url: String,

    #[arg(long, env = "VISION_MODEL", default_value = openai::DEFAULT_MODEL)]
    pub vision_model: String,

    #[arg(long, env = "VISION_TIMEOUT_SECS", default_value_t = 30)]
    pub vision_timeout_secs: u64,

    /// Comma separated
    #[arg(
        long,
        env = "ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    #[arg(long, env = "UPLOAD_DIR", default_value = "./uploads")]
    pub upload_dir: PathBuf,

    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 20)]
    pub max_upload_mb: usize,

    /// Run analysis inside the upload request instead of in the background
    #[arg(long, env = "SYNC_ANALYSIS")]
    pub sync_analysis: bool,
}

impl ServeArgs {
    pub fn settings(&self) -> GallerySettings {
        GallerySettings {
            upload_dir: self.upload_dir.clone(),
            max_upload_bytes: self.max_upload_mb * 1024 * 1024,
            vision_timeout: Duration::from_secs(self.vision_timeout_secs),
            analysis_mode: if self.sync_analysis {
                AnalysisMode::Inline
            } else {
                AnalysisMode::Background
            },
        }
    }

    pub fn token_verifier(&self) -> Result<Arc<dyn TokenVerifier>> {
        let (url, key) = match (&self.supabase_url, &self.supabase_anon_key) {
            (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
                (url, key)
            }
            _ => bail!("SUPABASE_URL and SUPABASE_ANON_KEY must both be set"),
        };
        Ok(Arc::new(SupabaseTokenVerifier::new(url, key.clone())?))
    }

    pub fn vision_analyzer(&self) -> Result<Arc<dyn VisionAnalyzer>> {
        match self.openai_api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(Arc::new(OpenAiVisionClient::new(
                key,
                self.vision_base_url.clone(),
                self.vision_model.clone(),
                Duration::from_secs(self.vision_timeout_secs),
            )?)),
            _ => {
                tracing::warn!("OPENAI_API_KEY is not set, image analysis is disabled");
                Ok(Arc::new(DisabledAnalyzer))
            }
        }
    }
}

/// Everything the services need that isn't a collaborator
#[derive(Clone, Debug)]
pub struct GallerySettings {
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub vision_timeout: Duration,
    pub analysis_mode: AnalysisMode,
}

impl Default for GallerySettings {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            max_upload_bytes: 20 * 1024 * 1024,
            vision_timeout: Duration::from_secs(30),
            analysis_mode: AnalysisMode::Background,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeploymentEnvironment {
    Railway,
    Docker,
    Local,
}

impl DeploymentEnvironment {
    pub fn detect() -> Self {
        if std::env::var_os("RAILWAY_ENVIRONMENT").is_some() {
            DeploymentEnvironment::Railway
        } else if Path::new("/.dockerenv").exists() {
            DeploymentEnvironment::Docker
        } else {
            DeploymentEnvironment::Local
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeploymentEnvironment::Railway => "railway",
            DeploymentEnvironment::Docker => "docker",
            DeploymentEnvironment::Local => "local",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        serve: ServeArgs,
    }

    fn parse(args: &[&str]) -> ServeArgs {
        TestCli::parse_from(std::iter::once("aigallery").chain(args.iter().copied())).serve
    }

    #[test]
    fn test_explicit_flags() {
        let args = parse(&[
            "--port",
            "9000",
            "--allowed-origins",
            "http://a.example,http://b.example",
            "--max-upload-mb",
            "5",
            "--sync-analysis",
        ]);

        assert_eq!(args.port, 9000);
        assert_eq!(
            args.allowed_origins,
            vec!["http://a.example", "http://b.example"]
        );

        let settings = args.settings();
        assert_eq!(settings.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(settings.analysis_mode, AnalysisMode::Inline);
    }

    #[test]
    fn test_missing_supabase_settings_fail() {
        let args = parse(&[
            "--supabase-url",
            "https://project.supabase.co",
            "--supabase-anon-key",
            " ",
        ]);
        assert!(args.token_verifier().is_err());

        let args = parse(&[
            "--supabase-url",
            "https://project.supabase.co",
            "--supabase-anon-key",
            "anon",
        ]);
        assert!(args.token_verifier().is_ok());
    }

    #[test]
    fn test_blank_api_key_disables_analysis() {
        let args = parse(&["--openai-api-key", "  "]);
        assert!(args.vision_analyzer().is_ok());
    }
}
