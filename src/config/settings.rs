use config::{Config, ConfigError, Environment, File, FileFormat};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::env;

pub static SETTINGS: Lazy<Settings> = Lazy::new(|| Settings::new().expect("Failed to setup settings"));

pub const DEFAULT_DATABASE_DIR: &str = "/app/database";

#[derive(Debug, Clone, Deserialize)]
pub struct App {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub http_port: u16,
    pub api_key: Option<String>,
    pub request_timeout: Option<u64>,
    pub max_upload_size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tracer {
    pub uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderBackend {
    Triton,
    Thumbnail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
    EuclideanL2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    Nhwc,
    Nchw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelNormalization {
    Base,
    Arcface,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Verifier {
    pub backend: EmbedderBackend,
    pub model_name: String,
    pub image_size: (u32, u32),
    pub distance_metric: DistanceMetric,
    pub threshold: Option<f64>,
    pub layout: TensorLayout,
    pub normalization: PixelNormalization,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Triton {
    pub host: String,
    pub http_port: u16,
    pub timeout: Option<u64>,
}

impl Triton {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.http_port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub environment: Option<String>,
    pub database_dir: String,
    pub server: Server,
    pub logger: Option<Logger>,
    pub tracer: Option<Tracer>,
    pub verifier: Verifier,
    pub triton: Option<Triton>,
    pub app: App,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .set_default("database_dir", DEFAULT_DATABASE_DIR)?
            .set_default("app.name", "face-verify-svc")?
            .set_default("server.http_port", 8000)?
            .set_default("verifier.backend", "triton")?
            .set_default("verifier.model_name", "VGG-Face")?
            .set_default("verifier.image_size", vec![224, 224])?
            .set_default("verifier.distance_metric", "cosine")?
            .set_default("verifier.layout", "nhwc")?
            .set_default("verifier.normalization", "base")?
            .add_source(File::with_name("conf/config.toml").format(FileFormat::Toml).required(false))
            .add_source(File::with_name("conf/default").required(false))
            .add_source(File::with_name(&format!("conf/{run_mode}")).required(false))
            .add_source(File::with_name("conf/local").required(false))
            .add_source(Environment::default().separator("__"));

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.http_port", port)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn request_timeout(&self) -> u64 {
        self.server.request_timeout.unwrap_or(20)
    }

    pub fn max_upload_size(&self) -> usize {
        self.server.max_upload_size.unwrap_or(10 * 1024 * 1024)
    }

    /// Empty keys count as "no key configured".
    pub fn api_key(&self) -> Option<&str> {
        self.server.api_key.as_deref().filter(|key| !key.is_empty())
    }
}
