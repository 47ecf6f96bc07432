use std::path::PathBuf;

pub const DEFAULT_MODEL_PATH: &str = "student_dropout_model.json";
pub const DEFAULT_FEATURES_PATH: &str = "features_used.json";
pub const LOG_ENV: &str = "DROPOUT_LOG";

/// Where the trained artifacts live. Resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub model_path: PathBuf,
    pub features_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            features_path: PathBuf::from(DEFAULT_FEATURES_PATH),
        }
    }
}

impl Settings {
    pub fn new(model_path: Option<PathBuf>, features_path: Option<PathBuf>) -> Self {
        let defaults = Self::default();
        Self {
            model_path: model_path.unwrap_or(defaults.model_path),
            features_path: features_path.unwrap_or(defaults.features_path),
        }
    }
}

pub fn init_logging() {
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Warn)
        .parse_env(env_logger::Env::default().filter_or(LOG_ENV, "info"))
        .format_timestamp(None)
        .init();
}
