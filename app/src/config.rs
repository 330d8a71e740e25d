use gallery::LayoutConfig;
use lookup_client::{DEFAULT_GEOCODER_URL, DEFAULT_WEATHER_URL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub log_level: String,
    pub data_dir: PathBuf,
    pub columns: usize,
    pub viewport_width: f32,
    pub placeholder_height: f32,
    pub min_card_height: f32,
    pub max_card_height: f32,
    pub lookup_timeout_secs: u64,
    pub geocoder_url: String,
    pub weather_url: String,
    pub offline: bool,
}

pub struct AppConfigOverrides {
    pub log_level: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub columns: Option<usize>,
    pub offline: bool,
}

fn base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".photojournal")
}

fn default_config_path() -> PathBuf {
    base_dir().join("config.toml")
}

impl AppConfig {
    pub fn load_from(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(default_config_path);
        let cfg = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .build()
            .unwrap_or_default();

        let layout = LayoutConfig::default();
        let float = |key: &str, default: f32| cfg.get_float(key).map(|v| v as f32).unwrap_or(default);

        Self {
            log_level: cfg
                .get_string("log_level")
                .unwrap_or_else(|_| "info".to_string()),
            data_dir: cfg
                .get_string("data_dir")
                .map(PathBuf::from)
                .unwrap_or_else(|_| base_dir()),
            columns: cfg.get_int("columns").unwrap_or(layout.columns as i64).max(0) as usize,
            viewport_width: float("viewport_width", layout.viewport_width),
            placeholder_height: float("placeholder_height", layout.placeholder_height),
            min_card_height: float("min_card_height", layout.min_height),
            max_card_height: float("max_card_height", layout.max_height),
            lookup_timeout_secs: cfg.get_int("lookup_timeout_secs").unwrap_or(10).max(0) as u64,
            geocoder_url: cfg
                .get_string("geocoder_url")
                .unwrap_or_else(|_| DEFAULT_GEOCODER_URL.to_string()),
            weather_url: cfg
                .get_string("weather_url")
                .unwrap_or_else(|_| DEFAULT_WEATHER_URL.to_string()),
            offline: cfg.get_bool("offline").unwrap_or(false),
        }
    }

    pub fn apply_overrides(mut self, ov: &AppConfigOverrides) -> Self {
        if let Some(l) = &ov.log_level {
            self.log_level = l.clone();
        }
        if let Some(d) = &ov.data_dir {
            self.data_dir = d.clone();
        }
        if let Some(c) = ov.columns {
            self.columns = c;
        }
        if ov.offline {
            self.offline = true;
        }
        self
    }

    pub fn save_to(&self, path: Option<PathBuf>) -> std::io::Result<()> {
        let path = path.unwrap_or_else(default_config_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = toml::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, data)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("photos.sqlite")
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn layout(&self) -> LayoutConfig {
        LayoutConfig {
            columns: self.columns,
            viewport_width: self.viewport_width,
            placeholder_height: self.placeholder_height,
            min_height: self.min_card_height,
            max_height: self.max_card_height,
            ..LayoutConfig::default()
        }
    }
}
