use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ErrorKind, Result};

pub const ENV_PREFIX: &str = "INKVAULT_";
/// Looked up in the working directory when no config file is given.
const DEFAULT_FILES: [&str; 3] = ["inkvault.toml", "inkvault.yaml", "inkvault.json"];
const DEFAULT_LANGUAGES: [&str; 7] = ["fr", "en", "es", "zh-hant", "th", "de", "id"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}
impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Local,
    S3,
    /// Local is authoritative, S3 gets a synchronous copy.
    Dual,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub enabled: bool,
    pub max_pages: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Overrides the built-in desktop user agent.
    pub user_agent: Option<String>,
    pub referer: String,
}
impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            user_agent: None,
            referer: "https://www.webtoons.com/fr/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 0 retries forever.
    pub max_attempts: u32,
    pub delay_secs: u64,
}
impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    pub webp_quality: f32,
}
impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            jitter_min_ms: 50,
            jitter_max_ms: 200,
            webp_quality: 80.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStorageConfig {
    /// Defaults to `<data_dir>/images`.
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default)]
    pub prefix: Option<String>,
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    pub key_id: String,
    pub key_secret: String,
    #[serde(default)]
    pub storage_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub mode: StorageMode,
    pub local: LocalStorageConfig,
    pub s3: Option<S3Config>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub batch_size: usize,
    pub cooldown_secs: u64,
    pub chunk_size: u32,
}
impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            cooldown_secs: 5,
            chunk_size: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// UTC hour of the daily catalog update; `None` disables it.
    pub daily_update_hour: Option<u8>,
}
impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_update_hour: Some(17),
        }
    }
}

/// Everything configurable, with defaults for every key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub environment: Environment,
    pub languages: Vec<String>,
    pub ignored_languages: Vec<String>,
    pub canvas: CanvasConfig,
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub fetch: FetchConfig,
    pub storage: StorageConfig,
    pub migration: MigrationConfig,
    pub schedule: ScheduleConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = ProjectDirs::from("", "", "inkvault")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("data"));
        Self {
            data_dir,
            environment: Environment::default(),
            languages: DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
            ignored_languages: Vec::new(),
            canvas: CanvasConfig::default(),
            http: HttpConfig::default(),
            retry: RetryConfig::default(),
            fetch: FetchConfig::default(),
            storage: StorageConfig::default(),
            migration: MigrationConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, then the config file (`path`, or the first `inkvault.*` in
    /// the working directory), then `INKVAULT_*` environment variables with
    /// nested keys split on `__`.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let figment = match path {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::MissingFile(path.to_path_buf()));
                }
                match path.extension().and_then(|ext| ext.to_str()) {
                    Some("toml") => figment.merge(Toml::file(path)),
                    Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                    Some("json") => figment.merge(Json::file(path)),
                    _ => exn::bail!(ErrorKind::Format(path.to_path_buf())),
                }
            },
            None => match DEFAULT_FILES.iter().find(|file| Path::new(file).is_file()) {
                Some(&file) if file.ends_with(".toml") => figment.merge(Toml::file(file)),
                Some(&file) if file.ends_with(".yaml") => figment.merge(Yaml::file(file)),
                Some(&file) => figment.merge(Json::file(file)),
                None => figment,
            },
        };
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Loads and validates the configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(path)?)
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        debug!(data_dir = %config.data_dir.display(), environment = ?config.environment, "Configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.enabled_languages().is_empty() {
            exn::bail!(ErrorKind::Invalid("languages"));
        }
        if self.http.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("http.timeout_secs"));
        }
        if self.fetch.jitter_min_ms > self.fetch.jitter_max_ms {
            exn::bail!(ErrorKind::Invalid("fetch.jitter_min_ms"));
        }
        if !(0.0..=100.0).contains(&self.fetch.webp_quality) {
            exn::bail!(ErrorKind::Invalid("fetch.webp_quality"));
        }
        if self.migration.batch_size == 0 {
            exn::bail!(ErrorKind::Invalid("migration.batch_size"));
        }
        if self.migration.chunk_size == 0 {
            exn::bail!(ErrorKind::Invalid("migration.chunk_size"));
        }
        if self.schedule.daily_update_hour.is_some_and(|hour| hour > 23) {
            exn::bail!(ErrorKind::Invalid("schedule.daily_update_hour"));
        }
        if self.canvas.max_pages == Some(0) {
            exn::bail!(ErrorKind::Invalid("canvas.max_pages"));
        }
        match (self.storage.mode, &self.storage.s3) {
            (StorageMode::S3 | StorageMode::Dual, None) => exn::bail!(ErrorKind::Invalid("storage.s3")),
            (_, Some(s3)) if s3.bucket.is_empty() => exn::bail!(ErrorKind::Invalid("storage.s3.bucket")),
            _ => Ok(()),
        }
    }

    /// Configured languages minus the ignored ones, in configured order.
    pub fn enabled_languages(&self) -> Vec<String> {
        self.languages
            .iter()
            .filter(|language| !self.ignored_languages.contains(language))
            .cloned()
            .collect()
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("catalog.sqlite")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join(".cache")
    }

    pub fn discovery_snapshot(&self) -> PathBuf {
        self.cache_dir().join("webtoons.json")
    }

    pub fn queue_snapshot(&self) -> PathBuf {
        self.cache_dir().join("download_queue.json")
    }

    pub fn images_root(&self) -> PathBuf {
        self.storage.local.root.clone().unwrap_or_else(|| self.data_dir.join("images"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.enabled_languages(), DEFAULT_LANGUAGES);
        assert_eq!(config.schedule.daily_update_hour, Some(17));
        assert_eq!(config.queue_snapshot(), config.data_dir.join(".cache/download_queue.json"));
    }

    #[test]
    fn test_file_then_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "inkvault.toml",
                r#"
                    data_dir = "/srv/inkvault"
                    environment = "production"
                    ignored_languages = ["th", "id"]

                    [storage]
                    mode = "dual"

                    [storage.s3]
                    bucket = "webtoons"
                    region = "eu-west-1"
                    key_id = "id"
                    key_secret = "secret"
                "#,
            )?;
            jail.set_env("INKVAULT_STORAGE__S3__BUCKET", "other");
            jail.set_env("INKVAULT_MIGRATION__BATCH_SIZE", "50");
            let config = Config::load(None).map_err(|err| err.to_string())?;
            assert_eq!(config.data_dir, Path::new("/srv/inkvault"));
            assert!(config.environment.is_production());
            assert_eq!(config.enabled_languages(), ["fr", "en", "es", "zh-hant", "de"]);
            assert_eq!(config.storage.mode, StorageMode::Dual);
            assert_eq!(config.storage.s3.as_ref().map(|s3| s3.bucket.as_str()), Some("other"));
            assert_eq!(config.migration.batch_size, 50);
            assert_eq!(config.images_root(), Path::new("/srv/inkvault/images"));
            Ok(())
        });
    }

    #[test]
    fn test_explicit_yaml_file() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.yml", "languages: [en]\ncanvas:\n  enabled: true\n  max_pages: 3\n")?;
            let config = Config::load(Some(Path::new("custom.yml"))).map_err(|err| err.to_string())?;
            assert_eq!(config.enabled_languages(), ["en"]);
            assert!(config.canvas.enabled);
            assert_eq!(config.canvas.max_pages, Some(3));
            Ok(())
        });
    }

    #[test]
    fn test_missing_and_unsupported_files() {
        Jail::expect_with(|jail| {
            let err = Config::load(Some(Path::new("nope.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::MissingFile(_)));
            jail.create_file("inkvault.ini", "")?;
            let err = Config::load(Some(Path::new("inkvault.ini"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Format(_)));
            Ok(())
        });
    }

    #[test]
    fn test_malformed_value() {
        Jail::expect_with(|jail| {
            jail.set_env("INKVAULT_STORAGE__MODE", "floppy");
            let err = Config::load(None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
            Ok(())
        });
    }

    #[rstest]
    #[case::no_languages(|c: &mut Config| c.ignored_languages = c.languages.clone(), "languages")]
    #[case::jitter(|c: &mut Config| c.fetch.jitter_min_ms = 500, "fetch.jitter_min_ms")]
    #[case::quality(|c: &mut Config| c.fetch.webp_quality = 120.0, "fetch.webp_quality")]
    #[case::batch(|c: &mut Config| c.migration.batch_size = 0, "migration.batch_size")]
    #[case::hour(|c: &mut Config| c.schedule.daily_update_hour = Some(24), "schedule.daily_update_hour")]
    #[case::s3_missing(|c: &mut Config| c.storage.mode = StorageMode::S3, "storage.s3")]
    fn test_validation(#[case] change: fn(&mut Config), #[case] field: &str) {
        let mut config = Config::default();
        change(&mut config);
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(f) if *f == field));
    }
}
