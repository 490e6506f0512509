use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub triage: TriageConfig,
    #[serde(default)]
    pub ids: IdConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub labels: LabelConfig,
}

/// Input and output locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Enriched disease records (JSON array of objects).
    pub input_path: PathBuf,
    /// Append-only node array read by the document-style runtime.
    pub json_store: PathBuf,
    /// Where previous versions of `json_store` are rotated to.
    pub backup_dir: PathBuf,
    /// Relational seed script destination.
    pub sql_output: PathBuf,
    /// Local SQLite store the SQLite-dialect script can be applied to.
    pub db_path: PathBuf,
    /// Root under which one folder per image-bearing result is reserved.
    pub image_root: PathBuf,
    /// Fingerprints of batches already applied per target.
    pub ledger_path: PathBuf,
    pub log_level: String,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("enriched_diseases.json"),
            json_store: PathBuf::from("data/responses_full.json"),
            backup_dir: PathBuf::from("data/backups"),
            sql_output: PathBuf::from("data/seed_data.sql"),
            db_path: PathBuf::from("data/triage.db"),
            image_root: PathBuf::from("public/images/diseases"),
            ledger_path: PathBuf::from("data/batch_ledger.json"),
            log_level: "info".to_string(),
        }
    }
}

/// Identifier floors per namespace
///
/// Floors sit above every id used by hand-authored seed data. Allocation
/// starts at the floor or one past the highest id observed in the target
/// store, whichever is higher.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdConfig {
    pub action_floor: i64,
    pub response_floor: i64,
    pub entry_point_floor: i64,
    /// Refuse relational runs that cannot observe the store maximum.
    pub require_store_max: bool,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            action_floor: 10_000,
            response_floor: 10_000,
            entry_point_floor: 5_000,
            require_store_max: false,
        }
    }
}

/// Record normalization settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Maximum length of display names, in characters.
    pub name_max_chars: usize,
    /// Skip records without a usable name instead of failing the batch.
    pub skip_invalid_records: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            name_max_chars: 400,
            skip_invalid_records: true,
        }
    }
}

/// User-facing texts placed into the graph
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// First question; `{disease}` is replaced by the lowercased disease name.
    pub symptom_question: String,
    pub severity_question: String,
    pub yes: String,
    pub no: String,
    pub dog_group: String,
    pub cat_group: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            symptom_question: "Does your pet show the symptom of {disease}?".to_string(),
            severity_question: "Is the symptom severe (e.g., vomiting, bloody diarrhea)?".to_string(),
            yes: "Yes".to_string(),
            no: "No".to_string(),
            dog_group: "All disease symptoms (Dog)".to_string(),
            cat_group: "All disease symptoms (Cat)".to_string(),
        }
    }
}

impl LabelConfig {
    pub fn symptom_question_for(&self, disease_name: &str) -> String {
        self.symptom_question
            .replace("{disease}", &disease_name.to_lowercase())
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in TRIAGE_CONFIG environment variable (must exist)
    /// 2. ./config.toml in current directory (defaults are used when absent)
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let (config_path, explicit) = match std::env::var("TRIAGE_CONFIG") {
            Ok(path) => (PathBuf::from(path), true),
            Err(_) => (PathBuf::from("config.toml"), false),
        };

        if !explicit && !config_path.exists() {
            log::info!("No config.toml found, using built-in defaults");
            let config = Config::default();
            config.validate()?;
            return Ok(config);
        }

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.ids.action_floor <= 0 {
            anyhow::bail!("ids.action_floor must be greater than 0");
        }

        if self.ids.response_floor <= 0 {
            anyhow::bail!("ids.response_floor must be greater than 0");
        }

        if self.ids.entry_point_floor <= 0 {
            anyhow::bail!("ids.entry_point_floor must be greater than 0");
        }

        if self.normalize.name_max_chars == 0 {
            anyhow::bail!("normalize.name_max_chars must be greater than 0");
        }

        if !self.labels.symptom_question.contains("{disease}") {
            anyhow::bail!("labels.symptom_question must contain the {{disease}} placeholder");
        }

        if self.labels.yes.trim().is_empty()
            || self.labels.no.trim().is_empty()
            || self.labels.yes == self.labels.no
        {
            anyhow::bail!("labels.yes and labels.no must be distinct, non-empty answers");
        }

        Ok(())
    }

    pub fn json_store(&self) -> &Path {
        &self.triage.json_store
    }

    pub fn db_path(&self) -> &Path {
        &self.triage.db_path
    }
}
