//! Engine configuration
//!
//! Thresholds, detector toggles and embedding settings. Config is resolved in
//! three layers:
//! 1. A threshold preset (default, conservative, aggressive)
//! 2. The embedded `config/engine.toml` or an override file in the data dir
//!    (~/.local/share/ledgerlens/config/engine.toml), or an explicit path
//! 3. Values present in that file replace the preset's
//!
//! Every field in the TOML is optional. Unknown keys are a config error.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::RULE_VERSION;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/engine.toml");

/// Named threshold presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Default,
    /// Fewer, stronger signals
    Conservative,
    /// More signals at lower amounts
    Aggressive,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Conservative => "conservative",
            Self::Aggressive => "aggressive",
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        match self {
            Self::Default => Thresholds::default(),
            Self::Conservative => Thresholds::conservative(),
            Self::Aggressive => Thresholds::aggressive(),
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "conservative" => Ok(Self::Conservative),
            "aggressive" => Ok(Self::Aggressive),
            _ => Err(format!("Unknown preset: {}", s)),
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Detector thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub large_amount_threshold: f64,
    pub very_large_amount_threshold: f64,
    pub z_score_critical: f64,
    pub z_score_high: f64,
    pub z_score_medium: f64,
    pub z_score_low: f64,
    pub iqr_multiplier: f64,
    pub duplicate_time_window_days: i64,
    pub duplicate_amount_tolerance: f64,
    pub round_amount_min: f64,
    pub unknown_merchant_threshold: f64,
    pub new_merchant_multiplier: f64,
    /// Debits below this are never examined by the amount detectors
    pub min_amount: f64,
    pub rare_merchant_multiplier: f64,
    /// Recent spend above this multiple of the expected three-day spend is a spike
    pub spending_spike_multiplier: f64,
    /// Smallest transfer counted towards repeated large transfers
    pub large_transfer_min: f64,
    pub large_transfer_cumulative: f64,
    pub large_transfer_window_days: i64,
    pub recurring_high_value_min: f64,
    pub large_bill_amount: f64,
    /// Income below this share of the expected month-to-date is a disruption
    pub income_ratio_threshold: f64,
    /// Income is not judged before this day of the month
    pub income_check_min_day: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            large_amount_threshold: 50_000.0,
            very_large_amount_threshold: 100_000.0,
            z_score_critical: 4.5,
            z_score_high: 3.5,
            z_score_medium: 3.0,
            z_score_low: 2.5,
            iqr_multiplier: 1.5,
            duplicate_time_window_days: 3,
            duplicate_amount_tolerance: 0.01,
            round_amount_min: 50_000.0,
            unknown_merchant_threshold: 20_000.0,
            new_merchant_multiplier: 5.0,
            min_amount: 1_000.0,
            rare_merchant_multiplier: 2.0,
            spending_spike_multiplier: 2.0,
            large_transfer_min: 30_000.0,
            large_transfer_cumulative: 100_000.0,
            large_transfer_window_days: 7,
            recurring_high_value_min: 10_000.0,
            large_bill_amount: 50_000.0,
            income_ratio_threshold: 0.70,
            income_check_min_day: 15,
        }
    }
}

impl Thresholds {
    /// Stricter z-scores and higher amount thresholds
    pub fn conservative() -> Self {
        Self {
            large_amount_threshold: 100_000.0,
            very_large_amount_threshold: 200_000.0,
            z_score_critical: 5.0,
            z_score_high: 4.0,
            z_score_medium: 3.5,
            z_score_low: 3.0,
            iqr_multiplier: 2.0,
            round_amount_min: 100_000.0,
            unknown_merchant_threshold: 50_000.0,
            new_merchant_multiplier: 8.0,
            ..Self::default()
        }
    }

    /// Looser z-scores and lower amount thresholds
    pub fn aggressive() -> Self {
        Self {
            large_amount_threshold: 25_000.0,
            very_large_amount_threshold: 50_000.0,
            z_score_critical: 4.0,
            z_score_high: 3.0,
            z_score_medium: 2.5,
            z_score_low: 2.0,
            iqr_multiplier: 1.2,
            round_amount_min: 25_000.0,
            unknown_merchant_threshold: 10_000.0,
            new_merchant_multiplier: 3.0,
            ..Self::default()
        }
    }

    /// Reject thresholds the detectors cannot work with
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("large_amount_threshold", self.large_amount_threshold),
            ("very_large_amount_threshold", self.very_large_amount_threshold),
            ("z_score_low", self.z_score_low),
            ("iqr_multiplier", self.iqr_multiplier),
            ("round_amount_min", self.round_amount_min),
            ("unknown_merchant_threshold", self.unknown_merchant_threshold),
            ("new_merchant_multiplier", self.new_merchant_multiplier),
            ("min_amount", self.min_amount),
            ("rare_merchant_multiplier", self.rare_merchant_multiplier),
            ("spending_spike_multiplier", self.spending_spike_multiplier),
            ("large_transfer_min", self.large_transfer_min),
            ("large_transfer_cumulative", self.large_transfer_cumulative),
            ("recurring_high_value_min", self.recurring_high_value_min),
            ("large_bill_amount", self.large_bill_amount),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!("{} must be positive, got {}", name, value)));
            }
        }
        if self.duplicate_time_window_days < 0 || self.large_transfer_window_days <= 0 {
            return Err(Error::Config("Day windows must not be negative".into()));
        }
        if !(self.z_score_critical > self.z_score_high
            && self.z_score_high > self.z_score_medium
            && self.z_score_medium > self.z_score_low)
        {
            return Err(Error::Config(
                "z-score bands must be strictly descending from critical to low".into(),
            ));
        }
        if self.very_large_amount_threshold <= self.large_amount_threshold {
            return Err(Error::Config(
                "very_large_amount_threshold must exceed large_amount_threshold".into(),
            ));
        }
        for (name, value) in [
            ("duplicate_amount_tolerance", self.duplicate_amount_tolerance),
            ("income_ratio_threshold", self.income_ratio_threshold),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(Error::Config(format!("{} must be in (0, 1), got {}", name, value)));
            }
        }
        if !(1..=31).contains(&self.income_check_min_day) {
            return Err(Error::Config("income_check_min_day must be a day of month".into()));
        }
        Ok(())
    }
}

/// Which detectors the engine runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorToggles {
    pub rule: bool,
    pub statistical: bool,
    pub duplicate: bool,
    pub pattern: bool,
    pub income: bool,
    pub ml: bool,
}

impl Default for DetectorToggles {
    fn default() -> Self {
        Self {
            rule: true,
            statistical: true,
            duplicate: true,
            pattern: true,
            income: true,
            ml: true,
        }
    }
}

/// Embedding provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    /// Concurrent outbound requests during a batch
    pub max_concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            max_concurrency: 5,
            timeout_secs: 60,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub rule_version: String,
    pub preset: Preset,
    pub thresholds: Thresholds,
    pub detectors: DetectorToggles,
    /// Recent transactions kept for the duplicate and pattern detectors
    pub history_window: usize,
    /// How far back the duplicate detector scans
    pub duplicate_scan_window: usize,
    /// Account holder, used by self-transfer detection
    pub customer_name: Option<String>,
    pub embedding: EmbeddingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::with_preset(Preset::Default)
    }
}

impl EngineConfig {
    pub fn with_preset(preset: Preset) -> Self {
        Self {
            rule_version: RULE_VERSION.to_string(),
            preset,
            thresholds: preset.thresholds(),
            detectors: DetectorToggles::default(),
            history_window: 100,
            duplicate_scan_window: 50,
            customer_name: None,
            embedding: EmbeddingConfig::default(),
        }
    }

    /// Load from the override location (or `path`), falling back to the
    /// embedded defaults. An explicit `preset` beats the one in the file.
    pub fn load(path: Option<&Path>, preset: Option<Preset>) -> Result<Self> {
        let content = match path {
            Some(p) => fs::read_to_string(p).map_err(|e| {
                Error::Config(format!("Failed to read config {}: {}", p.display(), e))
            })?,
            None => match default_config_path() {
                Some(p) if p.exists() => fs::read_to_string(&p)
                    .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?,
                _ => DEFAULT_CONFIG.to_string(),
            },
        };
        parse_config(&content, preset)
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        if self.history_window == 0 {
            return Err(Error::Config("history_window must be at least 1".into()));
        }
        if self.embedding.max_concurrency == 0 {
            return Err(Error::Config("embedding.max_concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("ledgerlens").join("config").join("engine.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    engine: Option<RawEngine>,
    thresholds: Option<RawThresholds>,
    detectors: Option<RawDetectors>,
    embedding: Option<RawEmbedding>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEngine {
    preset: Option<String>,
    history_window: Option<usize>,
    duplicate_scan_window: Option<usize>,
    customer_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawThresholds {
    large_amount_threshold: Option<f64>,
    very_large_amount_threshold: Option<f64>,
    z_score_critical: Option<f64>,
    z_score_high: Option<f64>,
    z_score_medium: Option<f64>,
    z_score_low: Option<f64>,
    iqr_multiplier: Option<f64>,
    duplicate_time_window_days: Option<i64>,
    duplicate_amount_tolerance: Option<f64>,
    round_amount_min: Option<f64>,
    unknown_merchant_threshold: Option<f64>,
    new_merchant_multiplier: Option<f64>,
    min_amount: Option<f64>,
    rare_merchant_multiplier: Option<f64>,
    spending_spike_multiplier: Option<f64>,
    large_transfer_min: Option<f64>,
    large_transfer_cumulative: Option<f64>,
    large_transfer_window_days: Option<i64>,
    recurring_high_value_min: Option<f64>,
    large_bill_amount: Option<f64>,
    income_ratio_threshold: Option<f64>,
    income_check_min_day: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDetectors {
    rule: Option<bool>,
    statistical: Option<bool>,
    duplicate: Option<bool>,
    pattern: Option<bool>,
    income: Option<bool>,
    ml: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEmbedding {
    base_url: Option<String>,
    model: Option<String>,
    max_concurrency: Option<usize>,
    timeout_secs: Option<u64>,
}

/// Copy every `Some` field of a raw struct onto its target
macro_rules! merge {
    ($target:expr, $raw:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $raw.$field {
                $target.$field = value;
            }
        )+
    };
}

/// Parse config from TOML content
fn parse_config(content: &str, preset: Option<Preset>) -> Result<EngineConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let file_preset = raw
        .engine
        .as_ref()
        .and_then(|e| e.preset.as_deref())
        .map(str::parse::<Preset>)
        .transpose()
        .map_err(Error::Config)?;
    let preset = preset.or(file_preset).unwrap_or_default();
    let mut config = EngineConfig::with_preset(preset);

    if let Some(engine) = raw.engine {
        merge!(config, engine, history_window, duplicate_scan_window);
        if let Some(name) = engine.customer_name.filter(|n| !n.trim().is_empty()) {
            config.customer_name = Some(name);
        }
    }

    if let Some(t) = raw.thresholds {
        merge!(
            config.thresholds,
            t,
            large_amount_threshold,
            very_large_amount_threshold,
            z_score_critical,
            z_score_high,
            z_score_medium,
            z_score_low,
            iqr_multiplier,
            duplicate_time_window_days,
            duplicate_amount_tolerance,
            round_amount_min,
            unknown_merchant_threshold,
            new_merchant_multiplier,
            min_amount,
            rare_merchant_multiplier,
            spending_spike_multiplier,
            large_transfer_min,
            large_transfer_cumulative,
            large_transfer_window_days,
            recurring_high_value_min,
            large_bill_amount,
            income_ratio_threshold,
            income_check_min_day,
        );
    }

    if let Some(d) = raw.detectors {
        merge!(config.detectors, d, rule, statistical, duplicate, pattern, income, ml);
    }

    if let Some(e) = raw.embedding {
        merge!(config.embedding, e, base_url, model, max_concurrency, timeout_secs);
    }

    debug!(preset = %config.preset, "Loaded engine config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG, None).unwrap();
        assert_eq!(config.preset, Preset::Default);
        assert_eq!(config.thresholds, Thresholds::default());
        assert_eq!(config.history_window, 100);
        assert_eq!(config.duplicate_scan_window, 50);
        assert_eq!(config.embedding.max_concurrency, 5);
        assert_eq!(config.rule_version, RULE_VERSION);
        config.validate().unwrap();
    }

    #[test]
    fn test_presets_validate() {
        for preset in [Preset::Default, Preset::Conservative, Preset::Aggressive] {
            preset.thresholds().validate().unwrap();
        }
        let c = Thresholds::conservative();
        let a = Thresholds::aggressive();
        assert!(c.z_score_critical > a.z_score_critical);
        assert!(c.large_amount_threshold > a.large_amount_threshold);
    }

    #[test]
    fn test_explicit_preset_beats_file() {
        let toml = r#"
            [engine]
            preset = "conservative"
        "#;
        let config = parse_config(toml, Some(Preset::Aggressive)).unwrap();
        assert_eq!(config.preset, Preset::Aggressive);
        assert_eq!(config.thresholds.z_score_critical, 4.0);

        let config = parse_config(toml, None).unwrap();
        assert_eq!(config.preset, Preset::Conservative);
    }

    #[test]
    fn test_file_values_override_preset() {
        let toml = r#"
            [thresholds]
            round_amount_min = 75000.0

            [detectors]
            duplicate = false

            [engine]
            customer_name = "Kalpit Sharma"
        "#;
        let config = parse_config(toml, None).unwrap();
        assert_eq!(config.thresholds.round_amount_min, 75_000.0);
        assert_eq!(config.thresholds.z_score_high, 3.5);
        assert!(!config.detectors.duplicate);
        assert!(config.detectors.rule);
        assert_eq!(config.customer_name.as_deref(), Some("Kalpit Sharma"));
    }

    #[test]
    fn test_every_threshold_is_configurable() {
        let custom = Thresholds {
            large_amount_threshold: 60_000.0,
            very_large_amount_threshold: 120_000.0,
            z_score_critical: 6.0,
            z_score_high: 5.0,
            z_score_medium: 4.0,
            z_score_low: 3.0,
            iqr_multiplier: 2.5,
            duplicate_time_window_days: 5,
            duplicate_amount_tolerance: 0.02,
            round_amount_min: 70_000.0,
            unknown_merchant_threshold: 25_000.0,
            new_merchant_multiplier: 6.0,
            min_amount: 1_500.0,
            rare_merchant_multiplier: 9.0,
            spending_spike_multiplier: 4.0,
            large_transfer_min: 35_000.0,
            large_transfer_cumulative: 150_000.0,
            large_transfer_window_days: 10,
            recurring_high_value_min: 12_000.0,
            large_bill_amount: 55_000.0,
            income_ratio_threshold: 0.6,
            income_check_min_day: 3,
        };
        let toml = format!("[thresholds]\n{}", toml::to_string(&custom).unwrap());
        let config = parse_config(&toml, None).unwrap();
        assert_eq!(config.thresholds, custom);
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        let toml = "[thresholds]\nrare_merchant_multipler = 9.0\n";
        assert!(matches!(parse_config(toml, None), Err(Error::Config(_))));

        let toml = "[detectors]\nstatistcal = false\n";
        assert!(matches!(parse_config(toml, None), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut t = Thresholds::default();
        t.z_score_high = 5.0;
        assert!(matches!(t.validate(), Err(Error::Config(_))));

        let mut t = Thresholds::default();
        t.duplicate_amount_tolerance = 1.5;
        assert!(matches!(t.validate(), Err(Error::Config(_))));

        let mut t = Thresholds::default();
        t.large_amount_threshold = -1.0;
        assert!(matches!(t.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            parse_config("[engine\nbroken", None),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_config("[engine]\npreset = \"reckless\"", None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(&path, "[engine]\nhistory_window = 25\n").unwrap();
        let config = EngineConfig::load(Some(&path), None).unwrap();
        assert_eq!(config.history_window, 25);

        let missing = dir.path().join("missing.toml");
        assert!(EngineConfig::load(Some(&missing), None).is_err());
    }
}
