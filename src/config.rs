//! Configuration file support and profile presets.
//!
//! Effective settings are resolved in layers, later overriding earlier:
//! 1. built-in defaults (the `deep` profile)
//! 2. the selected profile preset (`fast` / `deep` / `max`)
//! 3. `~/.config/seqsift/config.toml` (user defaults)
//! 4. `.seqsift.toml` in the working directory (project overrides)
//! 5. CLI flags
//!
//! Every knob the matching core honours lives here; the core itself never
//! reads global state.

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::model::ComponentTransform;

/// Search effort preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Fast,
    Deep,
    Max,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Fast => "fast",
            Profile::Deep => "deep",
            Profile::Max => "max",
        }
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(Profile::Fast),
            "deep" => Ok(Profile::Deep),
            "max" => Ok(Profile::Max),
            other => Err(format!("unknown profile '{}' (fast|deep|max)", other)),
        }
    }
}

/// Transform-stage settings.
#[derive(Debug, Clone)]
pub struct TransformConfig {
    pub scale_values: Vec<i64>,
    pub affine_offsets: Vec<i64>,
    pub shift_max: usize,
    pub decimate_values: Vec<usize>,
    pub movsum_windows: Vec<usize>,
    pub digit_sum_bases: Vec<u32>,
    pub mod_values: Vec<i64>,
    pub concat_bases: Vec<u32>,
    pub log_bases: Vec<u32>,
    pub exp_bases: Vec<u32>,
    /// Weight for the classical transforms (binomial, Euler, Mobius); kept
    /// configurable rather than hard-coded.
    pub classical_weight: u32,
    /// Explicit operator allow-list overriding the profile tiers.
    pub operator_set: Option<Vec<String>>,
    /// Chain depth override; `None` follows the profile.
    pub max_depth: Option<usize>,
    /// Wall-clock override in milliseconds; `None` follows the profile.
    pub max_time_ms: Option<u64>,
    pub min_variance: f64,
    pub max_chains: usize,
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig {
            scale_values: vec![-3, -2, -1, 2, 3],
            affine_offsets: vec![-2, -1, 1, 2],
            shift_max: 2,
            decimate_values: vec![2, 3],
            movsum_windows: vec![2, 3, 4],
            digit_sum_bases: vec![10],
            mod_values: vec![2, 3],
            concat_bases: vec![10],
            log_bases: vec![2, 10],
            exp_bases: vec![2],
            classical_weight: 3,
            operator_set: None,
            max_depth: None,
            max_time_ms: None,
            min_variance: 0.0,
            max_chains: 100_000,
        }
    }
}

impl TransformConfig {
    pub fn max_depth_for(&self, profile: Profile) -> usize {
        self.max_depth.unwrap_or(match profile {
            Profile::Fast => 1,
            Profile::Deep => 2,
            Profile::Max => 3,
        })
    }

    pub fn max_time_ms_for(&self, profile: Profile) -> u64 {
        self.max_time_ms.unwrap_or(match profile {
            Profile::Fast => 1_000,
            Profile::Deep => 2_000,
            Profile::Max => 60_000,
        })
    }
}

/// Similarity-stage settings.
#[derive(Debug, Clone)]
pub struct SimilarityConfig {
    pub min_corr: f64,
    pub max_nmse: f64,
    pub top_k: usize,
    /// Opt-in growth-rate band for candidate selection. Polynomial
    /// sequences have length-dependent fitted exponents, so this stays off
    /// unless a deployment knows its queries are exponential-like.
    pub growth_band_delta: Option<f64>,
    pub max_time_ms: u64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        SimilarityConfig {
            min_corr: 0.9,
            max_nmse: 0.1,
            top_k: 100,
            growth_band_delta: None,
            max_time_ms: 2_000,
        }
    }
}

/// Pair-combination settings.
#[derive(Debug, Clone)]
pub struct ComboConfig {
    pub bucket_size: usize,
    pub integer_coeffs: Vec<i64>,
    pub rational: bool,
    pub coeff_denom_max: i64,
    pub coeff_num_max: i64,
    pub max_shift: u32,
    pub max_shift_back: u32,
    pub component_transforms: Vec<ComponentTransform>,
    pub max_checks: u64,
    pub max_time_ms: u64,
}

impl Default for ComboConfig {
    fn default() -> Self {
        ComboConfig {
            bucket_size: 60,
            integer_coeffs: (-5..=5).collect(),
            rational: true,
            coeff_denom_max: 12,
            coeff_num_max: 20,
            max_shift: 3,
            max_shift_back: 1,
            component_transforms: vec![
                ComponentTransform::Identity,
                ComponentTransform::Diff,
                ComponentTransform::PartialSum,
            ],
            max_checks: 200_000,
            max_time_ms: 5_000,
        }
    }
}

/// Triple-combination settings.
#[derive(Debug, Clone)]
pub struct TripleConfig {
    pub enabled: bool,
    pub bucket_cap: usize,
    pub max_checks: u64,
    pub max_time_ms: u64,
}

impl Default for TripleConfig {
    fn default() -> Self {
        TripleConfig {
            enabled: true,
            bucket_cap: 30,
            max_checks: 200_000,
            max_time_ms: 5_000,
        }
    }
}

/// Which pipeline stages run.
#[derive(Debug, Clone)]
pub struct StageToggles {
    pub exact: bool,
    pub transform: bool,
    pub similarity: bool,
    pub combination: bool,
}

impl Default for StageToggles {
    fn default() -> Self {
        StageToggles {
            exact: true,
            transform: true,
            similarity: true,
            combination: true,
        }
    }
}

/// The full, resolved configuration threaded through every analysis call.
#[derive(Debug, Clone)]
pub struct Config {
    pub profile: Profile,
    pub min_match_length: usize,
    pub allow_subsequence: bool,
    pub max_wildcards: usize,
    pub max_stored_terms: usize,
    pub transform: TransformConfig,
    pub similarity: SimilarityConfig,
    pub combo: ComboConfig,
    pub triple: TripleConfig,
    pub stages: StageToggles,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            profile: Profile::Deep,
            min_match_length: 3,
            allow_subsequence: false,
            max_wildcards: 2,
            max_stored_terms: 64,
            transform: TransformConfig::default(),
            similarity: SimilarityConfig::default(),
            combo: ComboConfig::default(),
            triple: TripleConfig::default(),
            stages: StageToggles::default(),
        }
    }
}

/// Hard ceiling on the combination bucket, whatever the config asks for.
pub const BUCKET_HARD_CAP: usize = 200;

impl Config {
    /// Apply a profile preset in bulk. Runs before config files and CLI
    /// flags, so explicit settings still win.
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        match profile {
            Profile::Fast => {
                self.similarity.top_k = 50;
                self.combo.bucket_size = 30;
                self.combo.max_checks = 50_000;
                self.combo.max_time_ms = 1_000;
                self.triple.enabled = false;
            }
            Profile::Deep => {}
            Profile::Max => {
                self.transform.max_chains = 1_000_000;
                self.combo.max_checks = 5_000_000;
                self.combo.max_time_ms = 600_000;
                self.triple.max_checks = 1_000_000;
                self.triple.max_time_ms = 600_000;
            }
        }
        self
    }

    /// Load layered configuration: defaults, profile, user file, project
    /// file.
    pub fn load(profile: Profile, working_dir: &Path) -> Self {
        let mut config = Config::default().with_profile(profile);
        let user_path = dirs::config_dir().map(|d| d.join("seqsift/config.toml"));
        if let Some(path) = user_path {
            if let Some(file) = FileConfig::load_file(&path) {
                file.apply(&mut config);
            }
        }
        if let Some(file) = FileConfig::load_file(&working_dir.join(".seqsift.toml")) {
            file.apply(&mut config);
        }
        config.combo.bucket_size = config.combo.bucket_size.min(BUCKET_HARD_CAP);
        config
    }
}

/// On-disk TOML shape: every field optional, unset fields keep the layered
/// value underneath.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub min_match_length: Option<usize>,
    pub allow_subsequence: Option<bool>,
    pub max_wildcards: Option<usize>,
    pub max_stored_terms: Option<usize>,
    pub transform: TransformOverrides,
    pub similarity: SimilarityOverrides,
    pub combo: ComboOverrides,
    pub triple: TripleOverrides,
    pub stages: StageOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TransformOverrides {
    pub scale_values: Option<Vec<i64>>,
    pub affine_offsets: Option<Vec<i64>>,
    pub operator_set: Option<Vec<String>>,
    pub classical_weight: Option<u32>,
    pub max_depth: Option<usize>,
    pub max_time_ms: Option<u64>,
    pub min_variance: Option<f64>,
    pub max_chains: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SimilarityOverrides {
    pub min_corr: Option<f64>,
    pub max_nmse: Option<f64>,
    pub top_k: Option<usize>,
    pub growth_band_delta: Option<f64>,
    pub max_time_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ComboOverrides {
    pub bucket_size: Option<usize>,
    pub integer_coeffs: Option<Vec<i64>>,
    pub rational: Option<bool>,
    pub coeff_denom_max: Option<i64>,
    pub coeff_num_max: Option<i64>,
    pub max_shift: Option<u32>,
    pub max_shift_back: Option<u32>,
    pub component_transforms: Option<Vec<String>>,
    pub max_checks: Option<u64>,
    pub max_time_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TripleOverrides {
    pub enabled: Option<bool>,
    pub bucket_cap: Option<usize>,
    pub max_checks: Option<u64>,
    pub max_time_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StageOverrides {
    pub exact: Option<bool>,
    pub transform: Option<bool>,
    pub similarity: Option<bool>,
    pub combination: Option<bool>,
}

macro_rules! merge {
    ($dst:expr, $src:expr) => {
        if let Some(v) = $src {
            $dst = v;
        }
    };
}

impl FileConfig {
    fn load_file(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("failed to read config {}: {}", path.display(), e);
                return None;
            }
        };
        match toml::from_str::<Self>(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded config");
                Some(config)
            }
            Err(e) => {
                tracing::warn!("failed to parse config {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn apply(self, config: &mut Config) {
        merge!(config.min_match_length, self.min_match_length);
        merge!(config.allow_subsequence, self.allow_subsequence);
        merge!(config.max_wildcards, self.max_wildcards);
        merge!(config.max_stored_terms, self.max_stored_terms);

        merge!(config.transform.scale_values, self.transform.scale_values);
        merge!(config.transform.affine_offsets, self.transform.affine_offsets);
        merge!(config.transform.classical_weight, self.transform.classical_weight);
        merge!(config.transform.min_variance, self.transform.min_variance);
        merge!(config.transform.max_chains, self.transform.max_chains);
        if self.transform.operator_set.is_some() {
            config.transform.operator_set = self.transform.operator_set;
        }
        if self.transform.max_depth.is_some() {
            config.transform.max_depth = self.transform.max_depth;
        }
        if self.transform.max_time_ms.is_some() {
            config.transform.max_time_ms = self.transform.max_time_ms;
        }

        merge!(config.similarity.min_corr, self.similarity.min_corr);
        merge!(config.similarity.max_nmse, self.similarity.max_nmse);
        merge!(config.similarity.top_k, self.similarity.top_k);
        merge!(config.similarity.max_time_ms, self.similarity.max_time_ms);
        if self.similarity.growth_band_delta.is_some() {
            config.similarity.growth_band_delta = self.similarity.growth_band_delta;
        }

        merge!(config.combo.bucket_size, self.combo.bucket_size);
        merge!(config.combo.integer_coeffs, self.combo.integer_coeffs);
        merge!(config.combo.rational, self.combo.rational);
        merge!(config.combo.coeff_denom_max, self.combo.coeff_denom_max);
        merge!(config.combo.coeff_num_max, self.combo.coeff_num_max);
        merge!(config.combo.max_shift, self.combo.max_shift);
        merge!(config.combo.max_shift_back, self.combo.max_shift_back);
        merge!(config.combo.max_checks, self.combo.max_checks);
        merge!(config.combo.max_time_ms, self.combo.max_time_ms);
        if let Some(names) = self.combo.component_transforms {
            let parsed: Vec<ComponentTransform> = names
                .iter()
                .filter_map(|n| match n.as_str() {
                    "id" | "identity" => Some(ComponentTransform::Identity),
                    "diff" => Some(ComponentTransform::Diff),
                    "psum" | "partial_sum" => Some(ComponentTransform::PartialSum),
                    other => {
                        tracing::warn!("unknown component transform '{}', ignored", other);
                        None
                    }
                })
                .collect();
            if !parsed.is_empty() {
                config.combo.component_transforms = parsed;
            }
        }

        merge!(config.triple.enabled, self.triple.enabled);
        merge!(config.triple.bucket_cap, self.triple.bucket_cap);
        merge!(config.triple.max_checks, self.triple.max_checks);
        merge!(config.triple.max_time_ms, self.triple.max_time_ms);

        merge!(config.stages.exact, self.stages.exact);
        merge!(config.stages.transform, self.stages.transform);
        merge!(config.stages.similarity, self.stages.similarity);
        merge!(config.stages.combination, self.stages.combination);
    }
}
