use crate::error::{RecoError, RecoResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Root application configuration. Loaded from an optional `config` file
/// (yaml/toml/json) overlaid with environment variables prefixed
/// `STREAMLINE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_interactions_path")]
    pub interactions_path: String,
    #[serde(default = "default_movies_path")]
    pub movies_path: String,
}

/// Which recommender family to train and which options it gets.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub knn: KnnConfig,
    #[serde(default)]
    pub factorization: FactorizationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KnnConfig {
    #[serde(default = "default_k_neighbors")]
    pub k_neighbors: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
    #[serde(default)]
    pub algorithm: SearchAlgorithm,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FactorizationConfig {
    #[serde(default = "default_factors")]
    pub factors: usize,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_eval_k")]
    pub k: usize,
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Fixed seed for the user sampler; entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default = "default_rounds")]
    pub rounds: usize,
    #[serde(default = "default_challenger")]
    pub challenger: Strategy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Popularity,
    #[default]
    ItemKnn,
    MatrixFactorization,
}

/// Distance function used by the item neighbor index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    Manhattan,
}

/// Neighbor search strategy. Sparse item vectors are always searched
/// exhaustively; the tree variants are accepted for compatibility and
/// resolve to brute force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchAlgorithm {
    Auto,
    #[default]
    Brute,
    BallTree,
    KdTree,
}

// Default functions
fn default_interactions_path() -> String {
    "data/ratings.csv".to_string()
}
fn default_movies_path() -> String {
    "data/movies.csv".to_string()
}
fn default_k_neighbors() -> usize {
    20
}
fn default_factors() -> usize {
    50
}
fn default_iterations() -> usize {
    20
}
fn default_eval_k() -> usize {
    10
}
fn default_sample_size() -> usize {
    100
}
fn default_epsilon() -> f64 {
    0.1
}
fn default_rounds() -> usize {
    1000
}
fn default_challenger() -> Strategy {
    Strategy::Popularity
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8000
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            interactions_path: default_interactions_path(),
            movies_path: default_movies_path(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            knn: KnnConfig::default(),
            factorization: FactorizationConfig::default(),
        }
    }
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self {
            k_neighbors: default_k_neighbors(),
            metric: DistanceMetric::default(),
            algorithm: SearchAlgorithm::default(),
        }
    }
}

impl Default for FactorizationConfig {
    fn default() -> Self {
        Self {
            factors: default_factors(),
            iterations: default_iterations(),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            k: default_eval_k(),
            sample_size: default_sample_size(),
            seed: None,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            rounds: default_rounds(),
            challenger: default_challenger(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            model: ModelConfig::default(),
            evaluation: EvaluationConfig::default(),
            simulation: SimulationConfig::default(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl KnnConfig {
    pub fn validate(&self) -> RecoResult<()> {
        if self.k_neighbors == 0 {
            return Err(RecoError::Config(
                "knn.k_neighbors must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl FactorizationConfig {
    pub fn validate(&self) -> RecoResult<()> {
        if self.factors == 0 {
            return Err(RecoError::Config(
                "factorization.factors must be greater than zero".to_string(),
            ));
        }
        if self.iterations == 0 {
            return Err(RecoError::Config(
                "factorization.iterations must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl ModelConfig {
    /// Validate only the section the selected strategy reads.
    pub fn validate(&self) -> RecoResult<()> {
        match self.strategy {
            Strategy::Popularity => Ok(()),
            Strategy::ItemKnn => self.knn.validate(),
            Strategy::MatrixFactorization => self.factorization.validate(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the optional `config` file and environment.
    pub fn load() -> RecoResult<Self> {
        Self::load_from("config")
    }

    /// Load configuration using `path` (extension optional) as the file source.
    /// A missing file yields defaults; a file or variable that does not
    /// deserialize is a `Config` error.
    pub fn load_from(path: &str) -> RecoResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("STREAMLINE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| RecoError::Config(format!("{path}: {e}")))
    }

    pub fn validate(&self) -> RecoResult<()> {
        self.model.validate()?;
        if self.evaluation.k == 0 {
            return Err(RecoError::InvalidCutoff(0));
        }
        if !(0.0..=1.0).contains(&self.simulation.epsilon) {
            return Err(RecoError::Config(format!(
                "simulation.epsilon must lie in [0, 1], got {}",
                self.simulation.epsilon
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Popularity => "popularity",
            Strategy::ItemKnn => "item_knn",
            Strategy::MatrixFactorization => "matrix_factorization",
        };
        f.write_str(name)
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "popularity" => Ok(Strategy::Popularity),
            "item_knn" | "knn" => Ok(Strategy::ItemKnn),
            "matrix_factorization" | "mf" | "svd" => Ok(Strategy::MatrixFactorization),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "manhattan" | "cityblock" | "l1" => Ok(DistanceMetric::Manhattan),
            other => Err(format!("unknown distance metric: {other}")),
        }
    }
}

impl FromStr for SearchAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(SearchAlgorithm::Auto),
            "brute" => Ok(SearchAlgorithm::Brute),
            "ball_tree" => Ok(SearchAlgorithm::BallTree),
            "kd_tree" => Ok(SearchAlgorithm::KdTree),
            other => Err(format!("unknown search algorithm: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.evaluation.k, 10);
        assert_eq!(config.evaluation.sample_size, 100);
        assert_eq!(config.model.strategy, Strategy::ItemKnn);
    }

    #[test]
    fn test_zero_neighbors_rejected() {
        let config = KnnConfig {
            k_neighbors: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RecoError::Config(_))));
    }

    #[test]
    fn test_zero_factors_and_iterations_rejected() {
        let factors = FactorizationConfig {
            factors: 0,
            iterations: 5,
        };
        assert!(factors.validate().is_err());
        let iterations = FactorizationConfig {
            factors: 5,
            iterations: 0,
        };
        assert!(iterations.validate().is_err());
    }

    #[test]
    fn test_only_selected_strategy_is_validated() {
        let config = ModelConfig {
            strategy: Strategy::Popularity,
            knn: KnnConfig {
                k_neighbors: 0,
                ..Default::default()
            },
            factorization: FactorizationConfig::default(),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_epsilon_out_of_range_rejected() {
        let mut config = AppConfig::default();
        config.simulation.epsilon = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("cosine".parse::<DistanceMetric>(), Ok(DistanceMetric::Cosine));
        assert_eq!("cityblock".parse::<DistanceMetric>(), Ok(DistanceMetric::Manhattan));
        assert_eq!("kd_tree".parse::<SearchAlgorithm>(), Ok(SearchAlgorithm::KdTree));
        assert_eq!("mf".parse::<Strategy>(), Ok(Strategy::MatrixFactorization));
        assert!("hamming".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn test_deserialize_model_section() {
        let json = r#"{"strategy": "matrix_factorization",
                       "knn": {"k_neighbors": 5, "metric": "euclidean", "algorithm": "auto"},
                       "factorization": {"factors": 8, "iterations": 3}}"#;
        let config: ModelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.strategy, Strategy::MatrixFactorization);
        assert_eq!(config.knn.metric, DistanceMetric::Euclidean);
        assert_eq!(config.knn.algorithm, SearchAlgorithm::Auto);
        assert_eq!(config.factorization.factors, 8);
    }

    fn write_config(name: &str, body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "streamline-{}-{name}.json",
            std::process::id()
        ));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("streamline-no-such-config");
        let config = AppConfig::load_from(&path.display().to_string()).unwrap();
        assert_eq!(config.model.strategy, Strategy::ItemKnn);
    }

    #[test]
    fn test_load_from_reads_file() {
        let path = write_config(
            "good",
            r#"{"model": {"strategy": "matrix_factorization", "factorization": {"factors": 4}}}"#,
        );
        let config = AppConfig::load_from(&path.display().to_string()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.model.strategy, Strategy::MatrixFactorization);
        assert_eq!(config.model.factorization.factors, 4);
    }

    #[test]
    fn test_load_from_rejects_unknown_metric() {
        let path = write_config(
            "bad-metric",
            r#"{"model": {"strategy": "matrix_factorization", "knn": {"metric": "hamming"}}}"#,
        );
        let result = AppConfig::load_from(&path.display().to_string());
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(RecoError::Config(_))));
    }
}
