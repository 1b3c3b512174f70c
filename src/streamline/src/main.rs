//! Streamline: movie recommendations from rating history.
//!
//! `serve` trains the configured model and answers HTTP requests,
//! `evaluate` scores a model offline, and `simulate` replays an
//! epsilon-greedy A/B test between two strategies.

use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use streamline_api::{ApiServer, ContextHandle};
use streamline_core::config::{AppConfig, Strategy};
use streamline_core::{load_interactions, Interaction};
use streamline_evaluation::{precision_at_k, Evaluator, GroundTruth};
use streamline_models::{Recommender, RecommenderModel};
use streamline_rl_engine::{AbSimulator, Arm};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "streamline")]
#[command(about = "Movie recommendation engine with offline evaluation")]
#[command(version)]
struct Cli {
    /// Configuration file (without extension)
    #[arg(long, env = "STREAMLINE_CONFIG", default_value = "config")]
    config: String,

    /// Ratings CSV (overrides config)
    #[arg(long, env = "STREAMLINE__DATA__INTERACTIONS_PATH", global = true)]
    ratings: Option<String>,

    /// Movie metadata CSV (overrides config)
    #[arg(long, env = "STREAMLINE__DATA__MOVIES_PATH", global = true)]
    movies: Option<String>,

    /// Recommender strategy (overrides config)
    #[arg(long, env = "STREAMLINE__MODEL__STRATEGY", global = true)]
    strategy: Option<Strategy>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the configured model and serve recommendations over HTTP
    Serve(ServeArgs),
    /// Train the configured model and print offline ranking metrics
    Evaluate(EvaluateArgs),
    /// Run an epsilon-greedy A/B simulation between two strategies
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// HTTP port (overrides config)
    #[arg(long, env = "STREAMLINE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Expose Prometheus metrics on the configured metrics port
    #[arg(long, default_value_t = false)]
    metrics: bool,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Ranking cutoff
    #[arg(short, long)]
    k: Option<usize>,

    /// Number of users to sample
    #[arg(long)]
    sample_size: Option<usize>,

    /// Seed for the user sampler
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Exploration rate in [0, 1]
    #[arg(long)]
    epsilon: Option<f64>,

    /// Number of rounds to play
    #[arg(long)]
    rounds: Option<usize>,

    /// Strategy for arm B; arm A uses the configured strategy
    #[arg(long)]
    challenger: Option<Strategy>,

    /// Seed for arm selection and user draws
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamline=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load_from(&cli.config)?;

    if let Some(path) = cli.ratings {
        config.data.interactions_path = path;
    }
    if let Some(path) = cli.movies {
        config.data.movies_path = path;
    }
    if let Some(strategy) = cli.strategy {
        config.model.strategy = strategy;
    }

    match cli.command {
        Command::Serve(args) => {
            if let Some(port) = args.http_port {
                config.api.http_port = port;
            }
            if args.metrics {
                config.metrics.enabled = true;
            }
            config.validate()?;
            serve(config).await
        }
        Command::Evaluate(args) => {
            if let Some(k) = args.k {
                config.evaluation.k = k;
            }
            if let Some(sample_size) = args.sample_size {
                config.evaluation.sample_size = sample_size;
            }
            if args.seed.is_some() {
                config.evaluation.seed = args.seed;
            }
            config.validate()?;
            tokio::task::spawn_blocking(move || evaluate(&config)).await?
        }
        Command::Simulate(args) => {
            if let Some(epsilon) = args.epsilon {
                config.simulation.epsilon = epsilon;
            }
            if let Some(rounds) = args.rounds {
                config.simulation.rounds = rounds;
            }
            if let Some(challenger) = args.challenger {
                config.simulation.challenger = challenger;
            }
            config.validate()?;
            let seed = args.seed;
            tokio::task::spawn_blocking(move || simulate(&config, seed)).await?
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    info!(
        strategy = %config.model.strategy,
        http_port = config.api.http_port,
        interactions_path = %config.data.interactions_path,
        "Streamline starting up"
    );

    let api_server = ApiServer::new(config.clone(), ContextHandle::new());

    if config.metrics.enabled {
        if let Err(e) = api_server.start_metrics().await {
            error!(error = %e, "Failed to start metrics exporter");
        }
    }

    // Requests get 503 until training finishes.
    api_server.spawn_training();

    api_server.start_http().await?;
    Ok(())
}

fn evaluate(config: &AppConfig) -> anyhow::Result<()> {
    let interactions = load_interactions(&config.data.interactions_path)?;
    let model = RecommenderModel::train(&interactions, &config.model)?;

    let mut evaluator = Evaluator::from_config(&config.evaluation)?;
    let result = evaluator.evaluate_model(&model, &interactions, config.evaluation.k)?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn simulate(config: &AppConfig, seed: Option<u64>) -> anyhow::Result<()> {
    let interactions = load_interactions(&config.data.interactions_path)?;
    let incumbent = RecommenderModel::train(&interactions, &config.model)?;

    let mut challenger_config = config.model.clone();
    challenger_config.strategy = config.simulation.challenger;
    let challenger = RecommenderModel::train(&interactions, &challenger_config)?;

    info!(
        a = %incumbent.strategy(),
        b = %challenger.strategy(),
        epsilon = config.simulation.epsilon,
        rounds = config.simulation.rounds,
        "Starting A/B simulation"
    );

    let truth = GroundTruth::from_interactions(&interactions);
    let simulator = AbSimulator::from_config(&config.simulation)?;
    let k = config.evaluation.k;

    let (mut arm_rng, mut user_rng) = match seed {
        Some(seed) => (StdRng::seed_from_u64(seed), StdRng::seed_from_u64(seed.wrapping_add(1))),
        None => (StdRng::from_entropy(), StdRng::from_entropy()),
    };

    let report = simulator.run_with(&mut arm_rng, config.simulation.rounds, |arm| {
        let model = match arm {
            Arm::A => &incumbent,
            Arm::B => &challenger,
        };
        hit_rate(model, &interactions, &truth, k, &mut user_rng)
    });

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Share of a random user's top-k that the user actually interacted with.
/// A model that cannot serve the user earns nothing.
fn hit_rate(
    model: &RecommenderModel,
    interactions: &[Interaction],
    truth: &GroundTruth,
    k: usize,
    rng: &mut StdRng,
) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let user_id = truth.users()[rng.gen_range(0..truth.len())];
    let Some(relevant) = truth.items(user_id) else {
        return 0.0;
    };
    let recommended = match model.recommend(user_id, interactions, k) {
        Ok(recommendations) => model.resolve_items(&recommendations),
        Err(e) => {
            warn!(error = %e, user_id, "Recommendation failed during simulation");
            return 0.0;
        }
    };
    precision_at_k(&recommended, relevant, k).unwrap_or(0.0)
}
