use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rand::{SeedableRng, rngs::StdRng};
use tracing::info;

use snake_rl::{
    Agent, Config, DqnAgent, EpisodeLog, GridWorld, LoadPolicy, Sequential, TabularAgent, TrainingLoop,
    game::Direction,
    persistence::{load_q_table, restore_estimator},
};

#[derive(Parser)]
#[command(name = "train")]
#[command(version, about = "Train a snake-playing agent")]
struct Cli {
    /// JSON config file; every field falls back to its default
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "dqn")]
    agent: AgentKind,

    /// Override the configured episode count
    #[arg(long)]
    episodes: Option<usize>,

    /// Override the configured seed
    #[arg(long)]
    seed: Option<u64>,

    /// Where to save the trained model
    #[arg(long, default_value = "input/snake_agent.bin")]
    output: PathBuf,

    /// Continue training from a saved model
    #[arg(long)]
    resume: Option<PathBuf>,

    /// With --resume, start from fresh weights if the model file does not exist
    #[arg(long, requires = "resume")]
    fresh_if_missing: bool,

    /// Write one CSV row per episode
    #[arg(long)]
    log_csv: Option<PathBuf>,

    /// Greedy evaluation episodes to play after training
    #[arg(long, default_value = "0")]
    evaluate: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum AgentKind {
    /// Deep Q-network with replay and a target network
    Dqn,
    /// Tabular Q-learning over discretized features
    Tabular,
}

fn main() -> Result<()> {
    snake_rl::logging::init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(episodes) = cli.episodes {
        config.training.episodes = episodes;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    config.validate().context("invalid configuration")?;

    let policy = if cli.fresh_if_missing {
        LoadPolicy::FreshIfMissing
    } else {
        LoadPolicy::Require
    };

    let mut world = GridWorld::new(&config.env, config.seed)?;
    let mut agent = build_agent(&cli, &config, world.feature_count(), policy)?;

    let training = TrainingLoop::new(config.training.clone())?.save_to(&cli.output);
    let mut log = cli
        .log_csv
        .as_ref()
        .map(|path| EpisodeLog::create(path).with_context(|| format!("creating {}", path.display())))
        .transpose()?;

    info!(
        episodes = config.training.episodes,
        width = config.env.width,
        height = config.env.height,
        "starting training"
    );
    let report = training.run(&mut world, agent.as_mut(), |summary| match log.as_mut() {
        Some(log) => log.record(summary),
        None => Ok(()),
    })?;
    info!(
        best_score = report.best_score(),
        mean_reward = report.mean_reward(),
        output = %cli.output.display(),
        "training finished"
    );

    if cli.evaluate > 0 {
        let evaluation = training.evaluate(&mut world, agent.as_mut(), cli.evaluate)?;
        info!(
            best_score = evaluation.best_score(),
            mean_score = evaluation.mean_score(),
            "evaluation finished"
        );
    }

    Ok(())
}

fn build_agent(cli: &Cli, config: &Config, features: usize, policy: LoadPolicy) -> Result<Box<dyn Agent>> {
    match cli.agent {
        AgentKind::Dqn => {
            // weights get their own stream so exploration does not shift init
            let mut init_rng = StdRng::seed_from_u64(config.seed ^ 0x5eed);
            let mut network = Sequential::from_config(&config.dqn, features, Direction::COUNT, &mut init_rng);
            if let Some(path) = &cli.resume {
                restore_estimator(&mut network, path, policy)
                    .with_context(|| format!("restoring model {}", path.display()))?;
            }
            Ok(Box::new(DqnAgent::new(network, &config.dqn, config.seed)?))
        }
        AgentKind::Tabular => {
            let mut agent = TabularAgent::new(&config.tabular, config.seed);
            if let Some(path) = &cli.resume {
                match load_q_table(path) {
                    Ok(table) => agent = agent.with_q_table(table),
                    Err(snake_rl::Error::ModelNotFound { .. }) if policy == LoadPolicy::FreshIfMissing => {
                        tracing::warn!(path = %path.display(), "no saved q-table, starting empty");
                    }
                    Err(err) => {
                        return Err(err).with_context(|| format!("restoring q-table {}", path.display()));
                    }
                }
            }
            Ok(Box::new(agent))
        }
    }
}
