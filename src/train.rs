//! Episode orchestration
//!
//! Reset, act, step, remember, learn until the episode ends or hits the
//! step cap; sync the target on a fixed episode cadence; report.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::{debug, info};

use crate::{
    agent::{Agent, Transition},
    config::TrainingConfig,
    error::{Error, Result},
    game::{CollisionKind, GridWorld, StepOutcome},
};

/// Why an episode stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeEnd {
    Terminal(StepOutcome),
    /// Truncated by `max_steps_per_episode`; the last transition is not terminal.
    StepCap,
}

impl EpisodeEnd {
    pub fn label(self) -> &'static str {
        match self {
            EpisodeEnd::Terminal(StepOutcome::Collision(CollisionKind::Wall)) => "wall",
            EpisodeEnd::Terminal(StepOutcome::Collision(CollisionKind::Body)) => "body",
            EpisodeEnd::Terminal(StepOutcome::BoardFull) => "board_full",
            EpisodeEnd::Terminal(_) => "terminal",
            EpisodeEnd::StepCap => "step_cap",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    /// 1-based
    pub episode: usize,
    pub steps: usize,
    pub total_reward: f32,
    pub score: usize,
    pub epsilon: f32,
    pub end: EpisodeEnd,
    /// Mean loss over the updates made this episode, if any.
    pub mean_loss: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingReport {
    pub episodes: Vec<EpisodeSummary>,
}

impl TrainingReport {
    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn best_score(&self) -> usize {
        self.episodes.iter().map(|e| e.score).max().unwrap_or(0)
    }

    pub fn mean_reward(&self) -> f32 {
        if self.episodes.is_empty() {
            return 0.0;
        }
        self.episodes.iter().map(|e| e.total_reward).sum::<f32>() / self.episodes.len() as f32
    }

    pub fn mean_score(&self) -> f32 {
        if self.episodes.is_empty() {
            return 0.0;
        }
        self.episodes.iter().map(|e| e.score as f32).sum::<f32>() / self.episodes.len() as f32
    }
}

pub struct TrainingLoop {
    config: TrainingConfig,
    save_to: Option<PathBuf>,
}

impl TrainingLoop {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, save_to: None })
    }

    /// Persist the agent here once the last episode finishes.
    pub fn save_to(mut self, location: impl Into<PathBuf>) -> Self {
        self.save_to = Some(location.into());
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train for the configured number of episodes. `on_episode` sees every
    /// summary as soon as it is produced; an error from it stops the run.
    pub fn run<A, F>(&self, world: &mut GridWorld, agent: &mut A, mut on_episode: F) -> Result<TrainingReport>
    where
        A: Agent + ?Sized,
        F: FnMut(&EpisodeSummary) -> Result<()>,
    {
        let mut report = TrainingReport::default();

        for episode in 1..=self.config.episodes {
            let summary = self.play_episode(world, agent, episode, true)?;
            if episode % self.config.target_sync_every == 0 {
                agent.sync_target()?;
            }

            info!(
                episode,
                steps = summary.steps,
                total_reward = summary.total_reward,
                score = summary.score,
                epsilon = summary.epsilon,
                end = summary.end.label(),
                "episode finished"
            );
            on_episode(&summary)?;
            report.episodes.push(summary);
        }

        if let Some(location) = &self.save_to {
            agent.save(location)?;
            info!(path = %location.display(), "saved agent");
        }

        Ok(report)
    }

    /// One learning episode.
    pub fn run_episode<A: Agent + ?Sized>(
        &self,
        world: &mut GridWorld,
        agent: &mut A,
        episode: usize,
    ) -> Result<EpisodeSummary> {
        self.play_episode(world, agent, episode, true)
    }

    /// Greedy episodes with no learning and no exploration.
    pub fn evaluate<A: Agent + ?Sized>(
        &self,
        world: &mut GridWorld,
        agent: &mut A,
        episodes: usize,
    ) -> Result<TrainingReport> {
        let mut report = TrainingReport::default();
        for episode in 1..=episodes {
            let summary = self.play_episode(world, agent, episode, false)?;
            info!(
                episode,
                steps = summary.steps,
                score = summary.score,
                end = summary.end.label(),
                "evaluation episode"
            );
            report.episodes.push(summary);
        }
        Ok(report)
    }

    fn play_episode<A: Agent + ?Sized>(
        &self,
        world: &mut GridWorld,
        agent: &mut A,
        episode: usize,
        learning: bool,
    ) -> Result<EpisodeSummary> {
        let mut state = world.reset();
        world.render();

        let mut total_reward = 0.0;
        let mut losses = Vec::new();
        let mut steps = 0;
        let mut end = EpisodeEnd::StepCap;

        while steps < self.config.max_steps_per_episode {
            let action = if learning {
                agent.act(&state)?
            } else {
                agent.greedy_action(&state)?
            };
            let step = world.step(action)?;
            world.render();
            steps += 1;
            total_reward += step.reward;

            if learning {
                agent.remember(Transition {
                    state,
                    action,
                    reward: step.reward,
                    next_state: step.features.clone(),
                    done: step.done,
                })?;
                if let Some(loss) = agent.learn()? {
                    losses.push(loss);
                }
            }

            state = step.features;
            if step.done {
                end = EpisodeEnd::Terminal(step.info.outcome);
                break;
            }
        }

        if learning {
            agent.end_episode();
        }
        if end == EpisodeEnd::StepCap {
            debug!(episode, steps, "episode truncated at step cap");
        }

        let mean_loss = (!losses.is_empty()).then(|| losses.iter().sum::<f32>() / losses.len() as f32);
        Ok(EpisodeSummary {
            episode,
            steps,
            total_reward,
            score: world.state().score(),
            epsilon: agent.epsilon(),
            end,
            mean_loss,
        })
    }
}

#[derive(Serialize)]
struct EpisodeRow {
    episode: usize,
    steps: usize,
    total_reward: f32,
    score: usize,
    epsilon: f32,
    end: &'static str,
    mean_loss: Option<f32>,
}

/// One CSV row per episode.
pub struct EpisodeLog {
    writer: csv::Writer<File>,
}

impl EpisodeLog {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::io(format!("create {}", path.display()), source))?;
        Ok(Self {
            writer: csv::Writer::from_writer(file),
        })
    }

    pub fn record(&mut self, summary: &EpisodeSummary) -> Result<()> {
        self.writer.serialize(EpisodeRow {
            episode: summary.episode,
            steps: summary.steps,
            total_reward: summary.total_reward,
            score: summary.score,
            epsilon: summary.epsilon,
            end: summary.end.label(),
            mean_loss: summary.mean_loss,
        })?;
        self.writer
            .flush()
            .map_err(|source| Error::io("flush episode log", source))
    }
}
