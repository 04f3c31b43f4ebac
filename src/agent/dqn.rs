use std::path::Path;

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::debug;

use super::{Agent, Exploration, ReplayBuffer, Transition, argmax};
use crate::{
    config::DqnConfig,
    error::{Error, Result},
    estimator::QEstimator,
    game::{Action, Direction},
    persistence,
};

/// Deep Q-learning with experience replay and a target network.
///
/// `online` is trained every step once the buffer holds a full batch;
/// `target` only changes through `sync_target`.
pub struct DqnAgent<E: QEstimator + Clone> {
    online: E,
    target: E,
    replay: ReplayBuffer,

    batch_size: usize,
    gamma: f32,
    exploration: Exploration,

    rng: StdRng,
    updates: usize,
}

impl<E: QEstimator + Clone> DqnAgent<E> {
    pub fn new(online: E, config: &DqnConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        if online.output_size() != Direction::COUNT {
            return Err(Error::config(format!(
                "estimator must output {} action values, got {}",
                Direction::COUNT,
                online.output_size()
            )));
        }
        let target = online.clone();

        Ok(Self {
            online,
            target,
            replay: ReplayBuffer::new(config.buffer_capacity),
            batch_size: config.batch_size,
            gamma: config.gamma,
            exploration: Exploration::new(config.epsilon, config.epsilon_min, config.epsilon_decay),
            rng: StdRng::seed_from_u64(seed),
            updates: 0,
        })
    }

    pub fn online(&self) -> &E {
        &self.online
    }

    pub fn online_mut(&mut self) -> &mut E {
        &mut self.online
    }

    pub fn target(&self) -> &E {
        &self.target
    }

    pub fn replay(&self) -> &ReplayBuffer {
        &self.replay
    }

    /// Number of gradient updates applied so far.
    pub fn updates(&self) -> usize {
        self.updates
    }

    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.exploration.set_epsilon(epsilon);
    }

    pub fn q_values(&mut self, state: &[f32]) -> Result<Vec<f32>> {
        let mut rows = self.online.predict(&[state.to_vec()])?;
        rows.pop().ok_or(Error::EmptyBatch { operation: "predict" })
    }

    /// Regression targets for a sampled batch.
    ///
    /// Starts from the online predictions so untaken actions contribute no
    /// error, then overwrites the taken action with `r` on terminal
    /// transitions and `r + γ · max Q_target(s')` otherwise.
    fn targets(&mut self, batch: &[&Transition]) -> Result<(Vec<Vec<f32>>, Vec<Vec<f32>>)> {
        let states: Vec<Vec<f32>> = batch.iter().map(|t| t.state.clone()).collect();
        let next_states: Vec<Vec<f32>> = batch.iter().map(|t| t.next_state.clone()).collect();

        let next_q = self.target.predict(&next_states)?;
        let mut targets = self.online.predict(&states)?;

        for ((transition, row), next) in batch.iter().zip(targets.iter_mut()).zip(&next_q) {
            let value = if transition.done {
                transition.reward
            } else {
                let max_next = next.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                transition.reward + self.gamma * max_next
            };
            row[transition.action.index()] = value;
        }

        Ok((states, targets))
    }
}

impl<E: QEstimator + Clone> Agent for DqnAgent<E> {
    fn act(&mut self, state: &[f32]) -> Result<Action> {
        if self.rng.random::<f32>() < self.exploration.epsilon() {
            return Ok(Direction::ALL[self.rng.random_range(0..Direction::COUNT)]);
        }
        self.greedy_action(state)
    }

    fn greedy_action(&mut self, state: &[f32]) -> Result<Action> {
        let q = self.q_values(state)?;
        Direction::from_index(argmax(&q))
    }

    fn remember(&mut self, transition: Transition) -> Result<()> {
        self.replay.add(transition);
        Ok(())
    }

    fn learn(&mut self) -> Result<Option<f32>> {
        if self.replay.len() < self.batch_size {
            return Ok(None);
        }

        let batch: Vec<Transition> = self
            .replay
            .sample(&mut self.rng, self.batch_size)?
            .into_iter()
            .cloned()
            .collect();
        let batch: Vec<&Transition> = batch.iter().collect();
        let (states, targets) = self.targets(&batch)?;

        let loss = self.online.fit_batch(&states, &targets)?;
        self.exploration.decay();
        self.updates += 1;
        debug!(loss, epsilon = self.exploration.epsilon(), updates = self.updates, "dqn update");

        Ok(Some(loss))
    }

    fn sync_target(&mut self) -> Result<()> {
        self.target.set_parameters(&self.online.parameters())?;
        debug!(updates = self.updates, "target network synced");
        Ok(())
    }

    fn epsilon(&self) -> f32 {
        self.exploration.epsilon()
    }

    fn save(&self, location: &Path) -> Result<()> {
        persistence::save_estimator(&self.online, location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        estimator::{ParamBlock, Parameters},
        sequential::{Sequential, loss::MeanSquaredError, optimizer::SGD},
    };

    fn assert_vec_approx_eq(a: &[f32], b: &[f32]) {
        let tolerance = 1e-5;
        assert_eq!(a.len(), b.len(), "vectors have different lengths");
        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            assert!((x - y).abs() < tolerance, "mismatch at index {}: {} vs {}", i, x, y);
        }
    }

    /// Predicts a constant row per network and records the last fit.
    #[derive(Clone)]
    struct Constant {
        value: [f32; 4],
        fitted: Option<(Vec<Vec<f32>>, Vec<Vec<f32>>)>,
    }

    impl Constant {
        fn new(value: [f32; 4]) -> Self {
            Self { value, fitted: None }
        }
    }

    impl QEstimator for Constant {
        fn input_size(&self) -> usize {
            2
        }

        fn output_size(&self) -> usize {
            4
        }

        fn predict(&mut self, states: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
            Ok(states.iter().map(|_| self.value.to_vec()).collect())
        }

        fn fit_batch(&mut self, states: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<f32> {
            self.fitted = Some((states.to_vec(), targets.to_vec()));
            Ok(0.5)
        }

        fn parameters(&self) -> Parameters {
            Parameters {
                blocks: vec![ParamBlock {
                    shape: [1, 4],
                    values: self.value.to_vec(),
                }],
            }
        }

        fn set_parameters(&mut self, parameters: &Parameters) -> Result<()> {
            parameters.check_layout(&[[1, 4]])?;
            self.value.copy_from_slice(&parameters.blocks[0].values);
            Ok(())
        }
    }

    fn config(batch_size: usize) -> DqnConfig {
        DqnConfig {
            batch_size,
            buffer_capacity: 100,
            gamma: 0.5,
            epsilon: 1.0,
            epsilon_min: 0.1,
            epsilon_decay: 0.5,
            ..DqnConfig::default()
        }
    }

    fn transition(action: Direction, reward: f32, done: bool) -> Transition {
        Transition {
            state: vec![0.0, 1.0],
            action,
            reward,
            next_state: vec![1.0, 0.0],
            done,
        }
    }

    #[test]
    fn test_no_update_below_batch_size() {
        let mut agent = DqnAgent::new(Constant::new([0.0; 4]), &config(4), 0).unwrap();
        for _ in 0..3 {
            agent.remember(transition(Direction::Up, 1.0, false)).unwrap();
        }
        assert_eq!(agent.learn().unwrap(), None);
        assert_eq!(agent.epsilon(), 1.0);
        assert!(agent.online().fitted.is_none());

        agent.remember(transition(Direction::Up, 1.0, false)).unwrap();
        assert_eq!(agent.learn().unwrap(), Some(0.5));
        assert_eq!(agent.epsilon(), 0.5);
        assert_eq!(agent.updates(), 1);
    }

    #[test]
    fn test_targets_only_touch_taken_action() {
        let mut agent = DqnAgent::new(Constant::new([1.0, 2.0, 3.0, 4.0]), &config(1), 0).unwrap();
        // target network predicts a max of 8 for every next state
        agent.target.value = [8.0, -1.0, 0.0, 2.0];

        agent.remember(transition(Direction::Right, 1.0, false)).unwrap();
        agent.learn().unwrap();
        let (_, targets) = agent.online().fitted.clone().unwrap();
        // 1 + 0.5 * 8 written into slot 1 only
        assert_vec_approx_eq(&targets[0], &[1.0, 5.0, 3.0, 4.0]);
    }

    #[test]
    fn test_terminal_target_is_reward_only() {
        let mut agent = DqnAgent::new(Constant::new([1.0, 2.0, 3.0, 4.0]), &config(1), 0).unwrap();
        agent.target.value = [8.0, 8.0, 8.0, 8.0];

        agent.remember(transition(Direction::Down, -10.0, true)).unwrap();
        agent.learn().unwrap();
        let (_, targets) = agent.online().fitted.clone().unwrap();
        assert_vec_approx_eq(&targets[0], &[1.0, 2.0, 3.0, -10.0]);
    }

    #[test]
    fn test_sync_target_copies_online_parameters() {
        let mut agent = DqnAgent::new(Constant::new([1.0, 2.0, 3.0, 4.0]), &config(1), 0).unwrap();
        agent.online_mut().value = [9.0, 9.0, 9.0, 9.0];
        assert_ne!(agent.target().parameters(), agent.online().parameters());

        agent.sync_target().unwrap();
        assert_eq!(agent.target().parameters(), agent.online().parameters());
    }

    #[test]
    fn test_greedy_action_uses_online_network() {
        let mut agent = DqnAgent::new(Constant::new([0.1, 0.2, 0.9, 0.3]), &config(1), 0).unwrap();
        assert_eq!(agent.greedy_action(&[0.0, 0.0]).unwrap(), Direction::Up);

        agent.set_epsilon(0.0);
        for _ in 0..10 {
            assert_eq!(agent.act(&[0.0, 0.0]).unwrap(), Direction::Up);
        }
    }

    #[test]
    fn test_rejects_wrong_action_count() {
        let net = Sequential::mlp(
            2,
            &[4],
            3,
            Box::new(MeanSquaredError),
            Box::new(SGD::new(0.1)),
            &mut StdRng::seed_from_u64(0),
        );
        assert!(matches!(
            DqnAgent::new(net, &config(1), 0),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_sequential_agent_learns_from_replay() {
        let net = Sequential::mlp(
            2,
            &[8],
            4,
            Box::new(MeanSquaredError),
            Box::new(SGD::new(0.01)),
            &mut StdRng::seed_from_u64(1),
        );
        let mut agent = DqnAgent::new(net, &config(2), 3).unwrap();

        // exploration works before anything is stored
        agent.act(&[0.0, 1.0]).unwrap();

        for _ in 0..4 {
            agent.remember(transition(Direction::Left, 1.0, true)).unwrap();
        }
        let before = agent.q_values(&[0.0, 1.0]).unwrap()[0];
        for _ in 0..50 {
            agent.learn().unwrap();
        }
        let after = agent.q_values(&[0.0, 1.0]).unwrap()[0];
        assert!((after - 1.0).abs() < (before - 1.0).abs());
        assert_eq!(agent.epsilon(), 0.1);
    }
}
