pub mod reward;
pub mod state;

pub use reward::{DistanceShaping, RewardKind, RewardPolicy, StepPenalty};
pub use state::{Action, Cell, Direction, GridState};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;

use crate::{
    config::EnvConfig,
    encoder::StateEncoder,
    error::{Error, Result},
    render::{Frame, Presenter},
};

/// What hit the snake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionKind {
    Wall,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Moved,
    Ate,
    Collision(CollisionKind),
    /// The snake filled every cell; the episode is won.
    BoardFull,
}

impl StepOutcome {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepOutcome::Collision(_) | StepOutcome::BoardFull)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepInfo {
    pub outcome: StepOutcome,
    /// The request was the exact opposite of the heading and was replaced by "straight".
    pub reversal_ignored: bool,
    pub score: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub features: Vec<f32>,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

/// Deterministic snake environment.
///
/// Owns the game state, the reward policy, the configured encoder and the
/// RNG used for food placement. Nothing here performs I/O.
pub struct GridWorld {
    width: i32,
    height: i32,
    state: GridState,
    reward: Box<dyn RewardPolicy>,
    encoder: Box<dyn StateEncoder>,
    rng: StdRng,
    done: bool,
    presenter: Option<Box<dyn Presenter>>,
}

impl GridWorld {
    pub const INITIAL_HEADING: Direction = Direction::Right;

    pub fn new(config: &EnvConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let center = (config.width / 2, config.height / 2);
        let state = GridState::single(config.width, config.height, center, Self::INITIAL_HEADING);

        let mut world = Self {
            width: config.width,
            height: config.height,
            state,
            reward: config.reward.build(),
            encoder: config.encoder.build(),
            rng: StdRng::seed_from_u64(seed),
            done: false,
            presenter: None,
        };
        world.reset();

        Ok(world)
    }

    pub fn state(&self) -> &GridState {
        &self.state
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn feature_count(&self) -> usize {
        self.encoder.feature_count()
    }

    pub fn features(&self) -> Vec<f32> {
        self.encoder.encode(&self.state)
    }

    /// Single-segment snake at the grid center heading right, fresh food.
    pub fn reset(&mut self) -> Vec<f32> {
        let center = (self.width / 2, self.height / 2);
        let mut state = GridState::single(self.width, self.height, center, Self::INITIAL_HEADING);
        let food = spawn_food(&state, &mut self.rng);
        state.set_spawned_food(food);

        self.state = state;
        self.done = false;
        self.features()
    }

    /// Replace the whole game state, e.g. to script a scenario. Clears the terminal flag.
    pub fn load_state(&mut self, state: GridState) -> Result<()> {
        if state.width() != self.width || state.height() != self.height {
            return Err(Error::InvalidState {
                message: format!(
                    "state is {}x{} but the world is {}x{}",
                    state.width(),
                    state.height(),
                    self.width,
                    self.height
                ),
            });
        }
        self.state = state;
        self.done = false;
        Ok(())
    }

    /// Move the food to a specific free cell.
    pub fn place_food(&mut self, cell: Cell) -> Result<()> {
        self.state.set_food(Some(cell))
    }

    /// Integer action boundary: 0=LEFT, 1=RIGHT, 2=UP, 3=DOWN.
    pub fn step_index(&mut self, action: usize) -> Result<Step> {
        self.step(Direction::from_index(action)?)
    }

    pub fn step(&mut self, action: Action) -> Result<Step> {
        if self.done {
            return Err(Error::StepAfterTerminal);
        }

        let current = self.state.heading();
        let reversal_ignored = action == current.opposite();
        let heading = if reversal_ignored { current } else { action };
        self.state.set_heading(heading);

        let old_head = self.state.head();
        let new_head = heading.step_from(old_head);

        // the lethal move is not committed: body stays as it was
        if self.state.is_collision(new_head) {
            let kind = if self.state.in_bounds(new_head) {
                CollisionKind::Body
            } else {
                CollisionKind::Wall
            };
            return Ok(self.finish(self.reward.collision(), StepOutcome::Collision(kind), reversal_ignored));
        }

        let food = self.state.food();
        self.state.push_head(new_head);

        let (reward, outcome) = match food {
            Some(food) if food == new_head => {
                let next = spawn_food(&self.state, &mut self.rng);
                self.state.set_spawned_food(next);
                let outcome = if next.is_none() { StepOutcome::BoardFull } else { StepOutcome::Ate };
                (self.reward.food(), outcome)
            }
            Some(food) => {
                self.state.pop_tail();
                (self.reward.shaping(old_head, new_head, food), StepOutcome::Moved)
            }
            None => {
                self.state.pop_tail();
                (0.0, StepOutcome::Moved)
            }
        };

        Ok(self.finish(reward, outcome, reversal_ignored))
    }

    fn finish(&mut self, reward: f32, outcome: StepOutcome, reversal_ignored: bool) -> Step {
        self.done = outcome.is_terminal();
        Step {
            features: self.features(),
            reward,
            done: self.done,
            info: StepInfo {
                outcome,
                reversal_ignored,
                score: self.state.score(),
            },
        }
    }

    pub fn attach_presenter(&mut self, presenter: Box<dyn Presenter>) {
        self.presenter = Some(presenter);
    }

    pub fn detach_presenter(&mut self) -> Option<Box<dyn Presenter>> {
        self.presenter.take()
    }

    /// Hand the current frame to the attached presenter, if any.
    pub fn render(&mut self) {
        if let Some(presenter) = self.presenter.as_mut() {
            presenter.present(&Frame::capture(&self.state));
        }
    }
}

/// Uniform random free cell, or `None` when the snake covers the board.
///
/// Rejection sampling first; once the board is crowded enough that it keeps
/// missing, fall back to drawing from the explicit list of free cells.
fn spawn_food(state: &GridState, rng: &mut StdRng) -> Option<Cell> {
    if state.is_full() {
        return None;
    }

    let attempts = state.area().saturating_mul(4);
    for _ in 0..attempts {
        let cell = (rng.random_range(0..state.width()), rng.random_range(0..state.height()));
        if !state.occupies(cell) {
            return Some(cell);
        }
    }

    let free = state.free_cells();
    if free.is_empty() {
        None
    } else {
        Some(free[rng.random_range(0..free.len())])
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::encoder::EncoderKind;

    fn world(width: i32, height: i32, seed: u64) -> GridWorld {
        let config = EnvConfig {
            width,
            height,
            ..EnvConfig::default()
        };
        GridWorld::new(&config, seed).unwrap()
    }

    fn assert_invariants(state: &GridState) {
        let body: Vec<Cell> = state.body().copied().collect();
        assert_eq!(state.head(), *body.last().unwrap());
        let unique: std::collections::HashSet<Cell> = body.iter().copied().collect();
        assert_eq!(unique.len(), body.len(), "body cells must be distinct");
        for cell in &body {
            assert!(state.in_bounds(*cell));
        }
        if let Some(food) = state.food() {
            assert!(!state.occupies(food));
        }
    }

    #[test]
    fn test_reset_places_single_segment_at_center() {
        let mut world = world(10, 10, 3);
        let features = world.reset();
        assert_eq!(features.len(), 11);
        assert_eq!(world.state().body().copied().collect::<Vec<_>>(), vec![(5, 5)]);
        assert_eq!(world.state().heading(), Direction::Right);
        let food = world.state().food().unwrap();
        assert_ne!(food, (5, 5));
        assert!(!world.is_done());
    }

    #[test]
    fn test_reset_food_takes_the_only_free_cell() {
        for seed in 0..20 {
            let mut world = world(2, 1, seed);
            world.reset();
            assert_eq!(world.state().head(), (1, 0));
            assert_eq!(world.state().food(), Some((0, 0)));
        }
    }

    #[test]
    fn test_reset_is_deterministic_for_a_seed() {
        let a = world(20, 20, 42);
        let b = world(20, 20, 42);
        assert_eq!(a.state().food(), b.state().food());
    }

    #[test]
    fn test_reversal_at_start_continues_straight() {
        let mut reversed = world(10, 10, 9);
        let mut straight = world(10, 10, 9);

        let a = reversed.step(Direction::Left).unwrap();
        let b = straight.step(Direction::Right).unwrap();

        assert!(a.info.reversal_ignored);
        assert!(!b.info.reversal_ignored);
        assert_eq!(reversed.state().head(), (6, 5));
        assert_eq!(reversed.state().head(), straight.state().head());
        assert_eq!(reversed.state().heading(), Direction::Right);
        assert_eq!(a.reward, b.reward);
        assert_eq!(a.features, b.features);
    }

    #[test]
    fn test_eating_grows_body_and_respawns_food_off_body() {
        let mut world = world(10, 10, 1);
        world.place_food((7, 5)).unwrap();

        let first = world.step(Direction::Right).unwrap();
        assert_eq!(first.info.outcome, StepOutcome::Moved);
        assert_eq!(world.state().len(), 1);

        let second = world.step(Direction::Right).unwrap();
        assert_eq!(second.info.outcome, StepOutcome::Ate);
        assert_eq!(second.reward, 10.0);
        assert_eq!(world.state().head(), (7, 5));
        assert_eq!(world.state().len(), 2);
        let food = world.state().food().unwrap();
        assert!(!world.state().occupies(food));
        assert_invariants(world.state());
    }

    #[test]
    fn test_wall_collision_keeps_body_and_ends_episode() {
        let mut world = world(5, 5, 0);
        let state = GridState::new(5, 5, vec![(0, 2)], Direction::Left, Some((4, 4))).unwrap();
        world.load_state(state).unwrap();

        let step = world.step(Direction::Left).unwrap();
        assert!(step.done);
        assert_eq!(step.reward, -10.0);
        assert_eq!(step.info.outcome, StepOutcome::Collision(CollisionKind::Wall));
        assert_eq!(world.state().body().copied().collect::<Vec<_>>(), vec![(0, 2)]);
    }

    #[test]
    fn test_body_collision() {
        let mut world = world(6, 6, 0);
        // head at (2,2) heading up, body curls so that turning left hits (1,2)
        let body = vec![(1, 2), (1, 3), (2, 3), (2, 2)];
        world
            .load_state(GridState::new(6, 6, body.clone(), Direction::Up, Some((5, 5))).unwrap())
            .unwrap();

        let step = world.step(Direction::Left).unwrap();
        assert!(step.done);
        assert_eq!(step.info.outcome, StepOutcome::Collision(CollisionKind::Body));
        assert_eq!(world.state().body().copied().collect::<Vec<_>>(), body);
    }

    #[test]
    fn test_step_after_terminal_fails_until_reset() {
        let mut world = world(3, 3, 0);
        world
            .load_state(GridState::new(3, 3, vec![(2, 1)], Direction::Right, Some((0, 0))).unwrap())
            .unwrap();
        assert!(world.step(Direction::Right).unwrap().done);
        assert!(matches!(world.step(Direction::Up), Err(Error::StepAfterTerminal)));

        world.reset();
        assert!(world.step(Direction::Up).is_ok());
    }

    #[test]
    fn test_step_index_rejects_out_of_range() {
        let mut world = world(10, 10, 0);
        assert!(matches!(world.step_index(4), Err(Error::InvalidAction(4))));
        assert!(world.step_index(2).is_ok());
        assert_eq!(world.state().heading(), Direction::Up);
    }

    #[test]
    fn test_filling_the_board_is_a_distinct_win() {
        let mut world = world(2, 1, 0);
        // 2x1 grid: snake at (1,0), food at (0,0)
        world
            .load_state(GridState::new(2, 1, vec![(1, 0)], Direction::Left, Some((0, 0))).unwrap())
            .unwrap();
        let step = world.step(Direction::Left).unwrap();
        assert_eq!(step.info.outcome, StepOutcome::BoardFull);
        assert!(step.done);
        assert_eq!(step.reward, 10.0);
        assert_eq!(world.state().food(), None);
        assert_eq!(world.state().len(), 2);
    }

    #[test]
    fn test_random_walk_preserves_invariants() {
        let config = EnvConfig {
            width: 8,
            height: 8,
            encoder: EncoderKind::Absolute,
            ..EnvConfig::default()
        };
        let mut world = GridWorld::new(&config, 11).unwrap();
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..2_000 {
            if world.is_done() {
                world.reset();
            }
            let before = world.state().len();
            let step = world.step_index(rng.random_range(0..4)).unwrap();
            assert_invariants(world.state());
            match step.info.outcome {
                StepOutcome::Ate => assert_eq!(world.state().len(), before + 1),
                StepOutcome::Moved | StepOutcome::Collision(_) => assert_eq!(world.state().len(), before),
                StepOutcome::BoardFull => assert_eq!(world.state().len(), 64),
            }
            assert_eq!(step.features.len(), 10);
        }
    }

    #[test]
    fn test_step_penalty_variant() {
        let config = EnvConfig {
            width: 10,
            height: 10,
            reward: RewardKind::step_penalty(),
            ..EnvConfig::default()
        };
        let mut world = GridWorld::new(&config, 0).unwrap();
        world.place_food((0, 0)).unwrap();
        let step = world.step(Direction::Right).unwrap();
        assert_eq!(step.reward, -0.01);
    }

    struct Recorder(Rc<RefCell<Vec<Frame>>>);

    impl Presenter for Recorder {
        fn present(&mut self, frame: &Frame) {
            self.0.borrow_mut().push(frame.clone());
        }
    }

    #[test]
    fn test_render_is_a_no_op_without_presenter() {
        let mut world = world(10, 10, 0);
        world.render();

        let frames = Rc::new(RefCell::new(Vec::new()));
        world.attach_presenter(Box::new(Recorder(Rc::clone(&frames))));
        world.render();
        world.step(Direction::Down).unwrap();
        world.render();

        let frames = frames.borrow();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].head, (5, 5));
        assert_eq!(frames[1].head, (5, 6));
        assert!(world.detach_presenter().is_some());
    }
}
