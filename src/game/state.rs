use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Grid coordinate `(x, y)`, with `y` growing downwards.
pub type Cell = (i32, i32);

/// Cardinal heading. Actions are interpreted as the heading the agent asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

pub type Action = Direction;

impl Direction {
    /// Index order matches the integer action boundary: 0=LEFT, 1=RIGHT, 2=UP, 3=DOWN.
    pub const ALL: [Direction; 4] = [Direction::Left, Direction::Right, Direction::Up, Direction::Down];

    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
            Direction::Up => 2,
            Direction::Down => 3,
        }
    }

    pub fn from_index(index: usize) -> Result<Self> {
        Direction::ALL.get(index).copied().ok_or(Error::InvalidAction(index))
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Clockwise quarter turn on screen (y down).
    pub fn turn_right(self) -> Self {
        match self {
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
            Direction::Up => Direction::Right,
        }
    }

    pub fn turn_left(self) -> Self {
        self.turn_right().opposite()
    }

    pub fn delta(self) -> Cell {
        match self {
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
        }
    }

    pub fn step_from(self, cell: Cell) -> Cell {
        let (dx, dy) = self.delta();
        (cell.0 + dx, cell.1 + dy)
    }
}

impl TryFrom<usize> for Direction {
    type Error = Error;

    fn try_from(index: usize) -> Result<Self> {
        Direction::from_index(index)
    }
}

/// Snake body, heading and food on a bounded `width x height` grid.
///
/// The body is stored tail first, so the head is always the last cell.
/// `occupied` mirrors the body for O(1) collision queries.
#[derive(Debug, Clone)]
pub struct GridState {
    width: i32,
    height: i32,
    body: VecDeque<Cell>,
    occupied: HashSet<Cell>,
    heading: Direction,
    food: Option<Cell>,
}

impl GridState {
    /// Largest grid side. Keeps `area()` and the food search well inside `usize`.
    pub const MAX_SIDE: i32 = u16::MAX as i32;

    /// Build a state from an explicit body (tail first, head last), checking every invariant.
    pub fn new(width: i32, height: i32, body: Vec<Cell>, heading: Direction, food: Option<Cell>) -> Result<Self> {
        if width <= 0 || height <= 0 || width > Self::MAX_SIDE || height > Self::MAX_SIDE {
            return Err(Error::InvalidState {
                message: format!(
                    "grid sides must lie in 1..={}, got {width}x{height}",
                    Self::MAX_SIDE
                ),
            });
        }
        if body.is_empty() {
            return Err(Error::InvalidState {
                message: "snake body must contain at least the head".to_string(),
            });
        }

        let mut state = Self {
            width,
            height,
            body: VecDeque::with_capacity(body.len()),
            occupied: HashSet::with_capacity(body.len()),
            heading,
            food: None,
        };
        for cell in body {
            if !state.in_bounds(cell) {
                return Err(Error::InvalidState {
                    message: format!("body cell {cell:?} lies outside the {width}x{height} grid"),
                });
            }
            if !state.occupied.insert(cell) {
                return Err(Error::InvalidState {
                    message: format!("body cell {cell:?} appears twice"),
                });
            }
            state.body.push_back(cell);
        }
        if let Some(cell) = food {
            state.check_food(cell)?;
        }
        state.food = food;

        Ok(state)
    }

    /// One-segment snake without food. Callers guarantee `head` is on a valid grid.
    pub(crate) fn single(width: i32, height: i32, head: Cell, heading: Direction) -> Self {
        Self {
            width,
            height,
            body: VecDeque::from([head]),
            occupied: HashSet::from([head]),
            heading,
            food: None,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn head(&self) -> Cell {
        *self
            .body
            .back()
            .expect("snake body is never empty: constructors reject it and the tail is only popped after a push")
    }

    /// Body cells, tail first.
    pub fn body(&self) -> impl ExactSizeIterator<Item = &Cell> + '_ {
        self.body.iter()
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn score(&self) -> usize {
        self.body.len() - 1
    }

    pub fn heading(&self) -> Direction {
        self.heading
    }

    pub fn food(&self) -> Option<Cell> {
        self.food
    }

    pub fn is_full(&self) -> bool {
        self.body.len() >= self.area()
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.0 >= 0 && cell.0 < self.width && cell.1 >= 0 && cell.1 < self.height
    }

    pub fn occupies(&self, cell: Cell) -> bool {
        self.occupied.contains(&cell)
    }

    /// Wall or body hit. Shared by `step` and the danger encoder.
    pub fn is_collision(&self, cell: Cell) -> bool {
        !self.in_bounds(cell) || self.occupies(cell)
    }

    pub fn free_cells(&self) -> Vec<Cell> {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .filter(|cell| !self.occupies(*cell))
            .collect()
    }

    pub(crate) fn set_heading(&mut self, heading: Direction) {
        self.heading = heading;
    }

    pub(crate) fn set_food(&mut self, food: Option<Cell>) -> Result<()> {
        if let Some(cell) = food {
            self.check_food(cell)?;
        }
        self.food = food;
        Ok(())
    }

    /// Food from `spawn_food`, which only yields free in-bounds cells.
    pub(crate) fn set_spawned_food(&mut self, food: Option<Cell>) {
        debug_assert!(food.is_none_or(|cell| self.in_bounds(cell) && !self.occupies(cell)));
        self.food = food;
    }

    pub(crate) fn push_head(&mut self, cell: Cell) {
        self.occupied.insert(cell);
        self.body.push_back(cell);
    }

    pub(crate) fn pop_tail(&mut self) {
        if let Some(tail) = self.body.pop_front() {
            self.occupied.remove(&tail);
        }
    }

    fn check_food(&self, cell: Cell) -> Result<()> {
        if !self.in_bounds(cell) {
            return Err(Error::InvalidState {
                message: format!("food cell {cell:?} lies outside the grid"),
            });
        }
        if self.occupies(cell) {
            return Err(Error::InvalidState {
                message: format!("food cell {cell:?} overlaps the snake"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_index_round_trip_matches_action_boundary() {
        assert_eq!(Direction::from_index(0).unwrap(), Direction::Left);
        assert_eq!(Direction::from_index(3).unwrap(), Direction::Down);
        for direction in Direction::ALL {
            assert_eq!(Direction::try_from(direction.index()).unwrap(), direction);
        }
        assert!(matches!(Direction::from_index(4), Err(Error::InvalidAction(4))));
    }

    #[test]
    fn test_relative_turns() {
        assert_eq!(Direction::Right.turn_right(), Direction::Down);
        assert_eq!(Direction::Right.turn_left(), Direction::Up);
        assert_eq!(Direction::Up.turn_left(), Direction::Left);
        assert_eq!(Direction::Left.turn_right(), Direction::Up);
        for direction in Direction::ALL {
            assert_eq!(direction.opposite().opposite(), direction);
            assert_eq!(direction.turn_left().turn_right(), direction);
        }
    }

    #[test]
    fn test_new_rejects_broken_invariants() {
        assert!(GridState::new(5, 5, vec![], Direction::Right, None).is_err());
        assert!(GridState::new(5, 5, vec![(1, 1), (1, 1)], Direction::Right, None).is_err());
        assert!(GridState::new(5, 5, vec![(5, 1)], Direction::Right, None).is_err());
        assert!(GridState::new(5, 5, vec![(1, 1)], Direction::Right, Some((1, 1))).is_err());
        assert!(GridState::new(5, 5, vec![(1, 1)], Direction::Right, Some((-1, 0))).is_err());
    }

    #[test]
    fn test_head_is_last_body_cell() {
        let state = GridState::new(10, 10, vec![(3, 5), (4, 5), (5, 5)], Direction::Right, Some((0, 0))).unwrap();
        assert_eq!(state.head(), (5, 5));
        assert_eq!(state.len(), 3);
        assert_eq!(state.score(), 2);
        assert!(state.is_collision((4, 5)));
        assert!(state.is_collision((10, 5)));
        assert!(!state.is_collision((6, 5)));
    }

    #[test]
    #[should_panic(expected = "snake body is never empty")]
    fn test_head_of_emptied_body_panics() {
        let mut state = GridState::single(4, 4, (1, 1), Direction::Right);
        state.pop_tail();
        state.head();
    }

    #[test]
    fn test_new_rejects_oversized_grid() {
        let side = GridState::MAX_SIDE + 1;
        assert!(GridState::new(side, 2, vec![(0, 0)], Direction::Right, None).is_err());
        assert!(GridState::new(2, side, vec![(0, 0)], Direction::Right, None).is_err());
    }

    #[test]
    fn test_spawned_food_replaces_previous_food() {
        let mut state = GridState::new(3, 3, vec![(0, 0)], Direction::Right, Some((2, 2))).unwrap();
        state.set_spawned_food(Some((1, 1)));
        assert_eq!(state.food(), Some((1, 1)));
        state.set_spawned_food(None);
        assert_eq!(state.food(), None);
    }

    #[test]
    fn test_free_cells_excludes_body() {
        let state = GridState::new(2, 2, vec![(0, 0), (1, 0)], Direction::Right, None).unwrap();
        assert_eq!(state.free_cells(), vec![(0, 1), (1, 1)]);
        assert!(!state.is_full());
    }
}
