//! Presentation hook
//!
//! The core never draws. A presentation layer implements `Presenter` and
//! receives a `Frame` built from the current `GridState` on each render call.

use crate::game::{Cell, GridState};

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: i32,
    pub height: i32,
    /// Tail first, head last.
    pub body: Vec<Cell>,
    pub head: Cell,
    pub food: Option<Cell>,
    pub score: usize,
}

impl Frame {
    pub fn capture(state: &GridState) -> Self {
        Self {
            width: state.width(),
            height: state.height(),
            body: state.body().copied().collect(),
            head: state.head(),
            food: state.food(),
            score: state.score(),
        }
    }
}

pub trait Presenter {
    fn present(&mut self, frame: &Frame);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Direction;

    #[test]
    fn test_capture_reports_score_as_length_minus_one() {
        let state = GridState::new(6, 4, vec![(1, 1), (2, 1), (3, 1)], Direction::Right, Some((5, 3))).unwrap();
        let frame = Frame::capture(&state);
        assert_eq!(frame.score, 2);
        assert_eq!(frame.head, (3, 1));
        assert_eq!(frame.body, vec![(1, 1), (2, 1), (3, 1)]);
        assert_eq!(frame.food, Some((5, 3)));
        assert_eq!((frame.width, frame.height), (6, 4));
    }
}
