use crate::Slot;
use thiserror::Error;

const BASE_WIDTH: f64 = 500.0;
const BASE_HEIGHT_SMALL: f64 = 400.0;
const BASE_HEIGHT_LARGE: f64 = 500.0;
const LARGE_BOARD_PARTICIPANTS: usize = 20;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoardError {
    #[error("board needs at least one slot")]
    NoSlots,
    #[error("board dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: f64, height: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardConfig {
    pub rows: usize,
    pub max_participants: usize,
    pub width: f64,
    pub height: f64,
}

impl BoardConfig {
    pub fn new(rows: usize, max_participants: usize) -> Self {
        let height = if max_participants > LARGE_BOARD_PARTICIPANTS {
            BASE_HEIGHT_LARGE
        } else {
            BASE_HEIGHT_SMALL
        };
        Self {
            rows,
            max_participants,
            width: BASE_WIDTH,
            height,
        }
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peg {
    pub x: f64,
    pub y: f64,
}

/// Fixed geometry of one drop's reveal board: the peg lattice and the slot row.
#[derive(Debug, Clone)]
pub struct Board {
    config: BoardConfig,
    scale: f64,
    pegs: Vec<Peg>,
}

impl Board {
    pub fn new(config: BoardConfig) -> Result<Self, BoardError> {
        if config.max_participants == 0 {
            return Err(BoardError::NoSlots);
        }
        let finite = config.width.is_finite() && config.height.is_finite();
        if !finite || config.width <= 0.0 || config.height <= 0.0 {
            return Err(BoardError::InvalidDimensions {
                width: config.width,
                height: config.height,
            });
        }
        let base_height = if config.max_participants > LARGE_BOARD_PARTICIPANTS {
            BASE_HEIGHT_LARGE
        } else {
            BASE_HEIGHT_SMALL
        };
        let scale = (config.width / BASE_WIDTH).min(config.height / base_height);
        let pegs = peg_lattice(&config, scale);
        Ok(Self {
            config,
            scale,
            pegs,
        })
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn width(&self) -> f64 {
        self.config.width
    }

    pub fn height(&self) -> f64 {
        self.config.height
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn pegs(&self) -> &[Peg] {
        &self.pegs
    }

    pub fn slot_count(&self) -> usize {
        self.config.max_participants
    }

    pub fn contains_slot(&self, slot: Slot) -> bool {
        slot < self.config.max_participants
    }

    pub fn slot_width(&self) -> f64 {
        self.config.width / self.config.max_participants as f64
    }

    pub fn slot_height(&self) -> f64 {
        30.0 * self.scale
    }

    pub fn slot_center_x(&self, slot: Slot) -> f64 {
        (slot as f64 + 0.5) * self.slot_width()
    }

    pub fn ball_radius(&self) -> f64 {
        7.0 * self.scale
    }

    pub fn peg_radius(&self) -> f64 {
        4.0 * self.scale
    }

    /// y coordinate past which a ball is considered to be settling into a slot
    pub fn landing_line(&self) -> f64 {
        self.config.height - self.slot_height() - self.ball_radius()
    }

    /// y coordinate of a ball resting inside its slot
    pub fn resting_y(&self) -> f64 {
        self.config.height - self.slot_height() / 2.0 - self.ball_radius() / 2.0
    }
}

fn peg_lattice(config: &BoardConfig, scale: f64) -> Vec<Peg> {
    let spacing_x = (40.0 * scale).min(config.width / (config.rows as f64 + 1.0));
    let spacing_y = (30.0 * scale).min(config.height / (config.rows as f64 + 5.0));
    let mut pegs = Vec::new();
    for row in 0..config.rows {
        let pegs_in_row = row + 2;
        let row_width = (pegs_in_row - 1) as f64 * spacing_x;
        let start_x = (config.width - row_width) / 2.0;
        let y = (row as f64 + 1.0) * spacing_y + 30.0 * scale;
        for col in 0..pegs_in_row {
            pegs.push(Peg {
                x: start_x + col as f64 * spacing_x,
                y,
            });
        }
    }
    pegs
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn new__builds_triangular_lattice() {
        // given
        let config = BoardConfig::new(4, 10);

        // when
        let board = Board::new(config).unwrap();

        // then
        // 2 + 3 + 4 + 5
        assert_eq!(board.pegs().len(), 14);
        let first_row: Vec<_> = board.pegs().iter().take(2).collect();
        let mid = board.width() / 2.0;
        let centered = (first_row[0].x + first_row[1].x) / 2.0;
        assert!((centered - mid).abs() < 1e-9);
    }

    #[test]
    fn new__rejects_board_without_slots() {
        let err = Board::new(BoardConfig::new(4, 0)).unwrap_err();
        assert_eq!(err, BoardError::NoSlots);
    }

    #[test]
    fn new__rejects_non_positive_dimensions() {
        let config = BoardConfig::new(4, 3).with_size(0.0, 200.0);
        assert!(matches!(
            Board::new(config),
            Err(BoardError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn new__uses_taller_base_for_large_boards() {
        // given
        let small = BoardConfig::new(8, 20);
        let large = BoardConfig::new(8, 21);

        // then
        assert_eq!(small.height, 400.0);
        assert_eq!(large.height, 500.0);
        assert_eq!(Board::new(large).unwrap().scale(), 1.0);
    }

    #[test]
    fn slot_center_x__places_slots_evenly() {
        // given
        let board = Board::new(BoardConfig::new(6, 10)).unwrap();

        // then
        assert_eq!(board.slot_width(), 50.0);
        assert_eq!(board.slot_center_x(0), 25.0);
        assert_eq!(board.slot_center_x(9), 475.0);
        assert!(board.contains_slot(9));
        assert!(!board.contains_slot(10));
    }
}
