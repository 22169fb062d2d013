//! Per-frame ball integration for the reveal board.
//!
//! The outcome of a reveal is decided before the ball is dropped; the
//! simulation only has to look like a Galton board while guaranteeing the
//! ball settles in its target slot.

use crate::{
    Slot,
    board::Board,
};
use rand::Rng;

const GRAVITY: f64 = 0.25;
const HIT_SPEED: f64 = 0.8;
const HIT_JITTER: f64 = 0.5;
const HIT_KICK: f64 = 1.5;
const BIAS_ENGAGE_FRACTION: f64 = 0.7;
const BIAS_STRENGTH: f64 = 0.005;
const WALL_RESTITUTION: f64 = 0.7;
const SNAP_FACTOR: f64 = 0.3;
const SETTLE_DAMPING: f64 = 0.5;
const LANDING_TOLERANCE: f64 = 0.2;
const SETTLE_VELOCITY: f64 = 0.5;
const PARTICLE_DECAY: f64 = 0.03;
const PARTICLE_SPAWN_VY: f64 = 0.1;

/// Airborne ticks after which the ball is placed on the landing line.
pub const MAX_FLIGHT_TICKS: u32 = 1_500;
/// Ticks after which the ball lands regardless of its state.
pub const MAX_TOTAL_TICKS: u32 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub target_slot: Slot,
    pub landed: bool,
    pub particles: Vec<Particle>,
    pub ticks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Landing {
    pub slot: Slot,
    pub ticks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Moving,
    Landed(Landing),
    AlreadyLanded,
}

impl Board {
    /// Returns `None` when `target` is not a slot on this board.
    pub fn spawn_ball<R: Rng + ?Sized>(&self, target: Slot, rng: &mut R) -> Option<Ball> {
        if !self.contains_slot(target) {
            return None;
        }
        let scale = self.scale();
        Some(Ball {
            x: self.width() / 2.0 + (rng.random::<f64>() - 0.5) * 20.0 * scale,
            y: 10.0 * scale,
            vx: rng.random::<f64>() - 0.5,
            vy: 0.0,
            target_slot: target,
            landed: false,
            particles: Vec::new(),
            ticks: 0,
        })
    }

    /// Advances `ball` by one frame. Reports `Landed` exactly once.
    pub fn tick<R: Rng + ?Sized>(&self, ball: &mut Ball, rng: &mut R) -> TickOutcome {
        if ball.landed {
            return TickOutcome::AlreadyLanded;
        }
        ball.ticks = ball.ticks.saturating_add(1);
        let scale = self.scale();
        let ball_radius = self.ball_radius();
        let target_x = self.slot_center_x(ball.target_slot);

        update_trail(ball, ball_radius);

        ball.y += ball.vy;
        ball.vy += GRAVITY * scale;
        ball.x += ball.vx;

        let reach = ball_radius + self.peg_radius();
        for peg in self.pegs() {
            let dx = ball.x - peg.x;
            let dy = ball.y - peg.y;
            if (dx * dx + dy * dy).sqrt() < reach {
                let angle = dy.atan2(dx);
                ball.vx = angle.cos() * HIT_SPEED + (rng.random::<f64>() - 0.5) * HIT_JITTER;
                ball.vy = angle.sin() * HIT_SPEED * 0.8 - rng.random::<f64>() * HIT_KICK;
                if ball.y > self.height() * BIAS_ENGAGE_FRACTION {
                    ball.vx += (target_x - ball.x) * BIAS_STRENGTH * scale;
                }
            }
        }

        let landing_line = self.landing_line();
        if ball.y <= landing_line {
            if ball.x < ball_radius || ball.x > self.width() - ball_radius {
                ball.vx *= -WALL_RESTITUTION;
                ball.x = ball.x.clamp(ball_radius, self.width() - ball_radius);
            }
            if ball.ticks >= MAX_FLIGHT_TICKS {
                ball.y = landing_line + 1e-6;
                ball.vy = 0.0;
            }
        }

        if !is_finite(ball) || ball.ticks >= MAX_TOTAL_TICKS {
            return self.land(ball, target_x);
        }

        if ball.y > landing_line {
            ball.x += (target_x - ball.x) * SNAP_FACTOR;
            ball.vx *= SETTLE_DAMPING;
            ball.vy *= SETTLE_DAMPING;
            ball.y = ball.y.min(self.resting_y());

            let settled_x = (ball.x - target_x).abs() < self.slot_width() * LANDING_TOLERANCE;
            let settled_y = ball.vy.abs() < SETTLE_VELOCITY * scale;
            if settled_x && settled_y {
                return self.land(ball, target_x);
            }
        }
        TickOutcome::Moving
    }

    fn land(&self, ball: &mut Ball, target_x: f64) -> TickOutcome {
        ball.landed = true;
        ball.x = target_x;
        ball.y = self.resting_y();
        ball.vx = 0.0;
        ball.vy = 0.0;
        ball.particles.clear();
        TickOutcome::Landed(Landing {
            slot: ball.target_slot,
            ticks: ball.ticks,
        })
    }
}

fn update_trail(ball: &mut Ball, ball_radius: f64) {
    for particle in ball.particles.iter_mut() {
        particle.alpha -= PARTICLE_DECAY;
    }
    ball.particles.retain(|p| p.alpha > 0.0);
    if ball.vy > PARTICLE_SPAWN_VY {
        ball.particles.push(Particle {
            x: ball.x,
            y: ball.y - ball_radius,
            alpha: 1.0,
        });
    }
}

fn is_finite(ball: &Ball) -> bool {
    ball.x.is_finite() && ball.y.is_finite() && ball.vx.is_finite() && ball.vy.is_finite()
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::board::BoardConfig;
    use proptest::prelude::*;
    use rand::{
        SeedableRng,
        rngs::StdRng,
    };

    fn run_to_landing(board: &Board, ball: &mut Ball, rng: &mut StdRng) -> Option<Landing> {
        for _ in 0..=MAX_TOTAL_TICKS {
            if let TickOutcome::Landed(landing) = board.tick(ball, rng) {
                return Some(landing);
            }
        }
        None
    }

    #[test]
    fn spawn_ball__rejects_slot_outside_board() {
        // given
        let board = Board::new(BoardConfig::new(8, 10)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        // then
        assert!(board.spawn_ball(10, &mut rng).is_none());
        assert!(board.spawn_ball(9, &mut rng).is_some());
    }

    #[test]
    fn tick__lands_ball_in_target_slot() {
        // given
        let board = Board::new(BoardConfig::new(8, 10)).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut ball = board.spawn_ball(2, &mut rng).unwrap();

        // when
        let landing = run_to_landing(&board, &mut ball, &mut rng).unwrap();

        // then
        assert_eq!(landing.slot, 2);
        assert!(ball.landed);
        assert_eq!(ball.x, board.slot_center_x(2));
        assert_eq!(ball.y, board.resting_y());
    }

    #[test]
    fn tick__reports_landing_only_once() {
        // given
        let board = Board::new(BoardConfig::new(8, 5)).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut ball = board.spawn_ball(4, &mut rng).unwrap();
        run_to_landing(&board, &mut ball, &mut rng).unwrap();

        // when
        let after = board.tick(&mut ball, &mut rng);

        // then
        assert_eq!(after, TickOutcome::AlreadyLanded);
    }

    #[test]
    fn tick__degrades_non_finite_state_to_landing() {
        // given
        let board = Board::new(BoardConfig::new(8, 5)).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut ball = board.spawn_ball(1, &mut rng).unwrap();
        ball.vx = f64::NAN;

        // when
        let outcome = board.tick(&mut ball, &mut rng);

        // then
        assert!(matches!(outcome, TickOutcome::Landed(Landing { slot: 1, .. })));
        assert_eq!(ball.x, board.slot_center_x(1));
    }

    #[test]
    fn tick__lands_edge_slot_narrower_than_ball() {
        // given
        let board = Board::new(BoardConfig::new(12, 100)).unwrap();
        assert!(board.slot_center_x(0) < board.ball_radius());
        let mut rng = StdRng::seed_from_u64(11);
        let mut ball = board.spawn_ball(0, &mut rng).unwrap();

        // when
        let landing = run_to_landing(&board, &mut ball, &mut rng).unwrap();

        // then
        assert_eq!(landing.slot, 0);
    }

    #[test]
    fn tick__fades_trail_particles() {
        // given
        let board = Board::new(BoardConfig::new(8, 10)).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let mut ball = board.spawn_ball(3, &mut rng).unwrap();
        for _ in 0..10 {
            board.tick(&mut ball, &mut rng);
        }

        // then
        assert!(!ball.particles.is_empty());
        assert!(ball.particles.iter().all(|p| p.alpha > 0.0 && p.alpha <= 1.0));
    }

    proptest! {
        #[test]
        fn tick__converges_for_every_board_and_slot(
            slots in 1usize..=64,
            rows in 1usize..=16,
            pick in any::<prop::sample::Index>(),
            seed in any::<u64>(),
        ) {
            let board = Board::new(BoardConfig::new(rows, slots)).unwrap();
            let target = pick.index(slots);
            let mut rng = StdRng::seed_from_u64(seed);
            let mut ball = board.spawn_ball(target, &mut rng).unwrap();

            let landing = run_to_landing(&board, &mut ball, &mut rng);

            prop_assert_eq!(landing.map(|l| l.slot), Some(target));
            prop_assert!(ball.ticks <= MAX_TOTAL_TICKS);
        }
    }
}
