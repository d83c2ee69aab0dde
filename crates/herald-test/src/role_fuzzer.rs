//! Role Move Fuzzer - Randomized move sequences against the reorderer
//!
//! Checks after every move:
//! - Positions stay a permutation of `0..n`
//! - The moved role lands on its target
//! - The default role never leaves position 0
//! - Invalid requests are rejected without touching any position

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use herald_core::{Guild, HeraldError, RoleId};
use herald_state::plan_move;

use crate::GuildBuilder;

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct RoleFuzzerConfig {
    /// Roles besides the default role
    pub role_count: i32,
    pub move_count: usize,
    /// Probability of issuing a request that must be rejected
    pub invalid_prob: f64,
    pub seed: u64,
}

impl Default for RoleFuzzerConfig {
    fn default() -> Self {
        RoleFuzzerConfig {
            role_count: 12,
            move_count: 1000,
            invalid_prob: 0.1,
            seed: 42,
        }
    }
}

impl RoleFuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        RoleFuzzerConfig {
            role_count: 5,
            move_count: 100,
            invalid_prob: 0.1,
            seed: 42,
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        RoleFuzzerConfig {
            role_count: 64,
            move_count: 10_000,
            invalid_prob: 0.2,
            seed: 42,
        }
    }
}

/// Fuzzing result
#[derive(Debug, Default)]
pub struct RoleFuzzResult {
    pub moves_applied: u64,
    pub moves_rejected: u64,
    /// Edits submitted across all batches
    pub edits: u64,
    pub violations: Vec<String>,
}

impl RoleFuzzResult {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Drives random moves against one guild
pub struct RoleFuzzer {
    config: RoleFuzzerConfig,
    guild: Guild,
    rng: StdRng,
}

enum Request {
    Valid(RoleId, i32),
    NonPositive(RoleId, i32),
    DefaultRole(i32),
    Unknown(i32),
}

impl RoleFuzzer {
    pub fn new(config: RoleFuzzerConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        let guild = GuildBuilder::new(1).ladder(config.role_count.max(1)).build();
        RoleFuzzer { config, guild, rng }
    }

    pub fn guild(&self) -> &Guild {
        &self.guild
    }

    fn generate_request(&mut self) -> Request {
        let ids: Vec<RoleId> = self
            .guild
            .roles
            .iter()
            .filter(|r| !r.is_default())
            .map(|r| r.id)
            .collect();
        let role = ids[self.rng.gen_range(0..ids.len())];
        let max = self.config.role_count.max(1);

        if self.rng.gen::<f64>() >= self.config.invalid_prob {
            return Request::Valid(role, self.rng.gen_range(1..=max));
        }
        match self.rng.gen_range(0..3) {
            0 => Request::NonPositive(role, self.rng.gen_range(-5..=0)),
            1 => Request::DefaultRole(self.rng.gen_range(-1..=max)),
            _ => Request::Unknown(self.rng.gen_range(1..=max)),
        }
    }

    pub fn run(&mut self) -> RoleFuzzResult {
        let mut result = RoleFuzzResult::default();

        for step in 0..self.config.move_count {
            let request = self.generate_request();
            let valid = matches!(request, Request::Valid(..));
            let before = self.guild.roles.clone();

            match request {
                Request::Valid(role, target) => match plan_move(&mut self.guild, role, target) {
                    Ok(moves) => {
                        result.moves_applied += 1;
                        result.edits += moves.len() as u64;
                        let landed = self.guild.role(role).map(|r| r.position);
                        if landed != Some(target) {
                            result
                                .violations
                                .push(format!("step {step}: {role} landed at {landed:?}, wanted {target}"));
                        }
                    }
                    Err(e) => result.violations.push(format!("step {step}: valid move failed: {e}")),
                },
                Request::NonPositive(role, target) => {
                    let err = plan_move(&mut self.guild, role, target);
                    self.expect_rejection(&mut result, step, err.err(), |e| {
                        matches!(e, HeraldError::PositionBounds { .. })
                    });
                }
                Request::DefaultRole(target) => {
                    let everyone = RoleId::everyone(self.guild.id);
                    let err = plan_move(&mut self.guild, everyone, target);
                    // Bounds are checked first
                    let expected_bounds = target <= 0;
                    self.expect_rejection(&mut result, step, err.err(), |e| match e {
                        HeraldError::PositionBounds { .. } => expected_bounds,
                        HeraldError::UnmovableDefaultRole => !expected_bounds,
                        _ => false,
                    });
                }
                Request::Unknown(target) => {
                    let err = plan_move(&mut self.guild, RoleId::new(u64::MAX), target);
                    self.expect_rejection(&mut result, step, err.err(), |e| {
                        matches!(e, HeraldError::RoleNotFound(_))
                    });
                }
            }

            if !valid && self.guild.roles != before {
                result
                    .violations
                    .push(format!("step {step}: rejected move changed positions"));
            }
            self.check_invariants(&mut result, step);
        }
        result
    }

    fn expect_rejection(
        &self,
        result: &mut RoleFuzzResult,
        step: usize,
        err: Option<HeraldError>,
        expected: impl Fn(&HeraldError) -> bool,
    ) {
        match err {
            Some(e) if expected(&e) => result.moves_rejected += 1,
            Some(e) => result.violations.push(format!("step {step}: wrong rejection {e}")),
            None => result.violations.push(format!("step {step}: invalid move accepted")),
        }
    }

    fn check_invariants(&self, result: &mut RoleFuzzResult, step: usize) {
        let mut positions: Vec<i32> = self.guild.roles.iter().map(|r| r.position).collect();
        positions.sort_unstable();
        let expected: Vec<i32> = (0..positions.len() as i32).collect();
        if positions != expected {
            result
                .violations
                .push(format!("step {step}: positions not a permutation: {positions:?}"));
        }

        if self.guild.default_role().map(|r| r.position) != Some(0) {
            result.violations.push(format!("step {step}: default role moved"));
        }
    }
}
