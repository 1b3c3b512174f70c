//! Epsilon-greedy A/B chooser.
//!
//! Arm `A` is the incumbent and wins ties. Reward histories only ever grow;
//! there is no decay or windowing.

use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use streamline_core::config::SimulationConfig;
use streamline_core::{RecoError, RecoResult};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arm {
    A,
    B,
}

impl Arm {
    pub const ALL: [Arm; 2] = [Arm::A, Arm::B];
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arm::A => write!(f, "A"),
            Arm::B => write!(f, "B"),
        }
    }
}

impl FromStr for Arm {
    type Err = RecoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" | "a" => Ok(Arm::A),
            "B" | "b" => Ok(Arm::B),
            other => Err(RecoError::Config(format!("unknown arm: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArmReport {
    pub arm: Arm,
    pub pulls: usize,
    pub total_reward: f64,
    pub average_reward: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub rounds: usize,
    pub epsilon: f64,
    pub arms: Vec<ArmReport>,
    /// The arm a greedy choice would pick after the last round.
    pub leader: Arm,
}

/// Reward histories are sharded per arm, so concurrent `update` calls on
/// the same arm serialize while the other arm stays available.
pub struct AbSimulator {
    epsilon: f64,
    rewards: DashMap<Arm, Vec<f64>>,
}

impl AbSimulator {
    pub fn new(epsilon: f64) -> RecoResult<Self> {
        if !(0.0..=1.0).contains(&epsilon) {
            return Err(RecoError::Config(format!(
                "epsilon must lie in [0, 1], got {epsilon}"
            )));
        }
        let rewards = DashMap::new();
        for arm in Arm::ALL {
            rewards.insert(arm, Vec::new());
        }
        Ok(Self { epsilon, rewards })
    }

    pub fn from_config(config: &SimulationConfig) -> RecoResult<Self> {
        Self::new(config.epsilon)
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn choose(&self) -> Arm {
        self.choose_with(&mut rand::thread_rng())
    }

    /// With probability `epsilon` pick an arm uniformly, otherwise the arm
    /// with the higher average reward.
    pub fn choose_with(&self, rng: &mut impl Rng) -> Arm {
        if rng.gen::<f64>() < self.epsilon {
            let arm = Arm::ALL[rng.gen_range(0..Arm::ALL.len())];
            debug!(%arm, "Exploring");
            return arm;
        }
        self.leader()
    }

    /// Greedy choice; ties go to `A`.
    pub fn leader(&self) -> Arm {
        if self.average(Arm::A) >= self.average(Arm::B) {
            Arm::A
        } else {
            Arm::B
        }
    }

    pub fn update(&self, arm: Arm, reward: f64) {
        self.rewards.entry(arm).or_default().push(reward);
    }

    /// Mean observed reward, 0.0 before the first update.
    pub fn average(&self, arm: Arm) -> f64 {
        match self.rewards.get(&arm) {
            Some(history) if !history.is_empty() => {
                history.iter().sum::<f64>() / history.len() as f64
            }
            _ => 0.0,
        }
    }

    pub fn pulls(&self, arm: Arm) -> usize {
        self.rewards.get(&arm).map(|h| h.len()).unwrap_or(0)
    }

    pub fn history(&self, arm: Arm) -> Vec<f64> {
        self.rewards.get(&arm).map(|h| h.value().clone()).unwrap_or_default()
    }

    pub fn run<F>(&self, rounds: usize, reward: F) -> SimulationReport
    where
        F: FnMut(Arm) -> f64,
    {
        self.run_with(&mut rand::thread_rng(), rounds, reward)
    }

    /// Play `rounds` rounds: choose an arm, ask `reward` how it did, record
    /// the outcome.
    pub fn run_with<F>(&self, rng: &mut impl Rng, rounds: usize, mut reward: F) -> SimulationReport
    where
        F: FnMut(Arm) -> f64,
    {
        for _ in 0..rounds {
            let arm = self.choose_with(rng);
            let value = reward(arm);
            self.update(arm, value);
        }

        let report = self.report(rounds);
        info!(
            rounds,
            epsilon = self.epsilon,
            leader = %report.leader,
            a_pulls = self.pulls(Arm::A),
            b_pulls = self.pulls(Arm::B),
            a_average = self.average(Arm::A),
            b_average = self.average(Arm::B),
            "A/B simulation finished"
        );
        report
    }

    pub fn report(&self, rounds: usize) -> SimulationReport {
        let arms = Arm::ALL
            .iter()
            .map(|&arm| {
                let history = self.history(arm);
                ArmReport {
                    arm,
                    pulls: history.len(),
                    total_reward: history.iter().sum(),
                    average_reward: self.average(arm),
                }
            })
            .collect();
        SimulationReport {
            rounds,
            epsilon: self.epsilon,
            arms,
            leader: self.leader(),
        }
    }
}
