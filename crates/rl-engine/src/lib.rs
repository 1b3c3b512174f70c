//! Online model selection: an epsilon-greedy chooser between two competing
//! recommenders and an offline loop that replays it against a reward source.

pub mod simulator;

pub use simulator::{AbSimulator, Arm, ArmReport, SimulationReport};
