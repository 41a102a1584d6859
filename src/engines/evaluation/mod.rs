pub mod candidates;

pub use candidates::{CandidateEvaluator, CandidateScores};
