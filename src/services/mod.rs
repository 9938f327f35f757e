pub mod drift;
pub mod features;
pub mod matching;
pub mod ranking;
