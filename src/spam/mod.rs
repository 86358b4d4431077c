//! Classification du spam et des notifications système

pub mod classifier;
pub mod corpus;
pub mod detector;

pub use classifier::{Label, SpamClassifier, TrainingError};
pub use corpus::Corpus;
pub use detector::{Signals, SpamDetector, SpamRecord};
