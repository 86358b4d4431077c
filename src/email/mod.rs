//! Décodage des messages RFC822 bruts en enregistrements normalisés

pub mod message;
pub mod normalizer;

// Ré-exporter les éléments couramment utilisés
pub use message::{Body, Message, MessageRecord};
pub use normalizer::{clean_text, MessageNormalizer};
