//! Reconstitution des questions/réponses à partir des dossiers reçus et envoyés

pub mod chains;
pub mod links;
pub mod reconstructor;

pub use chains::{Chain, ChainBuilder, Consumption};
pub use links::extract_links;
pub use reconstructor::{reconstruct, ThreadReconstructor};
