// Exports de la bibliothèque mailqa
// Permet aux tests et au binaire d'utiliser les modules

pub mod config;
pub mod date_range;
pub mod email;
pub mod error;
pub mod export;
pub mod heuristics;
pub mod imap_client;
pub mod retrieval;

// Reconstitution des questions/réponses
pub mod threads;

// Classification du spam et des notifications système
pub mod spam;
