use std::collections::HashMap;

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Deux caractères de mot ou plus
static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("valid token pattern"));

const SMOOTHING: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Ham,
    Spam,
}

impl Label {
    fn index(self) -> usize {
        match self {
            Label::Ham => 0,
            Label::Spam => 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("le corpus d'entraînement est vide")]
    EmptyCorpus,
    #[error("le corpus d'entraînement ne contient aucun exemple {0:?}")]
    MissingLabel(Label),
    #[error("le corpus d'entraînement ne contient aucun mot exploitable")]
    NoVocabulary,
}

/// Mots de `text`, en minuscules.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    TOKEN.find_iter(text).map(|m| m.as_str().to_lowercase())
}

/// Bayes naïf multinomial sur le nombre d'occurrences des mots.
///
/// Entraîné une fois, ensuite uniquement lu.
#[derive(Debug, Clone)]
pub struct SpamClassifier {
    vocabulary: HashMap<String, usize>,
    log_priors: [f64; 2],
    /// Par étiquette, log P(mot | étiquette), indexé comme `vocabulary`
    log_likelihoods: [Vec<f64>; 2],
}

impl SpamClassifier {
    pub fn train<'a, I>(samples: I) -> Result<Self, TrainingError>
    where
        I: IntoIterator<Item = (Label, &'a str)>,
    {
        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut counts: [HashMap<usize, f64>; 2] = [HashMap::new(), HashMap::new()];
        let mut documents = [0usize; 2];

        for (label, text) in samples {
            documents[label.index()] += 1;
            for token in tokenize(text) {
                let next_id = vocabulary.len();
                let id = *vocabulary.entry(token).or_insert(next_id);
                *counts[label.index()].entry(id).or_insert(0.0) += 1.0;
            }
        }

        let total_documents = documents[0] + documents[1];
        if total_documents == 0 {
            return Err(TrainingError::EmptyCorpus);
        }
        for label in [Label::Ham, Label::Spam] {
            if documents[label.index()] == 0 {
                return Err(TrainingError::MissingLabel(label));
            }
        }
        if vocabulary.is_empty() {
            return Err(TrainingError::NoVocabulary);
        }

        let vocabulary_size = vocabulary.len();
        let log_priors = documents.map(|n| (n as f64 / total_documents as f64).ln());
        let log_likelihoods: [Vec<f64>; 2] = counts.map(|label_counts| {
            let total: f64 = label_counts.values().sum();
            let denominator = (total + SMOOTHING * vocabulary_size as f64).ln();
            (0..vocabulary_size)
                .map(|id| (label_counts.get(&id).copied().unwrap_or(0.0) + SMOOTHING).ln() - denominator)
                .collect()
        });

        info!(
            "✅ Classifieur de spam entraîné sur {} messages ({} spam), {} mots distincts",
            total_documents,
            documents[Label::Spam.index()],
            vocabulary_size
        );

        Ok(SpamClassifier {
            vocabulary,
            log_priors,
            log_likelihoods,
        })
    }

    /// Log-probabilités jointes de `text` pour chaque étiquette. Les mots inconnus sont ignorés.
    pub fn log_scores(&self, text: &str) -> [f64; 2] {
        let mut scores = self.log_priors;
        for token in tokenize(text) {
            if let Some(&id) = self.vocabulary.get(&token) {
                scores[0] += self.log_likelihoods[0][id];
                scores[1] += self.log_likelihoods[1][id];
            }
        }
        scores
    }

    /// En cas d'égalité, [`Label::Ham`].
    pub fn predict(&self, text: &str) -> Label {
        let [ham, spam] = self.log_scores(text);
        if spam > ham {
            Label::Spam
        } else {
            Label::Ham
        }
    }

    pub fn is_spam(&self, text: &str) -> bool {
        self.predict(text) == Label::Spam
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }
}
