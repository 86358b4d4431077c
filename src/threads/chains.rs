use std::collections::BTreeSet;

use anyhow::{Context, Result};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::links::extract_links;
use crate::config::HeuristicsConfig;
use crate::email::Message;
use crate::heuristics::NoticeFilter;

/// "On Mon, Jan 1, 2024 at 10:00 AM Someone <a@b> wrote: ..." et tout ce qui suit.
static QUOTE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)on\s+\w{3},?\s+\w+\s+\d{1,2},?\s+\d{4}\s+at\s+\d{1,2}:\d{2}.*?wrote:.*")
        .expect("valid quote header pattern")
});

/// Supprime la réponse citée en fin de message, s'il y en a une.
pub fn strip_quoted_reply(text: &str) -> &str {
    match QUOTE_HEADER.find(text) {
        Some(quote) => text[..quote.start()].trim(),
        None => text,
    }
}

/// Échange question/réponse reconstitué.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chain {
    pub question: String,
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_2: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    /// Position du message qui ouvre la chaîne
    #[serde(skip)]
    pub primary: usize,
    /// Position du message de relance, s'il y en a un
    #[serde(skip)]
    pub continuation: Option<usize>,
}

/// Messages déjà rattachés à une chaîne.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumption {
    used: Vec<bool>,
}

impl Consumption {
    pub fn new(len: usize) -> Self {
        Consumption { used: vec![false; len] }
    }

    pub fn is_used(&self, index: usize) -> bool {
        self.used.get(index).copied().unwrap_or(false)
    }

    /// Étend le suivi à `len` messages ; les nouveaux sont marqués non utilisés.
    fn cover(&mut self, len: usize) {
        if self.used.len() < len {
            self.used.resize(len, false);
        }
    }

    fn mark(&mut self, index: usize) {
        if let Some(slot) = self.used.get_mut(index) {
            *slot = true;
        }
    }

    pub fn used_count(&self) -> usize {
        self.used.iter().filter(|used| **used).count()
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

pub struct ChainBuilder {
    filter: NoticeFilter,
    continuation_marker: Option<Regex>,
    prefix_chars: usize,
}

impl ChainBuilder {
    pub fn new(filter: NoticeFilter, continuation_marker: &str, prefix_chars: usize) -> Result<Self> {
        let continuation_marker = if continuation_marker.trim().is_empty() {
            None
        } else {
            let pattern = format!("(?i){}", regex::escape(continuation_marker));
            Some(
                Regex::new(&pattern)
                    .with_context(|| format!("Marqueur de relance invalide '{}'", continuation_marker))?,
            )
        };

        Ok(ChainBuilder {
            filter,
            continuation_marker,
            prefix_chars,
        })
    }

    pub fn from_config(config: &HeuristicsConfig) -> Result<Self> {
        Self::new(
            NoticeFilter::from_config(config),
            &config.continuation_marker,
            config.continuation_prefix_chars,
        )
    }

    pub fn build(&self, messages: &[Message]) -> Vec<Chain> {
        let (chains, consumption) = self.build_with(messages, Consumption::new(messages.len()));
        debug!(
            "{} chaîne(s) construite(s), {} message(s) utilisé(s) sur {}",
            chains.len(),
            consumption.used_count(),
            consumption.len()
        );
        chains
    }

    /// Un seul parcours : chaque message appartient à au plus une chaîne,
    /// dans l'ordre des messages qui les ouvrent.
    pub fn build_with(&self, messages: &[Message], mut consumption: Consumption) -> (Vec<Chain>, Consumption) {
        let mut chains = Vec::new();
        consumption.cover(messages.len());

        for (i, first) in messages.iter().enumerate() {
            if consumption.is_used(i) || self.filter.is_automated(first) {
                continue;
            }

            let question = first.question.text.clone();
            if question.is_empty() {
                continue;
            }

            let answer = first
                .answer
                .as_ref()
                .map(|body| strip_quoted_reply(&body.text).to_string())
                .unwrap_or_default();

            let mut links: BTreeSet<String> = extract_links(&first.question.raw);
            if let Some(body) = &first.answer {
                links.extend(extract_links(&body.raw));
            }

            let mut chain = Chain {
                question,
                answer: (!answer.is_empty()).then(|| answer.clone()),
                question_2: None,
                answer_2: None,
                links: Vec::new(),
                primary: i,
                continuation: None,
            };

            if !answer.is_empty() {
                let prefix: String = answer.chars().take(self.prefix_chars).collect();

                for (j, next) in messages.iter().enumerate().skip(i + 1) {
                    if consumption.is_used(j) || !next.question.text.contains(&prefix) {
                        continue;
                    }

                    let next_answer = next
                        .answer
                        .as_ref()
                        .map(|body| strip_quoted_reply(&body.text))
                        .unwrap_or_default();

                    chain.question_2 = Some(self.cut_at_marker(&next.question.text).to_string());
                    chain.answer_2 = Some(self.cut_at_marker(next_answer).to_string());
                    chain.continuation = Some(j);

                    links.extend(extract_links(&next.question.raw));
                    if let Some(body) = &next.answer {
                        links.extend(extract_links(&body.raw));
                    }

                    consumption.mark(j);
                    break;
                }
            }

            chain.links = links.into_iter().collect();
            consumption.mark(i);
            chains.push(chain);
        }

        (chains, consumption)
    }

    fn cut_at_marker<'t>(&self, text: &'t str) -> &'t str {
        match self.continuation_marker.as_ref().and_then(|marker| marker.find(text)) {
            Some(found) => text[..found.start()].trim(),
            None => text,
        }
    }
}
