use chrono::NaiveDateTime;
use log::{debug, info};
use serde::Serialize;

use super::classifier::SpamClassifier;
use crate::email::Message;
use crate::heuristics::NoticeFilter;

/// Signaux déclenchés pour un message retenu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub spam: bool,
    pub system: bool,
    pub provider: bool,
}

impl Signals {
    pub fn any(&self) -> bool {
        self.spam || self.system || self.provider
    }
}

/// Message retenu par la vue spam/système.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpamRecord {
    pub timestamp: Option<NaiveDateTime>,
    pub subject: String,
    pub body: String,
    #[serde(skip)]
    pub signals: Signals,
}

pub struct SpamDetector<'a> {
    classifier: &'a SpamClassifier,
    filter: &'a NoticeFilter,
}

impl<'a> SpamDetector<'a> {
    pub fn new(classifier: &'a SpamClassifier, filter: &'a NoticeFilter) -> Self {
        SpamDetector { classifier, filter }
    }

    pub fn signals(&self, message: &Message) -> Signals {
        Signals {
            spam: self.classifier.is_spam(&message.question.text),
            system: self.filter.is_system_subject(&message.subject),
            provider: self.filter.is_provider_sender(&message.sender),
        }
    }

    /// `None` pour un message sans corps ou sans aucun signal.
    pub fn inspect(&self, message: &Message) -> Option<SpamRecord> {
        if message.question.is_empty() {
            return None;
        }
        let signals = self.signals(message);
        if !signals.any() {
            return None;
        }
        debug!("{} retenu : {:?}", message.message_id, signals);
        Some(SpamRecord {
            timestamp: message.timestamp,
            subject: message.subject.clone(),
            body: message.question.text.clone(),
            signals,
        })
    }

    pub fn scan<'m, I>(&self, messages: I) -> Vec<SpamRecord>
    where
        I: IntoIterator<Item = &'m Message>,
    {
        let records: Vec<SpamRecord> = messages.into_iter().filter_map(|m| self.inspect(m)).collect();
        info!("📨 {} message(s) spam ou système trouvé(s)", records.len());
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::Body;
    use crate::spam::classifier::Label;

    fn classifier() -> SpamClassifier {
        SpamClassifier::train([
            (Label::Spam, "You have won! Click now to claim your prize"),
            (Label::Spam, "Claim your free prize now, click the link"),
            (Label::Ham, "Can we meet after class to go over the homework?"),
            (Label::Ham, "Thanks for the notes, see you tomorrow"),
        ])
        .unwrap()
    }

    fn message(sender: &str, subject: &str, body: &str) -> Message {
        Message {
            message_id: format!("{}-{}", sender, subject),
            in_reply_to: None,
            references: Vec::new(),
            sender: sender.to_string(),
            subject: subject.to_string(),
            timestamp: None,
            question: Body::from_raw(body),
            answer: None,
        }
    }

    #[test]
    fn test_signals_are_combined() {
        let classifier = classifier();
        let filter = NoticeFilter::new(&["Security alert"], "google");
        let detector = SpamDetector::new(&classifier, &filter);

        let messages = vec![
            message("friend@example.com", "Hi", "You've won! Click now to claim your prize"),
            message("friend@example.com", "Security alert", "Can we meet after class?"),
            message("no-reply@accounts.google.com", "Storage", "See you tomorrow"),
            message("friend@example.com", "Notes", "Thanks for the notes, see you tomorrow"),
        ];
        let records = detector.scan(&messages);

        assert_eq!(records.len(), 3);
        assert!(records[0].signals.spam);
        assert!(records[1].signals.system && !records[1].signals.spam);
        assert!(records[2].signals.provider);
    }

    #[test]
    fn test_empty_body_is_never_retained() {
        let classifier = classifier();
        let filter = NoticeFilter::new(&["Security alert"], "google");
        let detector = SpamDetector::new(&classifier, &filter);

        let alert = message("no-reply@accounts.google.com", "Security alert", "<img src=x>");
        assert!(detector.inspect(&alert).is_none());
    }
}
