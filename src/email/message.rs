use chrono::NaiveDateTime;
use serde::Serialize;

use super::normalizer::clean_text;

/// Corps d'un message sous ses deux formes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Body {
    /// Contenu décodé, retours à la ligne aplatis ; le balisage est conservé
    pub raw: String,
    /// `raw` sans balisage, sans images et sans espaces multiples
    pub text: String,
}

impl Body {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let text = clean_text(&raw);
        Body { raw, text }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Message récupéré et normalisé.
///
/// `in_reply_to` et `references` sont de simples identifiants ; un message
/// ne possède jamais un autre message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub message_id: String,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
    pub sender: String,
    pub subject: String,
    /// UTC sans fuseau
    pub timestamp: Option<NaiveDateTime>,
    pub question: Body,
    pub answer: Option<Body>,
}

impl Message {
    pub fn to_record(&self) -> MessageRecord {
        MessageRecord::from(self)
    }
}

/// Forme à plat exportée pour les jeux raw et starred.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRecord {
    pub message_id: String,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    pub sender: String,
    pub subject: String,
    pub timestamp: Option<NaiveDateTime>,
    pub question_text: String,
    pub answer_text: Option<String>,
}

impl From<&Message> for MessageRecord {
    fn from(message: &Message) -> Self {
        MessageRecord {
            message_id: message.message_id.clone(),
            in_reply_to: message.in_reply_to.clone(),
            references: if message.references.is_empty() {
                None
            } else {
                Some(message.references.join(" "))
            },
            sender: message.sender.clone(),
            subject: message.subject.clone(),
            timestamp: message.timestamp,
            question_text: message.question.text.clone(),
            answer_text: message.answer.as_ref().map(|answer| answer.text.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_record_serializes_iso_timestamp_and_nulls() {
        let message = Message {
            message_id: "m1@example.com".into(),
            in_reply_to: None,
            references: vec!["a@x".into(), "b@x".into()],
            sender: "alice@example.com".into(),
            subject: "Password".into(),
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 15)
                .and_then(|d| d.and_hms_opt(7, 30, 0)),
            question: Body::from_raw("<p>How do I reset my password?</p>"),
            answer: None,
        };

        let json = serde_json::to_value(message.to_record()).unwrap();
        assert_eq!(json["timestamp"], "2024-01-15T07:30:00");
        assert_eq!(json["references"], "a@x b@x");
        assert_eq!(json["question_text"], "How do I reset my password?");
        assert!(json["answer_text"].is_null());
        assert!(json["in_reply_to"].is_null());
    }
}
