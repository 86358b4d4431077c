use crate::config::HeuristicsConfig;
use crate::email::Message;

/// Reconnaît le courrier automatique : notifications système d'après le sujet
/// et messages envoyés par le fournisseur de messagerie lui-même.
#[derive(Debug, Clone)]
pub struct NoticeFilter {
    subject_keywords: Vec<String>,
    provider_marker: String,
}

impl NoticeFilter {
    pub fn new<S: AsRef<str>>(subject_keywords: &[S], provider_marker: &str) -> Self {
        NoticeFilter {
            subject_keywords: subject_keywords
                .iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            provider_marker: provider_marker.to_lowercase(),
        }
    }

    pub fn from_config(config: &HeuristicsConfig) -> Self {
        Self::new(config.system_subject_keywords.as_slice(), &config.provider_marker)
    }

    pub fn is_system_subject(&self, subject: &str) -> bool {
        if subject.is_empty() {
            return false;
        }
        let subject = subject.to_lowercase();
        self.subject_keywords.iter().any(|k| subject.contains(k.as_str()))
    }

    pub fn is_provider_sender(&self, sender: &str) -> bool {
        !self.provider_marker.is_empty() && sender.to_lowercase().contains(&self.provider_marker)
    }

    pub fn is_automated(&self, message: &Message) -> bool {
        self.is_provider_sender(&message.sender) || self.is_system_subject(&message.subject)
    }
}
