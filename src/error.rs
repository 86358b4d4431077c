use thiserror::Error;

/// Erreurs remontées par la couche d'accès à la boîte mail.
///
/// Toutes, sauf [`RetrievalError::Fetch`], interrompent la récupération.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("impossible de joindre {host}:{port} : {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("échec de l'authentification pour {account} : {reason}")]
    Authentication { account: String, reason: String },

    #[error("erreur de session IMAP : {0}")]
    Session(String),

    #[error("impossible de récupérer le message {id} : {reason}")]
    Fetch { id: u32, reason: String },
}

impl RetrievalError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RetrievalError::Fetch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_fetch_errors_are_recoverable() {
        let fetch = RetrievalError::Fetch { id: 7, reason: "timeout".into() };
        assert!(!fetch.is_fatal());
        assert_eq!(fetch.to_string(), "impossible de récupérer le message 7 : timeout");

        let auth = RetrievalError::Authentication {
            account: "me@example.com".into(),
            reason: "[AUTHENTICATIONFAILED] Invalid credentials".into(),
        };
        assert!(auth.is_fatal());
        assert!(RetrievalError::Session("connection lost".into()).is_fatal());
    }
}
