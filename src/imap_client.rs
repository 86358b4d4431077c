use async_imap::error::Error as ImapError;
use async_imap::Session;
use futures::future::LocalBoxFuture;
use futures::stream::StreamExt;
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio_native_tls::{native_tls, TlsConnector, TlsStream};
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use crate::config::ImapConfig;
use crate::error::RetrievalError;

/// Identifiant et secret du compte, fournis à chaque exécution.
#[derive(Clone)]
pub struct Credentials {
    account: String,
    secret: String,
}

impl Credentials {
    pub fn new(account: impl Into<String>, secret: impl Into<String>) -> Self {
        Credentials {
            account: account.into(),
            secret: secret.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("secret", &"***")
            .finish()
    }
}

/// Session ouverte et authentifiée sur une boîte mail.
///
/// La récupération ne passe que par ce trait, ce qui permet de la faire
/// tourner sur une boîte en mémoire dans les tests.
pub trait MailSession: Sized + 'static {
    /// Sélectionne `folder` et renvoie les numéros de séquence correspondant à
    /// `criteria`, du plus ancien au plus récent. Un dossier impossible à
    /// sélectionner ne renvoie aucun identifiant.
    fn search_ids<'a>(
        &'a mut self,
        folder: &'a str,
        criteria: &'a str,
    ) -> LocalBoxFuture<'a, Result<Vec<u32>, RetrievalError>>;

    /// Représentation RFC822 complète d'un message du dossier sélectionné.
    fn fetch_raw(&mut self, id: u32) -> LocalBoxFuture<'_, Result<Vec<u8>, RetrievalError>>;

    /// Déconnexion (LOGOUT) et fermeture de la connexion.
    fn close(self) -> LocalBoxFuture<'static, Result<(), RetrievalError>>;
}

/// Classe une erreur de FETCH : une connexion perdue interrompt la session,
/// le reste ne concerne que le message demandé.
pub(crate) fn fetch_failure(id: u32, error: ImapError) -> RetrievalError {
    match error {
        ImapError::Io(_) | ImapError::ConnectionLost => {
            RetrievalError::Session(format!("FETCH {} interrompu : {}", id, error))
        }
        other => RetrievalError::Fetch {
            id,
            reason: other.to_string(),
        },
    }
}

type ImapStream = Compat<TlsStream<TcpStream>>;

pub struct ImapClient {
    session: Session<ImapStream>,
}

impl ImapClient {
    pub async fn connect(config: &ImapConfig, credentials: &Credentials) -> Result<Self, RetrievalError> {
        info!("Connexion au serveur IMAP {}:{}", config.server, config.port);

        let connection_error = |reason: String| RetrievalError::Connection {
            host: config.server.clone(),
            port: config.port,
            reason,
        };

        // Créer une connexion TCP
        let tcp_stream = TcpStream::connect((config.server.as_str(), config.port))
            .await
            .map_err(|e| connection_error(e.to_string()))?;

        // Créer une connexion TLS
        let tls = native_tls::TlsConnector::builder()
            .build()
            .map_err(|e| connection_error(e.to_string()))?;
        let tls_stream = TlsConnector::from(tls)
            .connect(&config.server, tcp_stream)
            .await
            .map_err(|e| connection_error(format!("échec de la négociation TLS : {}", e)))?;

        // Wrapper pour compatibilité futures
        let client = async_imap::Client::new(tls_stream.compat());

        // Authentification
        let session = client
            .login(credentials.account(), &credentials.secret)
            .await
            .map_err(|(e, _)| RetrievalError::Authentication {
                account: credentials.account().to_string(),
                reason: e.to_string(),
            })?;

        info!("✅ Session IMAP établie pour {}", credentials.account());

        Ok(ImapClient { session })
    }
}

impl MailSession for ImapClient {
    fn search_ids<'a>(
        &'a mut self,
        folder: &'a str,
        criteria: &'a str,
    ) -> LocalBoxFuture<'a, Result<Vec<u32>, RetrievalError>> {
        Box::pin(async move {
            match self.session.select(folder).await {
                Ok(mailbox) => debug!("Dossier {} sélectionné ({} messages)", folder, mailbox.exists),
                Err(ImapError::No(reason)) | Err(ImapError::Bad(reason)) => {
                    warn!("Impossible de sélectionner le dossier {} : {}", folder, reason);
                    return Ok(Vec::new());
                }
                Err(e) => {
                    return Err(RetrievalError::Session(format!(
                        "échec de SELECT {} : {}",
                        folder, e
                    )))
                }
            }

            let ids = match self.session.search(criteria).await {
                Ok(ids) => ids,
                Err(ImapError::No(reason)) | Err(ImapError::Bad(reason)) => {
                    warn!("SEARCH {} refusé dans {} : {}", criteria, folder, reason);
                    return Ok(Vec::new());
                }
                Err(e) => {
                    return Err(RetrievalError::Session(format!(
                        "échec de SEARCH {} : {}",
                        criteria, e
                    )))
                }
            };

            // SEARCH renvoie un ensemble non ordonné
            let mut ids: Vec<u32> = ids.into_iter().collect();
            ids.sort_unstable();

            debug!("{} message(s) correspondant à {} dans {}", ids.len(), criteria, folder);
            Ok(ids)
        })
    }

    fn fetch_raw(&mut self, id: u32) -> LocalBoxFuture<'_, Result<Vec<u8>, RetrievalError>> {
        Box::pin(async move {
            let responses = self
                .session
                .fetch(id.to_string(), "RFC822")
                .await
                .map_err(|e| fetch_failure(id, e))?;
            futures::pin_mut!(responses);

            let mut body = None;
            while let Some(response) = responses.next().await {
                match response {
                    Ok(fetch) => {
                        if body.is_none() {
                            body = fetch.body().map(<[u8]>::to_vec);
                        }
                    }
                    Err(e) => {
                        let failure = fetch_failure(id, e);
                        if failure.is_fatal() {
                            return Err(failure);
                        }
                        warn!("Réponse FETCH ignorée pour le message {} : {}", id, failure);
                    }
                }
            }

            let body = body.ok_or_else(|| RetrievalError::Fetch {
                id,
                reason: "réponse FETCH vide".to_string(),
            })?;

            debug!("Message {} récupéré, taille : {} bytes", id, body.len());
            Ok(body)
        })
    }

    fn close(mut self) -> LocalBoxFuture<'static, Result<(), RetrievalError>> {
        Box::pin(async move {
            info!("Déconnexion du serveur IMAP");
            self.session
                .logout()
                .await
                .map_err(|e| RetrievalError::Session(format!("échec de LOGOUT : {}", e)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lost_connection_aborts_fetch() {
        let lost = fetch_failure(3, ImapError::ConnectionLost);
        assert!(lost.is_fatal());
        assert!(matches!(lost, RetrievalError::Session(_)));

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe");
        assert!(fetch_failure(3, ImapError::Io(io)).is_fatal());
    }

    #[test]
    fn test_rejected_fetch_only_skips_the_message() {
        let rejected = fetch_failure(4, ImapError::No("message expunged".into()));
        assert!(!rejected.is_fatal());
        assert!(matches!(rejected, RetrievalError::Fetch { id: 4, .. }));
    }
}
