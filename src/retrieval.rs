use anyhow::Result;
use clap::ValueEnum;
use log::{debug, error, info, warn};

use crate::config::{FolderConfig, HeuristicsConfig};
use crate::date_range::DateRange;
use crate::email::{Message, MessageNormalizer, MessageRecord};
use crate::error::RetrievalError;
use crate::heuristics::NoticeFilter;
use crate::imap_client::MailSession;
use crate::spam::{SpamClassifier, SpamDetector, SpamRecord};
use crate::threads::{reconstruct, Chain, ChainBuilder};

/// Jeux de résultats qu'une récupération peut produire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Dataset {
    /// Messages reçus avec leur première réponse tirée des envoyés
    Raw,
    /// Chaînes question/réponse construites à partir de la vue raw
    Chains,
    /// Spam, notifications système et courrier du fournisseur
    Spam,
    /// Messages reçus marqués d'une étoile
    Starred,
}

impl Dataset {
    pub fn name(&self) -> &'static str {
        match self {
            Dataset::Raw => "raw",
            Dataset::Chains => "chains",
            Dataset::Spam => "spam",
            Dataset::Starred => "starred",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetrievalRequest {
    pub datasets: Vec<Dataset>,
    pub range: DateRange,
}

impl RetrievalRequest {
    pub fn new(datasets: Vec<Dataset>, range: DateRange) -> Self {
        RetrievalRequest { datasets, range }
    }

    pub fn wants(&self, dataset: Dataset) -> bool {
        self.datasets.contains(&dataset)
    }
}

/// Une entrée par jeu demandé ; `None` signifie « non demandé ».
#[derive(Debug, Default)]
pub struct RetrievalOutput {
    pub raw: Option<Vec<MessageRecord>>,
    pub chains: Option<Vec<Chain>>,
    pub spam: Option<Vec<SpamRecord>>,
    pub starred: Option<Vec<MessageRecord>>,
}

pub struct Retriever<'a> {
    folders: FolderConfig,
    filter: NoticeFilter,
    chain_builder: ChainBuilder,
    classifier: Option<&'a SpamClassifier>,
}

impl<'a> Retriever<'a> {
    pub fn new(folders: &FolderConfig, heuristics: &HeuristicsConfig) -> Result<Self> {
        Ok(Retriever {
            folders: folders.clone(),
            filter: NoticeFilter::from_config(heuristics),
            chain_builder: ChainBuilder::from_config(heuristics)?,
            classifier: None,
        })
    }

    pub fn with_classifier(mut self, classifier: &'a SpamClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Exécute chaque vue demandée sur `session`, puis la ferme.
    ///
    /// La déconnexion a lieu en cas de succès comme d'échec ; une erreur de
    /// déconnexion n'est remontée que si rien d'autre n'a échoué.
    pub async fn run<S: MailSession>(
        &self,
        mut session: S,
        request: &RetrievalRequest,
    ) -> Result<RetrievalOutput, RetrievalError> {
        let result = self.collect(&mut session, request).await;
        let closed = session.close().await;

        match (result, closed) {
            (Ok(output), Ok(())) => Ok(output),
            (Ok(_), Err(e)) => {
                error!("❌ Échec de la déconnexion : {}", e);
                Err(e)
            }
            (Err(e), closed) => {
                if let Err(close_error) = closed {
                    warn!("La déconnexion après l'échec a aussi échoué : {}", close_error);
                }
                Err(e)
            }
        }
    }

    async fn collect<S: MailSession>(
        &self,
        session: &mut S,
        request: &RetrievalRequest,
    ) -> Result<RetrievalOutput, RetrievalError> {
        let mut output = RetrievalOutput::default();
        let range = request.range;

        let wants_threads = request.wants(Dataset::Raw) || request.wants(Dataset::Chains);

        if wants_threads || request.wants(Dataset::Spam) {
            let inbox = self.fetch_folder(session, &self.folders.inbox, "ALL").await?;
            info!("📥 {} message(s) lu(s) depuis {}", inbox.len(), self.folders.inbox);

            if request.wants(Dataset::Spam) {
                output.spam = self.detect_spam(&inbox, range);
            }

            if wants_threads {
                let sent = self.fetch_folder(session, &self.folders.sent, "ALL").await?;
                info!("📤 {} message(s) lu(s) depuis {}", sent.len(), self.folders.sent);

                let threads = reconstruct(range, inbox, sent);
                info!("✅ {} message(s) reçu(s) conservé(s)", threads.len());

                if request.wants(Dataset::Chains) {
                    output.chains = Some(self.chain_builder.build(&threads));
                }
                if request.wants(Dataset::Raw) {
                    output.raw = Some(threads.iter().map(MessageRecord::from).collect());
                }
            }
        }

        if request.wants(Dataset::Starred) {
            let starred = self.fetch_folder(session, &self.folders.inbox, "FLAGGED").await?;
            output.starred = Some(
                starred
                    .iter()
                    .filter(|m| range.contains(m.timestamp))
                    .map(MessageRecord::from)
                    .collect(),
            );
        }

        Ok(output)
    }

    fn detect_spam(&self, inbox: &[Message], range: DateRange) -> Option<Vec<SpamRecord>> {
        let Some(classifier) = self.classifier else {
            warn!("Vue spam demandée sans classifieur entraîné, ignorée");
            return None;
        };
        let detector = SpamDetector::new(classifier, &self.filter);
        Some(detector.scan(inbox.iter().filter(|m| range.contains(m.timestamp))))
    }

    /// Récupère et normalise chaque message de `folder` correspondant à `criteria`.
    ///
    /// Les messages impossibles à télécharger ou à décoder sont ignorés.
    async fn fetch_folder<S: MailSession>(
        &self,
        session: &mut S,
        folder: &str,
        criteria: &str,
    ) -> Result<Vec<Message>, RetrievalError> {
        let ids = session.search_ids(folder, criteria).await?;
        debug!("{} identifiant(s) à récupérer dans {}", ids.len(), folder);

        let mut messages = Vec::with_capacity(ids.len());
        for id in ids {
            let raw = match session.fetch_raw(id).await {
                Ok(raw) => raw,
                Err(e) if !e.is_fatal() => {
                    warn!("⚠️ Message {} de {} ignoré : {}", id, folder, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            match MessageNormalizer::parse(&raw) {
                Some(message) => messages.push(message),
                None => debug!("Message {} de {} sans Message-ID exploitable, écarté", id, folder),
            }
        }
        Ok(messages)
    }
}
