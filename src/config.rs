use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Deserializer};

use crate::imap_client::Credentials;

pub const DEFAULT_CORPUS_URL: &str =
    "https://raw.githubusercontent.com/Apaulgithub/oibsip_taskno4/main/spam.csv";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub imap: ImapConfig,
    pub folders: FolderConfig,
    pub heuristics: HeuristicsConfig,
    pub classifier: ClassifierConfig,
    pub output_dir: String,
}

#[derive(Deserialize, Clone)]
pub struct ImapConfig {
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

// Écrit à la main pour que le mot de passe n'apparaisse jamais dans les logs
impl std::fmt::Debug for ImapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FolderConfig {
    pub inbox: String,
    pub sent: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HeuristicsConfig {
    /// Un sujet contenant l'un de ces mots-clés (sans tenir compte de la casse) est une notification système
    #[serde(deserialize_with = "keyword_list")]
    pub system_subject_keywords: Vec<String>,
    /// Un expéditeur contenant ce marqueur est le fournisseur de messagerie lui-même
    pub provider_marker: String,
    /// Les champs de relance sont coupés à cette expression
    pub continuation_marker: String,
    /// Nombre de caractères de la réponse devant réapparaître dans une question de relance
    pub continuation_prefix_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    /// URL `http(s)://` ou chemin local du corpus CSV étiqueté
    pub corpus_source: String,
}

/// Accepte une liste (fichier TOML) ou une chaîne séparée par des virgules
/// (variable d'environnement).
fn keyword_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Keywords {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Keywords::deserialize(deserializer)? {
        Keywords::List(keywords) => keywords,
        Keywords::Joined(joined) => joined
            .split(',')
            .map(|keyword| keyword.trim().to_string())
            .filter(|keyword| !keyword.is_empty())
            .collect(),
    })
}

impl Config {
    /// Charge les valeurs par défaut, puis `mailqa.toml` s'il existe, puis les variables `MAILQA_*`.
    ///
    /// Les clés imbriquées utilisent un double underscore : `MAILQA_IMAP__SERVER`,
    /// `MAILQA_FOLDERS__SENT`, `MAILQA_HEURISTICS__SYSTEM_SUBJECT_KEYWORDS` (séparés par des virgules).
    pub fn new() -> Result<Self> {
        let builder = Self::defaults()?
            .add_source(File::with_name("mailqa").required(false))
            .add_source(Self::environment());

        builder
            .build()
            .context("Impossible d'assembler la configuration")?
            .try_deserialize()
            .context("Configuration invalide")
    }

    /// Variables `MAILQA_*`, toujours lues comme des chaînes : un mot de passe
    /// numérique comme `007007` reste intact.
    pub(crate) fn environment() -> Environment {
        Environment::with_prefix("MAILQA")
            .prefix_separator("_")
            .separator("__")
    }

    pub(crate) fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let builder = config::Config::builder()
            .set_default("imap.server", "imap.gmail.com")?
            .set_default("imap.port", 993)?
            .set_default("folders.inbox", "INBOX")?
            .set_default("folders.sent", "[Gmail]/Sent Mail")?
            .set_default(
                "heuristics.system_subject_keywords",
                vec![
                    "Security alert",
                    "2-Step Verification",
                    "Güvenlik uyarısı",
                    "İki Adımlı Doğrulama",
                ],
            )?
            .set_default("heuristics.provider_marker", "google")?
            .set_default("heuristics.continuation_marker", "soru cevap")?
            .set_default("heuristics.continuation_prefix_chars", 50)?
            .set_default("classifier.corpus_source", DEFAULT_CORPUS_URL)?
            .set_default("output_dir", "./data")?;
        Ok(builder)
    }

    /// Résout les identifiants du compte, avec une aide si l'un d'eux manque.
    pub fn credentials(&self) -> Result<Credentials> {
        let mut missing_vars = Vec::new();
        if self.imap.username.is_none() {
            missing_vars.push("MAILQA_IMAP__USERNAME");
        }
        if self.imap.password.is_none() {
            missing_vars.push("MAILQA_IMAP__PASSWORD");
        }

        match (&self.imap.username, &self.imap.password) {
            (Some(account), Some(secret)) => Ok(Credentials::new(account, secret)),
            _ => anyhow::bail!(
                "Identifiants manquants : {}\n\
                 \n\
                 💡 Solutions :\n\
                 1. Créer un fichier .env avec :\n\
                    MAILQA_IMAP__USERNAME=vous@gmail.com\n\
                    MAILQA_IMAP__PASSWORD=mot-de-passe-application\n\
                 \n\
                 2. Ou passer --account / --password en ligne de commande",
                missing_vars.join(", ")
            ),
        }
    }
}
