use anyhow::{Context, Result};
use csv::ReaderBuilder;
use log::{debug, info, warn};

use super::classifier::{Label, SpamClassifier};

/// Message d'entraînement étiqueté.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub label: Label,
    pub text: String,
}

/// Messages étiquetés servant à entraîner le classifieur de spam.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    samples: Vec<Sample>,
}

impl Corpus {
    /// Lit le corpus depuis une URL `http(s)://` ou un fichier local.
    pub async fn load(source: &str) -> Result<Self> {
        let content = if source.starts_with("http://") || source.starts_with("https://") {
            info!("Téléchargement du corpus de spam depuis {}", source);
            let response = reqwest::get(source)
                .await
                .with_context(|| format!("Impossible de télécharger le corpus de spam depuis {}", source))?
                .error_for_status()
                .with_context(|| format!("La requête du corpus de spam vers {} a échoué", source))?;
            response
                .bytes()
                .await
                .context("Impossible de lire la réponse du corpus de spam")?
                .to_vec()
        } else {
            info!("Lecture du corpus de spam depuis {}", source);
            tokio::fs::read(source)
                .await
                .with_context(|| format!("Impossible de lire le fichier de corpus {}", source))?
        };

        Self::from_csv(&content)
    }

    /// Lit un CSV dont la première colonne est l'étiquette et la deuxième le message.
    ///
    /// L'étiquette `spam` désigne un spam, toute autre valeur un ham. Les colonnes
    /// supplémentaires sont ignorées ; le contenu peut être en UTF-8 ou ISO-8859-1.
    pub fn from_csv(content: &[u8]) -> Result<Self> {
        let content_str = match std::str::from_utf8(content) {
            Ok(s) => s.to_string(),
            // En ISO-8859-1, chaque octet correspond au point de code de même valeur
            Err(_) => content.iter().map(|&b| b as char).collect(),
        };

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(content_str.as_bytes());

        let headers = rdr.headers().context("Impossible de lire les en-têtes CSV du corpus")?;
        debug!("En-têtes CSV du corpus : {:?}", headers);

        let mut samples = Vec::new();
        for (line_num, result) in rdr.records().enumerate() {
            let record = result.with_context(|| format!("Erreur CSV dans le corpus à la ligne {}", line_num + 2))?;

            let (Some(label), Some(text)) = (record.get(0), record.get(1)) else {
                warn!("Ligne {} du corpus ignorée : pas assez de colonnes ({} < 2)", line_num + 2, record.len());
                continue;
            };

            let label = if label.trim().eq_ignore_ascii_case("spam") {
                Label::Spam
            } else {
                Label::Ham
            };
            samples.push(Sample {
                label,
                text: text.to_string(),
            });
        }

        info!(
            "Corpus chargé : {} messages, dont {} spam",
            samples.len(),
            samples.iter().filter(|s| s.label == Label::Spam).count()
        );
        Ok(Corpus { samples })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn train(&self) -> Result<SpamClassifier> {
        SpamClassifier::train(self.samples.iter().map(|s| (s.label, s.text.as_str())))
            .context("Impossible d'entraîner le classifieur de spam")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_parsing() {
        let csv_content = b"v1,v2,,,
ham,\"Go until jurong point, crazy..\",,,
spam,Free entry in 2 a wkly comp to win FA Cup final tkts,,,
ham,Ok lar... Joking wif u oni...
";
        let corpus = Corpus::from_csv(csv_content).unwrap();
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.samples()[0].text, "Go until jurong point, crazy..");
        assert_eq!(corpus.samples()[1].label, Label::Spam);
        assert_eq!(corpus.samples()[2].label, Label::Ham);
    }

    #[test]
    fn test_latin1_fallback() {
        // 0xA3 is the pound sign in ISO-8859-1
        let csv_content = b"v1,v2\nspam,Win \xA3100 now\nham,see you\n";
        let corpus = Corpus::from_csv(csv_content).unwrap();
        assert_eq!(corpus.samples()[0].text, "Win \u{a3}100 now");
        assert!(corpus.train().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spam.csv");
        std::fs::write(&path, "v1,v2\nspam,claim your prize now\nham,lunch tomorrow?\n").unwrap();

        let corpus = Corpus::load(path.to_str().unwrap()).await.unwrap();
        assert_eq!(corpus.len(), 2);
        assert!(Corpus::load("/nonexistent/spam.csv").await.is_err());
    }
}
