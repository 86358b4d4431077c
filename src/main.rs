use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::Parser;
use log::{error, info};

use mailqa::config::Config;
use mailqa::date_range::DateRange;
use mailqa::export::{ChainRow, Exporter, Format};
use mailqa::imap_client::ImapClient;
use mailqa::retrieval::{Dataset, RetrievalOutput, RetrievalRequest, Retriever};
use mailqa::spam::{Corpus, SpamClassifier};

#[derive(Parser)]
#[command(name = "mailqa")]
#[command(about = "Construit des jeux de données questions/réponses à partir d'une boîte mail")]
#[command(version = "0.1.0")]
struct Args {
    /// Jeux de résultats à produire (répétable)
    #[arg(short = 'd', long = "dataset", value_enum, default_values_t = [Dataset::Raw])]
    datasets: Vec<Dataset>,

    /// Formats de sortie (répétable)
    #[arg(short = 'f', long = "format", value_enum, default_values_t = [Format::Json])]
    formats: Vec<Format>,

    /// Ne garder que les messages envoyés ce jour ou après (AAAA-MM-JJ)
    #[arg(long, conflicts_with_all = ["from", "to"])]
    date: Option<NaiveDate>,

    /// Début de la plage de dates, inclus (AAAA-MM-JJ)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Fin de la plage de dates, incluse (AAAA-MM-JJ)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Compte de la boîte mail, remplace MAILQA_IMAP__USERNAME
    #[arg(long)]
    account: Option<String>,

    /// Mot de passe, remplace MAILQA_IMAP__PASSWORD
    #[arg(long)]
    password: Option<String>,

    /// Dossier où les exports sont écrits
    #[arg(short = 'o', long)]
    output_dir: Option<String>,

    /// Récupérer et afficher le bilan sans écrire de fichier
    #[arg(long)]
    dry_run: bool,

    /// Vérifier la configuration sans se connecter
    #[arg(long)]
    check_config: bool,
}

impl Args {
    fn range(&self) -> Result<DateRange> {
        match self.date {
            Some(day) => Ok(DateRange::single(day)),
            None => DateRange::checked(self.from, self.to),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Charger le fichier .env s'il existe
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::init();

    let range = args.range()?;

    let mut config = Config::new()?;
    if let Some(account) = &args.account {
        config.imap.username = Some(account.clone());
    }
    if let Some(password) = &args.password {
        config.imap.password = Some(password.clone());
    }
    if let Some(output_dir) = &args.output_dir {
        config.output_dir = output_dir.clone();
    }

    if args.check_config {
        println!("✅ Configuration valide");
        println!("📧 IMAP : {}:{}", config.imap.server, config.imap.port);
        println!("👤 Compte : {}", config.imap.username.as_deref().unwrap_or("(non défini)"));
        println!("📁 Dossiers : {} / {}", config.folders.inbox, config.folders.sent);
        println!("📚 Corpus de spam : {}", config.classifier.corpus_source);
        println!("💾 Dossier de sortie : {}", config.output_dir);
        return Ok(());
    }

    let mut datasets = args.datasets.clone();
    datasets.sort();
    datasets.dedup();

    if args.dry_run {
        info!("🧪 Mode dry-run, aucun fichier ne sera écrit");
    }
    if range.is_unbounded() {
        info!("🚀 Récupération de {:?} sur toute la boîte", datasets);
    } else {
        info!("🚀 Récupération de {:?} entre {:?} et {:?}", datasets, range.start, range.end);
    }

    // Avant la connexion : un corpus en erreur ne doit pas laisser de session ouverte
    let classifier = if datasets.contains(&Dataset::Spam) {
        Some(train_classifier(&config.classifier.corpus_source).await?)
    } else {
        None
    };

    let credentials = config.credentials()?;
    let session = ImapClient::connect(&config.imap, &credentials).await?;

    let mut retriever = Retriever::new(&config.folders, &config.heuristics)?;
    if let Some(classifier) = &classifier {
        retriever = retriever.with_classifier(classifier);
    }

    let request = RetrievalRequest::new(datasets.clone(), range);
    let output = match retriever.run(session, &request).await {
        Ok(output) => output,
        Err(e) => {
            error!("❌ Échec de la récupération : {}", e);
            return Err(e.into());
        }
    };

    let exporter = Exporter::new(&config.output_dir, args.formats.clone(), Local::now().date_naive(), range);
    report(&exporter, &output, &datasets, args.dry_run)?;

    info!("✅ Terminé");
    Ok(())
}

async fn train_classifier(source: &str) -> Result<SpamClassifier> {
    let corpus = Corpus::load(source).await?;
    corpus.train()
}

fn report(exporter: &Exporter, output: &RetrievalOutput, datasets: &[Dataset], dry_run: bool) -> Result<()> {
    for dataset in datasets {
        let (count, written) = match dataset {
            Dataset::Raw => export_or_count(exporter, *dataset, output.raw.as_deref(), dry_run, |r| r)?,
            Dataset::Starred => export_or_count(exporter, *dataset, output.starred.as_deref(), dry_run, |r| r)?,
            Dataset::Spam => export_or_count(exporter, *dataset, output.spam.as_deref(), dry_run, |r| r)?,
            Dataset::Chains => {
                export_or_count(exporter, *dataset, output.chains.as_deref(), dry_run, ChainRow::from)?
            }
        };

        match (count, written) {
            (0, _) => println!("📭 {} : aucune donnée trouvée", dataset.name()),
            (n, None) => println!("🔍 {} : {} enregistrement(s) (dry-run, rien d'écrit)", dataset.name(), n),
            (n, Some(paths)) => {
                for path in paths {
                    println!("💾 {} : {} enregistrement(s) → {}", dataset.name(), n, path.display());
                }
            }
        }
    }
    Ok(())
}

fn export_or_count<'r, T, R, F>(
    exporter: &Exporter,
    dataset: Dataset,
    records: Option<&'r [T]>,
    dry_run: bool,
    rows: F,
) -> Result<(usize, Option<Vec<std::path::PathBuf>>)>
where
    T: serde::Serialize,
    R: serde::Serialize,
    F: Fn(&'r T) -> R,
{
    let records = records.unwrap_or_default();
    if records.is_empty() || dry_run {
        return Ok((records.len(), None));
    }
    let paths = exporter.export(dataset, records, rows)?;
    Ok((records.len(), Some(paths)))
}
