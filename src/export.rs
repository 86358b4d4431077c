use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use log::info;
use serde::Serialize;

use crate::date_range::DateRange;
use crate::retrieval::Dataset;
use crate::threads::Chain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Csv,
}

impl Format {
    fn extension(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
        }
    }
}

/// Forme CSV à plat d'une [`Chain`].
#[derive(Debug, Serialize)]
pub struct ChainRow<'a> {
    pub question: &'a str,
    pub answer: Option<&'a str>,
    pub question_2: Option<&'a str>,
    pub answer_2: Option<&'a str>,
    pub links: String,
}

impl<'a> From<&'a Chain> for ChainRow<'a> {
    fn from(chain: &'a Chain) -> Self {
        ChainRow {
            question: &chain.question,
            answer: chain.answer.as_deref(),
            question_2: chain.question_2.as_deref(),
            answer_2: chain.answer_2.as_deref(),
            links: chain.links.join(", "),
        }
    }
}

/// `<prefix>_<today>` ou, avec un filtre de dates, `<prefix>_<today>_<start>_<end>_range`.
///
/// Un filtre sans date de fin s'arrête aujourd'hui.
pub fn output_stem(dataset: Dataset, today: NaiveDate, range: &DateRange) -> String {
    let prefix = match dataset {
        Dataset::Spam => "spam_mail".to_string(),
        other => format!("{}_data", other.name()),
    };
    let day = |date: NaiveDate| date.format("%d%m%Y").to_string();

    match (range.start, range.end) {
        (None, None) => format!("{}_{}", prefix, day(today)),
        (start, end) => format!(
            "{}_{}_{}_{}_range",
            prefix,
            day(today),
            start.map(day).unwrap_or_default(),
            day(end.unwrap_or(today))
        ),
    }
}

/// `path` s'il est libre, sinon le premier `<stem>_<n>.<ext>` libre avec n ≥ 2.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let extension = path.extension().and_then(|s| s.to_str());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    (2..)
        .map(|i| {
            let name = match extension {
                Some(ext) => format!("{}_{}.{}", stem, i, ext),
                None => format!("{}_{}", stem, i),
            };
            parent.join(name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

pub fn write_json<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Impossible de créer {:?}", path))?;
    serde_json::to_writer_pretty(file, records).with_context(|| format!("Impossible d'écrire {:?}", path))
}

pub fn write_csv<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("Impossible de créer {:?}", path))?;
    for row in rows {
        writer.serialize(row).with_context(|| format!("Impossible d'écrire une ligne dans {:?}", path))?;
    }
    writer.flush().with_context(|| format!("Impossible de vider le tampon de {:?}", path))?;
    Ok(())
}

/// Écrit les jeux de résultats dans `output_dir` sans jamais écraser un export précédent.
pub struct Exporter {
    output_dir: PathBuf,
    formats: Vec<Format>,
    today: NaiveDate,
    range: DateRange,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>, formats: Vec<Format>, today: NaiveDate, range: DateRange) -> Self {
        Exporter {
            output_dir: output_dir.into(),
            formats,
            today,
            range,
        }
    }

    /// Exporte `records` dans chaque format configuré ; `rows` donne la forme CSV.
    pub fn export<'r, T, R, F>(&self, dataset: Dataset, records: &'r [T], rows: F) -> Result<Vec<PathBuf>>
    where
        T: Serialize,
        R: Serialize,
        F: Fn(&'r T) -> R,
    {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Impossible de créer le dossier de sortie {:?}", self.output_dir))?;

        let stem = output_stem(dataset, self.today, &self.range);
        let mut written = Vec::new();

        for format in &self.formats {
            let path = unique_path(&self.output_dir.join(format!("{}.{}", stem, format.extension())));
            match format {
                Format::Json => write_json(&path, records)?,
                Format::Csv => write_csv(&path, records.iter().map(&rows))?,
            }
            info!("💾 {} enregistrement(s) {} sauvegardé(s) dans {:?}", records.len(), dataset.name(), path);
            written.push(path);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spam::SpamRecord;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_output_stem() {
        let today = day(2024, 3, 5);
        assert_eq!(output_stem(Dataset::Raw, today, &DateRange::unbounded()), "raw_data_05032024");
        assert_eq!(
            output_stem(Dataset::Spam, today, &DateRange::new(Some(day(2024, 1, 1)), Some(day(2024, 1, 31)))),
            "spam_mail_05032024_01012024_31012024_range"
        );
        assert_eq!(
            output_stem(Dataset::Chains, today, &DateRange::single(day(2024, 2, 1))),
            "chains_data_05032024_01022024_05032024_range"
        );
    }

    #[test]
    fn test_unique_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw_data.json");
        assert_eq!(unique_path(&path), path);

        std::fs::write(&path, "[]").unwrap();
        assert_eq!(unique_path(&path), dir.path().join("raw_data_2.json"));

        std::fs::write(dir.path().join("raw_data_2.json"), "[]").unwrap();
        assert_eq!(unique_path(&path), dir.path().join("raw_data_3.json"));
    }

    #[test]
    fn test_export_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(
            dir.path(),
            vec![Format::Json, Format::Csv],
            day(2024, 3, 5),
            DateRange::unbounded(),
        );
        let records = vec![SpamRecord {
            timestamp: None,
            subject: "Security alert".into(),
            body: "New sign-in".into(),
            signals: Default::default(),
        }];

        let first = exporter.export(Dataset::Spam, &records, |r| r.clone()).unwrap();
        let second = exporter.export(Dataset::Spam, &records, |r| r.clone()).unwrap();
        assert_eq!(first.len(), 2);
        assert_ne!(first, second);
        assert!(second[0].ends_with("spam_mail_05032024_2.json"));

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&first[0]).unwrap()).unwrap();
        assert_eq!(json[0]["subject"], "Security alert");
        assert!(json[0]["timestamp"].is_null());

        let csv = std::fs::read_to_string(&first[1]).unwrap();
        assert!(csv.starts_with("timestamp,subject,body"));
    }

    #[test]
    fn test_chain_rows_join_links() {
        let chain = Chain {
            question: "q".into(),
            answer: None,
            question_2: None,
            answer_2: None,
            links: vec!["https://a.org".into(), "https://b.org".into()],
            primary: 0,
            continuation: None,
        };
        let row = ChainRow::from(&chain);
        assert_eq!(row.links, "https://a.org, https://b.org");
    }
}
