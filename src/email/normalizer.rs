use chrono::{DateTime, NaiveDateTime};
use log::debug;
use mail_parser::{HeaderValue, MessagePart, MessageParser, MimeHeaders, PartType};
use once_cell::sync::Lazy;
use regex::Regex;

use super::message::{Body, Message};

static IMAGE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[image:.*?\]").expect("valid image placeholder pattern"));
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<.*?>").expect("valid tag pattern"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Formats essayés pour les en-têtes `Date` sans fuseau horaire.
const ZONELESS_DATE_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

pub struct MessageNormalizer;

impl MessageNormalizer {
    /// Décode un message RFC822 brut.
    ///
    /// Renvoie `None` si les octets ne forment pas un message ou si le
    /// Message-ID est absent : un tel message ne peut pas être corrélé.
    pub fn parse(raw: &[u8]) -> Option<Message> {
        let parsed = match MessageParser::default().parse(raw) {
            Some(parsed) => parsed,
            None => {
                debug!("Message illisible ({} bytes) ignoré", raw.len());
                return None;
            }
        };

        let message_id = parsed
            .message_id()
            .map(str::trim)
            .filter(|id| !id.is_empty())?
            .to_string();

        let in_reply_to = header_ids(parsed.in_reply_to()).into_iter().next();
        let references = header_ids(parsed.references());

        let sender = parsed
            .from()
            .and_then(|addrs| addrs.first())
            .and_then(|addr| addr.address.as_deref())
            .unwrap_or_default()
            .to_string();

        let subject = parsed.subject().unwrap_or_default().to_string();

        // En-tête brut d'abord, la date de mail-parser en secours
        let timestamp = raw_date_header(raw)
            .and_then(|value| parse_date_header(&value))
            .or_else(|| {
                parsed
                    .date()
                    .filter(|date| date.is_valid())
                    .and_then(|date| DateTime::from_timestamp(date.to_timestamp(), 0))
                    .map(|dt| dt.naive_utc())
            });

        let body = parsed
            .parts
            .iter()
            .filter(|part| is_body_part(part))
            .find_map(|part| match &part.body {
                PartType::Text(text) | PartType::Html(text) => Some(flatten_lines(text)),
                _ => None,
            })
            .unwrap_or_default();

        Some(Message {
            message_id,
            in_reply_to,
            references,
            sender,
            subject,
            timestamp,
            question: Body::from_raw(body),
            answer: None,
        })
    }
}

/// `text/plain`, `text/html`, ou une partie sans Content-Type (text/plain par défaut).
///
/// mail-parser range tous les `text/*` dans `PartType::Text`, d'où ce filtre.
fn is_body_part(part: &MessagePart) -> bool {
    match part.content_type() {
        None => true,
        Some(content_type) => {
            content_type.ctype().eq_ignore_ascii_case("text")
                && content_type
                    .subtype()
                    .map_or(true, |subtype| {
                        subtype.eq_ignore_ascii_case("plain") || subtype.eq_ignore_ascii_case("html")
                    })
        }
    }
}

fn header_ids(value: &HeaderValue) -> Vec<String> {
    match value {
        HeaderValue::Text(id) => vec![id.trim().to_string()],
        HeaderValue::TextList(ids) => ids.iter().map(|id| id.trim().to_string()).collect(),
        _ => Vec::new(),
    }
    .into_iter()
    .filter(|id| !id.is_empty())
    .collect()
}

/// Valeur de l'en-tête `Date`, dépliée, lue directement dans le bloc d'en-têtes.
fn raw_date_header(raw: &[u8]) -> Option<String> {
    let headers = String::from_utf8_lossy(raw);
    let mut lines = headers.lines().take_while(|line| !line.is_empty());

    while let Some(line) = lines.next() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.eq_ignore_ascii_case("date") {
            continue;
        }
        let mut value = value.trim().to_string();
        for continuation in lines.by_ref() {
            if !continuation.starts_with([' ', '\t']) {
                break;
            }
            value.push(' ');
            value.push_str(continuation.trim());
        }
        return Some(value);
    }
    None
}

/// Convertit une valeur `Date` RFC 5322 en UTC naïf.
///
/// Les valeurs avec fuseau sont ramenées en UTC, celles sans fuseau sont gardées telles quelles.
pub fn parse_date_header(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.naive_utc());
    }
    ZONELESS_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Supprime les retours chariot, remplace les sauts de ligne par des espaces et trim.
pub fn flatten_lines(text: &str) -> String {
    text.replace('\r', "").replace('\n', " ").trim().to_string()
}

/// Retire les `[image:...]` et les balises HTML, puis réduit les espaces.
pub fn clean_text(text: &str) -> String {
    let text = IMAGE_PLACEHOLDER.replace_all(text, "");
    let text = HTML_TAG.replace_all(&text, "");
    WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(
            clean_text("  <div>Hello   <b>world</b></div>[image: logo.png]\t\n  bye "),
            "Hello world bye"
        );
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("<br><br>"), "");
    }

    #[test]
    fn test_flatten_lines() {
        assert_eq!(flatten_lines("line one\r\nline two\n"), "line one line two");
    }

    #[test]
    fn test_parse_date_header_converts_to_utc() {
        assert_eq!(
            parse_date_header("Mon, 15 Jan 2024 10:00:00 +0300"),
            Some(at(2024, 1, 15, 7, 0, 0))
        );
        assert_eq!(
            parse_date_header(" Wed, 31 Jan 2024 23:30:00 -0200 "),
            Some(at(2024, 2, 1, 1, 30, 0))
        );
    }

    #[test]
    fn test_parse_date_header_keeps_zoneless_values() {
        assert_eq!(
            parse_date_header("Mon, 15 Jan 2024 10:00:00"),
            Some(at(2024, 1, 15, 10, 0, 0))
        );
        assert_eq!(parse_date_header("not a date"), None);
    }

    #[test]
    fn test_parse_message() {
        let raw = b"Message-ID: <q1@example.com>\r\n\
From: Alice <Alice@Example.com>\r\n\
Subject: =?UTF-8?Q?G=C3=BCvenlik_uyar=C4=B1s=C4=B1?=\r\n\
Date: Mon, 15 Jan 2024 10:00:00 +0000\r\n\
References: <r0@example.com> <r1@example.com>\r\n\
In-Reply-To: <r1@example.com>\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Hello,\r\nhow are you?\r\n";

        let message = MessageNormalizer::parse(raw).unwrap();
        assert_eq!(message.message_id, "q1@example.com");
        assert_eq!(message.sender, "Alice@Example.com");
        assert_eq!(message.subject, "Güvenlik uyarısı");
        assert_eq!(message.timestamp, Some(at(2024, 1, 15, 10, 0, 0)));
        assert_eq!(message.in_reply_to.as_deref(), Some("r1@example.com"));
        assert_eq!(message.references, vec!["r0@example.com", "r1@example.com"]);
        assert_eq!(message.question.text, "Hello, how are you?");
        assert!(message.answer.is_none());
    }

    #[test]
    fn test_message_without_id_is_discarded() {
        let raw = b"From: bob@example.com\r\nSubject: hi\r\n\r\nbody\r\n";
        assert!(MessageNormalizer::parse(raw).is_none());
    }

    #[test]
    fn test_unparseable_date_is_absent() {
        let raw = b"Message-ID: <d@example.com>\r\nDate: n/a\r\n\r\nbody\r\n";
        let message = MessageNormalizer::parse(raw).unwrap();
        assert_eq!(message.timestamp, None);
    }

    #[test]
    fn test_body_skips_non_plain_text_parts() {
        let raw = b"Message-ID: <cal@example.com>\r\n\
Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/calendar; charset=utf-8\r\n\
\r\n\
BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Real question body\r\n\
--b1--\r\n";

        let message = MessageNormalizer::parse(raw).unwrap();
        assert_eq!(message.question.text, "Real question body");
    }

    #[test]
    fn test_part_without_content_type_is_plain_text() {
        let raw = b"Message-ID: <plain@example.com>\r\n\r\nJust text\r\n";
        let message = MessageNormalizer::parse(raw).unwrap();
        assert_eq!(message.question.text, "Just text");
    }
}
