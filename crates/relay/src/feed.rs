//! Bulletin intake: line-oriented weather reports from a collaborator
//! process on stdin.
//!
//! Reports are keyed by kind and station, so a fresher METAR for the same
//! field replaces the stale one in the queue instead of piling up behind it.

use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use wxlink_core::QueuedMessage;

pub const PRIORITY_METAR: u8 = 10;
pub const PRIORITY_TAF: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Metar,
    Taf,
}

impl ReportKind {
    fn label(self) -> &'static str {
        match self {
            ReportKind::Metar => "METAR",
            ReportKind::Taf => "TAF",
        }
    }

    fn priority(self) -> u8 {
        match self {
            ReportKind::Metar => PRIORITY_METAR,
            ReportKind::Taf => PRIORITY_TAF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bulletin {
    pub kind: ReportKind,
    pub station: String,
    pub text: String,
}

impl Bulletin {
    /// Parse one report line. A bare report with no leading keyword is
    /// treated as a METAR and prefixed accordingly, the same normalization
    /// upstream feeds get.
    pub fn parse(line: &str) -> Option<Bulletin> {
        let line = line.trim();
        let mut tokens = line.split_whitespace();
        let first = tokens.next()?;

        let (kind, station, text) = match first {
            "METAR" => (ReportKind::Metar, tokens.next()?, line.to_string()),
            "TAF" => (ReportKind::Taf, tokens.next()?, line.to_string()),
            station => {
                tokens.next()?; // a lone identifier is not a report
                (ReportKind::Metar, station, format!("METAR {line}"))
            }
        };

        Some(Bulletin {
            kind,
            station: station.to_string(),
            text,
        })
    }

    pub fn into_message(self, ttl: Duration) -> QueuedMessage {
        QueuedMessage::with_ttl(
            format!("{}/{}", self.kind.label(), self.station),
            self.text.into_bytes(),
            self.kind.priority(),
            ttl,
        )
    }
}

/// Read report lines until EOF, queueing each parseable one.
pub async fn run<R>(input: R, producer: mpsc::Sender<QueuedMessage>, ttl: Duration)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(bulletin) = Bulletin::parse(&line) else {
                    if !line.trim().is_empty() {
                        warn!("ignoring unparseable report line: {line}");
                    }
                    continue;
                };
                debug!("bulletin for {} ({})", bulletin.station, bulletin.kind.label());
                if producer.send(bulletin.into_message(ttl)).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!("bulletin feed ended");
                break;
            }
            Err(e) => {
                warn!("bulletin feed read error: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_metar() {
        let b = Bulletin::parse("METAR KJFK 251951Z 18008KT 10SM FEW250 28/18 A3002").unwrap();
        assert_eq!(b.kind, ReportKind::Metar);
        assert_eq!(b.station, "KJFK");
        assert!(b.text.starts_with("METAR KJFK"));
    }

    #[test]
    fn parses_taf() {
        let b = Bulletin::parse("TAF KBOS 251720Z 2518/2624 19012KT P6SM SCT040").unwrap();
        assert_eq!(b.kind, ReportKind::Taf);
        assert_eq!(b.station, "KBOS");
    }

    #[test]
    fn bare_report_becomes_metar() {
        let b = Bulletin::parse("KLGA 251951Z 20007KT 10SM CLR 27/17 A3001").unwrap();
        assert_eq!(b.kind, ReportKind::Metar);
        assert_eq!(b.station, "KLGA");
        assert_eq!(
            b.text,
            "METAR KLGA 251951Z 20007KT 10SM CLR 27/17 A3001"
        );
    }

    #[test]
    fn rejects_blank_and_single_token_lines() {
        assert_eq!(Bulletin::parse("   "), None);
        assert_eq!(Bulletin::parse("KJFK"), None);
    }

    #[test]
    fn message_key_combines_kind_and_station() {
        let msg = Bulletin::parse("METAR KJFK 251951Z 18008KT")
            .unwrap()
            .into_message(Duration::from_secs(60));
        assert_eq!(msg.id, "METAR/KJFK");
        assert_eq!(msg.priority, PRIORITY_METAR);
    }

    #[tokio::test]
    async fn feed_queues_parsed_reports() {
        let (tx, mut rx) = mpsc::channel(4);
        let input = "METAR KJFK 251951Z 18008KT\ngarbage\nTAF KBOS 251720Z 2518/2624\n";
        run(input.as_bytes(), tx, Duration::from_secs(60)).await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first.id, "METAR/KJFK");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.id, "TAF/KBOS");
        assert!(rx.recv().await.is_none());
    }
}
