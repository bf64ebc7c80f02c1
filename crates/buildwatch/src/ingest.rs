//! JSON-lines request ingestion.
//!
//! One request per line, tagged by `op`. Lines that fail to parse are
//! logged and skipped; they never reach the engine.

use std::collections::BTreeSet;

use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use buildwatch_core::{AlertEngine, BuildEvent, Builds, Event, EventKind};

/// A single ingestion request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request {
    /// A break or fix. Without a timestamp the event is stamped now.
    Event {
        build: String,
        job: String,
        kind: EventKind,
        #[serde(default)]
        timestamp: Option<i64>,
        #[serde(default)]
        responsible: BTreeSet<String>,
    },
    Clear {
        #[serde(default)]
        build: Option<String>,
        #[serde(default)]
        job: Option<String>,
    },
    Delete {
        #[serde(default)]
        build: Option<String>,
        #[serde(default)]
        job: Option<String>,
    },
    Purge,
    /// Print the current build tree.
    Status,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed request: {0}")]
    Json(#[from] serde_json::Error),

    #[error("'{op}' names a job without a build")]
    JobWithoutBuild { op: &'static str },
}

/// Parse one line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Request>, IngestError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let request: Request = serde_json::from_str(line)?;
    match &request {
        Request::Clear { build: None, job: Some(_) } => {
            Err(IngestError::JobWithoutBuild { op: "clear" })
        }
        Request::Delete { build: None, job: Some(_) } => {
            Err(IngestError::JobWithoutBuild { op: "delete" })
        }
        _ => Ok(Some(request)),
    }
}

impl Request {
    /// Apply to the engine. `Status` returns a snapshot to print.
    pub fn apply(self, engine: &AlertEngine) -> Option<Builds> {
        match self {
            Request::Event {
                build,
                job,
                kind,
                timestamp,
                responsible,
            } => {
                let event = match timestamp {
                    Some(ts) => Event::new(ts, kind, responsible),
                    None => Event::now(kind, responsible),
                };
                engine.process(&[BuildEvent::new(build, job, event)]);
                None
            }
            Request::Clear { build, job } => {
                engine.clear(build.as_deref(), job.as_deref());
                None
            }
            Request::Delete { build, job } => {
                engine.delete(build.as_deref(), job.as_deref());
                None
            }
            Request::Purge => {
                engine.purge();
                None
            }
            Request::Status => Some(engine.builds()),
        }
    }
}

/// Line counts for one ingestion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub applied: usize,
    pub skipped: usize,
}

/// Read requests until EOF, applying each to `engine`. `on_status` gets
/// the snapshot of every `status` request.
pub async fn ingest<R>(
    reader: R,
    engine: &AlertEngine,
    mut on_status: impl FnMut(&Builds),
) -> std::io::Result<IngestStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = IngestStats::default();
    let mut lines = reader.lines();
    let mut line_no = 0_usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        match parse_line(&line) {
            Ok(Some(request)) => {
                debug!(line = line_no, ?request, "request");
                if let Some(snapshot) = request.apply(engine) {
                    on_status(&snapshot);
                }
                stats.applied += 1;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping request");
                stats.skipped += 1;
            }
        }
    }

    info!(applied = stats.applied, skipped = stats.skipped, "input exhausted");
    Ok(stats)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use buildwatch_core::EngineConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_every_op() {
        let event = parse_line(
            r#"{"op":"event","build":"bolt","job":"smoke","kind":"broken","timestamp":5,"responsible":["alice"]}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            event,
            Request::Event {
                build: "bolt".into(),
                job: "smoke".into(),
                kind: EventKind::Broken,
                timestamp: Some(5),
                responsible: BTreeSet::from(["alice".to_owned()]),
            }
        );

        assert_eq!(
            parse_line(r#"{"op":"clear","build":"bolt"}"#).unwrap(),
            Some(Request::Clear {
                build: Some("bolt".into()),
                job: None
            })
        );
        assert_eq!(
            parse_line(r#"{"op":"delete"}"#).unwrap(),
            Some(Request::Delete {
                build: None,
                job: None
            })
        );
        assert_eq!(parse_line(r#"{"op":"purge"}"#).unwrap(), Some(Request::Purge));
        assert_eq!(parse_line(r#"{"op":"status"}"#).unwrap(), Some(Request::Status));
    }

    #[test]
    fn blank_and_comment_lines_are_ignored() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# seeded by hand").unwrap(), None);
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(matches!(parse_line("not json"), Err(IngestError::Json(_))));
        assert!(matches!(
            parse_line(r#"{"op":"explode"}"#),
            Err(IngestError::Json(_))
        ));
        assert!(matches!(
            parse_line(r#"{"op":"event","build":"bolt","job":"smoke","kind":"flaky"}"#),
            Err(IngestError::Json(_))
        ));
        assert!(matches!(
            parse_line(r#"{"op":"clear","job":"smoke"}"#),
            Err(IngestError::JobWithoutBuild { op: "clear" })
        ));
    }

    #[tokio::test]
    async fn ingest_applies_valid_lines_and_skips_the_rest() {
        let engine = AlertEngine::start(EngineConfig::default(), Vec::new());
        let input = br#"{"op":"event","build":"bolt","job":"smoke","kind":"broken","timestamp":1,"responsible":["x"]}
garbage
{"op":"event","build":"bolt","job":"unit","kind":"fixed","timestamp":2}
{"op":"status"}
{"op":"delete","build":"bolt","job":"unit"}
{"op":"status"}
"#;

        let mut seen = Vec::new();
        let stats = ingest(&input[..], &engine, |b| seen.push(b.clone()))
            .await
            .unwrap();

        assert_eq!(stats, IngestStats { applied: 5, skipped: 1 });
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].build("bolt").jobs.len(), 2);
        assert_eq!(seen[1].build("bolt").jobs.len(), 1);
        assert!(engine.job("bolt", "smoke").is_broken());

        engine.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_timestamp_stamps_now() {
        let engine = AlertEngine::start(EngineConfig::default(), Vec::new());
        let request = parse_line(r#"{"op":"event","build":"bolt","job":"smoke","kind":"fixed"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(request.apply(&engine), None);
        let fix = engine.job("bolt", "smoke").last_fix.unwrap();
        assert!(fix.timestamp > 0);

        engine.close().await.unwrap();
    }
}
