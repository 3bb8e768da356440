//! Query every source and reduce each one to a single report.
//!
//! This is the caller side of the adapters: it owns one session per source
//! for the duration of a run, ranks the catalog's unranked candidates
//! locally, and turns errors into per-source reports instead of aborting
//! the whole run.

use serde::Serialize;

use crate::config::Config;
use crate::matcher::{rank_records, TieBreak};
use crate::models::{AnimeRecord, Resolution};
use crate::traits::{AnimeSource, SourceKind};

/// Outcome for one source.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome {
    Found {
        record: AnimeRecord,
        score: Option<u8>,
    },
    NotFound {
        query: String,
    },
    Failed {
        kind: String,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: SourceKind,
    #[serde(flatten)]
    pub outcome: ReportOutcome,
}

impl SourceReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ReportOutcome::Failed { .. })
    }
}

/// Reduce an adapter result to a report. Catalog candidates are ranked here
/// with first-seen tie-breaking; an empty catalog result is "not found".
pub fn report_for(
    source: SourceKind,
    query: &str,
    result: crate::error::Result<Resolution>,
) -> SourceReport {
    let outcome = match result {
        Ok(Resolution::Candidates(candidates)) => {
            match rank_records(query, candidates, TieBreak::FirstSeen) {
                Some(best) => ReportOutcome::Found {
                    record: best.candidate,
                    score: Some(best.score),
                },
                None => ReportOutcome::NotFound {
                    query: query.to_string(),
                },
            }
        }
        Ok(Resolution::Match { record, score }) => ReportOutcome::Found { record, score },
        Ok(Resolution::NoMatch) => ReportOutcome::NotFound {
            query: query.to_string(),
        },
        Err(crate::error::ResolveError::NotFound(_)) => ReportOutcome::NotFound {
            query: query.to_string(),
        },
        Err(e) => ReportOutcome::Failed {
            kind: e.kind().to_string(),
            message: e.to_string(),
        },
    };
    SourceReport { source, outcome }
}

/// Run one already-opened adapter.
pub async fn resolve_with(source: &dyn AnimeSource, query: &str) -> SourceReport {
    let kind = source.kind();
    let result = source.search(query).await;
    if let Err(e) = &result {
        tracing::warn!(source = %kind, kind = e.kind(), error = %e, "source failed");
    }
    report_for(kind, query, result)
}

/// Query each source in `kinds` in order. A source that cannot even be
/// opened (bad config, missing credentials) is reported as failed.
pub async fn resolve_all(config: &Config, kinds: &[SourceKind], query: &str) -> Vec<SourceReport> {
    let mut reports = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        let report = match kind.open(config) {
            Ok(source) => resolve_with(source.as_ref(), query).await,
            Err(e) => SourceReport {
                source: kind,
                outcome: ReportOutcome::Failed {
                    kind: "configuration".to_string(),
                    message: format!("{:#}", e),
                },
            },
        };
        reports.push(report);
    }
    reports
}

/// One human-readable line per report.
pub fn render_report(report: &SourceReport) -> String {
    match &report.outcome {
        ReportOutcome::Found { record, score } => {
            let score = score.map(|s| format!(" (score {})", s)).unwrap_or_default();
            format!("{:<12} {}{}  {}", report.source, record.title, score, record.source_url)
        }
        ReportOutcome::NotFound { query } => {
            format!("{:<12} not found: \"{}\"", report.source, query)
        }
        ReportOutcome::Failed { kind, message } => {
            format!("{:<12} failed ({}): {}", report.source, kind, message)
        }
    }
}
