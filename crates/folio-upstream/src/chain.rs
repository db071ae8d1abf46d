use crate::client::get_json;
use crate::error::{CandidateFailure, FetchError};
use crate::parser::HtmlPattern;
use async_trait::async_trait;
use folio_core::types::{Extracted, IndicatorKind, MarketIndicatorResult};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// One way of obtaining a raw value. Range checking happens in the chain.
#[async_trait]
pub trait Candidate: Send + Sync {
    fn label(&self) -> &str;
    async fn attempt(&self) -> Result<Extracted, FetchError>;
}

pub type JsonExtractor = fn(&Value) -> Result<Extracted, FetchError>;

/// Fetches a JSON document and hands it to an extractor.
pub struct JsonCandidate {
    label: String,
    client: Client,
    url: String,
    extract: JsonExtractor,
}

impl JsonCandidate {
    pub fn new(label: &str, client: Client, url: impl Into<String>, extract: JsonExtractor) -> Self {
        Self {
            label: label.to_string(),
            client,
            url: url.into(),
            extract,
        }
    }
}

#[async_trait]
impl Candidate for JsonCandidate {
    fn label(&self) -> &str {
        &self.label
    }

    async fn attempt(&self) -> Result<Extracted, FetchError> {
        let json = get_json(&self.client, &self.url).await?;
        (self.extract)(&json)
    }
}

/// Applies a pattern to a page that has already been fetched.
pub struct PatternCandidate {
    pattern: HtmlPattern,
    html: Arc<str>,
}

impl PatternCandidate {
    pub fn new(pattern: HtmlPattern, html: Arc<str>) -> Self {
        Self { pattern, html }
    }
}

#[async_trait]
impl Candidate for PatternCandidate {
    fn label(&self) -> &str {
        &self.pattern.label
    }

    async fn attempt(&self) -> Result<Extracted, FetchError> {
        self.pattern.extract(&self.html)
    }
}

/// Tries `candidates` left to right and returns the first value that passes
/// the range check for `kind`. Candidates after the first success are never
/// attempted.
pub async fn first_plausible(
    kind: IndicatorKind,
    candidates: &[Box<dyn Candidate>],
) -> Result<MarketIndicatorResult, FetchError> {
    let range = kind.range();
    let mut attempts = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let label = candidate.label();
        let failure = match candidate.attempt().await {
            Ok(extracted) => {
                let value = extracted.value;
                match MarketIndicatorResult::accept(kind, label, extracted) {
                    Some(result) => {
                        info!("{} = {} via {}", kind, value, label);
                        return Ok(result);
                    }
                    None => FetchError::OutOfRange {
                        value,
                        min: range.min,
                        max: range.max,
                    },
                }
            }
            Err(e) => e,
        };
        warn!("{} candidate '{}' rejected: {}", kind, label, failure);
        attempts.push(CandidateFailure {
            label: label.to_string(),
            reason: failure.to_string(),
        });
    }

    error!("All {} candidates failed for {}", attempts.len(), kind);
    Err(FetchError::Exhausted { kind, attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        label: &'static str,
        value: Option<f64>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Candidate for Fixed {
        fn label(&self) -> &str {
            self.label
        }

        async fn attempt(&self) -> Result<Extracted, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.value
                .map(Extracted::bare)
                .ok_or_else(|| FetchError::MissingField("value".into()))
        }
    }

    fn fixed(label: &'static str, value: Option<f64>, calls: &Arc<AtomicUsize>) -> Box<dyn Candidate> {
        Box::new(Fixed {
            label,
            value,
            calls: calls.clone(),
        })
    }

    #[tokio::test]
    async fn test_skips_missing_and_out_of_range() {
        let calls = Arc::new(AtomicUsize::new(0));
        let candidates = vec![
            fixed("missing", None, &calls),
            fixed("too high", Some(250.0), &calls),
            fixed("good", Some(21.0), &calls),
            fixed("never", Some(30.0), &calls),
        ];
        let result = first_plausible(IndicatorKind::Vix, &candidates).await.unwrap();
        assert_eq!(result.value, 21.0);
        assert_eq!(result.source_label, "good");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_lists_every_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let candidates = vec![
            fixed("low", Some(10.0), &calls),
            fixed("missing", None, &calls),
        ];
        match first_plausible(IndicatorKind::BuffettIndicator, &candidates).await {
            Err(FetchError::Exhausted { kind, attempts }) => {
                assert_eq!(kind, IndicatorKind::BuffettIndicator);
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].label, "low");
                assert!(attempts[0].reason.contains("outside plausible range"));
            }
            other => panic!("expected exhaustion, got {:?}", other.map(|r| r.value)),
        }
    }

    #[tokio::test]
    async fn test_empty_chain_is_exhausted() {
        let err = first_plausible(IndicatorKind::Vix, &[]).await.unwrap_err();
        assert!(!err.is_recoverable());
    }
}
