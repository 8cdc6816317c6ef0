use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::{
    error::Result,
    model::{DiseaseCandidate, HealthSnapshot},
};

/// Jaro-Winkler acceptance threshold for a symptom term to count as a fuzzy
/// match against a candidate's symptom vocabulary.
const FUZZY_MATCH_THRESHOLD: f64 = 0.85;

/// Best-effort fetch of a user's latest health-metric snapshot.
#[async_trait]
pub trait HealthContextLookup: Send + Sync {
    async fn find_latest(&self, user_id: &str) -> Result<Option<HealthSnapshot>>;
}

/// Fuzzy multi-term lexical search over the disease knowledge base.
///
/// Terms are OR-combined: a candidate matches when at least one supplied
/// term fuzzily matches one of its symptom terms.
#[async_trait]
pub trait DiseaseMatcher: Send + Sync {
    async fn fuzzy_search(&self, terms: &[String]) -> Result<Vec<DiseaseCandidate>>;
}

/// In-memory implementation of HealthContextLookup, keyed by user id.
pub struct InMemoryHealthLookup {
    snapshots: Arc<DashMap<String, HealthSnapshot>>,
}

impl InMemoryHealthLookup {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(DashMap::new()),
        }
    }

    pub fn insert(&self, snapshot: HealthSnapshot) {
        self.snapshots.insert(snapshot.user_id.clone(), snapshot);
    }
}

impl Default for InMemoryHealthLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthContextLookup for InMemoryHealthLookup {
    async fn find_latest(&self, user_id: &str) -> Result<Option<HealthSnapshot>> {
        Ok(self.snapshots.get(user_id).map(|entry| entry.clone()))
    }
}

/// In-memory implementation of DiseaseMatcher over a fixed candidate list.
///
/// Candidates are returned in insertion order; relevance ranking belongs to
/// the real search engine, not to this double.
pub struct InMemoryDiseaseMatcher {
    candidates: Vec<DiseaseCandidate>,
}

impl InMemoryDiseaseMatcher {
    pub fn new(candidates: Vec<DiseaseCandidate>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl DiseaseMatcher for InMemoryDiseaseMatcher {
    async fn fuzzy_search(&self, terms: &[String]) -> Result<Vec<DiseaseCandidate>> {
        let matches = self
            .candidates
            .iter()
            .filter(|candidate| {
                terms
                    .iter()
                    .any(|term| candidate_matches_term(candidate, term))
            })
            .cloned()
            .collect();
        Ok(matches)
    }
}

fn candidate_matches_term(candidate: &DiseaseCandidate, term: &str) -> bool {
    let norm_term = term.trim().to_lowercase();
    if norm_term.is_empty() {
        return false;
    }
    candidate.symptoms.iter().any(|symptom| {
        let norm_symptom = symptom.to_lowercase();
        strsim::jaro_winkler(&norm_term, &norm_symptom) >= FUZZY_MATCH_THRESHOLD
    })
}
