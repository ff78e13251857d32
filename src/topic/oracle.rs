use std::collections::HashMap;

use ahash::RandomState;

use crate::{error::OracleError, topic::Term};

/// Everything a topic run reads from the indexing side.
///
/// `similarity` returns `Ok(None)` when the pair is unknown to the source.
/// `generation` must change whenever the set of documents changes, it is
/// used to decide whether a cached result is stale.
pub trait TermSource: Send + Sync {
    /// All known terms, in a stable order
    fn terms(&self) -> Result<Vec<Term>, OracleError>;

    /// Similarity of two terms in `[0, 1]`, or `None` if unknown
    fn similarity(&self, a: &str, b: &str) -> Result<Option<f64>, OracleError>;

    /// Non-negative significance score of a term
    fn significance(&self, term: &str) -> Result<f64, OracleError>;

    /// Current generation of the underlying documents
    fn generation(&self) -> u64;
}

/// Memo over a similarity oracle for the span of one run.
///
/// Lookups are order independent: `(a, b)` and `(b, a)` share an entry, so
/// the oracle is called at most once per unordered pair, with the arguments
/// of the first lookup. Absence is cached
/// like any other answer, errors are not.
pub struct SimilarityMemo<F> {
    oracle: F,
    cache: HashMap<Term, HashMap<Term, Option<f64>, RandomState>, RandomState>,
    oracle_calls: u64,
    lookups: u64,
}

impl<F> SimilarityMemo<F>
where
    F: FnMut(&str, &str) -> Result<Option<f64>, OracleError>,
{
    pub fn new(oracle: F) -> Self {
        Self {
            oracle,
            cache: HashMap::with_hasher(RandomState::new()),
            oracle_calls: 0,
            lookups: 0,
        }
    }

    /// Memoized similarity of `a` and `b`
    pub fn get(&mut self, a: &str, b: &str) -> Result<Option<f64>, OracleError> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        self.lookups += 1;
        if let Some(hit) = self.cache.get(lo).and_then(|row| row.get(hi)) {
            return Ok(*hit);
        }
        let score = (self.oracle)(a, b)?;
        self.oracle_calls += 1;
        self.cache
            .entry(lo.into())
            .or_insert_with(|| HashMap::with_hasher(RandomState::new()))
            .insert(hi.into(), score);
        Ok(score)
    }

    /// Number of times the wrapped oracle answered
    pub fn oracle_calls(&self) -> u64 {
        self.oracle_calls
    }

    /// Number of lookups served, hits included
    pub fn lookups(&self) -> u64 {
        self.lookups
    }
}
