pub mod corpus;
pub mod shared;
pub mod term;
pub mod tfidf;

use std::marker::PhantomData;

use indexmap::IndexMap;
use rayon::prelude::*;

use crate::{
    topic::Term,
    vectorizer::{
        corpus::Corpus,
        term::TermFrequency,
        tfidf::{DefaultTfIdfEngine, TfIdfEngine},
    },
};

pub type DocKey = Box<str>;

/// In-memory term index over a set of documents.
///
/// Holds:
/// - the term frequencies of each document
/// - a reverse index from term to the documents containing it
/// - the corpus (document frequencies, generation counter)
///
/// It answers the two questions topic synthesis asks about terms:
/// how similar two terms are, and how significant a term is.
///
/// `TermIndex<E>` is generic over the TF-IDF engine `E`.
#[derive(Debug, Clone)]
pub struct TermIndex<E = DefaultTfIdfEngine> {
    /// Document's term frequencies
    documents: IndexMap<DocKey, TermFrequency>,
    /// term -> documents containing it
    term_rev_index: IndexMap<Box<str>, Vec<DocKey>>,
    corpus: Corpus,
    _marker: PhantomData<E>,
}

impl<E> Default for TermIndex<E>
where
    E: TfIdfEngine,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TermIndex<E>
where
    E: TfIdfEngine,
{
    pub fn new() -> Self {
        Self {
            documents: IndexMap::new(),
            term_rev_index: IndexMap::new(),
            corpus: Corpus::new(),
            _marker: PhantomData,
        }
    }

    /// Add a document
    /// A document with the same key is replaced
    pub fn add_doc(&mut self, key: impl Into<DocKey>, doc: &TermFrequency) {
        let key = key.into();
        if self.documents.contains_key(&key) {
            self.del_doc(&key);
        }
        // hash order is not stable, sort so first-seen order is reproducible
        let mut terms = doc.term_set_ref_str();
        terms.sort_unstable();
        self.corpus.add_set(&terms);
        for term in terms {
            self.term_rev_index
                .entry(term.into())
                .or_insert_with(Vec::new)
                .push(key.clone());
        }
        self.documents.insert(key, doc.clone());
    }

    /// Delete a document, returns whether it existed
    pub fn del_doc(&mut self, key: &str) -> bool {
        let Some(doc) = self.documents.shift_remove(key) else {
            return false;
        };
        let terms = doc.term_set_ref_str();
        for term in &terms {
            let emptied = match self.term_rev_index.get_mut(*term) {
                Some(keys) => {
                    keys.retain(|k| &**k != key);
                    keys.is_empty()
                }
                None => false,
            };
            if emptied {
                self.term_rev_index.shift_remove(*term);
            }
        }
        self.corpus.sub_set(&terms);
        true
    }

    pub fn get_doc(&self, key: &str) -> Option<&TermFrequency> {
        self.documents.get(key)
    }

    pub fn contains_doc(&self, key: &str) -> bool {
        self.documents.contains_key(key)
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.term_rev_index.contains_key(term)
    }

    pub fn doc_num(&self) -> usize {
        self.documents.len()
    }

    pub fn term_num(&self) -> usize {
        self.corpus.vocab_size()
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// changes on every add / delete
    pub fn generation(&self) -> u64 {
        self.corpus.get_gen_num()
    }

    /// All known terms in first-seen order
    pub fn terms(&self) -> Vec<Term> {
        self.corpus.terms().map(Term::from).collect()
    }

    /// TF-IDF score of `term` in document `key`, 0 if either is unknown
    pub fn score(&self, term: &str, key: &str) -> f64 {
        self.documents
            .get(key)
            .map_or(0.0, |doc| E::tf_idf(doc, &self.corpus, term))
    }

    /// TF-IDF scores of `term` over the documents containing it
    pub fn term_vector(&self, term: &str) -> Vec<(&str, f64)> {
        self.term_rev_index.get(term).map_or_else(Vec::new, |keys| {
            keys.iter().map(|k| (&**k, self.score(term, k))).collect()
        })
    }

    /// Cosine similarity of the two terms' document score vectors.
    /// `None` when either term is unknown.
    pub fn similarity(&self, a: &str, b: &str) -> Option<f64> {
        if !self.contains_term(a) || !self.contains_term(b) {
            return None;
        }
        let va = self.term_vector(a);
        let vb = self.term_vector(b);
        let norm_a = va.iter().map(|(_, s)| s * s).sum::<f64>().sqrt();
        let norm_b = vb.iter().map(|(_, s)| s * s).sum::<f64>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return Some(0.0);
        }
        let dot: f64 = va
            .iter()
            .filter_map(|(doc, sa)| vb.iter().find(|(d, _)| d == doc).map(|(_, sb)| sa * sb))
            .sum();
        Some(num::clamp(dot / (norm_a * norm_b), 0.0, 1.0))
    }

    /// Geometric mean of the term's per-document scores.
    /// 0 for an unknown term or when any score is 0.
    pub fn significance(&self, term: &str) -> f64 {
        let scores = self.term_vector(term);
        if scores.is_empty() || scores.iter().any(|(_, s)| *s <= 0.0) {
            return 0.0;
        }
        let log_sum: f64 = scores.iter().map(|(_, s)| s.ln()).sum();
        (log_sum / scores.len() as f64).exp()
    }
}

impl<E> TermIndex<E>
where
    E: TfIdfEngine + Sync,
{
    /// Significance of every term, highest first
    pub fn significance_table(&self) -> Vec<(Term, f64)> {
        let terms = self.terms();
        let mut table: Vec<(Term, f64)> = terms
            .into_par_iter()
            .map(|t| {
                let s = self.significance(&t);
                (t, s)
            })
            .collect();
        table.sort_by(|a, b| b.1.total_cmp(&a.1));
        table
    }
}
