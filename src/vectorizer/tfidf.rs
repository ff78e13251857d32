use crate::vectorizer::{corpus::Corpus, term::TermFrequency};

/// TF-IDF calculation strategy plugged into [`crate::TermIndex`].
pub trait TfIdfEngine {
    /// term frequency of `term` within one document
    fn tf(freq: &TermFrequency, term: &str) -> f64;
    /// inverse document frequency of `term` over the corpus
    fn idf(corpus: &Corpus, term: &str) -> f64;

    fn tf_idf(freq: &TermFrequency, corpus: &Corpus, term: &str) -> f64 {
        Self::tf(freq, term) * Self::idf(corpus, term)
    }
}

/// デフォルトのTF-IDFエンジン
/// tf = count / total, idf = doc_num / (df + 1)
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTfIdfEngine;

impl TfIdfEngine for DefaultTfIdfEngine {
    fn tf(freq: &TermFrequency, term: &str) -> f64 {
        let total = freq.term_sum();
        if total == 0 {
            return 0.0;
        }
        freq.term_count(term) as f64 / total as f64
    }

    fn idf(corpus: &Corpus, term: &str) -> f64 {
        let doc_num = corpus.get_doc_num() as f64;
        let doc_freq = corpus.get_term_count(term) as f64;
        doc_num / (doc_freq + 1.0)
    }
}
