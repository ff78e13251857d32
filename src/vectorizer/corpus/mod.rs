use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// keep document count and per-term document counts
///
/// Terms are kept in first-seen order; a term whose count drops to zero is
/// removed without disturbing the order of the others.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Corpus {
    /// corpus add_num
    /// for update notify
    pub add_num: u64,
    /// corpus sub_num
    /// for update notify
    pub sub_num: u64,
    // number of documents containing each term
    pub term_counts: IndexMap<Box<str>, u64>,
}

impl Corpus {
    /// Create a new instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document's distinct terms to the corpus
    pub fn add_set<T>(&mut self, terms: &[T])
    where
        T: AsRef<str>,
    {
        self.add_num += 1;
        for term in terms {
            *self.term_counts.entry(term.as_ref().into()).or_insert(0) += 1;
        }
    }

    /// Remove a document's distinct terms from the corpus
    pub fn sub_set<T>(&mut self, terms: &[T])
    where
        T: AsRef<str>,
    {
        self.sub_num += 1;
        for term in terms {
            let term = term.as_ref();
            let last = match self.term_counts.get_mut(term) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                Some(_) => true,
                None => false,
            };
            if last {
                self.term_counts.shift_remove(term);
            }
        }
    }

    /// Get the number of documents in the corpus
    pub fn get_doc_num(&self) -> u64 {
        self.add_num - self.sub_num
    }

    /// Get the generation number of the corpus
    /// changes on every add or sub
    pub fn get_gen_num(&self) -> u64 {
        self.add_num + self.sub_num
    }

    /// Get the number of documents containing `term`
    pub fn get_term_count(&self, term: &str) -> u64 {
        self.term_counts.get(term).copied().unwrap_or(0)
    }

    /// Get the current vocabulary size (number of unique terms)
    #[inline]
    pub fn vocab_size(&self) -> usize {
        self.term_counts.len()
    }

    /// All terms in first-seen order
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.term_counts.keys().map(|t| &**t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_generation_follow_add_and_sub() {
        let mut corpus = Corpus::new();
        corpus.add_set(&["a", "b"]);
        corpus.add_set(&["b", "c"]);
        assert_eq!(corpus.get_doc_num(), 2);
        assert_eq!(corpus.get_term_count("b"), 2);
        assert_eq!(corpus.get_gen_num(), 2);

        corpus.sub_set(&["a", "b"]);
        assert_eq!(corpus.get_doc_num(), 1);
        assert_eq!(corpus.get_term_count("a"), 0);
        assert_eq!(corpus.get_term_count("b"), 1);
        assert_eq!(corpus.get_gen_num(), 3);
        assert_eq!(corpus.terms().collect::<Vec<_>>(), vec!["b", "c"]);
    }
}
