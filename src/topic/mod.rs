pub mod cluster;
pub mod oracle;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Opaque term identifier. Equality is exact string equality.
pub type Term = Box<str>;

/// A group of terms assigned to the same cluster.
/// Member order is insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// member terms in the order they joined
    pub terms: Vec<Term>,
    /// arithmetic mean of member significances
    pub significance: f64,
}

impl Topic {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// never true for a topic produced by clustering
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.iter().any(|t| &**t == term)
    }

    /// Member terms as `&str`
    pub fn term_strs(&self) -> Vec<&str> {
        self.terms.iter().map(|t| &**t).collect()
    }
}

/// Result of one completed run.
/// Topics are sorted by descending significance. Immutable once produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicSet {
    topics: Vec<Topic>,
}

impl TopicSet {
    pub(crate) fn from_sorted(topics: Vec<Topic>) -> Self {
        Self { topics }
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Topic> {
        self.topics.iter()
    }

    /// Total number of terms over all topics
    pub fn term_num(&self) -> usize {
        self.topics.iter().map(Topic::len).sum()
    }

    /// Member lists only, in topic order
    pub fn term_lists(&self) -> Vec<Vec<&str>> {
        self.topics.iter().map(Topic::term_strs).collect()
    }

    /// Encode as CBOR
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        Ok(serde_cbor::to_vec(self)?)
    }

    /// Decode from CBOR
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        Ok(serde_cbor::from_slice(bytes)?)
    }
}

impl<'a> IntoIterator for &'a TopicSet {
    type Item = &'a Topic;
    type IntoIter = std::slice::Iter<'a, Topic>;

    fn into_iter(self) -> Self::IntoIter {
        self.topics.iter()
    }
}

impl fmt::Display for TopicSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, topic) in self.topics.iter().enumerate() {
            writeln!(f, "{}\t{:.6}\t{}", i + 1, topic.significance, topic.term_strs().join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(terms: &[&str], significance: f64) -> Topic {
        Topic {
            terms: terms.iter().map(|t| Term::from(*t)).collect(),
            significance,
        }
    }

    #[test]
    fn cbor_keeps_topic_order_and_scores() {
        let set = TopicSet::from_sorted(vec![topic(&["cat", "car"], 0.8), topic(&["dog"], 0.2)]);
        let bytes = set.to_cbor().unwrap();
        let de = TopicSet::from_cbor(&bytes).unwrap();
        assert_eq!(de, set);
        assert_eq!(de.term_lists(), vec![vec!["cat", "car"], vec!["dog"]]);
    }

    #[test]
    fn from_cbor_rejects_garbage() {
        let res = TopicSet::from_cbor(&[0xff, 0x00, 0x13]);
        assert!(matches!(res, Err(crate::TopicError::Codec(_))));
    }

    #[test]
    fn display_lists_rank_score_and_terms() {
        let set = TopicSet::from_sorted(vec![topic(&["a", "b"], 1.5)]);
        assert_eq!(set.to_string(), "1\t1.500000\ta b\n");
        assert_eq!(set.term_num(), 2);
        assert!(set.topics()[0].contains("b"));
    }
}
