use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    error::OracleError,
    topic::{oracle::TermSource, Term},
    vectorizer::{
        term::TermFrequency,
        tfidf::{DefaultTfIdfEngine, TfIdfEngine},
        TermIndex,
    },
};

/// [`TermIndex`] behind a read-write lock, shared between the writers that
/// add documents and the topic worker that reads it.
///
/// Each oracle call takes the read lock for the span of that one call only.
#[derive(Debug)]
pub struct SharedIndex<E = DefaultTfIdfEngine> {
    inner: RwLock<TermIndex<E>>,
}

impl<E> Default for SharedIndex<E>
where
    E: TfIdfEngine,
{
    fn default() -> Self {
        Self::new(TermIndex::new())
    }
}

impl<E> SharedIndex<E>
where
    E: TfIdfEngine,
{
    pub fn new(index: TermIndex<E>) -> Self {
        Self { inner: RwLock::new(index) }
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, TermIndex<E>>, OracleError> {
        self.inner.read().map_err(|_| OracleError::Poisoned)
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, TermIndex<E>>, OracleError> {
        self.inner.write().map_err(|_| OracleError::Poisoned)
    }

    pub fn add_doc(&self, key: impl Into<Box<str>>, doc: &TermFrequency) -> Result<(), OracleError> {
        self.write()?.add_doc(key, doc);
        Ok(())
    }

    pub fn del_doc(&self, key: &str) -> Result<bool, OracleError> {
        Ok(self.write()?.del_doc(key))
    }

    pub fn doc_num(&self) -> Result<usize, OracleError> {
        Ok(self.read()?.doc_num())
    }
}

impl<E> TermSource for SharedIndex<E>
where
    E: TfIdfEngine + Send + Sync,
{
    fn terms(&self) -> Result<Vec<Term>, OracleError> {
        Ok(self.read()?.terms())
    }

    fn similarity(&self, a: &str, b: &str) -> Result<Option<f64>, OracleError> {
        Ok(self.read()?.similarity(a, b))
    }

    fn significance(&self, term: &str) -> Result<f64, OracleError> {
        Ok(self.read()?.significance(term))
    }

    fn generation(&self) -> u64 {
        // the counter is only bumped after a document update completed
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation()
    }
}
