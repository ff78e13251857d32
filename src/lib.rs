/// This crate synthesizes topics from a TF-IDF term index in the background.
pub mod config;
pub mod error;
pub mod job;
pub mod topic;
pub mod vectorizer;

/// Topic Job Controller
/// The top-level struct of this crate. It owns at most one background topic
/// run and serializes every client request against it.
///
/// A client drives it with a single call, `request_status(cancel)`:
/// - `false` starts a run when none is active, or reports the active one
/// - `true` cancels the active run and blocks until its worker has exited
///
/// A completed `TopicSet` is cached and returned on every later call until
/// the term source's generation changes or `invalidate` is called.
///
/// # Thread Safety
/// `TopicJob<S>` can be shared between threads behind an `Arc`.
pub use job::{JobPhase, JobStatus, RunId, TopicJob};

/// Controller configuration
/// Serializable, with `with_*` builders over the defaults.
pub use config::TopicJobConfig;

/// Error types
/// - `TopicError`: ends a run or rejects a request
/// - `OracleError`: failure of a similarity / significance oracle
pub use error::{OracleError, Result, TopicError};

/// Topic and TopicSet
/// A `Topic` is a group of terms with a significance score.
/// A `TopicSet` is the result of one run, sorted by descending significance.
///
/// # Serialization
/// Supported, including CBOR export via `TopicSet::to_cbor`.
pub use topic::{Term, Topic, TopicSet};

/// Greedy clustering engine
/// Assigns each term to the first topic whose members are all dissimilar to
/// it (similarity below `SIMILARITY_THRESHOLD`), otherwise opens a new topic.
pub use topic::cluster::{cluster, SIMILARITY_THRESHOLD};

/// Term Source Trait
/// Everything a topic run reads: the ordered term list, the similarity and
/// significance oracles, and a generation counter for cache invalidation.
///
/// `SimilarityMemo` caches similarity answers for the span of one run.
pub use topic::oracle::{SimilarityMemo, TermSource};

/// Term Index
/// In-memory index over document term frequencies. Similarity of two terms is
/// the cosine of their TF-IDF scores over the documents, significance is the
/// geometric mean of a term's scores.
///
/// `SharedIndex` puts a `TermIndex` behind a read-write lock and implements
/// `TermSource`, so it can be handed to a `TopicJob` directly.
pub use vectorizer::{shared::SharedIndex, TermIndex};

/// Corpus
/// Per-term document counts, the document count and the generation counter.
/// Used as the base data for IDF calculation.
pub use vectorizer::corpus::Corpus;

/// Term Frequency structure
/// Occurrence counts of each term within one document.
/// Used as the base data for TF calculation.
pub use vectorizer::term::TermFrequency;

/// TF IDF Calculation Engine Trait
/// Plug different TF-IDF strategies into `TermIndex<E>`.
/// `DefaultTfIdfEngine` is the textbook-style default.
pub use vectorizer::tfidf::{DefaultTfIdfEngine, TfIdfEngine};

/// Cancellation and progress signals shared between a controller and its worker
pub use job::signal::{CancellationToken, ProgressCell};
