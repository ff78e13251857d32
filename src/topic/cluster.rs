use rayon::prelude::*;
use tracing::debug;

use crate::{
    error::{OracleError, Result, TopicError},
    topic::{Term, Topic, TopicSet},
};

/// Two terms at or above this similarity never share a topic.
pub const SIMILARITY_THRESHOLD: f64 = 0.001;

/// Greedy single-link topic assignment.
///
/// Each term, in input order, joins the first topic whose members all score
/// strictly below [`SIMILARITY_THRESHOLD`] against it, otherwise it opens a new
/// topic at the end of the list. An absent similarity counts as not similar.
///
/// `cancel_poll` is checked before every term; a `true` aborts with
/// [`TopicError::CancellationRequested`] and no partial result. After every
/// term `progress` receives `i / n` for the 0-based index `i`.
///
/// Topics are finally scored by the mean significance of their members and
/// stably sorted, highest first. A NaN score sorts last.
///
/// # Errors
/// Any oracle error aborts the run as [`TopicError::OracleFailure`].
pub fn cluster<Sim, Sig, P, C>(
    terms: &[Term],
    mut similarity: Sim,
    significance: Sig,
    mut progress: P,
    mut cancel_poll: C,
) -> Result<TopicSet>
where
    Sim: FnMut(&str, &str) -> std::result::Result<Option<f64>, OracleError>,
    Sig: Fn(&str) -> std::result::Result<f64, OracleError> + Sync,
    P: FnMut(f64),
    C: FnMut() -> bool,
{
    let n = terms.len();
    let mut groups: Vec<Vec<Term>> = Vec::new();

    for (i, term) in terms.iter().enumerate() {
        if cancel_poll() {
            debug!(processed = i, total = n, "clustering cancelled");
            return Err(TopicError::CancellationRequested);
        }
        match first_accepting_topic(&groups, term, &mut similarity)? {
            Some(idx) => groups[idx].push(term.clone()),
            None => groups.push(vec![term.clone()]),
        }
        progress(i as f64 / n as f64);
    }

    let topics = score_topics(groups, &significance)?;
    debug!(terms = n, topics = topics.len(), "clustering finished");
    Ok(TopicSet::from_sorted(topics))
}

fn first_accepting_topic<Sim>(groups: &[Vec<Term>], term: &str, similarity: &mut Sim) -> Result<Option<usize>>
where
    Sim: FnMut(&str, &str) -> std::result::Result<Option<f64>, OracleError>,
{
    'topics: for (idx, members) in groups.iter().enumerate() {
        for member in members {
            if is_similar(similarity(term, &**member)?) {
                continue 'topics;
            }
        }
        return Ok(Some(idx));
    }
    Ok(None)
}

#[inline]
fn is_similar(score: Option<f64>) -> bool {
    matches!(score, Some(s) if s >= SIMILARITY_THRESHOLD)
}

fn score_topics<Sig>(groups: Vec<Vec<Term>>, significance: &Sig) -> Result<Vec<Topic>>
where
    Sig: Fn(&str) -> std::result::Result<f64, OracleError> + Sync,
{
    let mut topics = groups
        .into_par_iter()
        .map(|terms| {
            let sum = terms
                .iter()
                .map(|t| significance(&**t))
                .sum::<std::result::Result<f64, OracleError>>()?;
            // topics are never empty
            let significance = sum / terms.len() as f64;
            Ok(Topic { terms, significance })
        })
        .collect::<std::result::Result<Vec<Topic>, OracleError>>()?;

    // Vec::sort_by is stable
    topics.sort_by(|a, b| sort_key(b.significance).total_cmp(&sort_key(a.significance)));
    Ok(topics)
}

#[inline]
fn sort_key(score: f64) -> f64 {
    if score.is_nan() { f64::NEG_INFINITY } else { score }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::HashMap};

    use super::*;

    fn terms(list: &[&str]) -> Vec<Term> {
        list.iter().map(|t| Term::from(*t)).collect()
    }

    fn table(pairs: &[(&str, &str, f64)]) -> HashMap<(String, String), f64> {
        let mut map = HashMap::new();
        for (a, b, s) in pairs {
            map.insert((a.to_string(), b.to_string()), *s);
            map.insert((b.to_string(), a.to_string()), *s);
        }
        map
    }

    fn flat(score: f64) -> impl Fn(&str) -> std::result::Result<f64, OracleError> + Sync {
        move |_| Ok(score)
    }

    #[test]
    fn empty_input_gives_empty_set_without_oracle_calls() {
        let calls = RefCell::new(0);
        let mut progress = Vec::new();
        let set = cluster(
            &[],
            |_, _| {
                *calls.borrow_mut() += 1;
                Ok(Some(1.0))
            },
            |_| -> std::result::Result<f64, OracleError> { panic!("significance must not be called") },
            |p| progress.push(p),
            || false,
        )
        .unwrap();
        assert!(set.is_empty());
        assert_eq!(*calls.borrow(), 0);
        assert!(progress.is_empty());
    }

    #[test]
    fn all_dissimilar_terms_share_one_topic() {
        let input = terms(&["a", "b", "c", "d"]);
        let set = cluster(&input, |_, _| Ok(Some(0.0)), flat(1.0), |_| {}, || false).unwrap();
        assert_eq!(set.term_lists(), vec![vec!["a", "b", "c", "d"]]);
    }

    #[test]
    fn all_similar_terms_each_open_a_topic_in_input_order() {
        let input = terms(&["a", "b", "c", "d"]);
        let set = cluster(&input, |_, _| Ok(Some(SIMILARITY_THRESHOLD)), flat(1.0), |_| {}, || false).unwrap();
        assert_eq!(set.term_lists(), vec![vec!["a"], vec!["b"], vec!["c"], vec!["d"]]);
    }

    #[test]
    fn cat_dog_car_scenario() {
        let sims = table(&[("cat", "dog", 0.5), ("cat", "car", 0.0005), ("dog", "car", 0.0005)]);
        let calls = RefCell::new(Vec::new());
        let sig: HashMap<&str, f64> = [("cat", 0.3), ("car", 0.1), ("dog", 0.5)].into_iter().collect();

        let set = cluster(
            &terms(&["cat", "dog", "car"]),
            |a, b| {
                calls.borrow_mut().push((a.to_string(), b.to_string()));
                Ok(sims.get(&(a.to_string(), b.to_string())).copied())
            },
            |t| Ok(sig[t]),
            |_| {},
            || false,
        )
        .unwrap();

        // dog (0.5) outranks the cat/car topic (mean 0.2)
        assert_eq!(set.term_lists(), vec![vec!["dog"], vec!["cat", "car"]]);
        assert!((set.topics()[1].significance - 0.2).abs() < 1e-12);
        // car joins cat's topic, so it is never compared against dog
        assert_eq!(
            *calls.borrow(),
            vec![("dog".to_string(), "cat".to_string()), ("car".to_string(), "cat".to_string())]
        );
    }

    #[test]
    fn cat_dog_car_with_low_dog_significance() {
        let sims = table(&[("cat", "dog", 0.5), ("cat", "car", 0.0005), ("dog", "car", 0.0005)]);
        let sig: HashMap<&str, f64> = [("cat", 0.3), ("car", 0.1), ("dog", 0.05)].into_iter().collect();
        let set = cluster(
            &terms(&["cat", "dog", "car"]),
            |a, b| Ok(sims.get(&(a.to_string(), b.to_string())).copied()),
            |t| Ok(sig[t]),
            |_| {},
            || false,
        )
        .unwrap();
        assert_eq!(set.term_lists(), vec![vec!["cat", "car"], vec!["dog"]]);
    }

    #[test]
    fn absent_similarity_does_not_block_membership() {
        let set = cluster(&terms(&["x", "y", "z"]), |_, _| Ok(None), flat(1.0), |_| {}, || false).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.topics()[0].len(), 3);
    }

    #[test]
    fn term_must_be_dissimilar_to_every_member() {
        // c is dissimilar to a but similar to b, so it skips topic [a, b]
        let sims = table(&[("a", "b", 0.0), ("a", "c", 0.0), ("b", "c", 0.9)]);
        let set = cluster(
            &terms(&["a", "b", "c"]),
            |x, y| Ok(sims.get(&(x.to_string(), y.to_string())).copied()),
            flat(1.0),
            |_| {},
            || false,
        )
        .unwrap();
        assert_eq!(set.term_lists(), vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn progress_reports_index_over_total_and_never_regresses() {
        let mut progress = Vec::new();
        cluster(&terms(&["a", "b", "c", "d"]), |_, _| Ok(Some(1.0)), flat(1.0), |p| progress.push(p), || false).unwrap();
        assert_eq!(progress, vec![0.0, 0.25, 0.5, 0.75]);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn cancellation_aborts_without_result() {
        let mut polls = 0;
        let mut progress = Vec::new();
        let res = cluster(
            &terms(&["a", "b", "c", "d"]),
            |_, _| Ok(Some(1.0)),
            flat(1.0),
            |p| progress.push(p),
            || {
                polls += 1;
                polls > 2
            },
        );
        assert!(matches!(res, Err(TopicError::CancellationRequested)));
        assert_eq!(progress, vec![0.0, 0.25]);
    }

    #[test]
    fn similarity_error_is_an_oracle_failure() {
        let res = cluster(
            &terms(&["a", "b"]),
            |_, _| Err(OracleError::Backend("db down".into())),
            flat(1.0),
            |_| {},
            || false,
        );
        match res {
            Err(err @ TopicError::OracleFailure(_)) => assert!(!err.is_cancellation()),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn significance_error_is_an_oracle_failure() {
        let res = cluster(
            &terms(&["a", "b"]),
            |_, _| Ok(Some(1.0)),
            |t| {
                if t == "b" {
                    Err(OracleError::Poisoned)
                } else {
                    Ok(1.0)
                }
            },
            |_| {},
            || false,
        );
        assert!(matches!(res, Err(TopicError::OracleFailure(OracleError::Poisoned))));
    }

    #[test]
    fn equal_scores_keep_creation_order() {
        let sig: HashMap<&str, f64> = [("a", 1.0), ("b", 2.0), ("c", 1.0), ("d", 2.0)].into_iter().collect();
        let set = cluster(&terms(&["a", "b", "c", "d"]), |_, _| Ok(Some(1.0)), |t| Ok(sig[t]), |_| {}, || false).unwrap();
        assert_eq!(set.term_lists(), vec![vec!["b"], vec!["d"], vec!["a"], vec!["c"]]);
    }

    #[test]
    fn nan_significance_sorts_last() {
        let sig: HashMap<&str, f64> = [("a", f64::NAN), ("b", 0.0), ("c", 3.0)].into_iter().collect();
        let set = cluster(&terms(&["a", "b", "c"]), |_, _| Ok(Some(1.0)), |t| Ok(sig[t]), |_| {}, || false).unwrap();
        assert_eq!(set.term_lists(), vec![vec!["c"], vec!["b"], vec!["a"]]);
    }
}
