use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tf_idf_topics::{cluster, OracleError, SimilarityMemo, Term, TermFrequency, TermIndex};

// deterministic pseudo-random term streams, no network or files
fn synthetic_index(docs: usize, vocab: usize, doc_len: usize) -> TermIndex {
    let mut index = TermIndex::new();
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    for d in 0..docs {
        let mut tf = TermFrequency::new();
        for _ in 0..doc_len {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            tf.add_term(&format!("w{}", state % vocab as u64));
        }
        index.add_doc(format!("doc{d}"), &tf);
    }
    index
}

fn cluster_benchmarks(c: &mut Criterion) {
    let index = synthetic_index(200, 400, 60);
    let terms: Vec<Term> = index.terms();

    c.bench_function("cluster_index_terms", |b| {
        b.iter(|| {
            let mut memo = SimilarityMemo::new(|a: &str, b: &str| Ok::<_, OracleError>(index.similarity(a, b)));
            cluster(
                black_box(&terms),
                |a, b| memo.get(a, b),
                |t| Ok(index.significance(t)),
                |_| {},
                || false,
            )
        })
    });

    // constant oracles isolate the greedy assignment itself
    let flat: Vec<Term> = (0..500).map(|i| Term::from(format!("t{i}"))).collect();
    c.bench_function("cluster_single_topic", |b| {
        b.iter(|| cluster(black_box(&flat), |_, _| Ok(Some(0.0)), |_| Ok(1.0), |_| {}, || false))
    });

    c.bench_function("significance_table", |b| b.iter(|| black_box(&index).significance_table()));
}

criterion_group!(benches, cluster_benchmarks);
criterion_main!(benches);
