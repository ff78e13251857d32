use std::{
    env, fs, io,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use rayon::prelude::*;
use tf_idf_topics::{JobStatus, SharedIndex, TermFrequency, TopicJob, TopicSet};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

struct Options {
    docs_dir: PathBuf,
    limit: Option<usize>,
    poll: Duration,
    cbor_out: Option<PathBuf>,
}

// lowercase alphanumeric runs only
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

// files directly under `dir`, tokenized in parallel, added in path order
fn load_documents(dir: &Path, index: &SharedIndex, limit: Option<usize>) -> io::Result<usize> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    if let Some(limit) = limit {
        files.truncate(limit);
    }
    info!(files = files.len(), threads = rayon::current_num_threads(), "tokenizing documents");

    let docs: Vec<(String, TermFrequency)> = files
        .par_iter()
        .filter_map(|path| {
            let content = match fs::read_to_string(path) {
                Ok(c) => c,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable file");
                    return None;
                }
            };
            let mut tf = TermFrequency::new();
            tf.add_terms(&tokenize(&content));
            if tf.is_empty() {
                return None;
            }
            let key = path.file_name().and_then(|s| s.to_str()).unwrap_or("unknown").to_string();
            Some((key, tf))
        })
        .collect();

    let count = docs.len();
    for (key, tf) in docs {
        index.add_doc(key, &tf).map_err(io::Error::other)?;
    }
    Ok(count)
}

fn poll_until_settled(job: &TopicJob<SharedIndex>, poll: Duration) -> Result<Arc<TopicSet>, String> {
    let mut status = job.request_status(false);
    loop {
        match status {
            JobStatus::Started { run_id, .. } => info!(run_id, "topic run started"),
            JobStatus::Running { run_id, progress } => {
                eprint!("\r[topics] run {run_id} {:5.1}%", progress * 100.0);
            }
            JobStatus::Done { result, .. } => {
                eprintln!("\r[topics] done          ");
                return Ok(result);
            }
            JobStatus::Cancelled { run_id } => return Err(format!("run {run_id} was cancelled")),
            JobStatus::Error { message } => return Err(message),
        }
        thread::sleep(poll);
        status = job.request_status(false);
    }
}

fn parse_args() -> Result<Option<Options>, String> {
    let mut args = env::args().skip(1);
    let mut opts = Options {
        docs_dir: PathBuf::from("data/docs"),
        limit: None,
        poll: Duration::from_millis(100),
        cbor_out: None,
    };
    while let Some(a) = args.next() {
        match a.as_str() {
            "--docs" => opts.docs_dir = args.next().ok_or("--docs requires a path")?.into(),
            "--limit" => match args.next().map(|v| v.parse::<usize>()) {
                Some(Ok(n)) if n > 0 => opts.limit = Some(n),
                _ => return Err("--limit needs positive integer".into()),
            },
            "--poll-ms" => match args.next().map(|v| v.parse::<u64>()) {
                Some(Ok(ms)) => opts.poll = Duration::from_millis(ms),
                _ => return Err("--poll-ms needs an integer".into()),
            },
            "--cbor" => opts.cbor_out = Some(args.next().ok_or("--cbor requires a path")?.into()),
            "-h" | "--help" => return Ok(None),
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(Some(opts))
}

fn print_usage() {
    eprintln!("Usage: tf-idf-topics [--docs DIR] [--limit N] [--poll-ms MS] [--cbor FILE]");
    eprintln!("Output format: <rank>\t<significance>\t<terms...>");
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let opts = match parse_args() {
        Ok(Some(opts)) => opts,
        Ok(None) => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Err(msg) => {
            eprintln!("[error] {msg}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let index = Arc::new(SharedIndex::default());
    let load_start = Instant::now();
    match load_documents(&opts.docs_dir, &index, opts.limit) {
        Ok(0) => {
            eprintln!("[error] no documents loaded from {}. abort", opts.docs_dir.display());
            return ExitCode::FAILURE;
        }
        Ok(n) => info!(docs = n, elapsed_ms = load_start.elapsed().as_millis() as u64, "documents indexed"),
        Err(err) => {
            eprintln!("[error] failed to load documents: {err}");
            return ExitCode::FAILURE;
        }
    }

    let job = TopicJob::with_defaults(Arc::clone(&index));
    let topics = match poll_until_settled(&job, opts.poll) {
        Ok(topics) => topics,
        Err(msg) => {
            eprintln!("[error] {msg}");
            return ExitCode::FAILURE;
        }
    };
    print!("{topics}");

    if let Some(path) = opts.cbor_out {
        let written = topics
            .to_cbor()
            .map_err(|e| e.to_string())
            .and_then(|bytes| fs::write(&path, bytes).map_err(|e| e.to_string()));
        if let Err(msg) = written {
            eprintln!("[error] failed to write {}: {msg}", path.display());
            return ExitCode::FAILURE;
        }
        info!(path = %path.display(), topics = topics.len(), "topics exported");
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_alphanumeric_runs() {
        assert_eq!(tokenize("Rust, rust-lang & C++ 2021!"), vec!["rust", "rust", "lang", "c", "2021"]);
        assert!(tokenize(" -- ").is_empty());
    }
}
