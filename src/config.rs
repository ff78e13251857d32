//! Configuration for the topic job controller.

use serde::{Deserialize, Serialize};

/// Configuration for [`crate::TopicJob`].
///
/// # Example
///
/// ```
/// use tf_idf_topics::TopicJobConfig;
///
/// let config = TopicJobConfig::default()
///     .with_invalidate_on_change(false)
///     .with_worker_name("topics-nightly");
/// assert!(!config.invalidate_on_change);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicJobConfig {
    /// Drop a cached result once the term source generation moves past the
    /// generation the result was computed from.
    pub invalidate_on_change: bool,

    /// Name given to the background worker thread.
    pub worker_name: String,

    /// Progress delta between two `debug` log events of a run (0.0 to 1.0).
    pub progress_log_step: f64,
}

impl Default for TopicJobConfig {
    fn default() -> Self {
        Self {
            invalidate_on_change: true,
            worker_name: "topic-synth".to_string(),
            progress_log_step: 0.1,
        }
    }
}

impl TopicJobConfig {
    /// Set whether document changes invalidate a cached result.
    #[must_use]
    pub fn with_invalidate_on_change(mut self, invalidate: bool) -> Self {
        self.invalidate_on_change = invalidate;
        self
    }

    /// Set the worker thread name.
    #[must_use]
    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    /// Set the progress logging step. Values are clamped into `[0, 1]`.
    #[must_use]
    pub fn with_progress_log_step(mut self, step: f64) -> Self {
        self.progress_log_step = num::clamp(step, 0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_invalidate_on_change() {
        let config = TopicJobConfig::default();
        assert!(config.invalidate_on_change);
        assert_eq!(config.worker_name, "topic-synth");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: TopicJobConfig = serde_json::from_str(r#"{"worker_name":"w"}"#).unwrap();
        assert_eq!(config.worker_name, "w");
        assert!(config.invalidate_on_change);
        assert_eq!(config.progress_log_step, 0.1);
    }

    #[test]
    fn progress_log_step_is_clamped() {
        assert_eq!(TopicJobConfig::default().with_progress_log_step(3.0).progress_log_step, 1.0);
        assert_eq!(TopicJobConfig::default().with_progress_log_step(-1.0).progress_log_step, 0.0);
    }
}
