//! Dialogue engine configuration.
//!
//! Every timing, the keyword table, the reply lines and the task script are
//! carried by [`DialogueConfig`]. Defaults reproduce the stock JARVIS
//! behavior; `from_env` overrides them from `JARVIS_*` variables.

use crate::{
    intent::{Intent, IntentClassifier},
    long_task::ProgressTiming,
    replies::ReplyTemplates,
    script::TaskScript,
    typewriter::RevealTiming,
};
use std::path::PathBuf;
use std::time::Duration;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error("Failed to load task script from {path}: {1}", path = .0.display())]
    Script(PathBuf, String),
}

/// What `submit` does when a turn is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusyPolicy {
    /// Silently drop the new submission.
    #[default]
    Drop,
    /// Cancel the running turn, wait for the machine to settle, then run.
    Interrupt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogueConfig {
    pub reveal: RevealTiming,
    pub progress: ProgressTiming,
    /// Pause between the code request acknowledgment and the long task.
    pub ack_pause: Duration,
    pub gate_debounce: Duration,
    /// Delay before the front-end triggers the greeting.
    pub greeting_delay: Duration,
    pub busy_policy: BusyPolicy,
    pub classifier: IntentClassifier,
    pub replies: ReplyTemplates,
    pub script: TaskScript,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            reveal: RevealTiming::default(),
            progress: ProgressTiming::default(),
            ack_pause: Duration::from_millis(500),
            gate_debounce: Duration::from_millis(200),
            greeting_delay: Duration::from_millis(1000),
            busy_policy: BusyPolicy::Drop,
            classifier: IntentClassifier::default(),
            replies: ReplyTemplates::default(),
            script: TaskScript::default(),
        }
    }
}

const KEYWORD_VARS: [(&str, Intent); 5] = [
    ("JARVIS_KEYWORDS_CODE", Intent::CodeRequest),
    ("JARVIS_KEYWORDS_GREETING", Intent::Greeting),
    ("JARVIS_KEYWORDS_STATUS", Intent::StatusQuery),
    ("JARVIS_KEYWORDS_HELP", Intent::HelpRequest),
    ("JARVIS_KEYWORDS_THANKS", Intent::Thanks),
];

impl DialogueConfig {
    /// Loads configuration from environment variables, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let defaults = Self::default();

        let reveal = RevealTiming {
            cadence: millis_var("JARVIS_REVEAL_CADENCE_MS", defaults.reveal.cadence)?,
            trailing_pause: millis_var("JARVIS_TRAILING_PAUSE_MS", defaults.reveal.trailing_pause)?,
            cursor_blink: millis_var("JARVIS_CURSOR_BLINK_MS", defaults.reveal.cursor_blink)?,
        };

        let tick = millis_var("JARVIS_PROGRESS_TICK_MS", defaults.progress.tick)?;
        if tick.is_zero() {
            return Err(ConfigError::InvalidValue(
                "JARVIS_PROGRESS_TICK_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let increment = match std::env::var("JARVIS_PROGRESS_INCREMENT") {
            Ok(raw) => {
                let value = raw.trim().parse::<f32>().map_err(|e| {
                    ConfigError::InvalidValue("JARVIS_PROGRESS_INCREMENT".to_string(), e.to_string())
                })?;
                if !(value > 0.0 && value <= 1.0) {
                    return Err(ConfigError::InvalidValue(
                        "JARVIS_PROGRESS_INCREMENT".to_string(),
                        format!("'{}' is not in (0, 1]", raw),
                    ));
                }
                value
            }
            Err(_) => defaults.progress.increment,
        };
        let progress = ProgressTiming {
            tick,
            increment,
            settle: millis_var("JARVIS_SETTLE_PAUSE_MS", defaults.progress.settle)?,
        };

        let busy_policy = match std::env::var("JARVIS_BUSY_POLICY") {
            Ok(raw) => match raw.trim().to_lowercase().as_str() {
                "drop" => BusyPolicy::Drop,
                "interrupt" => BusyPolicy::Interrupt,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "JARVIS_BUSY_POLICY".to_string(),
                        format!("'{}' is not one of 'drop', 'interrupt'", raw),
                    ));
                }
            },
            Err(_) => defaults.busy_policy,
        };

        let mut classifier = defaults.classifier;
        for (var, intent) in KEYWORD_VARS {
            if let Ok(raw) = std::env::var(var) {
                let keywords: Vec<&str> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .collect();
                if keywords.is_empty() {
                    return Err(ConfigError::InvalidValue(
                        var.to_string(),
                        "keyword list is empty".to_string(),
                    ));
                }
                classifier.set_keywords(intent, keywords);
            }
        }

        let script = match std::env::var("JARVIS_SCRIPT_PATH") {
            Ok(path) => load_script(PathBuf::from(path))?,
            Err(_) => defaults.script,
        };

        Ok(Self {
            reveal,
            progress,
            ack_pause: millis_var("JARVIS_ACK_PAUSE_MS", defaults.ack_pause)?,
            gate_debounce: millis_var("JARVIS_GATE_DEBOUNCE_MS", defaults.gate_debounce)?,
            greeting_delay: millis_var("JARVIS_GREETING_DELAY_MS", defaults.greeting_delay)?,
            busy_policy,
            classifier,
            replies: defaults.replies,
            script,
        })
    }
}

fn millis_var(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| {
                ConfigError::InvalidValue(
                    name.to_string(),
                    format!("'{}' is not a whole number of milliseconds", raw),
                )
            }),
        Err(_) => Ok(default),
    }
}

fn load_script(path: PathBuf) -> Result<TaskScript, ConfigError> {
    let json = std::fs::read_to_string(&path)
        .map_err(|e| ConfigError::Script(path.clone(), e.to_string()))?;
    TaskScript::from_json(&json).map_err(|e| ConfigError::Script(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::TaskStep;
    use serial_test::serial;
    use std::env;
    use std::io::Write;

    const VARS: [&str; 16] = [
        "JARVIS_REVEAL_CADENCE_MS",
        "JARVIS_TRAILING_PAUSE_MS",
        "JARVIS_CURSOR_BLINK_MS",
        "JARVIS_PROGRESS_TICK_MS",
        "JARVIS_PROGRESS_INCREMENT",
        "JARVIS_SETTLE_PAUSE_MS",
        "JARVIS_ACK_PAUSE_MS",
        "JARVIS_GATE_DEBOUNCE_MS",
        "JARVIS_GREETING_DELAY_MS",
        "JARVIS_BUSY_POLICY",
        "JARVIS_SCRIPT_PATH",
        "JARVIS_KEYWORDS_CODE",
        "JARVIS_KEYWORDS_GREETING",
        "JARVIS_KEYWORDS_STATUS",
        "JARVIS_KEYWORDS_HELP",
        "JARVIS_KEYWORDS_THANKS",
    ];

    fn clear_env_vars() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_config_error_display() {
        let invalid = ConfigError::InvalidValue("JARVIS_ACK_PAUSE_MS".into(), "bad".into());
        assert_eq!(
            invalid.to_string(),
            "Invalid value for environment variable JARVIS_ACK_PAUSE_MS: bad"
        );

        let script = ConfigError::Script(PathBuf::from("/tmp/task.json"), "EOF".into());
        assert_eq!(
            script.to_string(),
            "Failed to load task script from /tmp/task.json: EOF"
        );
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env_vars();
        let config = DialogueConfig::from_env().expect("Config should load successfully");
        assert_eq!(config, DialogueConfig::default());
        assert_eq!(config.reveal.cadence, Duration::from_millis(25));
        assert_eq!(config.reveal.trailing_pause, Duration::from_millis(300));
        assert_eq!(config.ack_pause, Duration::from_millis(500));
        assert_eq!(config.progress.tick, Duration::from_millis(100));
        assert_eq!(config.progress.increment, 0.008);
        assert_eq!(config.progress.settle, Duration::from_millis(1000));
        assert_eq!(config.busy_policy, BusyPolicy::Drop);
    }

    #[test]
    #[serial]
    fn test_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("JARVIS_REVEAL_CADENCE_MS", "10");
            env::set_var("JARVIS_TRAILING_PAUSE_MS", "0");
            env::set_var("JARVIS_PROGRESS_TICK_MS", "50");
            env::set_var("JARVIS_PROGRESS_INCREMENT", "0.05");
            env::set_var("JARVIS_BUSY_POLICY", "Interrupt");
            env::set_var("JARVIS_KEYWORDS_THANKS", "cheers, ta");
        }

        let config = DialogueConfig::from_env().expect("Config should load successfully");
        assert_eq!(config.reveal.cadence, Duration::from_millis(10));
        assert_eq!(config.reveal.trailing_pause, Duration::ZERO);
        assert_eq!(config.progress.tick, Duration::from_millis(50));
        assert_eq!(config.progress.increment, 0.05);
        assert_eq!(config.busy_policy, BusyPolicy::Interrupt);
        assert_eq!(config.classifier.keywords(Intent::Thanks), ["cheers", "ta"]);
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_duration() {
        clear_env_vars();
        unsafe {
            env::set_var("JARVIS_ACK_PAUSE_MS", "half a second");
        }
        match DialogueConfig::from_env().unwrap_err() {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "JARVIS_ACK_PAUSE_MS"),
            other => panic!("Expected InvalidValue, got {other:?}"),
        }
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_zero_tick_is_rejected() {
        clear_env_vars();
        unsafe {
            env::set_var("JARVIS_PROGRESS_TICK_MS", "0");
        }
        assert!(matches!(
            DialogueConfig::from_env(),
            Err(ConfigError::InvalidValue(var, _)) if var == "JARVIS_PROGRESS_TICK_MS"
        ));
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_increment_out_of_range() {
        clear_env_vars();
        unsafe {
            env::set_var("JARVIS_PROGRESS_INCREMENT", "1.5");
        }
        assert!(matches!(
            DialogueConfig::from_env(),
            Err(ConfigError::InvalidValue(var, _)) if var == "JARVIS_PROGRESS_INCREMENT"
        ));
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_unknown_busy_policy() {
        clear_env_vars();
        unsafe {
            env::set_var("JARVIS_BUSY_POLICY", "queue");
        }
        assert!(matches!(
            DialogueConfig::from_env(),
            Err(ConfigError::InvalidValue(var, _)) if var == "JARVIS_BUSY_POLICY"
        ));
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_script_loaded_from_file() {
        clear_env_vars();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "steps": [{{ "step": "speak", "text": "Deploying." }}, {{ "step": "wait", "ms": 100 }}] }}"#
        )
        .unwrap();
        unsafe {
            env::set_var("JARVIS_SCRIPT_PATH", file.path());
        }

        let config = DialogueConfig::from_env().expect("Config should load successfully");
        assert_eq!(
            config.script.steps,
            vec![
                TaskStep::speak("Deploying."),
                TaskStep::wait(Duration::from_millis(100))
            ]
        );
        assert_eq!(config.script.completion, None);
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_missing_script_file() {
        clear_env_vars();
        unsafe {
            env::set_var("JARVIS_SCRIPT_PATH", "/definitely/not/here.json");
        }
        assert!(matches!(
            DialogueConfig::from_env(),
            Err(ConfigError::Script(..))
        ));
        clear_env_vars();
    }
}
