//! Application-level configuration loading: race timing, target text words and room policies.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TYPERACE_CONFIG_PATH";
/// Delay between the last player readying up and the race start.
const DEFAULT_COUNTDOWN: Duration = Duration::from_secs(5);
/// Number of words in a generated target text.
const DEFAULT_WORD_COUNT: usize = 25;
/// How long an empty room survives before it is retired.
const DEFAULT_ROOM_IDLE_TTL: Duration = Duration::from_secs(30);

/// What happens to a pending race start when readiness changes during the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountdownPolicy {
    /// The countdown always starts the race, whatever happened in between.
    #[default]
    Unguarded,
    /// An un-ready cancels the countdown and the ready count is checked again when it fires.
    Revalidate,
}

/// How repeated `finished` reports from one connection are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishPolicy {
    /// Every report is appended to the results.
    #[default]
    Unguarded,
    /// Only the first report of each connection counts.
    Once,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    countdown: Duration,
    word_count: usize,
    words: Vec<String>,
    room_idle_ttl: Duration,
    countdown_policy: CountdownPolicy,
    finish_policy: FinishPolicy,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        words = app_config.words.len(),
                        countdown_policy = ?app_config.countdown_policy,
                        finish_policy = ?app_config.finish_policy,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Delay between "everyone is ready" and the race start.
    pub fn countdown(&self) -> Duration {
        self.countdown
    }

    /// Number of words in each generated target text.
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Pool the target text words are drawn from.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Grace period an empty room is kept around for reconnects.
    pub fn room_idle_ttl(&self) -> Duration {
        self.room_idle_ttl
    }

    /// Countdown re-validation policy.
    pub fn countdown_policy(&self) -> CountdownPolicy {
        self.countdown_policy
    }

    /// Duplicate `finished` handling policy.
    pub fn finish_policy(&self) -> FinishPolicy {
        self.finish_policy
    }

    /// Override the countdown delay.
    pub fn with_countdown(mut self, countdown: Duration) -> Self {
        self.countdown = countdown;
        self
    }

    /// Override the idle TTL of empty rooms.
    pub fn with_room_idle_ttl(mut self, ttl: Duration) -> Self {
        self.room_idle_ttl = ttl;
        self
    }

    /// Override the countdown policy.
    pub fn with_countdown_policy(mut self, policy: CountdownPolicy) -> Self {
        self.countdown_policy = policy;
        self
    }

    /// Override the finish policy.
    pub fn with_finish_policy(mut self, policy: FinishPolicy) -> Self {
        self.finish_policy = policy;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            countdown: DEFAULT_COUNTDOWN,
            word_count: DEFAULT_WORD_COUNT,
            words: default_words(),
            room_idle_ttl: DEFAULT_ROOM_IDLE_TTL,
            countdown_policy: CountdownPolicy::default(),
            finish_policy: FinishPolicy::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
#[serde(default)]
struct RawConfig {
    countdown_ms: Option<u64>,
    word_count: Option<usize>,
    words: Option<Vec<String>>,
    room_idle_ttl_ms: Option<u64>,
    countdown_policy: CountdownPolicy,
    finish_policy: FinishPolicy,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        let words = value
            .words
            .map(|words| {
                words
                    .into_iter()
                    .map(|word| word.trim().to_string())
                    .filter(|word| !word.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|words| !words.is_empty())
            .unwrap_or(defaults.words);

        Self {
            countdown: value
                .countdown_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.countdown),
            word_count: value
                .word_count
                .filter(|count| *count > 0)
                .unwrap_or(defaults.word_count),
            words,
            room_idle_ttl: value
                .room_idle_ttl_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.room_idle_ttl),
            countdown_policy: value.countdown_policy,
            finish_policy: value.finish_policy,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in word pool shipped with the binary.
fn default_words() -> Vec<String> {
    [
        "about", "above", "after", "again", "along", "always", "animal", "answer", "around",
        "because", "before", "begin", "behind", "below", "between", "bird", "black", "board",
        "body", "book", "bring", "build", "call", "carry", "change", "children", "city", "close",
        "color", "come", "country", "cover", "cross", "dark", "early", "earth", "enough", "even",
        "every", "eye", "face", "family", "far", "father", "feet", "field", "find", "fire", "first",
        "follow", "food", "form", "found", "friend", "garden", "girl", "give", "good", "great",
        "green", "ground", "group", "grow", "hand", "hard", "head", "hear", "help", "high", "home",
        "horse", "house", "idea", "important", "island", "just", "keep", "kind", "land", "large",
        "last", "late", "learn", "leave", "letter", "life", "light", "line", "list", "little",
        "live", "long", "look", "machine", "make", "many", "mark", "might", "mile", "money",
        "morning", "mother", "mountain", "move", "music", "name", "near", "need", "never", "next",
        "night", "north", "note", "number", "often", "open", "order", "other", "own", "page",
        "paper", "part", "people", "picture", "place", "plant", "play", "point", "problem",
        "question", "quick", "rain", "read", "real", "river", "road", "rock", "room", "round",
        "same", "school", "science", "scale", "second", "seem", "sentence", "should", "show",
        "side", "simple", "small", "song", "sound", "south", "space", "special", "stand", "star",
        "start", "state", "still", "stop", "story", "study", "such", "sun", "system", "table",
        "take", "talk", "thing", "think", "thought", "through", "time", "together", "took", "tree",
        "turn", "under", "until", "upon", "usual", "very", "voice", "walk", "watch", "water",
        "where", "while", "white", "whole", "wind", "word", "work", "world", "write", "year",
        "young",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
