//! Screen layout, timing and behavior settings.
//!
//! The configuration is read once from a JSON file, validated, and then passed
//! by reference to everything that needs it. Nothing modifies it during a run.

use {
    crate::{
        answer::{AnswerFormat, AnswerLetter},
        hotkey::parse_key,
        layout::CoordinateSet,
        types::{ScreenPoint, ScreenRegion},
    },
    anyhow::Context as _,
    itertools::Itertools,
    serde::{Deserialize, Serialize},
    std::{
        collections::BTreeMap,
        path::{Path, PathBuf},
        time::Duration,
    },
    strum::IntoEnumIterator,
    tracing::warn,
};

pub const DEFAULT_CONFIG_PATH: &str = "quizpilot.json";

/// Reminder sent in front of every question image.
pub const DEFAULT_PROMPT: &str = "TASK: Read the question from attached image. \
    Answer with ONLY the letter (A, B, C, or D). \
    Do NOT explain. Do NOT append to previous answers. \
    Only answer the current question:\n\n";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub question_area: ScreenRegion,
    pub answer_options: LayoutVariants<BTreeMap<AnswerLetter, ScreenPoint>>,
    pub next_button: LayoutVariants<ScreenPoint>,
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub send_retry: RetryPolicy,
    #[serde(default)]
    pub answer_format: AnswerFormat,
    #[serde(default)]
    pub unparseable_response: UnparseablePolicy,
    #[serde(default)]
    pub screenshots: ScreenshotConfig,
    #[serde(default = "default_reference_dir")]
    pub reference_dir: PathBuf,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub hotkeys: HotkeyConfig,
}

/// Coordinates for the layout of the first question and for the layout after
/// the one-time shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutVariants<T> {
    pub first: T,
    pub shifted: T,
}

impl<T> LayoutVariants<T> {
    pub fn get(&self, set: CoordinateSet) -> &T {
        match set {
            CoordinateSet::First => &self.first,
            CoordinateSet::Shifted => &self.shifted,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub input_field: ScreenPoint,
    pub send_button: ScreenPoint,
    /// Half the side of the square watched around the send button.
    #[serde(default = "default_send_button_margin")]
    pub send_button_margin: u32,
    pub response_area: ScreenRegion,
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

impl AssistantConfig {
    pub fn send_button_region(&self) -> ScreenRegion {
        ScreenRegion::around(self.send_button, self.send_button_margin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Small region compared before and after the first "next" click.
    pub sentinel: ScreenRegion,
    /// Fixed coordinate set; disables shift detection when present.
    #[serde(rename = "override", skip_serializing_if = "Option::is_none")]
    pub override_set: Option<CoordinateSet>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            sentinel: ScreenRegion::new(22, 454, 20, 20),
            override_set: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    #[serde(rename = "after_click_ms", with = "duration_ms")]
    pub after_click: Duration,
    #[serde(rename = "after_paste_ms", with = "duration_ms")]
    pub after_paste: Duration,
    #[serde(rename = "between_questions_ms", with = "duration_ms")]
    pub between_questions: Duration,
    /// Wait before the send button is first checked after pasting.
    #[serde(rename = "upload_initial_delay_ms", with = "duration_ms")]
    pub upload_initial_delay: Duration,
    #[serde(rename = "ready_check_interval_ms", with = "duration_ms")]
    pub ready_check_interval: Duration,
    /// Includes the initial upload delay.
    #[serde(rename = "ready_timeout_ms", with = "duration_ms")]
    pub ready_timeout: Duration,
    #[serde(rename = "response_initial_delay_ms", with = "duration_ms")]
    pub response_initial_delay: Duration,
    #[serde(rename = "response_poll_interval_ms", with = "duration_ms")]
    pub response_poll_interval: Duration,
    pub response_max_attempts: u32,
    /// Wait after the first "next" click before the sentinel is captured again.
    #[serde(rename = "shift_settle_ms", with = "duration_ms")]
    pub shift_settle: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            after_click: Duration::from_millis(500),
            after_paste: Duration::from_millis(1000),
            between_questions: Duration::from_millis(2000),
            upload_initial_delay: Duration::from_millis(1000),
            ready_check_interval: Duration::from_millis(500),
            ready_timeout: Duration::from_secs(10),
            response_initial_delay: Duration::from_millis(2000),
            response_poll_interval: Duration::from_millis(500),
            response_max_attempts: 40,
            shift_settle: Duration::from_millis(500),
        }
    }
}

/// Bounded retry schedule for clicking the send button.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(rename = "delay_ms", with = "duration_ms")]
    pub delay: Duration,
    /// Factor applied to the delay after every failed attempt.
    pub backoff: f64,
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            delay: Duration::from_millis(500),
            backoff: 1.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt number `attempt` (starting at 1).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.delay.as_secs_f64() * self.backoff.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

/// What to do when the assistant's reply contains no recognizable option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnparseablePolicy {
    /// Click option A and carry on (logged as a warning).
    #[default]
    DefaultToA,
    /// Abort the cycle, which stops the run.
    FailCycle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("screenshots"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub start: String,
    pub stop: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            start: "f9".into(),
            stop: "escape".into(),
        }
    }
}

fn default_reference_dir() -> PathBuf {
    PathBuf::from("reference_images")
}

fn default_send_button_margin() -> u32 {
    30
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.into()
}

impl Default for Config {
    /// A template for a 1920x1080 screen with the quiz on the left half and
    /// the assistant on the right half.
    fn default() -> Self {
        let options = |x: i32, first_y: i32| {
            AnswerLetter::iter()
                .enumerate()
                .map(|(i, letter)| (letter, ScreenPoint::new(x, first_y + 60 * i as i32)))
                .collect::<BTreeMap<_, _>>()
        };
        Self {
            question_area: ScreenRegion::new(40, 180, 880, 520),
            answer_options: LayoutVariants {
                first: options(120, 480),
                shifted: options(120, 540),
            },
            next_button: LayoutVariants {
                first: ScreenPoint::new(820, 760),
                shifted: ScreenPoint::new(820, 820),
            },
            assistant: AssistantConfig {
                input_field: ScreenPoint::new(1400, 960),
                send_button: ScreenPoint::new(1850, 960),
                send_button_margin: default_send_button_margin(),
                response_area: ScreenRegion::new(1000, 300, 860, 500),
                prompt: default_prompt(),
            },
            layout: LayoutConfig::default(),
            timing: TimingConfig::default(),
            send_retry: RetryPolicy::default(),
            answer_format: AnswerFormat::default(),
            unparseable_response: UnparseablePolicy::default(),
            screenshots: ScreenshotConfig::default(),
            reference_dir: default_reference_dir(),
            log_file: None,
            hotkeys: HotkeyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must have a non-zero width and height")]
    EmptyRegion(&'static str),
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error("{0} must allow at least one attempt")]
    ZeroAttempts(&'static str),
    #[error("send_retry.backoff must be a finite number >= 1.0, got {0}")]
    InvalidBackoff(f64),
    #[error("unknown hotkey {0:?}")]
    UnknownHotkey(String),
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs_err::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config file {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("invalid config file {:?}", path))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs_err::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let regions = [
            ("question_area", &self.question_area),
            ("assistant.response_area", &self.assistant.response_area),
            ("layout.sentinel", &self.layout.sentinel),
        ];
        for (name, region) in regions {
            if region.is_empty() {
                return Err(ConfigError::EmptyRegion(name));
            }
        }
        if self.assistant.send_button_margin == 0 {
            return Err(ConfigError::EmptyRegion("assistant.send_button_margin"));
        }

        let intervals = [
            ("timing.ready_check_interval_ms", self.timing.ready_check_interval),
            ("timing.response_poll_interval_ms", self.timing.response_poll_interval),
        ];
        for (name, interval) in intervals {
            if interval.is_zero() {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        if self.timing.response_max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts("timing.response_max_attempts"));
        }
        if self.send_retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts("send_retry.max_attempts"));
        }
        if !self.send_retry.backoff.is_finite() || self.send_retry.backoff < 1.0 {
            return Err(ConfigError::InvalidBackoff(self.send_retry.backoff));
        }

        for key in [&self.hotkeys.start, &self.hotkeys.stop] {
            if parse_key(key).is_none() {
                return Err(ConfigError::UnknownHotkey(key.clone()));
            }
        }

        // A missing option only fails the cycle that picks it.
        for set in [CoordinateSet::First, CoordinateSet::Shifted] {
            let options = self.answer_options.get(set);
            let missing = AnswerLetter::iter()
                .filter(|letter| !options.contains_key(letter))
                .join(", ");
            if !missing.is_empty() {
                warn!("no coordinates for options {} in the {} layout", missing, set);
            }
        }
        Ok(())
    }
}

mod duration_ms {
    use {
        serde::{Deserialize, Deserializer, Serializer},
        std::time::Duration,
    };

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[test]
fn default_config_is_valid() {
    Config::default().validate().unwrap();
}

#[test]
fn partial_config_uses_defaults() {
    let text = r#"{
        "question_area": { "x": 10, "y": 20, "width": 300, "height": 200 },
        "answer_options": {
            "first": { "A": { "x": 1, "y": 2 }, "B": { "x": 3, "y": 4 } },
            "shifted": { "A": { "x": 5, "y": 6 } }
        },
        "next_button": { "first": { "x": 7, "y": 8 }, "shifted": { "x": 9, "y": 10 } },
        "assistant": {
            "input_field": { "x": 11, "y": 12 },
            "send_button": { "x": 100, "y": 100 },
            "response_area": { "x": 0, "y": 0, "width": 50, "height": 50 }
        },
        "timing": { "after_click_ms": 250 },
        "answer_format": "number",
        "unparseable_response": "fail-cycle",
        "layout": { "override": "shifted" }
    }"#;
    let config: Config = serde_json::from_str(text).unwrap();
    config.validate().unwrap();

    assert_eq!(config.timing.after_click, Duration::from_millis(250));
    assert_eq!(config.timing.response_max_attempts, 40);
    assert_eq!(config.answer_format, AnswerFormat::Number);
    assert_eq!(config.unparseable_response, UnparseablePolicy::FailCycle);
    assert_eq!(config.layout.override_set, Some(CoordinateSet::Shifted));
    assert_eq!(config.layout.sentinel, ScreenRegion::new(22, 454, 20, 20));
    assert_eq!(
        config.answer_options.first.get(&AnswerLetter::B),
        Some(&ScreenPoint::new(3, 4))
    );
    assert_eq!(
        config.assistant.send_button_region(),
        ScreenRegion::new(70, 70, 60, 60)
    );
    assert_eq!(config.assistant.prompt, DEFAULT_PROMPT);
}

#[test]
fn rejects_invalid_values() {
    let mut config = Config::default();
    config.question_area.width = 0;
    assert_eq!(
        config.validate(),
        Err(ConfigError::EmptyRegion("question_area"))
    );

    let mut config = Config::default();
    config.send_retry.backoff = 0.5;
    assert_eq!(config.validate(), Err(ConfigError::InvalidBackoff(0.5)));

    let mut config = Config::default();
    config.hotkeys.stop = "hyper".into();
    assert_eq!(
        config.validate(),
        Err(ConfigError::UnknownHotkey("hyper".into()))
    );
}

#[test]
fn retry_delay_grows_and_is_capped() {
    let policy = RetryPolicy {
        max_attempts: 10,
        delay: Duration::from_millis(100),
        backoff: 2.0,
        max_delay: Duration::from_millis(500),
    };
    assert_eq!(policy.delay_after(1), Duration::from_millis(100));
    assert_eq!(policy.delay_after(2), Duration::from_millis(200));
    assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    assert_eq!(policy.delay_after(4), Duration::from_millis(500));
    assert_eq!(RetryPolicy::default().delay_after(30), Duration::from_millis(500));
}
