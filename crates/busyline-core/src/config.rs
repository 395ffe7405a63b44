#![forbid(unsafe_code)]

//! Configuration surface: the host-binding input shape, per-instance
//! options, and the global defaults merged into them.
//!
//! The host binding hands the engine a [`BusyInput`] whenever its bound
//! value changes: absent, a single source, an array of sources, or a full
//! [`BusyOptions`] object carrying the sources under `busy`. `From`
//! conversions cover the ergonomic cases so hosts can pass any of these
//! shapes directly to `configure`.
//!
//! [`BusyDefaults`] is a plain value type (delay 300 ms, minimum visible
//! duration 700 ms, backdrop on); how an application sources its defaults is
//! its own business.

use web_time::Duration;

use crate::content::{self, BusyContent, ComponentHandle, ComponentInputs, InputValue, TemplateHandle};
use crate::source::BusySource;

// ---------------------------------------------------------------------------
// Host-binding input
// ---------------------------------------------------------------------------

/// The value a host binds to a busy region.
#[derive(Debug, Clone, Default)]
pub enum BusyInput {
    /// No sources: never busy.
    #[default]
    None,
    /// A single async source.
    Single(BusySource),
    /// An ordered set of async sources.
    Many(Vec<BusySource>),
    /// Full options with sources under `busy`.
    Options(BusyOptions),
}

impl BusyInput {
    /// Normalize into full options (empty for `None`).
    #[must_use]
    pub fn into_options(self) -> BusyOptions {
        match self {
            Self::None => BusyOptions::new(),
            Self::Single(source) => BusyOptions::new().with_source(source),
            Self::Many(sources) => BusyOptions::new().with_sources(sources),
            Self::Options(options) => options,
        }
    }
}

impl From<BusySource> for BusyInput {
    fn from(source: BusySource) -> Self {
        Self::Single(source)
    }
}

impl From<Vec<BusySource>> for BusyInput {
    fn from(sources: Vec<BusySource>) -> Self {
        Self::Many(sources)
    }
}

impl From<Option<BusySource>> for BusyInput {
    fn from(source: Option<BusySource>) -> Self {
        match source {
            Some(source) => Self::Single(source),
            None => Self::None,
        }
    }
}

impl From<BusyOptions> for BusyInput {
    fn from(options: BusyOptions) -> Self {
        Self::Options(options)
    }
}

// ---------------------------------------------------------------------------
// Per-instance options
// ---------------------------------------------------------------------------

/// Per-instance busy options. Omitted fields fall back to [`BusyDefaults`]
/// at merge time.
#[derive(Debug, Clone, Default)]
pub struct BusyOptions {
    /// The async sources to track.
    pub busy: Vec<BusySource>,
    /// Suppress the indicator unless pending longer than this.
    pub delay: Option<Duration>,
    /// Once shown, stay shown at least this long after settling.
    pub min_duration: Option<Duration>,
    /// Explicit component content (highest resolution precedence).
    pub component: Option<ComponentHandle>,
    /// Explicit template content.
    pub template: Option<TemplateHandle>,
    /// Literal text content.
    pub text: Option<String>,
    /// CSS-style wrapper class for the presentation layer.
    pub wrapper_class: Option<String>,
    /// Whether the presentation layer should render a backdrop overlay.
    pub backdrop: Option<bool>,
    /// Named inputs for component-typed content.
    pub inputs: ComponentInputs,
}

impl BusyOptions {
    /// Options with no sources and every field deferred to defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one async source.
    #[must_use]
    pub fn with_source(mut self, source: BusySource) -> Self {
        self.busy.push(source);
        self
    }

    /// Add a batch of async sources.
    #[must_use]
    pub fn with_sources(mut self, sources: impl IntoIterator<Item = BusySource>) -> Self {
        self.busy.extend(sources);
        self
    }

    /// Override the start delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Override the minimum visible duration.
    #[must_use]
    pub fn with_min_duration(mut self, min_duration: Duration) -> Self {
        self.min_duration = Some(min_duration);
        self
    }

    /// Render a component type while busy.
    #[must_use]
    pub fn with_component(mut self, component: ComponentHandle) -> Self {
        self.component = Some(component);
        self
    }

    /// Render a template while busy.
    #[must_use]
    pub fn with_template(mut self, template: TemplateHandle) -> Self {
        self.template = Some(template);
        self
    }

    /// Render literal text while busy.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Override the wrapper class.
    #[must_use]
    pub fn with_wrapper_class(mut self, class: impl Into<String>) -> Self {
        self.wrapper_class = Some(class.into());
        self
    }

    /// Enable or disable the backdrop overlay.
    #[must_use]
    pub fn with_backdrop(mut self, backdrop: bool) -> Self {
        self.backdrop = Some(backdrop);
        self
    }

    /// Add a named input for component-typed content.
    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>, value: InputValue) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }

    /// Fill omitted fields from `defaults` and resolve the content
    /// descriptor.
    #[must_use]
    pub fn merge(self, defaults: &BusyDefaults) -> ResolvedOptions {
        let content = content::resolve(&self);
        ResolvedOptions {
            delay: self.delay.unwrap_or(defaults.delay),
            min_duration: self.min_duration.unwrap_or(defaults.min_duration),
            wrapper_class: self
                .wrapper_class
                .unwrap_or_else(|| defaults.wrapper_class.clone()),
            backdrop: self.backdrop.unwrap_or(defaults.backdrop),
            content,
            busy: self.busy,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults and merged result
// ---------------------------------------------------------------------------

/// Global defaults applied where per-instance options are silent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusyDefaults {
    pub delay: Duration,
    pub min_duration: Duration,
    pub wrapper_class: String,
    pub backdrop: bool,
}

impl Default for BusyDefaults {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(300),
            min_duration: Duration::from_millis(700),
            wrapper_class: "busy-default-wrapper".to_string(),
            backdrop: true,
        }
    }
}

/// Options after defaults were merged in: everything the engine and the
/// presentation layer need, with no optionality left.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub busy: Vec<BusySource>,
    pub delay: Duration,
    pub min_duration: Duration,
    pub wrapper_class: String,
    pub backdrop: bool,
    pub content: BusyContent,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
