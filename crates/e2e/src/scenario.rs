//! The edit-route scenario as a typed sequence of steps

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// Name typed into the edit form.
pub const NEW_ROUTE_NAME: &str = "New Route Name";

/// Path the edit page must live under once the Edit link is followed.
pub const EDIT_URL_PATTERN: &str = r"/routes/edit/\d+";

/// Key under which the route's generated name is remembered.
pub const ORIGINAL_NAME_KEY: &str = "original_name";

/// A fixed, ordered list of browser steps run in a single page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Viewport size for the browser
    #[serde(default = "default_viewport")]
    pub viewport: Viewport,

    /// Steps to execute in order
    pub steps: Vec<Step>,
}

fn default_viewport() -> Viewport {
    Viewport { width: 1280, height: 720 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        default_viewport()
    }
}

/// Pixel offset relative to the top-left corner of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

/// How an accessible name or visible text is compared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", content = "value", rename_all = "snake_case")]
pub enum TextMatch {
    /// Whole string, case-sensitive
    Exact(String),
    /// Case-insensitive substring (Playwright's default)
    Substring(String),
    /// Case-sensitive regular expression, unanchored
    Pattern(String),
}

/// How an element is found on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Locator {
    Css { selector: String },
    Role { role: String, name: TextMatch },
    Label { text: TextMatch },
    Text { text: TextMatch },
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Locator::Css { selector: selector.to_string() }
    }

    pub fn role(role: &str, name: TextMatch) -> Self {
        Locator::Role { role: role.to_string(), name }
    }

    pub fn label(text: TextMatch) -> Self {
        Locator::Label { text }
    }

    pub fn text(text: TextMatch) -> Self {
        Locator::Text { text }
    }

    fn describe(&self) -> String {
        match self {
            Locator::Css { selector } => selector.clone(),
            Locator::Role { role, name } => format!("{}[{}]", role, name.describe()),
            Locator::Label { text } => format!("label[{}]", text.describe()),
            Locator::Text { text } => format!("text[{}]", text.describe()),
        }
    }

    fn text_match(&self) -> Option<&TextMatch> {
        match self {
            Locator::Css { .. } => None,
            Locator::Role { name, .. } => Some(name),
            Locator::Label { text } | Locator::Text { text } => Some(text),
        }
    }
}

impl TextMatch {
    fn describe(&self) -> String {
        match self {
            TextMatch::Exact(s) => format!("={}", s),
            TextMatch::Substring(s) => format!("~{}", s),
            TextMatch::Pattern(p) => format!("/{}/", p),
        }
    }
}

/// A single step in the scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to an absolute URL
    Navigate { url: String },

    /// Click an element, optionally at an offset inside it
    Click {
        locator: Locator,
        #[serde(default)]
        position: Option<Position>,
        /// Use the first match instead of requiring a unique one
        #[serde(default)]
        first: bool,
    },

    /// Replace the value of an input
    Fill { locator: Locator, value: String },

    /// Store an input's current value for a later assertion
    Remember { locator: Locator, key: String },

    /// Assert the page URL matches a regular expression
    ExpectUrl { pattern: String },

    /// Assert an element is visible
    ExpectVisible { locator: Locator },

    /// Assert no element shows exactly the remembered text
    ExpectAbsent { remembered: String },

    /// Capture the page to a PNG file
    Screenshot {
        path: PathBuf,
        #[serde(default)]
        full_page: bool,
    },
}

/// Whether a failure in a step is an action failure or an assertion failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Action,
    Assertion,
}

impl Step {
    pub fn kind(&self) -> StepKind {
        match self {
            Step::ExpectUrl { .. } | Step::ExpectVisible { .. } | Step::ExpectAbsent { .. } => {
                StepKind::Assertion
            }
            _ => StepKind::Action,
        }
    }

    /// Short label used in logs and reports
    pub fn name(&self) -> String {
        match self {
            Step::Navigate { url } => format!("navigate:{}", url),
            Step::Click { locator, position: Some(p), .. } => {
                format!("click:{}@{},{}", locator.describe(), p.x, p.y)
            }
            Step::Click { locator, .. } => format!("click:{}", locator.describe()),
            Step::Fill { locator, .. } => format!("fill:{}", locator.describe()),
            Step::Remember { key, .. } => format!("remember:{}", key),
            Step::ExpectUrl { pattern } => format!("expect-url:{}", pattern),
            Step::ExpectVisible { locator } => format!("expect-visible:{}", locator.describe()),
            Step::ExpectAbsent { remembered } => format!("expect-absent:{}", remembered),
            Step::Screenshot { path, .. } => format!("screenshot:{}", path.display()),
        }
    }

    fn locator(&self) -> Option<&Locator> {
        match self {
            Step::Click { locator, .. }
            | Step::Fill { locator, .. }
            | Step::Remember { locator, .. }
            | Step::ExpectVisible { locator } => Some(locator),
            _ => None,
        }
    }
}

impl Scenario {
    /// Create a route on the map, rename it through the edit page and
    /// capture the resulting list.
    pub fn edit_route_name(base_url: &str, screenshot: &Path) -> Self {
        let base = base_url.trim_end_matches('/');
        let map = Locator::css("#map");

        let steps = vec![
            Step::Navigate { url: format!("{}/routes/create", base) },
            Step::Click {
                locator: map.clone(),
                position: Some(Position { x: 100, y: 100 }),
                first: false,
            },
            Step::Click {
                locator: map,
                position: Some(Position { x: 200, y: 200 }),
                first: false,
            },
            Step::Click {
                locator: Locator::role("button", TextMatch::Substring("Save".into())),
                position: None,
                first: false,
            },
            Step::Navigate { url: format!("{}/routes", base) },
            Step::Click {
                locator: Locator::role("link", TextMatch::Pattern("Edit route".into())),
                position: None,
                first: true,
            },
            Step::ExpectUrl { pattern: EDIT_URL_PATTERN.to_string() },
            Step::ExpectVisible {
                locator: Locator::role("heading", TextMatch::Exact("Edit Route".into())),
            },
            Step::Remember {
                locator: Locator::label(TextMatch::Substring("Name".into())),
                key: ORIGINAL_NAME_KEY.to_string(),
            },
            Step::Fill {
                locator: Locator::label(TextMatch::Substring("Name".into())),
                value: NEW_ROUTE_NAME.to_string(),
            },
            Step::Click {
                locator: Locator::role("button", TextMatch::Substring("Save Changes".into())),
                position: None,
                first: false,
            },
            Step::ExpectVisible {
                locator: Locator::role("heading", TextMatch::Exact("Saved Routes".into())),
            },
            Step::ExpectVisible {
                locator: Locator::text(TextMatch::Substring(NEW_ROUTE_NAME.into())),
            },
            Step::ExpectAbsent { remembered: ORIGINAL_NAME_KEY.to_string() },
            Step::Screenshot { path: screenshot.to_path_buf(), full_page: true },
        ];

        Self {
            name: "edit-route-name".to_string(),
            description: "Create a route, then rename it from the edit page".to_string(),
            viewport: Viewport::default(),
            steps,
        }
    }

    /// Check patterns compile and remembered values are stored before use
    pub fn validate(&self) -> E2eResult<()> {
        if self.steps.is_empty() {
            return Err(E2eError::InvalidScenario(format!("{} has no steps", self.name)));
        }

        let mut remembered = HashSet::new();
        for step in &self.steps {
            if let Step::ExpectUrl { pattern } = step {
                Regex::new(pattern)?;
            }
            if let Some(TextMatch::Pattern(p)) = step.locator().and_then(Locator::text_match) {
                Regex::new(p)?;
            }
            match step {
                Step::Remember { key, .. } => {
                    remembered.insert(key.as_str());
                }
                Step::ExpectAbsent { remembered: key } if !remembered.contains(key.as_str()) => {
                    return Err(E2eError::InvalidScenario(format!(
                        "'{}' is asserted before it is remembered",
                        key
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Screenshot paths written by this scenario, in step order
    pub fn screenshots(&self) -> Vec<&Path> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                Step::Screenshot { path, .. } => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }
}

/// Search `url` for `pattern` the way the driver's URL assertion does
pub fn url_matches(pattern: &str, url: &str) -> E2eResult<bool> {
    Ok(Regex::new(pattern)?.is_match(url))
}
