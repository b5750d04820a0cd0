//! Playwright browser automation
//!
//! The whole scenario is rendered into one Node.js program so every step
//! shares a single page. The program reports one JSON event per step on
//! stdout, prefixed with [`EVENT_PREFIX`]. `@playwright/test` is resolved
//! from the project directory, not from wherever the script is written.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tracing::{debug, error, info};

use crate::error::{E2eError, E2eResult};
use crate::scenario::{Locator, Scenario, Step, StepKind, TextMatch};

/// Marks stdout lines that carry step events
pub const EVENT_PREFIX: &str = "__routes_e2e__ ";

/// Playwright browser handle
pub struct PlaywrightHandle {
    /// Node.js executable
    node_binary: PathBuf,

    /// Where the generated script is written
    script_dir: PathBuf,

    /// Working directory for node; `@playwright/test` is resolved from here
    project_dir: PathBuf,

    /// Browser type
    browser: Browser,

    headless: bool,

    /// Overrides the driver's default action and assertion timeouts
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(format!("unknown browser '{}'", other)),
        }
    }
}

/// Result of executing a scenario step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub success: bool,
    pub step_name: String,
    pub kind: StepKind,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Event written by the generated script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    StepPassed { index: usize, duration_ms: u64 },
    /// `index` is -1 when the browser failed before the first step
    StepFailed { index: i64, duration_ms: u64, error: String },
    Finished,
}

impl ScriptEvent {
    /// Parse one stdout line, ignoring anything the page or driver printed
    pub fn parse_line(line: &str) -> Option<E2eResult<Self>> {
        line.strip_prefix(EVENT_PREFIX)
            .map(|payload| serde_json::from_str(payload).map_err(E2eError::from))
    }
}

impl PlaywrightHandle {
    /// Create a new Playwright handle
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;

        std::fs::create_dir_all(&config.script_dir)?;

        Ok(Self::without_check(config))
    }

    /// Create a handle without probing for an installed Playwright
    pub fn without_check(config: PlaywrightConfig) -> Self {
        Self {
            node_binary: config.node_binary,
            script_dir: config.script_dir,
            project_dir: config.project_dir,
            browser: config.browser,
            headless: config.headless,
            timeout_ms: config.timeout_ms,
        }
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Path the script for `scenario` is written to
    pub fn script_path(&self, scenario: &Scenario) -> PathBuf {
        self.script_dir.join(format!("{}.cjs", scenario.name))
    }

    /// Build the Playwright program for a scenario
    pub fn build_script(&self, scenario: &Scenario) -> E2eResult<String> {
        let mut script = String::new();

        script.push_str(&format!(
            r#"const {{ chromium, firefox, webkit, expect }} = require(
  require.resolve('@playwright/test', {{ paths: [process.cwd()] }})
);

function report(event) {{
  console.log({prefix} + JSON.stringify(event));
}}

(async () => {{
  let current = -1;
  let started = Date.now();
  const browser = await {browser}.launch({{ headless: {headless} }});
  try {{
    const context = await browser.newContext({{
      viewport: {{ width: {width}, height: {height} }}
    }});
    const page = await context.newPage();
{timeouts}    const remembered = {{}};
"#,
            prefix = js_str(EVENT_PREFIX)?,
            browser = self.browser.as_str(),
            headless = self.headless,
            width = scenario.viewport.width,
            height = scenario.viewport.height,
            timeouts = self.timeout_js(),
        ));

        for (i, step) in scenario.steps.iter().enumerate() {
            script.push_str(&format!("\n    // Step {}: {}\n", i + 1, step.name()));
            script.push_str(&format!("    current = {}; started = Date.now();\n", i));
            script.push_str(&step_to_js(step)?);
            script.push_str(&format!(
                "\n    report({{ event: 'step_passed', index: {}, duration_ms: Date.now() - started }});\n",
                i
            ));
        }

        script.push_str(
            r#"
    report({ event: 'finished' });
  } catch (error) {
    report({
      event: 'step_failed',
      index: current,
      duration_ms: Date.now() - started,
      error: String((error && error.message) || error),
    });
    process.exitCode = 1;
  } finally {
    await browser.close();
  }
})().catch((error) => {
  console.error(error);
  process.exitCode = 2;
});
"#,
        );

        Ok(script)
    }

    fn timeout_js(&self) -> String {
        match self.timeout_ms {
            Some(ms) => format!(
                "    page.setDefaultTimeout({ms});\n    const check = expect.configure({{ timeout: {ms} }});\n"
            ),
            None => "    const check = expect;\n".to_string(),
        }
    }

    /// Write the script and run it with Node, collecting one result per
    /// executed step. Execution stops at the first failure.
    pub async fn execute(&self, scenario: &Scenario) -> E2eResult<Vec<StepResult>> {
        let script = self.build_script(scenario)?;
        let script_path = crate::artifact::absolute(&self.script_path(scenario))?;
        std::fs::write(&script_path, &script)?;

        info!(
            "Running '{}' in {} ({} steps)",
            scenario.name,
            self.browser.as_str(),
            scenario.steps.len()
        );
        debug!("Playwright script: {}", script_path.display());

        let mut child = TokioCommand::new(&self.node_binary)
            .arg(&script_path)
            .current_dir(&self.project_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                E2eError::Playwright(format!(
                    "failed to spawn {}: {}",
                    self.node_binary.display(),
                    e
                ))
            })?;

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        let mut collector = EventCollector::new(scenario);
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                match ScriptEvent::parse_line(&line) {
                    Some(event) => collector.push(event?),
                    None => debug!("[node] {}", line),
                }
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        collector.finish(status.success(), &stderr)
    }
}

/// Folds script events into step results
pub struct EventCollector<'a> {
    scenario: &'a Scenario,
    results: Vec<StepResult>,
    launch_error: Option<String>,
    finished: bool,
}

impl<'a> EventCollector<'a> {
    pub fn new(scenario: &'a Scenario) -> Self {
        Self {
            scenario,
            results: Vec::new(),
            launch_error: None,
            finished: false,
        }
    }

    pub fn push(&mut self, event: ScriptEvent) {
        match event {
            ScriptEvent::StepPassed { index, duration_ms } => {
                if let Some(step) = self.scenario.steps.get(index) {
                    info!("✓ {} ({} ms)", step.name(), duration_ms);
                    self.results.push(StepResult {
                        index,
                        success: true,
                        step_name: step.name(),
                        kind: step.kind(),
                        duration_ms,
                        error: None,
                    });
                }
            }
            ScriptEvent::StepFailed { index, duration_ms, error } => {
                let step = usize::try_from(index)
                    .ok()
                    .and_then(|i| self.scenario.steps.get(i).map(|s| (i, s)));
                match step {
                    Some((index, step)) => {
                        error!("✗ {} - {}", step.name(), error);
                        self.results.push(StepResult {
                            index,
                            success: false,
                            step_name: step.name(),
                            kind: step.kind(),
                            duration_ms,
                            error: Some(error),
                        });
                    }
                    None => self.launch_error = Some(error),
                }
            }
            ScriptEvent::Finished => self.finished = true,
        }
    }

    /// Check the event stream is consistent with how the process exited
    pub fn finish(self, exited_ok: bool, stderr: &str) -> E2eResult<Vec<StepResult>> {
        if let Some(err) = self.launch_error {
            return Err(E2eError::Playwright(format!("browser failed to start: {}", err)));
        }

        let failed = self.results.iter().any(|r| !r.success);
        let complete = self.finished && self.results.len() == self.scenario.steps.len();

        if failed || (exited_ok && complete) {
            return Ok(self.results);
        }

        Err(E2eError::Playwright(format!(
            "script stopped after {} of {} steps:\n{}",
            self.results.len(),
            self.scenario.steps.len(),
            stderr.trim()
        )))
    }
}

/// Quote a string as a JavaScript literal
fn js_str(s: &str) -> E2eResult<String> {
    Ok(serde_json::to_string(s)?)
}

fn text_arg(m: &TextMatch) -> E2eResult<(String, bool)> {
    Ok(match m {
        TextMatch::Exact(s) => (js_str(s)?, true),
        TextMatch::Substring(s) => (js_str(s)?, false),
        TextMatch::Pattern(p) => (format!("new RegExp({})", js_str(p)?), false),
    })
}

fn locator_to_js(locator: &Locator) -> E2eResult<String> {
    Ok(match locator {
        Locator::Css { selector } => format!("page.locator({})", js_str(selector)?),
        Locator::Role { role, name } => {
            let (name, exact) = text_arg(name)?;
            let exact = if exact { ", exact: true" } else { "" };
            format!("page.getByRole({}, {{ name: {}{} }})", js_str(role)?, name, exact)
        }
        Locator::Label { text } => by_text("getByLabel", text)?,
        Locator::Text { text } => by_text("getByText", text)?,
    })
}

fn by_text(method: &str, text: &TextMatch) -> E2eResult<String> {
    let (arg, exact) = text_arg(text)?;
    Ok(if exact {
        format!("page.{}({}, {{ exact: true }})", method, arg)
    } else {
        format!("page.{}({})", method, arg)
    })
}

/// Convert a step to JavaScript code
fn step_to_js(step: &Step) -> E2eResult<String> {
    Ok(match step {
        Step::Navigate { url } => format!("    await page.goto({});", js_str(url)?),
        Step::Click { locator, position, first } => {
            let target = locator_to_js(locator)?;
            let target = if *first { format!("{}.first()", target) } else { target };
            match position {
                Some(p) => format!(
                    "    await {}.click({{ position: {{ x: {}, y: {} }} }});",
                    target, p.x, p.y
                ),
                None => format!("    await {}.click();", target),
            }
        }
        Step::Fill { locator, value } => {
            format!("    await {}.fill({});", locator_to_js(locator)?, js_str(value)?)
        }
        Step::Remember { locator, key } => format!(
            "    remembered[{}] = await {}.inputValue();",
            js_str(key)?,
            locator_to_js(locator)?
        ),
        Step::ExpectUrl { pattern } => {
            format!("    await check(page).toHaveURL(new RegExp({}));", js_str(pattern)?)
        }
        Step::ExpectVisible { locator } => {
            format!("    await check({}).toBeVisible();", locator_to_js(locator)?)
        }
        Step::ExpectAbsent { remembered } => {
            let key = js_str(remembered)?;
            format!(
                "    if (remembered[{key}]) {{\n      await check(page.getByText(remembered[{key}], {{ exact: true }})).toHaveCount(0);\n    }}"
            )
        }
        Step::Screenshot { path, full_page } => format!(
            "    await page.screenshot({{ path: {}, fullPage: {} }});",
            js_str(&path.to_string_lossy())?,
            full_page
        ),
    })
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub node_binary: PathBuf,
    pub script_dir: PathBuf,
    pub project_dir: PathBuf,
    pub browser: Browser,
    pub headless: bool,
    pub timeout_ms: Option<u64>,
}

impl PlaywrightConfig {
    pub fn with_script_dir(mut self, dir: &Path) -> Self {
        self.script_dir = dir.to_path_buf();
        self
    }
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            node_binary: PathBuf::from("node"),
            script_dir: PathBuf::from("test-results"),
            project_dir: PathBuf::from("."),
            browser: Browser::Chromium,
            headless: true,
            timeout_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(timeout_ms: Option<u64>) -> PlaywrightHandle {
        PlaywrightHandle::without_check(PlaywrightConfig {
            timeout_ms,
            ..Default::default()
        })
    }

    fn scenario() -> Scenario {
        Scenario::edit_route_name("http://localhost:5174", Path::new("/tmp/shot.png"))
    }

    #[test]
    fn test_locators_render_playwright_calls() {
        let role = Locator::role("button", TextMatch::Exact("Save".into()));
        assert_eq!(
            locator_to_js(&role).unwrap(),
            r#"page.getByRole("button", { name: "Save", exact: true })"#
        );

        let link = Locator::role("link", TextMatch::Pattern("Edit route".into()));
        assert_eq!(
            locator_to_js(&link).unwrap(),
            r#"page.getByRole("link", { name: new RegExp("Edit route") })"#
        );

        let text = Locator::text(TextMatch::Substring("New Route Name".into()));
        assert_eq!(locator_to_js(&text).unwrap(), r#"page.getByText("New Route Name")"#);
    }

    #[test]
    fn test_literals_are_escaped() {
        let step = Step::Fill {
            locator: Locator::css("#name"),
            value: "it's \"quoted\"".into(),
        };
        assert_eq!(
            step_to_js(&step).unwrap(),
            r##"    await page.locator("#name").fill("it's \"quoted\"");"##
        );
    }

    #[test]
    fn test_url_pattern_keeps_backslash() {
        let step = Step::ExpectUrl { pattern: r"/routes/edit/\d+".into() };
        assert_eq!(
            step_to_js(&step).unwrap(),
            r#"    await check(page).toHaveURL(new RegExp("/routes/edit/\\d+"));"#
        );
    }

    #[test]
    fn test_script_runs_every_step_in_one_page() {
        let script = handle(None).build_script(&scenario()).unwrap();
        assert_eq!(script.matches("newPage()").count(), 1);
        assert_eq!(script.matches("event: 'step_passed'").count(), 15);
        assert!(script.contains("chromium.launch({ headless: true })"));
        assert!(script.contains("viewport: { width: 1280, height: 720 }"));
        assert!(script.contains(".first().click();"));
        assert!(script.contains(r#"click({ position: { x: 200, y: 200 } })"#));
        assert!(script.contains(r#"page.screenshot({ path: "/tmp/shot.png", fullPage: true })"#));
        assert!(script.contains("const check = expect;"));
        assert!(!script.contains("setDefaultTimeout"));
        assert!(script.contains("require.resolve('@playwright/test', { paths: [process.cwd()] })"));

        let renamed = script
            .find(r#"check(page.getByText("New Route Name")).toBeVisible()"#)
            .unwrap();
        let remembered = script.find(".inputValue();").unwrap();
        let absent = script.find(".toHaveCount(0);").unwrap();
        let screenshot = script.find("page.screenshot(").unwrap();
        assert!(remembered < renamed);
        assert!(renamed < absent);
        assert!(absent < screenshot);
    }

    #[test]
    fn test_remember_reads_input_value() {
        let step = Step::Remember {
            locator: Locator::label(TextMatch::Substring("Name".into())),
            key: "original_name".into(),
        };
        assert_eq!(
            step_to_js(&step).unwrap(),
            r#"    remembered["original_name"] = await page.getByLabel("Name").inputValue();"#
        );
    }

    #[test]
    fn test_absent_checks_exact_remembered_text() {
        let step = Step::ExpectAbsent { remembered: "original_name".into() };
        let js = step_to_js(&step).unwrap();
        assert_eq!(
            js,
            concat!(
                "    if (remembered[\"original_name\"]) {\n",
                "      await check(page.getByText(remembered[\"original_name\"], { exact: true })).toHaveCount(0);\n",
                "    }"
            )
        );
    }

    #[test]
    fn test_timeout_override() {
        let script = handle(Some(2500)).build_script(&scenario()).unwrap();
        assert!(script.contains("page.setDefaultTimeout(2500);"));
        assert!(script.contains("expect.configure({ timeout: 2500 })"));
    }

    #[test]
    fn test_parse_event_lines() {
        let line = format!("{}{}", EVENT_PREFIX, r#"{"event":"step_passed","index":3,"duration_ms":12}"#);
        let event = ScriptEvent::parse_line(&line).unwrap().unwrap();
        assert_eq!(event, ScriptEvent::StepPassed { index: 3, duration_ms: 12 });
        assert!(ScriptEvent::parse_line("console noise").is_none());
    }

    #[test]
    fn test_collector_stops_at_failure() {
        let s = scenario();
        let mut collector = EventCollector::new(&s);
        for i in 0..5 {
            collector.push(ScriptEvent::StepPassed { index: i, duration_ms: 1 });
        }
        collector.push(ScriptEvent::StepFailed {
            index: 5,
            duration_ms: 5000,
            error: "Timeout 5000ms exceeded".into(),
        });
        let results = collector.finish(false, "").unwrap();
        assert_eq!(results.len(), 6);
        let last = results.last().unwrap();
        assert!(!last.success);
        assert_eq!(last.kind, StepKind::Action);
        assert_eq!(last.step_name, "click:link[/Edit route/]");
    }

    #[test]
    fn test_collector_reports_launch_failure() {
        let s = scenario();
        let mut collector = EventCollector::new(&s);
        collector.push(ScriptEvent::StepFailed {
            index: -1,
            duration_ms: 0,
            error: "Executable doesn't exist".into(),
        });
        assert!(matches!(collector.finish(false, ""), Err(E2eError::Playwright(_))));
    }

    #[test]
    fn test_collector_rejects_truncated_run() {
        let s = scenario();
        let mut collector = EventCollector::new(&s);
        collector.push(ScriptEvent::StepPassed { index: 0, duration_ms: 1 });
        let err = collector.finish(false, "Cannot find module '@playwright/test'").unwrap_err();
        assert!(err.to_string().contains("1 of 15"));
    }

    #[test]
    fn test_browser_from_str() {
        assert_eq!("webkit".parse::<Browser>().unwrap(), Browser::Webkit);
        assert!("opera".parse::<Browser>().is_err());
    }
}
