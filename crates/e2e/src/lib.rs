//! Edit-route browser verification
//!
//! Drives Playwright through the route workflow of a running application:
//! - Creates a route by clicking twice on the map and saving it
//! - Follows the first "Edit route" link and checks the edit page
//! - Renames the route and checks the list shows the new name
//! - Captures a full-page screenshot and verifies the file
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ScenarioRunner (Rust)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  preflight::wait_for_reachable(base_url)                    │
//! │  Scenario::edit_route_name() -> [Step]                      │
//! │  PlaywrightHandle::execute(scenario)                        │
//! │    ├── build_script() -> one Node.js program, one page      │
//! │    └── stdout events  -> [StepResult], stop at first fail   │
//! │  artifact::verify(screenshot) -> ScreenshotReport           │
//! │  write_results() -> <name>-results.json                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifact;
pub mod error;
pub mod playwright;
pub mod preflight;
pub mod runner;
pub mod scenario;

pub use error::{E2eError, E2eResult};
pub use runner::{RunnerConfig, ScenarioResult, ScenarioRunner};
pub use scenario::{Scenario, Step};
