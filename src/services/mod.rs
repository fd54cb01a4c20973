//! Services module - crash log analysis logic.
//!
//! Everything here is framework-agnostic: no terminal output, no global
//! state. Inputs are plain data (paths, lines, the loaded database) and so
//! are outputs.
//!
//! # Components
//!
//! - [`segments`]: splits a log into sections by anchor lines and reads the header
//! - [`plugins`]: load order extraction, plugin-limit detection, call-stack plugin suspects
//! - [`form_ids`]: FormID extraction, resolution against the load order, counting
//! - [`suspects`]: known crash signature matching
//! - [`records`]: named records and GPU detection
//! - [`mod_conflicts`]: mod database checks against the installed set
//! - [`settings_validator`]: crash generator settings checks and live fixes
//! - [`fcx`]: extended file checks, run once per batch
//! - [`analyzer`]: sequences all of the above into one result per log
//! - [`game_detection`]: crash log discovery and game identification
//!
//! # Usage Example
//!
//! ```ignore
//! use autoscan::services::Analyzer;
//!
//! let analyzer = Analyzer::new(database, &settings);
//! let log = analyzer.parse_crash_log(&path).await?;
//! let result = analyzer.analyze(&log).await;
//! ```

pub mod analyzer;
pub mod fcx;
pub mod form_ids;
pub mod game_detection;
pub mod mod_conflicts;
pub mod plugins;
pub mod records;
pub mod segments;
pub mod settings_validator;
pub mod suspects;

pub use analyzer::Analyzer;
pub use fcx::{FcxHandler, FilePresenceChecker, IntegrityChecker};
pub use form_ids::{FormIdExtractor, FormIdLookup};
pub use game_detection::{DetectedGame, detect_game_from_log, find_crash_logs, report_path};
pub use mod_conflicts::{InstalledMods, detect_mod_conflicts};
pub use plugins::{PluginExtractor, PluginList, parse_load_order, read_load_order_file};
pub use segments::{LogHeader, SegmentParser};
pub use settings_validator::{SettingRule, SettingsValidator, Trigger};
pub use suspects::SuspectMatcher;
