use crate::models::{GameInfo, PluginLimits};
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?(?:\.\d+)?").expect("static version regex")
});

/// Crash generator release where the limit marker stopped being a false
/// positive on the new-generation game build.
pub const LIMIT_MARKER_FIXED_IN: Version = Version::new(1, 37, 0);

/// Pull the first dotted version out of free text.
///
/// `"Buffout 4 v1.28.6"` and `"Fallout 4 v1.10.163.0"` both parse; a missing
/// patch component is treated as zero and a fourth component is dropped.
pub fn parse_version(text: &str) -> Option<Version> {
    let captures = VERSION_PATTERN.captures(text)?;
    let part = |index: usize| -> Option<u64> {
        captures
            .get(index)
            .map_or(Some(0), |m| m.as_str().parse().ok())
    };
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}

/// Game and tool identity, passed explicitly to every stage that needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameContext {
    pub game: String,
    pub root_name: String,
    pub vr: bool,
    pub crashgen_name: String,
    pub xse_acronym: String,
    pub latest_crashgen: String,
    pub latest_crashgen_vr: String,
    /// First version of the new-generation game build
    pub game_version_new: String,
    pub limits: PluginLimits,
}

impl GameContext {
    pub fn new(info: &GameInfo, vr: bool, limits: PluginLimits) -> Self {
        Self {
            game: if vr {
                format!("{}VR", info.name)
            } else {
                info.name.clone()
            },
            root_name: info.root_name.clone(),
            vr,
            crashgen_name: info.crashgen_name.clone(),
            xse_acronym: info.xse_acronym.clone(),
            latest_crashgen: info.crashgen_latest.clone(),
            latest_crashgen_vr: info.crashgen_latest_vr.clone(),
            game_version_new: info.game_version_new.clone(),
            limits,
        }
    }

    /// Game is the new-generation build and the crash generator predates
    /// the limit-marker fix.
    pub fn limit_marker_unreliable(&self, game_version: &str, crashgen_version: &str) -> bool {
        let (Some(game), Some(new_gen)) =
            (parse_version(game_version), parse_version(&self.game_version_new))
        else {
            return false;
        };
        let Some(crashgen) = parse_version(crashgen_version) else {
            return false;
        };
        game >= new_gen && crashgen < LIMIT_MARKER_FIXED_IN
    }
}
