//! Compatibility gate.
//!
//! Validates a plug-in's declared versions against the host before the
//! plug-in is granted any capability.

use serde::{Deserialize, Serialize};

use super::descriptor::{PluginMetadata, PluginStatus};
use super::host::HostVersions;

/// How to treat plug-ins that pin a host version when the running host
/// version cannot be determined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownHostVersionPolicy {
    /// Record a warning and keep the plug-in eligible.
    #[default]
    Warn,
    /// Record a warning and mark the plug-in incompatible.
    Reject,
}

/// Outcome of the gate for one plug-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: PluginStatus,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl Verdict {
    /// Whether the plug-in may proceed to initialization.
    pub fn is_eligible(&self) -> bool {
        self.status == PluginStatus::Loaded
    }
}

/// Whether a required host version opts out of the host check.
pub fn is_wildcard(version: &str) -> bool {
    version == "*" || version.eq_ignore_ascii_case("any")
}

/// Whether a host runtime version is unknown.
pub fn is_unknown(version: &str) -> bool {
    let version = version.trim();
    version.is_empty() || version.eq_ignore_ascii_case(super::host::UNKNOWN_VERSION)
}

/// Evaluate declared metadata against the host versions.
///
/// The API rule and the host rule are both evaluated and recorded. A
/// `Failed` status from a missing API version is never relaxed to
/// `Incompatible`.
pub fn evaluate(
    metadata: &PluginMetadata,
    host: &HostVersions,
    policy: UnknownHostVersionPolicy,
) -> Verdict {
    let mut status = PluginStatus::Loaded;
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    let target_api = metadata.target_api_version.trim();
    if target_api.is_empty() {
        status = PluginStatus::Failed;
        errors.push("Plug-in has no target API version declared.".to_string());
    } else if target_api != host.api_version() {
        status = PluginStatus::Incompatible;
        warnings.push(format!(
            "Plug-in targets API {} but host expects {}.",
            target_api,
            host.api_version()
        ));
    }

    let required = metadata.required_host_version.trim();
    if !required.is_empty() && !is_wildcard(required) {
        let running = host.runtime_version();
        if is_unknown(running) {
            warnings.push("Running host version is unknown; cannot verify compatibility.".to_string());
            if policy == UnknownHostVersionPolicy::Reject {
                status = downgrade(status);
            }
        } else if required != running {
            status = downgrade(status);
            warnings.push(format!(
                "Requires host version {} but running {}.",
                required, running
            ));
        }
    }

    Verdict {
        status,
        warnings,
        errors,
    }
}

fn downgrade(status: PluginStatus) -> PluginStatus {
    match status {
        PluginStatus::Failed => PluginStatus::Failed,
        _ => PluginStatus::Incompatible,
    }
}
