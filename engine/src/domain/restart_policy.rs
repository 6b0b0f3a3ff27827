//! RestartPolicy value object
//! Defines when an exited process should be automatically respawned

use std::fmt;

/// Policy for automatically restarting processes after a spontaneous exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RestartPolicy {
    /// Never restart after a steady-state exit.
    #[default]
    Never,

    /// Restart on any disallowed exit code once startup has succeeded.
    Always,

    /// Restart on a disallowed exit code or on any exit that occurs
    /// before the configured minimum uptime.
    Unexpected,
}

impl RestartPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "never" | "no" => Some(RestartPolicy::Never),
            "always" => Some(RestartPolicy::Always),
            "unexpected" => Some(RestartPolicy::Unexpected),
            _ => None,
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartPolicy::Never => write!(f, "never"),
            RestartPolicy::Always => write!(f, "always"),
            RestartPolicy::Unexpected => write!(f, "unexpected"),
        }
    }
}

/// Decide whether a spontaneous exit warrants a respawn.
///
/// `exit_allowed` is whether the exit code is in the program's allowed
/// set; `within_start_window` is whether the process died before its
/// configured minimum uptime.
///
/// A disallowed exit inside the start window is a startup failure and
/// always wants a respawn, whatever the policy says; the retry budget is
/// enforced by the caller, not here.
pub fn respawn_wanted(
    policy: RestartPolicy,
    exit_allowed: bool,
    within_start_window: bool,
) -> bool {
    if !exit_allowed && within_start_window {
        return true;
    }
    match policy {
        RestartPolicy::Never => false,
        RestartPolicy::Always => !exit_allowed,
        RestartPolicy::Unexpected => !exit_allowed || within_start_window,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_failure_overrides_policy() {
        // disallowed + young: respawn wanted regardless of policy
        for policy in [
            RestartPolicy::Never,
            RestartPolicy::Always,
            RestartPolicy::Unexpected,
        ] {
            assert!(respawn_wanted(policy, false, true), "policy {policy}");
        }
    }

    #[test]
    fn test_never_steady_state() {
        assert!(!respawn_wanted(RestartPolicy::Never, true, false));
        assert!(!respawn_wanted(RestartPolicy::Never, false, false));
        assert!(!respawn_wanted(RestartPolicy::Never, true, true));
    }

    #[test]
    fn test_always_restarts_only_on_disallowed_codes() {
        assert!(respawn_wanted(RestartPolicy::Always, false, false));
        // allowed exit: no restart, even under `always`
        assert!(!respawn_wanted(RestartPolicy::Always, true, false));
        assert!(!respawn_wanted(RestartPolicy::Always, true, true));
    }

    #[test]
    fn test_unexpected_restarts_on_young_allowed_exit() {
        assert!(respawn_wanted(RestartPolicy::Unexpected, false, false));
        assert!(respawn_wanted(RestartPolicy::Unexpected, true, true));
        assert!(!respawn_wanted(RestartPolicy::Unexpected, true, false));
    }

    #[test]
    fn test_parse() {
        assert_eq!(RestartPolicy::parse("never"), Some(RestartPolicy::Never));
        assert_eq!(RestartPolicy::parse("no"), Some(RestartPolicy::Never));
        assert_eq!(RestartPolicy::parse("always"), Some(RestartPolicy::Always));
        assert_eq!(
            RestartPolicy::parse("unexpected"),
            Some(RestartPolicy::Unexpected)
        );
        assert_eq!(RestartPolicy::parse("UNEXPECTED"), Some(RestartPolicy::Unexpected));
        assert_eq!(RestartPolicy::parse("on-failure"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(RestartPolicy::Never.to_string(), "never");
        assert_eq!(RestartPolicy::Always.to_string(), "always");
        assert_eq!(RestartPolicy::Unexpected.to_string(), "unexpected");
    }

    #[test]
    fn test_default() {
        assert_eq!(RestartPolicy::default(), RestartPolicy::Never);
    }
}
