//! Subscriber installation for host applications

use std::sync::OnceLock;

use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Output profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable lines, debug and up
    Development,
    /// One JSON object per line, info and up
    Production,
    /// Silent registry; pair with `init_test_capture()` for assertions
    Test,
}

impl Profile {
    /// Filter applied when `RUST_LOG` is unset
    pub fn default_directive(self) -> &'static str {
        match self {
            Profile::Development => "embedx_core=debug",
            Profile::Production => "embedx_core=info",
            Profile::Test => "off",
        }
    }

    fn filter(self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.default_directive()))
    }
}

static ACTIVE: OnceLock<Profile> = OnceLock::new();

/// Install the global subscriber for `profile`
///
/// Only the first call in a process does anything; it returns the profile
/// chosen by that first call. A subscriber the host installed earlier is
/// kept, and the facility's own one is then skipped.
///
/// ```
/// use embedx_core::logging_facility::{init, Profile};
///
/// assert_eq!(init(Profile::Production), Profile::Production);
/// assert_eq!(init(Profile::Development), Profile::Production);
/// ```
pub fn init(profile: Profile) -> Profile {
    *ACTIVE.get_or_init(|| {
        let installed = match profile {
            Profile::Development => tracing_subscriber::fmt()
                .with_env_filter(profile.filter())
                .try_init()
                .is_ok(),
            Profile::Production => tracing_subscriber::fmt()
                .json()
                .with_env_filter(profile.filter())
                .try_init()
                .is_ok(),
            Profile::Test => tracing_subscriber::registry().try_init().is_ok(),
        };
        if !installed {
            tracing::debug!(?profile, "global subscriber already set, keeping it");
        }
        profile
    })
}
