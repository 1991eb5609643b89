// ABOUTME: Snapshot and restore of process-wide TLS settings around a secured session.
// ABOUTME: Client libraries install trust and key stores globally; this puts them back.

use std::ffi::OsString;

/// Environment keys that secured connects may overwrite.
pub const PROCESS_SECURITY_VARS: &[&str] = &[
    "SSL_CERT_FILE",
    "SSL_CERT_DIR",
    "SSL_CLIENT_CERT",
    "SSL_CLIENT_KEY",
];

/// Holds the prior values of the security keys and restores them on
/// [`restore`](Self::restore) or drop, whichever comes first.
#[must_use = "dropping the scope restores the settings immediately"]
#[derive(Debug)]
pub struct SecurityScope {
    saved: Vec<(&'static str, Option<OsString>)>,
    restored: bool,
}

impl SecurityScope {
    pub fn capture() -> Self {
        Self::capture_vars(PROCESS_SECURITY_VARS)
    }

    pub fn capture_vars(vars: &[&'static str]) -> Self {
        let saved = vars.iter().map(|k| (*k, std::env::var_os(k))).collect();
        Self {
            saved,
            restored: false,
        }
    }

    pub fn restore(mut self) {
        self.restore_now();
    }

    fn restore_now(&mut self) {
        if self.restored {
            return;
        }
        for (key, value) in &self.saved {
            match value {
                // SAFETY: the scope is opened and closed by the single task
                // that owns the connection; no other code writes these keys.
                Some(v) => unsafe { std::env::set_var(key, v) },
                // SAFETY: as above.
                None => unsafe { std::env::remove_var(key) },
            }
        }
        self.restored = true;
        tracing::debug!("restored process security settings");
    }
}

impl Drop for SecurityScope {
    fn drop(&mut self) {
        self.restore_now();
    }
}
