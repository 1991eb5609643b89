// ABOUTME: Chooses between reinstalling and updating an application in place.
// ABOUTME: The plan depends on the configured mode and whether the app already exists.

use serde::Deserialize;

/// How an already-installed application is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    /// Uninstall first, then install fresh.
    Reinstall,
    /// Redeploy over the existing instance; install if absent.
    #[default]
    Update,
}

/// Concrete steps for the install phase of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPlan {
    /// Uninstall the existing application, then install.
    Reinstall,
    /// Nothing installed yet: plain install.
    FreshInstall,
    /// Redeploy over the existing application.
    Redeploy,
}

impl InstallPlan {
    pub fn for_mode(mode: OperationMode, installed: bool) -> Self {
        match (mode, installed) {
            (_, false) => InstallPlan::FreshInstall,
            (OperationMode::Reinstall, true) => InstallPlan::Reinstall,
            (OperationMode::Update, true) => InstallPlan::Redeploy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_installed_is_always_fresh_install() {
        assert_eq!(
            InstallPlan::for_mode(OperationMode::Reinstall, false),
            InstallPlan::FreshInstall
        );
        assert_eq!(
            InstallPlan::for_mode(OperationMode::Update, false),
            InstallPlan::FreshInstall
        );
    }

    #[test]
    fn installed_app_follows_mode() {
        assert_eq!(
            InstallPlan::for_mode(OperationMode::Reinstall, true),
            InstallPlan::Reinstall
        );
        assert_eq!(
            InstallPlan::for_mode(OperationMode::Update, true),
            InstallPlan::Redeploy
        );
    }

    #[test]
    fn update_is_the_default_mode() {
        assert_eq!(OperationMode::default(), OperationMode::Update);
    }
}
