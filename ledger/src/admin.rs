use funnel_types::AdminCheck;

/// Process-wide settings injected at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FunnelConfig {
    /// Secret gating admin operations. `None` disables them entirely.
    pub admin_password: Option<String>,
    /// Partner registration link handed to clients.
    pub affiliate_link: Option<String>,
}

impl FunnelConfig {
    /// Builds a config, treating blank values as absent.
    pub fn new(admin_password: Option<String>, affiliate_link: Option<String>) -> Self {
        Self {
            // The password is compared verbatim; the link is trimmed.
            admin_password: admin_password.filter(|value| !value.trim().is_empty()),
            affiliate_link: affiliate_link
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        }
    }

    pub fn check_admin(&self, supplied: Option<&str>) -> AdminCheck {
        check_admin(self.admin_password.as_deref(), supplied)
    }

    pub fn affiliate_link(&self) -> Option<&str> {
        self.affiliate_link.as_deref()
    }
}

/// Plain equality against the configured secret; fails closed when unset.
pub fn check_admin(configured: Option<&str>, supplied: Option<&str>) -> AdminCheck {
    match configured {
        None | Some("") => AdminCheck::NotConfigured,
        Some(secret) if supplied == Some(secret) => AdminCheck::Accepted,
        Some(_) => AdminCheck::Rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_admin() {
        assert_eq!(check_admin(None, Some("anything")), AdminCheck::NotConfigured);
        assert_eq!(check_admin(None, None), AdminCheck::NotConfigured);
        assert_eq!(check_admin(Some(""), Some("")), AdminCheck::NotConfigured);
        assert_eq!(check_admin(Some("hunter2"), Some("hunter2")), AdminCheck::Accepted);
        assert_eq!(check_admin(Some("hunter2"), Some("Hunter2")), AdminCheck::Rejected);
        assert_eq!(check_admin(Some("hunter2"), None), AdminCheck::Rejected);
    }

    #[test]
    fn test_config_normalizes_blank_values() {
        let config = FunnelConfig::new(Some("   ".into()), Some("  https://partner.example/r?id=1 ".into()));
        assert_eq!(config.admin_password, None);
        assert_eq!(config.affiliate_link(), Some("https://partner.example/r?id=1"));
        assert_eq!(config.check_admin(Some("   ")), AdminCheck::NotConfigured);

        let config = FunnelConfig::new(Some(" secret ".into()), Some("".into()));
        assert_eq!(config.affiliate_link(), None);
        assert_eq!(config.check_admin(Some(" secret ")), AdminCheck::Accepted);
    }
}
