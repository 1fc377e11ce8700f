use serde::Deserialize;

use crate::auth::handler::SessionProbe;
use crate::config::handler::HandlerConfig;
use crate::config::settings::SettingsConfig;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    /// no handler means every request reports "no handler configured"
    pub handler: Option<HandlerConfig>,
    #[serde(default)]
    pub session: SessionConfig,
}

/// ================================
/// Signed-in identity
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    pub user_id: Option<String>,
    pub email: Option<String>,
}

impl SessionProbe for SessionConfig {
    fn is_authenticated(&self) -> bool {
        self.user_id.is_some() || self.email.is_some()
    }
}
