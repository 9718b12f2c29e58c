//! User-agent allow list.

use crate::admission::{AdmissionDecision, Rejection};
use crate::config::UserAgentConfig;

/// Admits user agents containing any configured substring.
///
/// An empty allow list admits everything.
#[derive(Debug, Clone, Default)]
pub struct UserAgentFilter {
    allowed: Vec<String>,
}

impl UserAgentFilter {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    pub fn from_config(config: &UserAgentConfig) -> Self {
        Self::new(config.allowed.clone())
    }

    pub fn check(&self, user_agent: &str) -> AdmissionDecision {
        if self.allowed.is_empty() || self.allowed.iter().any(|a| user_agent.contains(a.as_str())) {
            AdmissionDecision::Admit
        } else {
            Rejection::UserAgentNotAllowed.into()
        }
    }
}
