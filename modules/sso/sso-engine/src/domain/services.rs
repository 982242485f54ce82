//! Registered services and attribute release.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sso_engine_sdk::{Attributes, surrogate_attributes};

use crate::config::RegisteredServiceConfig;
use crate::domain::error::DomainError;

/// Which attributes of a principal are released.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeReleaseConfig {
    #[default]
    ReturnAll,
    ReturnNone,
    /// Only the listed attributes.
    ReturnAllowed { allowed: Vec<String> },
    /// Everything except the listed attributes.
    ReturnAllExcept { denied: Vec<String> },
}

impl AttributeReleaseConfig {
    #[must_use]
    pub fn apply(&self, attributes: &Attributes) -> Attributes {
        let mut released = attributes.clone();
        match self {
            Self::ReturnAll => {}
            Self::ReturnNone => released.retain(|_| false),
            Self::ReturnAllowed { allowed } => {
                released.retain(|name| allowed.iter().any(|a| a == name));
            }
            Self::ReturnAllExcept { denied } => {
                released.retain(|name| !denied.iter().any(|d| d == name));
            }
        }
        released
    }
}

#[derive(Debug, Clone)]
pub struct RegisteredService {
    pub id: u64,
    pub name: String,
    pub attribute_release: AttributeReleaseConfig,
    pattern: Regex,
}

impl RegisteredService {
    /// Whole-string match of the service URL.
    #[must_use]
    pub fn matches(&self, service: &str) -> bool {
        self.pattern.is_match(service)
    }
}

/// Registered services in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: Vec<RegisteredService>,
}

impl ServiceRegistry {
    pub fn from_config(configs: &[RegisteredServiceConfig]) -> Result<Self, DomainError> {
        let mut services = Vec::with_capacity(configs.len());
        for cfg in configs {
            if services.iter().any(|s: &RegisteredService| s.id == cfg.id) {
                return Err(DomainError::validation(format!(
                    "duplicate registered service id {}",
                    cfg.id
                )));
            }
            let pattern = Regex::new(&format!("^(?:{})$", cfg.service_id)).map_err(|e| {
                DomainError::validation(format!(
                    "invalid serviceId pattern for service {}: {e}",
                    cfg.id
                ))
            })?;
            services.push(RegisteredService {
                id: cfg.id,
                name: cfg.name.clone(),
                attribute_release: cfg.attribute_release.clone(),
                pattern,
            });
        }
        services.sort_by_key(|s| s.id);
        Ok(Self { services })
    }

    /// First registered service matching the URL.
    #[must_use]
    pub fn find(&self, service: &str) -> Option<&RegisteredService> {
        self.services.iter().find(|s| s.matches(service))
    }

    #[must_use]
    pub fn is_registered(&self, service: &str) -> bool {
        self.find(service).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Attributes released to a service. Unregistered services get
    /// everything. Surrogate attributes are never filtered out.
    #[must_use]
    pub fn release_attributes(&self, service: &str, attributes: &Attributes) -> Attributes {
        let Some(registered) = self.find(service) else {
            return attributes.clone();
        };
        let mut released = registered.attribute_release.apply(attributes);
        for name in surrogate_attributes::ALL {
            if let Some(values) = attributes.get(name) {
                released.insert(name, values.clone());
            }
        }
        released
    }
}
