use crux_core::capability::{CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const MAX_VALUE_LENGTH: usize = 4096;

/// Named view preferences kept by the shell between sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PreferenceKey {
    MapTypeId,
    MapZoom,
}

impl PreferenceKey {
    pub const ALL: [PreferenceKey; 2] = [PreferenceKey::MapTypeId, PreferenceKey::MapZoom];

    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceKey::MapTypeId => "mapTypeId",
            PreferenceKey::MapZoom => "mapZoom",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PreferenceOperation {
    Get {
        key: PreferenceKey,
    },
    Set {
        key: PreferenceKey,
        value: String,
        expires_in_days: u32,
    },
}

impl PreferenceOperation {
    pub fn get(key: PreferenceKey) -> Self {
        Self::Get { key }
    }

    pub fn set(
        key: PreferenceKey,
        value: impl Into<String>,
        expires_in_days: u32,
    ) -> Result<Self, KvError> {
        let value = value.into();
        Self::validate_value(key, &value)?;
        Ok(Self::Set {
            key,
            value,
            expires_in_days,
        })
    }

    /// Values end up in cookie-like storage, so separators are rejected.
    fn validate_value(key: PreferenceKey, value: &str) -> Result<(), KvError> {
        if value.is_empty() {
            return Err(KvError::InvalidValue {
                key,
                reason: "value cannot be empty".to_string(),
            });
        }

        if value.len() > MAX_VALUE_LENGTH {
            return Err(KvError::InvalidValue {
                key,
                reason: format!("value exceeds maximum length of {} bytes", MAX_VALUE_LENGTH),
            });
        }

        if let Some(c) = value
            .chars()
            .find(|c| c.is_control() || matches!(c, ';' | ',' | '='))
        {
            return Err(KvError::InvalidValue {
                key,
                reason: format!("value contains reserved character {:?}", c),
            });
        }

        Ok(())
    }
}

impl Operation for PreferenceOperation {
    type Output = KvResult;
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum KvError {
    #[error("invalid value for '{}': {reason}", .key.as_str())]
    InvalidValue { key: PreferenceKey, reason: String },

    #[error("storage error: {message}")]
    Storage { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum KvOutput {
    Value(Option<String>),
    Written,
}

pub type KvResult = Result<KvOutput, KvError>;

/// Cookie-like preference store with per-entry expiry.
#[derive(crux_core::macros::Capability)]
pub struct Preferences<Ev> {
    context: CapabilityContext<PreferenceOperation, Ev>,
}

impl<Ev> Preferences<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<PreferenceOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn get<F>(&self, key: PreferenceKey, callback: F)
    where
        F: FnOnce(KvResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx
                .request_from_shell(PreferenceOperation::get(key))
                .await;
            ctx.update_app(callback(result));
        });
    }

    /// Writes are fire-and-forget; invalid values are logged and dropped.
    pub fn set(&self, key: PreferenceKey, value: impl Into<String>, expires_in_days: u32) {
        let operation = match PreferenceOperation::set(key, value, expires_in_days) {
            Ok(operation) => operation,
            Err(e) => {
                warn!(error = %e, "preference not persisted");
                return;
            }
        };
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(operation).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_key_names() {
        assert_eq!(PreferenceKey::MapTypeId.as_str(), "mapTypeId");
        assert_eq!(PreferenceKey::MapZoom.as_str(), "mapZoom");
    }

    #[test]
    fn test_value_validation_empty() {
        let result = PreferenceOperation::set(PreferenceKey::MapZoom, "", 10);
        assert_matches!(result, Err(KvError::InvalidValue { .. }));
    }

    #[test]
    fn test_value_validation_separators() {
        assert!(PreferenceOperation::set(PreferenceKey::MapTypeId, "a;b", 10).is_err());
        assert!(PreferenceOperation::set(PreferenceKey::MapTypeId, "a=b", 10).is_err());
        assert!(PreferenceOperation::set(PreferenceKey::MapTypeId, "a\nb", 10).is_err());
    }

    #[test]
    fn test_value_validation_too_long() {
        let long = "a".repeat(MAX_VALUE_LENGTH + 1);
        assert!(PreferenceOperation::set(PreferenceKey::MapTypeId, long, 10).is_err());
    }

    #[test]
    fn test_set_carries_expiry() {
        let op = PreferenceOperation::set(PreferenceKey::MapZoom, "18", 3650).unwrap();
        assert_eq!(
            op,
            PreferenceOperation::Set {
                key: PreferenceKey::MapZoom,
                value: "18".to_string(),
                expires_in_days: 3650,
            }
        );
    }

    #[test]
    fn test_error_message_names_key() {
        let err = PreferenceOperation::set(PreferenceKey::MapZoom, "", 1).unwrap_err();
        assert!(err.to_string().contains("mapZoom"));
    }
}
