//! Profile → backend routing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use sandcell_core::{
    Backend, BackendKind, Error, ExecuteRequest, ExecuteResult, Result, Runtime, SecurityProfile,
};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a [`RuntimeRouter`].
#[derive(Default)]
pub struct RouterConfig {
    /// Backend per security profile.
    pub backends: HashMap<SecurityProfile, Arc<dyn Backend>>,
    /// Profiles that must never reach the unsafe backend.
    ///
    /// When a listed profile resolves to a backend of kind
    /// [`BackendKind::UnsafeHost`], execution is denied.
    pub deny_unsafe_profiles: Vec<SecurityProfile>,
    /// Profile applied when the request carries none.
    pub default_profile: Option<SecurityProfile>,
}

// =============================================================================
// Runtime Router
// =============================================================================

/// The default [`Runtime`]: routes requests to backends by security profile.
///
/// Safe for concurrent use; backends may be registered and unregistered at
/// runtime.
pub struct RuntimeRouter {
    backends: DashMap<SecurityProfile, Arc<dyn Backend>>,
    deny_unsafe: HashSet<SecurityProfile>,
    default_profile: Option<SecurityProfile>,
}

impl RuntimeRouter {
    /// Create a router with the given configuration.
    pub fn new(cfg: RouterConfig) -> Self {
        Self {
            backends: cfg.backends.into_iter().collect(),
            deny_unsafe: cfg.deny_unsafe_profiles.into_iter().collect(),
            default_profile: cfg.default_profile,
        }
    }

    /// Register a backend for a security profile.
    pub fn register_backend(&self, profile: SecurityProfile, backend: Arc<dyn Backend>) {
        self.backends.insert(profile, backend);
    }

    /// Remove the backend for a security profile.
    pub fn unregister_backend(&self, profile: SecurityProfile) {
        self.backends.remove(&profile);
    }
}

#[async_trait]
impl Runtime for RuntimeRouter {
    async fn execute(
        &self,
        cancel: &CancellationToken,
        mut req: ExecuteRequest,
    ) -> Result<ExecuteResult> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }

        req.validate()?;

        let profile = match req.profile.or(self.default_profile) {
            Some(profile) => profile,
            None => {
                return Err(Error::runtime_unavailable(
                    "no profile requested and no default profile configured",
                ))
            }
        };

        let backend = match self.backends.get(&profile) {
            Some(entry) => Arc::clone(entry.value()),
            None => {
                return Err(
                    Error::runtime_unavailable(format!("no backend for profile {profile:?}"))
                        .with_op("execute"),
                )
            }
        };

        if backend.kind() == BackendKind::UnsafeHost && self.deny_unsafe.contains(&profile) {
            return Err(Error::backend_denied(format!(
                "unsafe backend denied for profile {profile:?}"
            ))
            .with_backend(BackendKind::UnsafeHost));
        }

        tracing::info!(profile = %profile, backend = %backend.kind(), "executing snippet");

        // The backend sees the effective profile, not the request's empty one.
        req.profile = Some(profile);
        let gateway = req.gateway.clone();

        let mut result = match backend.execute(cancel, req).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(profile = %profile, error = %err, "execution failed");
                return Err(err);
            }
        };

        // If the backend did not populate tool calls but the gateway can
        // report a trace, harvest it.
        if result.tool_calls.is_empty() {
            if let Some(gateway) = &gateway {
                if let Some(tracer) = gateway.tracer() {
                    result.tool_calls = tracer.tool_calls();
                }
            }
        }

        tracing::info!(
            profile = %profile,
            duration_ms = result.duration.as_millis() as u64,
            tool_calls = result.tool_calls.len(),
            "execution completed"
        );

        Ok(result)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sandcell_core::mocks::{MockBackend, MockGateway};
    use sandcell_core::{ErrorKind, ToolCallRecord, ToolGateway};
    use serde_json::json;
    use std::time::Duration;

    fn request(profile: Option<SecurityProfile>, gateway: Arc<dyn ToolGateway>) -> ExecuteRequest {
        ExecuteRequest {
            code: "__out = 1".into(),
            profile,
            gateway: Some(gateway),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn routes_by_profile() {
        let dev = Arc::new(MockBackend::new(BackendKind::UnsafeHost).with_value(json!("dev")));
        let std_backend = Arc::new(MockBackend::new(BackendKind::Docker).with_value(json!("std")));

        let router = RuntimeRouter::new(RouterConfig {
            backends: HashMap::from([
                (SecurityProfile::Dev, dev as Arc<dyn Backend>),
                (SecurityProfile::Standard, std_backend as Arc<dyn Backend>),
            ]),
            ..Default::default()
        });
        let cancel = CancellationToken::new();

        let result = router
            .execute(
                &cancel,
                request(Some(SecurityProfile::Dev), Arc::new(MockGateway::new())),
            )
            .await
            .unwrap();
        assert_eq!(result.value, Some(json!("dev")));

        let result = router
            .execute(
                &cancel,
                request(
                    Some(SecurityProfile::Standard),
                    Arc::new(MockGateway::new()),
                ),
            )
            .await
            .unwrap();
        assert_eq!(result.value, Some(json!("std")));
    }

    #[tokio::test]
    async fn empty_profile_resolves_to_the_default() {
        let dev = Arc::new(MockBackend::new(BackendKind::UnsafeHost));
        let router = RuntimeRouter::new(RouterConfig {
            backends: HashMap::from([(SecurityProfile::Dev, dev.clone() as Arc<dyn Backend>)]),
            default_profile: Some(SecurityProfile::Dev),
            ..Default::default()
        });
        let cancel = CancellationToken::new();

        router
            .execute(&cancel, request(None, Arc::new(MockGateway::new())))
            .await
            .unwrap();

        assert_eq!(dev.last_profile(), Some(SecurityProfile::Dev));
    }

    #[tokio::test]
    async fn missing_backend_is_runtime_unavailable() {
        let router = RuntimeRouter::new(RouterConfig::default());
        let cancel = CancellationToken::new();

        let err = router
            .execute(
                &cancel,
                request(
                    Some(SecurityProfile::Hardened),
                    Arc::new(MockGateway::new()),
                ),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuntimeUnavailable);
        assert!(err.to_string().contains("Hardened"));
    }

    #[tokio::test]
    async fn denied_profile_cannot_reach_the_unsafe_backend() {
        let dev = Arc::new(MockBackend::new(BackendKind::UnsafeHost));
        let router = RuntimeRouter::new(RouterConfig {
            backends: HashMap::from([
                (SecurityProfile::Dev, dev.clone() as Arc<dyn Backend>),
                (SecurityProfile::Standard, dev.clone() as Arc<dyn Backend>),
            ]),
            deny_unsafe_profiles: vec![SecurityProfile::Standard, SecurityProfile::Hardened],
            ..Default::default()
        });
        let cancel = CancellationToken::new();

        let err = router
            .execute(
                &cancel,
                request(
                    Some(SecurityProfile::Standard),
                    Arc::new(MockGateway::new()),
                ),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendDenied);
        assert_eq!(dev.executions(), 0);

        // The same backend stays reachable through an allowed profile.
        router
            .execute(
                &cancel,
                request(Some(SecurityProfile::Dev), Arc::new(MockGateway::new())),
            )
            .await
            .unwrap();
        assert_eq!(dev.executions(), 1);
    }

    #[tokio::test]
    async fn denial_applies_only_to_unsafe_backends() {
        let docker = Arc::new(MockBackend::new(BackendKind::Docker));
        let router = RuntimeRouter::new(RouterConfig {
            backends: HashMap::from([(SecurityProfile::Standard, docker as Arc<dyn Backend>)]),
            deny_unsafe_profiles: vec![SecurityProfile::Standard],
            ..Default::default()
        });
        let cancel = CancellationToken::new();

        router
            .execute(
                &cancel,
                request(
                    Some(SecurityProfile::Standard),
                    Arc::new(MockGateway::new()),
                ),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn harvests_trace_from_the_gateway() {
        let backend = Arc::new(MockBackend::new(BackendKind::Docker));
        let router = RuntimeRouter::new(RouterConfig {
            backends: HashMap::from([(SecurityProfile::Standard, backend as Arc<dyn Backend>)]),
            ..Default::default()
        });
        let cancel = CancellationToken::new();

        let gateway = Arc::new(MockGateway::new());
        for tool_id in ["a", "b", "c"] {
            gateway.push_record(ToolCallRecord {
                tool_id: tool_id.into(),
                backend_kind: "mock".into(),
                duration: Duration::from_millis(2),
                error_op: None,
            });
        }

        let result = router
            .execute(
                &cancel,
                request(Some(SecurityProfile::Standard), gateway),
            )
            .await
            .unwrap();

        let ids: Vec<&str> = result.tool_calls.iter().map(|r| r.tool_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn register_and_unregister_at_runtime() {
        let router = RuntimeRouter::new(RouterConfig::default());
        let cancel = CancellationToken::new();

        router.register_backend(
            SecurityProfile::Dev,
            Arc::new(MockBackend::new(BackendKind::UnsafeHost)),
        );
        router
            .execute(
                &cancel,
                request(Some(SecurityProfile::Dev), Arc::new(MockGateway::new())),
            )
            .await
            .unwrap();

        router.unregister_backend(SecurityProfile::Dev);
        let err = router
            .execute(
                &cancel,
                request(Some(SecurityProfile::Dev), Arc::new(MockGateway::new())),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuntimeUnavailable);
    }

    #[tokio::test]
    async fn validation_failures_surface_unchanged() {
        let router = RuntimeRouter::new(RouterConfig::default());
        let cancel = CancellationToken::new();

        let err = router
            .execute(&cancel, ExecuteRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingGateway);
    }
}
