//! Sensor permission status.
//!
//! The platform prompt lives behind [`PermissionRequester`]; the last known
//! outcome is remembered in an injected [`PermissionCache`] so that a denial
//! can be reported as "previously denied" before prompting again.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CoreError;

/// Authorization state of a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthorizationStatus {
    /// Never asked.
    NotDetermined,
    Authorized,
    /// Denied by the platform on the latest request.
    Denied,
    /// Denied on an earlier request and remembered in the cache.
    PreviouslyDenied,
}

impl AuthorizationStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized)
    }
}

/// Kinds of permission an async action may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionType {
    Motion,
    Location,
    Camera,
    Microphone,
}

impl PermissionType {
    /// Key under which the outcome is cached.
    pub fn cache_key(&self) -> &'static str {
        match self {
            Self::Motion => "permission.motion",
            Self::Location => "permission.location",
            Self::Camera => "permission.camera",
            Self::Microphone => "permission.microphone",
        }
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Motion => "motion",
            Self::Location => "location",
            Self::Camera => "camera",
            Self::Microphone => "microphone",
        };
        f.write_str(name)
    }
}

/// Storage for the last authorization outcome per permission.
pub trait PermissionCache: Send + Sync {
    fn get(&self, key: &str) -> Option<bool>;
    fn set(&self, key: &str, authorized: bool);
}

/// Process-local cache, mainly for tests and the CLI.
#[derive(Debug, Default)]
pub struct InMemoryPermissionCache {
    entries: Mutex<HashMap<String, bool>>,
}

impl InMemoryPermissionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PermissionCache for InMemoryPermissionCache {
    fn get(&self, key: &str) -> Option<bool> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).copied())
    }

    fn set(&self, key: &str, authorized: bool) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), authorized);
        }
    }
}

/// Platform adapter that shows the permission prompt.
#[async_trait]
pub trait PermissionRequester: Send + Sync {
    /// Ask for `permission`; resolves to `true` when granted.
    async fn request(&self, permission: PermissionType) -> Result<bool, CoreError>;
}

/// Authorization for one permission backed by a cache and a requester.
#[derive(Clone)]
pub struct CachedAuthorization {
    permission: PermissionType,
    cache: Arc<dyn PermissionCache>,
    requester: Arc<dyn PermissionRequester>,
}

impl CachedAuthorization {
    pub fn new(
        permission: PermissionType,
        cache: Arc<dyn PermissionCache>,
        requester: Arc<dyn PermissionRequester>,
    ) -> Self {
        Self {
            permission,
            cache,
            requester,
        }
    }

    pub fn permission(&self) -> PermissionType {
        self.permission
    }

    /// Status as known from the cache, without prompting.
    pub fn status(&self) -> AuthorizationStatus {
        match self.cache.get(self.permission.cache_key()) {
            Some(true) => AuthorizationStatus::Authorized,
            Some(false) => AuthorizationStatus::PreviouslyDenied,
            None => AuthorizationStatus::NotDetermined,
        }
    }

    /// Prompt through the requester and remember the outcome.
    pub async fn request(&self) -> Result<AuthorizationStatus, CoreError> {
        debug!(permission = %self.permission, "Requesting authorization");
        let granted = self.requester.request(self.permission).await?;
        self.cache.set(self.permission.cache_key(), granted);

        let status = if granted {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::Denied
        };
        info!(permission = %self.permission, status = ?status, "Authorization resolved");
        Ok(status)
    }
}

impl fmt::Debug for CachedAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedAuthorization")
            .field("permission", &self.permission)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedRequester {
        grant: bool,
        calls: AtomicUsize,
    }

    impl FixedRequester {
        fn new(grant: bool) -> Arc<Self> {
            Arc::new(Self {
                grant,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PermissionRequester for FixedRequester {
        async fn request(&self, _permission: PermissionType) -> Result<bool, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.grant)
        }
    }

    struct FailingRequester;

    #[async_trait]
    impl PermissionRequester for FailingRequester {
        async fn request(&self, permission: PermissionType) -> Result<bool, CoreError> {
            Err(CoreError::Permission(format!("{permission} unavailable")))
        }
    }

    #[test]
    fn test_status_from_cache() {
        let cache = Arc::new(InMemoryPermissionCache::new());
        let auth = CachedAuthorization::new(PermissionType::Motion, cache.clone(), FixedRequester::new(true));
        assert_eq!(auth.status(), AuthorizationStatus::NotDetermined);

        cache.set("permission.motion", true);
        assert_eq!(auth.status(), AuthorizationStatus::Authorized);

        cache.set("permission.motion", false);
        assert_eq!(auth.status(), AuthorizationStatus::PreviouslyDenied);
    }

    #[tokio::test]
    async fn test_request_granted_is_cached() {
        let cache = Arc::new(InMemoryPermissionCache::new());
        let requester = FixedRequester::new(true);
        let auth = CachedAuthorization::new(PermissionType::Motion, cache.clone(), requester.clone());

        assert_eq!(auth.request().await.unwrap(), AuthorizationStatus::Authorized);
        assert_eq!(auth.status(), AuthorizationStatus::Authorized);
        assert_eq!(cache.get("permission.motion"), Some(true));
        assert_eq!(requester.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_request_denied_then_previously_denied() {
        let cache = Arc::new(InMemoryPermissionCache::new());
        let auth = CachedAuthorization::new(PermissionType::Camera, cache, FixedRequester::new(false));

        assert_eq!(auth.request().await.unwrap(), AuthorizationStatus::Denied);
        assert_eq!(auth.status(), AuthorizationStatus::PreviouslyDenied);
        assert!(!auth.status().is_authorized());
    }

    #[tokio::test]
    async fn test_request_error_leaves_cache_untouched() {
        let cache = Arc::new(InMemoryPermissionCache::new());
        let auth = CachedAuthorization::new(PermissionType::Location, cache.clone(), Arc::new(FailingRequester));

        let err = auth.request().await.unwrap_err();
        assert!(matches!(err, CoreError::Permission(_)));
        assert_eq!(cache.get("permission.location"), None);
        assert_eq!(auth.status(), AuthorizationStatus::NotDetermined);
    }

    #[test]
    fn test_caches_are_independent() {
        let first = InMemoryPermissionCache::new();
        let second = InMemoryPermissionCache::new();
        first.set("permission.motion", true);
        assert_eq!(second.get("permission.motion"), None);
    }
}
