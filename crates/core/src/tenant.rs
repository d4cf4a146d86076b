use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::WorkflowError;

const MAX_IDENTIFIER_LEN: usize = 64;

/// Validated tenant identifier.
///
/// Construction goes through [`TenantId::parse`] only, so a malformed value
/// (empty string, stray whitespace, characters a query layer could read as
/// wildcards) is rejected before any SQL is built with it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn parse(raw: &str) -> Result<Self, WorkflowError> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(WorkflowError::validation("tenant identifier must not be empty"));
        }
        if normalized.len() > MAX_IDENTIFIER_LEN {
            return Err(WorkflowError::validation(format!(
                "tenant identifier exceeds {MAX_IDENTIFIER_LEN} characters"
            )));
        }
        let valid = normalized
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-');
        if !valid {
            return Err(WorkflowError::validation(
                "tenant identifier may only contain lowercase letters, digits, and `-`",
            ));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves a raw tenant reference (as handed over by the upstream identity
/// collaborator) to a known tenant. Implementations look the tenant up in
/// their own source of truth; an unknown tenant is indistinguishable from a
/// missing resource.
#[async_trait]
pub trait TenantResolver: Send + Sync {
    async fn resolve(&self, raw: &str) -> Result<TenantId, WorkflowError>;
}

/// Cache bounds for [`CachingTenantResolver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolverCacheSettings {
    pub ttl: Duration,
    pub capacity: usize,
}

impl Default for ResolverCacheSettings {
    fn default() -> Self {
        Self { ttl: Duration::from_secs(300), capacity: 1024 }
    }
}

/// TTL-bounded memoization over another resolver.
///
/// Only successful resolutions are cached; failures always consult the
/// inner resolver again. The cache is owned by whoever constructs the
/// resolver and injected where needed, never process-global.
pub struct CachingTenantResolver<R> {
    inner: R,
    settings: ResolverCacheSettings,
    entries: Mutex<HashMap<String, Instant>>,
}

impl<R> CachingTenantResolver<R> {
    pub fn new(inner: R, settings: ResolverCacheSettings) -> Self {
        Self { inner, settings, entries: Mutex::new(HashMap::new()) }
    }

    fn cache_hit(&self, key: &str) -> bool {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        match entries.get(key) {
            Some(inserted_at) if inserted_at.elapsed() < self.settings.ttl => true,
            Some(_) => {
                entries.remove(key);
                false
            }
            None => false,
        }
    }

    fn remember(&self, key: String) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.len() >= self.settings.capacity && !entries.contains_key(&key) {
            entries.retain(|_, inserted_at| inserted_at.elapsed() < self.settings.ttl);
            if entries.len() >= self.settings.capacity {
                // Still full after dropping expired entries: evict the oldest.
                if let Some(oldest) =
                    entries.iter().min_by_key(|(_, at)| **at).map(|(key, _)| key.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(key, Instant::now());
    }
}

#[async_trait]
impl<R> TenantResolver for CachingTenantResolver<R>
where
    R: TenantResolver,
{
    async fn resolve(&self, raw: &str) -> Result<TenantId, WorkflowError> {
        let tenant = TenantId::parse(raw)?;
        if self.cache_hit(tenant.as_str()) {
            return Ok(tenant);
        }
        let resolved = self.inner.resolve(tenant.as_str()).await?;
        self.remember(resolved.as_str().to_string());
        Ok(resolved)
    }
}

/// Fixed-set resolver for tests and single-node tooling.
#[derive(Clone, Debug, Default)]
pub struct StaticTenantResolver {
    known: Vec<String>,
}

impl StaticTenantResolver {
    pub fn new<I, S>(tenants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { known: tenants.into_iter().map(Into::into).collect() }
    }
}

#[async_trait]
impl TenantResolver for StaticTenantResolver {
    async fn resolve(&self, raw: &str) -> Result<TenantId, WorkflowError> {
        let tenant = TenantId::parse(raw)?;
        if self.known.iter().any(|known| known == tenant.as_str()) {
            Ok(tenant)
        } else {
            Err(WorkflowError::NotFound { resource: "tenant" })
        }
    }
}
