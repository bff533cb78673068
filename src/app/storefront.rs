use std::sync::Arc;
use tracing::debug;

use crate::app::list_cache::ListCache;
use crate::app::ports::ListingPort;
use crate::common::constants::{
    DEFAULT_CACHE_TTL_MINUTES, PRODUCTS_CACHE_KEY, SERVICES_CACHE_KEY,
};
use crate::common::error::{CatalogError, Result};
use crate::domain::{Entity, EntityKind};

/// What a public listing page renders: the items, or an unavailable notice.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    Ready(Arc<Vec<Entity>>),
    Unavailable(String),
}

impl Listing {
    pub fn items(&self) -> &[Entity] {
        match self {
            Listing::Ready(items) => items,
            Listing::Unavailable(_) => &[],
        }
    }
}

/// Public read side: cached listings and slug lookups.
pub struct Storefront {
    source: Arc<dyn ListingPort>,
    cache: ListCache<Arc<Vec<Entity>>>,
    ttl_minutes: i64,
}

pub fn cache_key(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Product => PRODUCTS_CACHE_KEY,
        EntityKind::Service => SERVICES_CACHE_KEY,
    }
}

impl Storefront {
    pub fn new(source: Arc<dyn ListingPort>) -> Self {
        Self::with_cache(source, ListCache::new(), DEFAULT_CACHE_TTL_MINUTES)
    }

    pub fn with_cache(
        source: Arc<dyn ListingPort>,
        cache: ListCache<Arc<Vec<Entity>>>,
        ttl_minutes: i64,
    ) -> Self {
        Self {
            source,
            cache,
            ttl_minutes,
        }
    }

    async fn entities(&self, kind: EntityKind) -> Result<Arc<Vec<Entity>>> {
        let source = &self.source;
        self.cache
            .get_or_fetch(cache_key(kind), self.ttl_minutes, move || async move {
                let items = source.list_entities(kind).await?;
                debug!("Fetched {} {} for the storefront", items.len(), kind.path_segment());
                Ok(Arc::new(items))
            })
            .await
    }

    /// Never fails: a fetch error becomes `Listing::Unavailable`.
    pub async fn listing(&self, kind: EntityKind) -> Listing {
        match self.entities(kind).await {
            Ok(items) => Listing::Ready(items),
            Err(e) => Listing::Unavailable(format!(
                "{} are temporarily unavailable: {}",
                kind.path_segment(),
                e
            )),
        }
    }

    pub async fn detail(&self, kind: EntityKind, slug: &str) -> Result<Entity> {
        let items = self.entities(kind).await?;
        items
            .iter()
            .find(|entity| entity.slug() == slug)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound {
                kind,
                id: slug.to_string(),
            })
    }
}
