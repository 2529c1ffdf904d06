pub mod api;
pub mod error;
pub mod feed;
pub mod model;
pub mod service;
pub mod validate;

use std::sync::Arc;

use axum::Router;
use placement_core::Module;
use placement_sql::SQLStore;

pub use error::LedgerError;
pub use feed::{ChangeEvent, ChangeFeed, ChangeOp, ChangeTable, SubscriptionId};
pub use service::{AllocationService, LedgerConfig};

/// Allocation module: per-college account quotas with an audit trail.
pub struct AllocationModule {
    service: Arc<AllocationService>,
}

impl AllocationModule {
    pub fn new(
        sql: Arc<dyn SQLStore>,
        feed: Arc<ChangeFeed>,
        config: LedgerConfig,
    ) -> Result<Self, LedgerError> {
        Ok(Self {
            service: Arc::new(AllocationService::new(sql, feed, config)?),
        })
    }

    pub fn service(&self) -> &Arc<AllocationService> {
        &self.service
    }
}

impl Module for AllocationModule {
    fn name(&self) -> &str {
        "allocation"
    }

    fn routes(&self) -> Router {
        api::router(self.service.clone())
    }
}
