//! Storage implementations for different backends
//!
//! [`Storage`] bundles every store the server needs so the builder can take
//! a whole backend at once.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::{InMemoryAttendanceStore, InMemoryDataService, InMemoryLedgerStore};
#[cfg(feature = "postgres")]
pub use postgres::{PostgresAttendanceStore, PostgresDataService, PostgresLedgerStore};

use crate::attendance::store::AttendanceStore;
use crate::core::DataService;
use crate::ledger::store::LedgerStore;
use crate::notifications::model::{Notification, WhatsAppMessage};
use crate::resources::ResourceServices;
use std::sync::Arc;

/// Every store used by the server, from a single backend
#[derive(Clone)]
pub struct Storage {
    pub ledger: Arc<dyn LedgerStore>,
    pub attendance: Arc<dyn AttendanceStore>,
    pub notifications: Arc<dyn DataService<Notification>>,
    pub messages: Arc<dyn DataService<WhatsAppMessage>>,
    pub resources: ResourceServices,
}

impl Storage {
    /// Process-local storage; contents are lost on restart
    pub fn in_memory() -> Self {
        let notifications = InMemoryDataService::<Notification>::new();

        Self {
            ledger: Arc::new(InMemoryLedgerStore::new(notifications.clone())),
            attendance: Arc::new(InMemoryAttendanceStore::new()),
            notifications: Arc::new(notifications),
            messages: Arc::new(InMemoryDataService::new()),
            resources: ResourceServices {
                academic_years: Arc::new(InMemoryDataService::new()),
                classes: Arc::new(InMemoryDataService::new()),
                sections: Arc::new(InMemoryDataService::new()),
                subjects: Arc::new(InMemoryDataService::new()),
                parents: Arc::new(InMemoryDataService::new()),
                students: Arc::new(InMemoryDataService::new()),
                staff: Arc::new(InMemoryDataService::new()),
                templates: Arc::new(InMemoryDataService::new()),
            },
        }
    }

    /// PostgreSQL storage over a migrated pool
    #[cfg(feature = "postgres")]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            ledger: Arc::new(PostgresLedgerStore::new(pool.clone())),
            attendance: Arc::new(PostgresAttendanceStore::new(pool.clone())),
            notifications: Arc::new(PostgresDataService::new(pool.clone())),
            messages: Arc::new(PostgresDataService::new(pool.clone())),
            resources: ResourceServices {
                academic_years: Arc::new(PostgresDataService::new(pool.clone())),
                classes: Arc::new(PostgresDataService::new(pool.clone())),
                sections: Arc::new(PostgresDataService::new(pool.clone())),
                subjects: Arc::new(PostgresDataService::new(pool.clone())),
                parents: Arc::new(PostgresDataService::new(pool.clone())),
                students: Arc::new(PostgresDataService::new(pool.clone())),
                staff: Arc::new(PostgresDataService::new(pool.clone())),
                templates: Arc::new(PostgresDataService::new(pool)),
            },
        }
    }
}
