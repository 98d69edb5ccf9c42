//! Server host holding all application state
//!
//! `ServerHost` is the single source of truth shared by every route. It is
//! built once by the [`ServerBuilder`](super::ServerBuilder) and handed to
//! the REST exposure behind an `Arc`.

use crate::attendance::store::AttendanceStore;
use crate::config::AppConfig;
use crate::core::DataService;
use crate::ledger::store::LedgerStore;
use crate::notifications::model::{Notification, WhatsAppMessage};
use crate::payments::gateway::PaymentGateway;
use crate::resources::ResourceServices;
use crate::server::entity_registry::{EntityRegistry, FetcherMap};
use crate::storage::Storage;
use chrono::NaiveDate;
use std::sync::Arc;

/// State shared by the domain routers
pub type AppState = Arc<ServerHost>;

/// Host context containing all application state
pub struct ServerHost {
    pub config: Arc<AppConfig>,

    /// Invoices, installments and payments
    pub ledger: Arc<dyn LedgerStore>,

    pub attendance: Arc<dyn AttendanceStore>,
    pub notifications: Arc<dyn DataService<Notification>>,
    pub messages: Arc<dyn DataService<WhatsAppMessage>>,

    /// Directory entities (students, parents, templates, ...)
    pub resources: ResourceServices,

    pub gateway: Arc<dyn PaymentGateway>,

    /// Entity registry for CRUD routes
    pub entity_registry: EntityRegistry,

    /// Entity fetchers keyed by singular type (foreign-key checks)
    pub entity_fetchers: FetcherMap,
}

impl ServerHost {
    /// Build the host from builder components
    pub fn from_builder_components(
        config: AppConfig,
        storage: Storage,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let mut entity_registry = EntityRegistry::new();
        storage.resources.mount_all(&mut entity_registry);
        let fetchers = entity_registry.fetchers();

        Self {
            config: Arc::new(config),
            ledger: storage.ledger,
            attendance: storage.attendance,
            notifications: storage.notifications,
            messages: storage.messages,
            resources: storage.resources,
            gateway,
            entity_registry,
            entity_fetchers: fetchers,
        }
    }

    /// Get entity types registered in the host
    pub fn entity_types(&self) -> Vec<&str> {
        self.entity_registry.entity_types()
    }

    /// Today's date at the school
    pub fn today(&self) -> NaiveDate {
        self.config.school.today()
    }
}
