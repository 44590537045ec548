use std::sync::Arc;

use lib_telemetry::connections::db_postgres::Database;
use lib_telemetry::TelemetryService;

/// Shared state handed to every route handler.
///
/// The service owns all mutable ingestion state; the database is the
/// optional durable collaborator (absent when no URL was configured or
/// the store was unreachable at boot).
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TelemetryService>,
    pub db: Option<Arc<Database>>,
}
