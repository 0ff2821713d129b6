use sqlx::FromRow;
use uuid::Uuid;

/// Vehicle as seen by the ingestion core. Managed elsewhere.
#[derive(Debug, Clone, FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub company_id: Uuid,
    pub is_active: bool,
    pub assigned_driver_id: Option<Uuid>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Driver {
    pub id: Uuid,
    pub company_id: Uuid,
    pub is_active: bool,
}
