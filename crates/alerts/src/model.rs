//! Alert lifecycle and HITL supplemented types, spec.md §3 and §12.
//! Struct/`FromRow` shape follows the teacher's convention used in
//! `shelfops-master-data::inventory::model`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    StockoutPredicted,
    ReorderRecommended,
    AnomalyDetected,
    ForecastAccuracyLow,
    ModelDriftDetected,
    DataStale,
    ReceivingDiscrepancy,
    VendorReliabilityLow,
    ReorderPointChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
    Dismissed,
}

/// (tenant, store, product, alert_type, status) fact, spec.md §3. The
/// `metadata` map is mutable and carries idempotency state such as
/// `linked_po_id` and `suggested_qty`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Alert {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub alert_type: String,
    pub severity: String,
    pub status: String,
    pub message: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(tenant_id: Uuid, store_id: Uuid, product_id: Uuid, alert_type: AlertType, severity: Severity, message: impl Into<String>, metadata: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            store_id,
            product_id,
            alert_type: alert_type_str(alert_type).to_string(),
            severity: severity_str(severity).to_string(),
            status: "open".to_string(),
            message: message.into(),
            metadata: Value::Object(metadata),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn is_open_or_acknowledged(&self) -> bool {
        matches!(self.status.as_str(), "open" | "acknowledged")
    }
}

pub fn alert_type_str(t: AlertType) -> &'static str {
    match t {
        AlertType::StockoutPredicted => "stockout_predicted",
        AlertType::ReorderRecommended => "reorder_recommended",
        AlertType::AnomalyDetected => "anomaly_detected",
        AlertType::ForecastAccuracyLow => "forecast_accuracy_low",
        AlertType::ModelDriftDetected => "model_drift_detected",
        AlertType::DataStale => "data_stale",
        AlertType::ReceivingDiscrepancy => "receiving_discrepancy",
        AlertType::VendorReliabilityLow => "vendor_reliability_low",
        AlertType::ReorderPointChanged => "reorder_point_changed",
    }
}

pub fn severity_str(s: Severity) -> &'static str {
    match s {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}

/// Append-only audit row for user interactions on alerts, spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Action {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub alert_id: Uuid,
    pub action_type: String,
    pub actor: Option<String>,
    pub detail: Value,
    pub created_at: DateTime<Utc>,
}

impl Action {
    pub fn new(tenant_id: Uuid, alert_id: Uuid, action_type: impl Into<String>, actor: Option<String>, detail: Value) -> Self {
        Self { id: Uuid::new_v4(), tenant_id, alert_id, action_type: action_type.into(), actor, detail, created_at: Utc::now() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Suggested,
    Approved,
    Ordered,
    Shipped,
    Received,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    VendorDirect,
    Dc,
    Transfer,
}

/// Status machine {suggested -> approved -> ordered -> shipped -> received,
/// or -> cancelled}, spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub supplier_id: Uuid,
    pub quantity: i32,
    pub source_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    pub fn new_approved(tenant_id: Uuid, store_id: Uuid, product_id: Uuid, supplier_id: Uuid, quantity: i32, source_type: SourceType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            store_id,
            product_id,
            supplier_id,
            quantity,
            source_type: match source_type {
                SourceType::VendorDirect => "vendor_direct",
                SourceType::Dc => "dc",
                SourceType::Transfer => "transfer",
            }
            .to_string(),
            status: "approved".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PODecisionKind {
    Approved,
    Rejected,
    Edited,
}

/// Per-PO reason-coded record capturing original vs final quantity for ML
/// feedback, spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PODecision {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub purchase_order_id: Uuid,
    pub alert_id: Uuid,
    pub decision: String,
    pub original_quantity: i32,
    pub final_quantity: i32,
    pub reason_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PODecision {
    pub fn new(tenant_id: Uuid, purchase_order_id: Uuid, alert_id: Uuid, decision: PODecisionKind, original_quantity: i32, final_quantity: i32, reason_code: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            purchase_order_id,
            alert_id,
            decision: match decision {
                PODecisionKind::Approved => "approved",
                PODecisionKind::Rejected => "rejected",
                PODecisionKind::Edited => "edited",
            }
            .to_string(),
            original_quantity,
            final_quantity,
            reason_code,
            created_at: Utc::now(),
        }
    }
}

/// Created on PO receive transitions when `received_qty != ordered_qty`,
/// spec.md §4.J.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReceivingDiscrepancy {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub purchase_order_id: Uuid,
    pub ordered_qty: i32,
    pub received_qty: i32,
    pub created_at: DateTime<Utc>,
}

impl ReceivingDiscrepancy {
    pub fn new(tenant_id: Uuid, purchase_order_id: Uuid, ordered_qty: i32, received_qty: i32) -> Self {
        Self { id: Uuid::new_v4(), tenant_id, purchase_order_id, ordered_qty, received_qty, created_at: Utc::now() }
    }

    pub fn variance(&self) -> i32 {
        self.received_qty - self.ordered_qty
    }
}

/// ML-detected anomaly fact, spec.md §3. Grounded in
/// `original_source/backend/ml/anomaly.py`'s `Anomaly` row and
/// `backend/ml/ghost_stock.py`'s `inventory_discrepancy` case.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Anomaly {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub anomaly_type: String,
    pub severity: String,
    pub description: String,
    pub metadata: Value,
    pub detected_at: DateTime<Utc>,
}

/// Auxiliary ML-lifecycle alert (separate from operational `Alert`, e.g.
/// model-drift or low-accuracy warnings surfaced to data-science owners).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MLAlert {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub model_name: String,
    pub model_version: String,
    pub alert_type: String,
    pub message: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ModelExperiment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub model_name: String,
    pub params: Value,
    pub metrics: Value,
    pub tags: Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ModelRetrainingLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub model_name: String,
    pub trigger: String,
    pub previous_version: Option<String>,
    pub new_version: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: String,
}

/// Tracks the $ cost of opportunities missed by HITL overrides and
/// dismissed alerts, feeding the ML feedback loop (spec.md §3, §12).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OpportunityCostLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub alert_id: Uuid,
    pub estimated_cost: f64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl OpportunityCostLog {
    pub fn new(tenant_id: Uuid, alert_id: Uuid, estimated_cost: f64, reason: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), tenant_id, alert_id, estimated_cost, reason: reason.into(), created_at: Utc::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_alert_starts_open_with_metadata() {
        let mut meta = Map::new();
        meta.insert("suggested_qty".to_string(), Value::from(42));
        let alert = Alert::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), AlertType::ReorderRecommended, Severity::Medium, "low stock", meta);
        assert_eq!(alert.status, "open");
        assert_eq!(alert.metadata_str("suggested_qty"), None);
        assert_eq!(alert.metadata.get("suggested_qty").and_then(Value::as_i64), Some(42));
        assert!(alert.is_open_or_acknowledged());
    }

    #[test]
    fn receiving_discrepancy_reports_variance() {
        let rd = ReceivingDiscrepancy::new(Uuid::new_v4(), Uuid::new_v4(), 100, 92);
        assert_eq!(rd.variance(), -8);
    }
}
