//! HITL order-from-alert, spec.md §4.J. Grounded in
//! `examples/original_source/backend/api/v1/routers/purchase_orders.py`
//! and `alerts.py`: the original's exception-driven early returns are
//! folded into one `UnitOfWork::commit` per spec.md §9, guarded by an
//! in-process per-alert `Mutex` standing in for the database's
//! single-tenant write lock (spec.md §5).

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::json;
use shelfops_core::TenantContext;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AlertsError, Result};
use crate::model::{Action, Alert, PODecision, PODecisionKind, PurchaseOrder, SourceType};

/// Caller-supplied overrides to the alert's `suggested_qty`, spec.md §4.J:
/// "if caller overrides `suggested_qty` then `reason_code` is required".
#[derive(Debug, Clone)]
pub struct OrderOverride {
    pub quantity: Option<i64>,
    pub reason_code: Option<String>,
    pub actor: Option<String>,
}

#[async_trait]
pub trait HitlRepository: Send + Sync {
    async fn get_alert(&self, tenant: &TenantContext, alert_id: Uuid) -> shelfops_core::error::Result<Option<Alert>>;
    async fn get_purchase_order(&self, tenant: &TenantContext, po_id: Uuid) -> shelfops_core::error::Result<Option<PurchaseOrder>>;
    async fn default_supplier(&self, tenant: &TenantContext, store_id: Uuid, product_id: Uuid) -> shelfops_core::error::Result<Uuid>;

    /// Inserts the `PurchaseOrder`, `PODecision`, `Action`, and the
    /// resolved alert in one call so callers cannot observe a partially
    /// applied order, spec.md §4.J "transactionally".
    async fn commit_order(&self, tenant: &TenantContext, po: PurchaseOrder, decision: PODecision, action: Action, resolved_alert: Alert) -> shelfops_core::error::Result<()>;
}

#[derive(Debug, Clone)]
pub struct OrderOutcome {
    pub purchase_order: PurchaseOrder,
    pub already_existed: bool,
}

/// Per-alert serialization for `order_from_alert`, spec.md §4.J: "the
/// database's single-tenant write lock guarantees exactly one PO is
/// created per alert." Uses the teacher's `DashMap`-for-concurrent-cache
/// pattern (see `shelfops_core::database::DatabasePool`) to hold one
/// `tokio::sync::Mutex` per alert id.
#[derive(Clone, Default)]
pub struct AlertLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl AlertLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, alert_id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(alert_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// One order-from-alert attempt, idempotent per spec.md §4.J and §8
/// scenario 2/3.
pub struct UnitOfWork<'a, R: HitlRepository> {
    pub tenant: &'a TenantContext,
    pub repo: &'a R,
    pub locks: &'a AlertLocks,
}

impl<'a, R: HitlRepository> UnitOfWork<'a, R> {
    pub fn new(tenant: &'a TenantContext, repo: &'a R, locks: &'a AlertLocks) -> Self {
        Self { tenant, repo, locks }
    }

    /// Only `reorder_recommended` alerts can be ordered, spec.md §4.J.
    pub async fn order_from_alert(&self, alert_id: Uuid, overrides: OrderOverride) -> Result<OrderOutcome> {
        let lock = self.locks.lock_for(alert_id);
        let _guard = lock.lock().await;

        let alert = self.repo.get_alert(self.tenant, alert_id).await?.ok_or(AlertsError::AlertNotFound { id: alert_id.to_string() })?;

        if alert.alert_type != "reorder_recommended" {
            return Err(AlertsError::NotOrderable { id: alert_id.to_string() });
        }

        // Idempotency: already resolved with a linked PO returns that PO
        // rather than creating a duplicate.
        if alert.status == "resolved" {
            if let Some(po_id) = alert.metadata_str("linked_po_id") {
                let po_id = Uuid::parse_str(po_id).map_err(|_| AlertsError::AlertNotFound { id: alert_id.to_string() })?;
                if let Some(po) = self.repo.get_purchase_order(self.tenant, po_id).await? {
                    return Ok(OrderOutcome { purchase_order: po, already_existed: true });
                }
            }
        }

        let suggested_qty = alert.metadata.get("suggested_qty").and_then(|v| v.as_i64());
        let final_quantity = match overrides.quantity {
            Some(q) => q,
            None => suggested_qty.unwrap_or(0),
        };
        if final_quantity <= 0 {
            return Err(AlertsError::InvalidQuantity { quantity: final_quantity });
        }

        let is_override = overrides.quantity.is_some() && Some(final_quantity) != suggested_qty;
        if is_override && overrides.reason_code.is_none() {
            return Err(AlertsError::ReasonCodeRequired);
        }

        let supplier_id = self.repo.default_supplier(self.tenant, alert.store_id, alert.product_id).await?;
        let po = PurchaseOrder::new_approved(self.tenant.tenant_id.0, alert.store_id, alert.product_id, supplier_id, final_quantity as i32, SourceType::VendorDirect);

        let decision_kind = if is_override { PODecisionKind::Edited } else { PODecisionKind::Approved };
        let original_quantity = suggested_qty.unwrap_or(final_quantity) as i32;
        let decision = PODecision::new(self.tenant.tenant_id.0, po.id, alert_id, decision_kind, original_quantity, final_quantity as i32, overrides.reason_code.clone());

        let action = Action::new(
            self.tenant.tenant_id.0,
            alert_id,
            "ordered",
            overrides.actor.clone(),
            json!({ "purchase_order_id": po.id, "quantity": final_quantity }),
        );

        let mut resolved_alert = alert;
        resolved_alert.status = "resolved".to_string();
        resolved_alert.updated_at = chrono::Utc::now();
        if let Some(obj) = resolved_alert.metadata.as_object_mut() {
            obj.insert("linked_po_id".to_string(), json!(po.id.to_string()));
        }

        self.repo.commit_order(self.tenant, po.clone(), decision, action, resolved_alert).await?;

        Ok(OrderOutcome { purchase_order: po, already_existed: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};
    use shelfops_core::TenantId;
    use std::sync::Mutex as StdMutex;

    use crate::model::{AlertType, Severity};

    #[derive(Default)]
    struct FakeRepo {
        alerts: StdMutex<std::collections::HashMap<Uuid, Alert>>,
        purchase_orders: StdMutex<std::collections::HashMap<Uuid, PurchaseOrder>>,
        commit_calls: StdMutex<u32>,
    }

    #[async_trait]
    impl HitlRepository for FakeRepo {
        async fn get_alert(&self, _tenant: &TenantContext, alert_id: Uuid) -> shelfops_core::error::Result<Option<Alert>> {
            Ok(self.alerts.lock().unwrap().get(&alert_id).cloned())
        }

        async fn get_purchase_order(&self, _tenant: &TenantContext, po_id: Uuid) -> shelfops_core::error::Result<Option<PurchaseOrder>> {
            Ok(self.purchase_orders.lock().unwrap().get(&po_id).cloned())
        }

        async fn default_supplier(&self, _tenant: &TenantContext, _store_id: Uuid, _product_id: Uuid) -> shelfops_core::error::Result<Uuid> {
            Ok(Uuid::new_v4())
        }

        async fn commit_order(&self, _tenant: &TenantContext, po: PurchaseOrder, _decision: PODecision, _action: Action, resolved_alert: Alert) -> shelfops_core::error::Result<()> {
            *self.commit_calls.lock().unwrap() += 1;
            self.purchase_orders.lock().unwrap().insert(po.id, po);
            self.alerts.lock().unwrap().insert(resolved_alert.id, resolved_alert);
            Ok(())
        }
    }

    fn tenant() -> TenantContext {
        TenantContext::new(TenantId::new(), "tenant_test")
    }

    fn reorder_alert(tenant_id: Uuid, suggested_qty: i64) -> Alert {
        let mut meta = Map::new();
        meta.insert("suggested_qty".to_string(), Value::from(suggested_qty));
        Alert::new(tenant_id, Uuid::new_v4(), Uuid::new_v4(), AlertType::ReorderRecommended, Severity::Medium, "low stock", meta)
    }

    #[tokio::test]
    async fn orders_with_default_suggested_quantity() {
        let tenant = tenant();
        let alert = reorder_alert(tenant.tenant_id.0, 25);
        let alert_id = alert.id;
        let repo = FakeRepo::default();
        repo.alerts.lock().unwrap().insert(alert_id, alert);
        let locks = AlertLocks::new();
        let uow = UnitOfWork::new(&tenant, &repo, &locks);

        let outcome = uow.order_from_alert(alert_id, OrderOverride { quantity: None, reason_code: None, actor: None }).await.unwrap();
        assert_eq!(outcome.purchase_order.quantity, 25);
        assert!(!outcome.already_existed);
    }

    #[tokio::test]
    async fn repeated_calls_return_the_same_purchase_order() {
        let tenant = tenant();
        let alert = reorder_alert(tenant.tenant_id.0, 25);
        let alert_id = alert.id;
        let repo = FakeRepo::default();
        repo.alerts.lock().unwrap().insert(alert_id, alert);
        let locks = AlertLocks::new();
        let uow = UnitOfWork::new(&tenant, &repo, &locks);

        let first = uow.order_from_alert(alert_id, OrderOverride { quantity: None, reason_code: None, actor: None }).await.unwrap();
        let second = uow.order_from_alert(alert_id, OrderOverride { quantity: None, reason_code: None, actor: None }).await.unwrap();

        assert_eq!(first.purchase_order.id, second.purchase_order.id);
        assert!(second.already_existed);
        assert_eq!(*repo.commit_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn override_without_reason_code_is_rejected() {
        let tenant = tenant();
        let alert = reorder_alert(tenant.tenant_id.0, 25);
        let alert_id = alert.id;
        let repo = FakeRepo::default();
        repo.alerts.lock().unwrap().insert(alert_id, alert);
        let locks = AlertLocks::new();
        let uow = UnitOfWork::new(&tenant, &repo, &locks);

        let result = uow.order_from_alert(alert_id, OrderOverride { quantity: Some(40), reason_code: None, actor: None }).await;
        assert!(matches!(result, Err(AlertsError::ReasonCodeRequired)));
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let tenant = tenant();
        let alert = reorder_alert(tenant.tenant_id.0, 0);
        let alert_id = alert.id;
        let repo = FakeRepo::default();
        repo.alerts.lock().unwrap().insert(alert_id, alert);
        let locks = AlertLocks::new();
        let uow = UnitOfWork::new(&tenant, &repo, &locks);

        let result = uow.order_from_alert(alert_id, OrderOverride { quantity: None, reason_code: None, actor: None }).await;
        assert!(matches!(result, Err(AlertsError::InvalidQuantity { .. })));
    }
}
