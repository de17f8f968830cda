use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use be_remote_db::{SubscriptionPlan, TransactionOutcome, TransactionStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::PaymentError,
    extract::JsonBody,
    gateway::{CallbackError, CallbackOutcome, decode_envelope, parse_callback, validate_phone},
    provisioning::{activate_subscription, find_or_create_subscriber, resume_activation},
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub phone_number: String,
    pub plan_id: String,
    pub mac_address: String,
    pub router_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
    pub success: bool,
    pub message: String,
    pub transaction_id: Uuid,
    pub checkout_request_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
}

pub async fn list_plans(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SubscriptionPlan>>, PaymentError> {
    Ok(Json(state.store.list_plans(true).await?))
}

pub async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<InitiatePaymentRequest>,
) -> Result<Json<InitiatePaymentResponse>, PaymentError> {
    let phone = validate_phone(&request.phone_number)?;

    let plan_id = request.plan_id.trim();
    if plan_id.is_empty() {
        return Err(PaymentError::Validation("Plan ID is required".into()));
    }
    let mac_address = request.mac_address.trim().to_ascii_uppercase();
    if mac_address.is_empty() {
        return Err(PaymentError::Validation("MAC address is required".into()));
    }

    let plan_id =
        Uuid::parse_str(plan_id).map_err(|_| PaymentError::NotFound("Subscription plan"))?;
    let plan = match state.store.get_plan(plan_id).await {
        Ok(plan) => plan,
        Err(err) if err.is_not_found() => return Err(PaymentError::NotFound("Subscription plan")),
        Err(err) => return Err(err.into()),
    };
    if !plan.is_active {
        return Err(PaymentError::Validation(
            "Subscription plan is not available".into(),
        ));
    }

    let router_id = match request.router_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let id = Uuid::parse_str(raw).map_err(|_| PaymentError::NotFound("Router"))?;
            match state.store.get_router(id).await {
                Ok(router) => Some(router.id),
                Err(err) if err.is_not_found() => return Err(PaymentError::NotFound("Router")),
                Err(err) => return Err(err.into()),
            }
        }
    };

    let user = find_or_create_subscriber(&state, &mac_address, &phone, &plan, router_id).await?;

    let push = state
        .gateway
        .initiate(&phone, plan.price, &user.id.to_string())
        .await?;

    let transaction = state
        .store
        .create_transaction(be_remote_db::NewTransaction {
            checkout_request_id: push.checkout_request_id.clone(),
            merchant_request_id: push.merchant_request_id,
            phone_number: phone,
            amount: plan.price,
            plan_id: plan.id,
            user_id: user.id,
        })
        .await?;

    info!(
        transaction_id = %transaction.id,
        checkout_request_id = %push.checkout_request_id,
        user_id = %user.id,
        plan = %plan.name,
        "Payment initiated"
    );

    Ok(Json(InitiatePaymentResponse {
        success: true,
        message: "STK push initiated successfully".into(),
        transaction_id: transaction.id,
        checkout_request_id: push.checkout_request_id,
    }))
}

pub async fn payment_callback(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, PaymentError> {
    let payload: Value = serde_json::from_slice(&body).map_err(CallbackError::from)?;
    let callback = decode_envelope(&payload)?.body.stk_callback;

    let transaction = match state
        .store
        .get_transaction_by_checkout_id(&callback.checkout_request_id)
        .await
    {
        Ok(transaction) => transaction,
        Err(err) if err.is_not_found() => {
            warn!(
                checkout_request_id = %callback.checkout_request_id,
                "Callback for unknown transaction"
            );
            return Err(PaymentError::NotFound("Transaction"));
        }
        Err(err) => return Err(err.into()),
    };

    let outcome = match parse_callback(&callback) {
        CallbackOutcome::Paid(receipt) => {
            info!(
                transaction_id = %transaction.id,
                receipt = %receipt.receipt_number,
                "Payment confirmed"
            );
            TransactionOutcome::Completed {
                receipt_number: receipt.receipt_number,
                transaction_date: receipt.transaction_date,
                callback_data: payload,
            }
        }
        CallbackOutcome::Failed {
            result_code,
            reason,
        } => {
            warn!(
                transaction_id = %transaction.id,
                result_code,
                %reason,
                "Payment failed"
            );
            TransactionOutcome::Failed {
                callback_data: payload,
            }
        }
    };

    match state
        .store
        .finalize_transaction(transaction.id, outcome)
        .await?
    {
        Some(finalized) if finalized.status == TransactionStatus::Completed => {
            activate_subscription(&state, &finalized).await?;
        }
        Some(_) => {}
        None => {
            let stored = state.store.get_transaction(transaction.id).await?;
            if !resume_activation(&state, &stored).await? {
                info!(
                    transaction_id = %stored.id,
                    status = %stored.status,
                    "Ignoring callback for finalized transaction"
                );
            }
        }
    }

    Ok(Json(json!({ "success": true })))
}

pub async fn payment_status(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, PaymentError> {
    let id = Uuid::parse_str(&transaction_id).map_err(|_| PaymentError::NotFound("Transaction"))?;

    let transaction = match state.store.get_transaction(id).await {
        Ok(transaction) => transaction,
        Err(err) if err.is_not_found() => return Err(PaymentError::NotFound("Transaction")),
        Err(err) => return Err(err.into()),
    };

    Ok(Json(PaymentStatusResponse {
        status: transaction.status,
        amount: transaction.amount,
        phone_number: transaction.phone_number,
        created_at: transaction.created_at,
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use be_remote_db::{
        Admin, DashboardStats, DbError, DbResult, HotspotStore, HotspotUser, HotspotUserUpdate,
        MemoryStore, MpesaTransaction, NewAdmin, NewHotspotUser, NewPlan, NewRouter,
        NewTransaction, PaginationParams, PlanRemoval, PlanUpdate, Router, RouterUpdate,
        UserSession,
    };
    use be_router_service::{SimulatedRouterClient, StoreRegistry};
    use tower::ServiceExt;

    use super::*;
    use crate::gateway::FakeGateway;

    const MAC: &str = "AA:BB:CC:DD:EE:FF";

    struct Harness {
        store: Arc<MemoryStore>,
        gateway: Arc<FakeGateway>,
        app: axum::Router,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let routers = Arc::new(SimulatedRouterClient::new(Arc::new(StoreRegistry::new(
            store.clone(),
        ))));
        let state = Arc::new(AppState::new(store.clone(), gateway.clone(), routers));
        let app = crate::create_router(state).unwrap();
        Harness {
            store,
            gateway,
            app,
        }
    }

    async fn plan(store: &MemoryStore, price: i64, duration_hours: i32) -> SubscriptionPlan {
        store
            .create_plan(NewPlan {
                name: "Standard".into(),
                description: None,
                price: Decimal::new(price, 0),
                duration_hours,
                speed_mbps: 10,
                data_limit_gb: Some(5),
                is_active: true,
            })
            .await
            .unwrap()
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-forwarded-for", "198.51.100.10")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", "198.51.100.10")
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn initiate(app: &axum::Router, plan_id: Uuid, mac: &str) -> Response {
        app.clone()
            .oneshot(post(
                "/api/payment/initiate",
                json!({"phoneNumber": "0712345678", "planId": plan_id, "macAddress": mac}),
            ))
            .await
            .unwrap()
    }

    fn success_callback(checkout_request_id: &str) -> Value {
        json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "fake-merchant-1",
                    "CheckoutRequestID": checkout_request_id,
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            {"Name": "MpesaReceiptNumber", "Value": "ABC123"},
                            {"Name": "Amount", "Value": 100},
                            {"Name": "TransactionDate", "Value": "20240101120000"}
                        ]
                    }
                }
            }
        })
    }

    fn failed_callback(checkout_request_id: &str) -> Value {
        json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "fake-merchant-1",
                    "CheckoutRequestID": checkout_request_id,
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user"
                }
            }
        })
    }

    #[tokio::test]
    async fn lists_only_active_plans() {
        let h = harness();
        plan(&h.store, 100, 72).await;
        let hidden = plan(&h.store, 50, 24).await;
        h.store
            .update_plan(
                hidden.id,
                be_remote_db::PlanUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let response = h.app.clone().oneshot(get("/api/plans")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let plans = json_body(response).await;
        assert_eq!(plans.as_array().unwrap().len(), 1);
        assert_eq!(plans[0]["durationHours"], 72);
    }

    #[tokio::test]
    async fn purchase_end_to_end() {
        let h = harness();
        let router = h
            .store
            .create_router(NewRouter {
                name: "Lobby".into(),
                host: "192.168.88.1".into(),
                port: 8728,
                username: "api".into(),
                password: "secret".into(),
                is_active: true,
            })
            .await
            .unwrap();
        let plan = plan(&h.store, 100, 72).await;

        let response = initiate(&h.app, plan.id, MAC).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        let checkout_id = body["checkoutRequestId"].as_str().unwrap().to_string();
        let transaction_id = body["transactionId"].as_str().unwrap().to_string();

        let pushes = h.gateway.pushes();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].phone, "254712345678");
        assert_eq!(pushes[0].amount, Decimal::new(100, 0));

        let user = h.store.find_hotspot_user_by_mac(MAC).await.unwrap().unwrap();
        assert_eq!(user.username.as_deref(), Some("user_AABBCCDDEEFF"));
        assert_eq!(user.router_id, Some(router.id));
        assert!(!user.is_active);
        assert_eq!(pushes[0].reference, user.id.to_string());

        let status = json_body(
            h.app
                .clone()
                .oneshot(get(&format!("/api/payment/status/{transaction_id}")))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(status["status"], "pending");
        assert_eq!(status["phoneNumber"], "254712345678");

        let response = h
            .app
            .clone()
            .oneshot(post("/api/payment/callback", success_callback(&checkout_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"success": true}));

        let transaction = h
            .store
            .get_transaction_by_checkout_id(&checkout_id)
            .await
            .unwrap();
        assert_eq!(transaction.status, TransactionStatus::Completed);
        assert_eq!(transaction.mpesa_receipt_number.as_deref(), Some("ABC123"));
        assert!(transaction.callback_data.is_some());

        let user = h.store.get_hotspot_user(user.id).await.unwrap();
        assert!(user.is_active);
        let remaining = user.expires_at.unwrap() - Utc::now();
        assert!(remaining > chrono::Duration::hours(71));
        assert!(remaining <= chrono::Duration::hours(72));

        let sessions = h.store.active_sessions_for_user(user.id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].router_id, router.id);

        let status = json_body(
            h.app
                .clone()
                .oneshot(get(&format!("/api/payment/status/{transaction_id}")))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(status["status"], "completed");
    }

    #[tokio::test]
    async fn same_mac_reuses_subscriber() {
        let h = harness();
        let plan = plan(&h.store, 100, 72).await;

        for _ in 0..2 {
            assert_eq!(initiate(&h.app, plan.id, MAC).await.status(), StatusCode::OK);
        }

        let users = h.store.list_hotspot_users(None).await.unwrap();
        assert_eq!(users.len(), 1);
        let pushes = h.gateway.pushes();
        assert_eq!(pushes[0].reference, pushes[1].reference);
    }

    #[tokio::test]
    async fn replayed_callback_cannot_change_terminal_state() {
        let h = harness();
        let plan = plan(&h.store, 100, 72).await;
        let body = json_body(initiate(&h.app, plan.id, MAC).await).await;
        let checkout_id = body["checkoutRequestId"].as_str().unwrap().to_string();

        for callback in [success_callback(&checkout_id), failed_callback(&checkout_id)] {
            let response = h
                .app
                .clone()
                .oneshot(post("/api/payment/callback", callback))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let transaction = h
            .store
            .get_transaction_by_checkout_id(&checkout_id)
            .await
            .unwrap();
        assert_eq!(transaction.status, TransactionStatus::Completed);
        let user = h.store.find_hotspot_user_by_mac(MAC).await.unwrap().unwrap();
        assert!(user.is_active);
    }

    /// Delegates to a [`MemoryStore`] but fails the first activation.
    struct ActivationFailsOnce {
        inner: Arc<MemoryStore>,
        failed: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl HotspotStore for ActivationFailsOnce {
        async fn get_admin_by_username(&self, username: &str) -> DbResult<Admin> {
            self.inner.get_admin_by_username(username).await
        }
        async fn create_admin(&self, admin: NewAdmin) -> DbResult<Admin> {
            self.inner.create_admin(admin).await
        }
        async fn list_plans(&self, active_only: bool) -> DbResult<Vec<SubscriptionPlan>> {
            self.inner.list_plans(active_only).await
        }
        async fn get_plan(&self, id: Uuid) -> DbResult<SubscriptionPlan> {
            self.inner.get_plan(id).await
        }
        async fn create_plan(&self, plan: NewPlan) -> DbResult<SubscriptionPlan> {
            self.inner.create_plan(plan).await
        }
        async fn update_plan(&self, id: Uuid, update: PlanUpdate) -> DbResult<SubscriptionPlan> {
            self.inner.update_plan(id, update).await
        }
        async fn remove_plan(&self, id: Uuid) -> DbResult<PlanRemoval> {
            self.inner.remove_plan(id).await
        }
        async fn list_routers(&self, active_only: bool) -> DbResult<Vec<Router>> {
            self.inner.list_routers(active_only).await
        }
        async fn get_router(&self, id: Uuid) -> DbResult<Router> {
            self.inner.get_router(id).await
        }
        async fn create_router(&self, router: NewRouter) -> DbResult<Router> {
            self.inner.create_router(router).await
        }
        async fn update_router(&self, id: Uuid, update: RouterUpdate) -> DbResult<Router> {
            self.inner.update_router(id, update).await
        }
        async fn touch_router(&self, id: Uuid, seen_at: DateTime<Utc>) -> DbResult<()> {
            self.inner.touch_router(id, seen_at).await
        }
        async fn list_hotspot_users(
            &self,
            active_at: Option<DateTime<Utc>>,
        ) -> DbResult<Vec<HotspotUser>> {
            self.inner.list_hotspot_users(active_at).await
        }
        async fn get_hotspot_user(&self, id: Uuid) -> DbResult<HotspotUser> {
            self.inner.get_hotspot_user(id).await
        }
        async fn find_hotspot_user_by_mac(&self, mac: &str) -> DbResult<Option<HotspotUser>> {
            self.inner.find_hotspot_user_by_mac(mac).await
        }
        async fn create_hotspot_user(&self, user: NewHotspotUser) -> DbResult<HotspotUser> {
            self.inner.create_hotspot_user(user).await
        }
        async fn update_hotspot_user(
            &self,
            id: Uuid,
            update: HotspotUserUpdate,
        ) -> DbResult<HotspotUser> {
            self.inner.update_hotspot_user(id, update).await
        }
        async fn activate_hotspot_user(
            &self,
            id: Uuid,
            expires_at: DateTime<Utc>,
        ) -> DbResult<HotspotUser> {
            if !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Err(DbError::Connection("connection reset".into()));
            }
            self.inner.activate_hotspot_user(id, expires_at).await
        }
        async fn deactivate_hotspot_user(&self, id: Uuid) -> DbResult<HotspotUser> {
            self.inner.deactivate_hotspot_user(id).await
        }
        async fn list_transactions(
            &self,
            params: PaginationParams,
        ) -> DbResult<Vec<MpesaTransaction>> {
            self.inner.list_transactions(params).await
        }
        async fn get_transaction(&self, id: Uuid) -> DbResult<MpesaTransaction> {
            self.inner.get_transaction(id).await
        }
        async fn get_transaction_by_checkout_id(&self, id: &str) -> DbResult<MpesaTransaction> {
            self.inner.get_transaction_by_checkout_id(id).await
        }
        async fn create_transaction(&self, tx: NewTransaction) -> DbResult<MpesaTransaction> {
            self.inner.create_transaction(tx).await
        }
        async fn finalize_transaction(
            &self,
            id: Uuid,
            outcome: TransactionOutcome,
        ) -> DbResult<Option<MpesaTransaction>> {
            self.inner.finalize_transaction(id, outcome).await
        }
        async fn open_session(
            &self,
            user_id: Uuid,
            router_id: Uuid,
            session_id: Option<String>,
        ) -> DbResult<UserSession> {
            self.inner.open_session(user_id, router_id, session_id).await
        }
        async fn active_sessions_for_user(&self, user_id: Uuid) -> DbResult<Vec<UserSession>> {
            self.inner.active_sessions_for_user(user_id).await
        }
        async fn end_session(&self, id: Uuid) -> DbResult<()> {
            self.inner.end_session(id).await
        }
        async fn dashboard_stats(&self, now: DateTime<Utc>) -> DbResult<DashboardStats> {
            self.inner.dashboard_stats(now).await
        }
    }

    #[tokio::test]
    async fn redelivered_callback_recovers_failed_activation() {
        let memory = Arc::new(MemoryStore::new());
        let store = Arc::new(ActivationFailsOnce {
            inner: memory.clone(),
            failed: Default::default(),
        });
        let routers = Arc::new(SimulatedRouterClient::new(Arc::new(StoreRegistry::new(
            store.clone(),
        ))));
        let state = Arc::new(AppState::new(store, Arc::new(FakeGateway::new()), routers));
        let app = crate::create_router(state).unwrap();

        let plan = plan(&memory, 100, 72).await;
        let body = json_body(initiate(&app, plan.id, MAC).await).await;
        let checkout_id = body["checkoutRequestId"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(post("/api/payment/callback", success_callback(&checkout_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let user = memory.find_hotspot_user_by_mac(MAC).await.unwrap().unwrap();
        assert!(!user.is_active);
        let transaction = memory
            .get_transaction_by_checkout_id(&checkout_id)
            .await
            .unwrap();
        assert_eq!(transaction.status, TransactionStatus::Completed);

        let response = app
            .clone()
            .oneshot(post("/api/payment/callback", success_callback(&checkout_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let user = memory.get_hotspot_user(user.id).await.unwrap();
        assert!(user.is_active);
        assert!(user.expires_at.unwrap() > Utc::now() + chrono::Duration::hours(71));
    }

    #[tokio::test]
    async fn failed_callback_leaves_subscriber_inactive() {
        let h = harness();
        let plan = plan(&h.store, 100, 72).await;
        let body = json_body(initiate(&h.app, plan.id, MAC).await).await;
        let checkout_id = body["checkoutRequestId"].as_str().unwrap().to_string();

        let response = h
            .app
            .clone()
            .oneshot(post("/api/payment/callback", failed_callback(&checkout_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let transaction = h
            .store
            .get_transaction_by_checkout_id(&checkout_id)
            .await
            .unwrap();
        assert_eq!(transaction.status, TransactionStatus::Failed);
        let user = h.store.find_hotspot_user_by_mac(MAC).await.unwrap().unwrap();
        assert!(!user.is_active);
        assert!(user.expires_at.is_none());
    }

    #[tokio::test]
    async fn device_failure_does_not_fail_callback() {
        let h = harness();
        let router = h
            .store
            .create_router(NewRouter {
                name: "Offline".into(),
                host: "10.0.0.9".into(),
                port: 8728,
                username: "api".into(),
                password: "secret".into(),
                is_active: false,
            })
            .await
            .unwrap();
        let plan = plan(&h.store, 100, 72).await;

        let response = h
            .app
            .clone()
            .oneshot(post(
                "/api/payment/initiate",
                json!({
                    "phoneNumber": "0712345678",
                    "planId": plan.id,
                    "macAddress": MAC,
                    "routerId": router.id,
                }),
            ))
            .await
            .unwrap();
        let checkout_id = json_body(response).await["checkoutRequestId"]
            .as_str()
            .unwrap()
            .to_string();

        let response = h
            .app
            .clone()
            .oneshot(post("/api/payment/callback", success_callback(&checkout_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let user = h.store.find_hotspot_user_by_mac(MAC).await.unwrap().unwrap();
        assert!(user.is_active);
        assert!(
            h.store
                .active_sessions_for_user(user.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn initiate_validates_input() {
        let h = harness();
        let plan = plan(&h.store, 100, 72).await;

        let cases = [
            (
                json!({"phoneNumber": "0212345678", "planId": plan.id, "macAddress": MAC}),
                StatusCode::BAD_REQUEST,
            ),
            (
                json!({"phoneNumber": "0712345678", "planId": "", "macAddress": MAC}),
                StatusCode::BAD_REQUEST,
            ),
            (
                json!({"phoneNumber": "0712345678", "planId": plan.id, "macAddress": ""}),
                StatusCode::BAD_REQUEST,
            ),
            (
                json!({"phoneNumber": "0712345678", "planId": "not-a-uuid", "macAddress": MAC}),
                StatusCode::NOT_FOUND,
            ),
            (
                json!({"phoneNumber": "0712345678", "planId": Uuid::now_v7(), "macAddress": MAC}),
                StatusCode::NOT_FOUND,
            ),
        ];

        for (body, expected) in cases {
            let response = h
                .app
                .clone()
                .oneshot(post("/api/payment/initiate", body.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), expected, "{body}");
            assert!(json_body(response).await["message"].is_string());
        }
        assert!(h.gateway.pushes().is_empty());
    }

    #[tokio::test]
    async fn mistyped_body_is_bad_request_json() {
        let h = harness();
        let plan = plan(&h.store, 100, 72).await;

        let response = h
            .app
            .clone()
            .oneshot(post(
                "/api/payment/initiate",
                json!({"phoneNumber": 712345678, "planId": plan.id, "macAddress": MAC}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let message = json_body(response).await["message"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(message.contains("phoneNumber"), "{message}");

        let response = h
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/payment/initiate")
                    .header("x-forwarded-for", "198.51.100.10")
                    .body(Body::from("phoneNumber=0712345678"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["message"].is_string());
        assert!(h.gateway.pushes().is_empty());
    }

    #[tokio::test]
    async fn gateway_error_is_reported_without_transaction() {
        let h = harness();
        let plan = plan(&h.store, 100, 72).await;
        h.gateway.fail_next_with("Invalid Access Token");

        let response = initiate(&h.app, plan.id, MAC).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let message = json_body(response).await["message"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(message.contains("Invalid Access Token"));

        let transactions = h
            .store
            .list_transactions(be_remote_db::PaginationParams::default())
            .await
            .unwrap();
        assert!(transactions.is_empty());
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let h = harness();

        for uri in [
            format!("/api/payment/status/{}", Uuid::now_v7()),
            "/api/payment/status/not-a-uuid".to_string(),
        ] {
            let response = h.app.clone().oneshot(get(&uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }

        let response = h
            .app
            .clone()
            .oneshot(post("/api/payment/callback", success_callback("ws_CO_unknown")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_callback_is_rejected() {
        let h = harness();

        for body in [json!({}), json!({"Body": {"stkCallback": {"ResultCode": 0}}})] {
            let response = h
                .app
                .clone()
                .oneshot(post("/api/payment/callback", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(response).await["message"], "malformed callback");
        }
    }
}
