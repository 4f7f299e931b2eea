//! In-memory fakes for lifecycle tests

#![allow(dead_code)]

use async_trait::async_trait;
use canteen_client::models::{
    Canteen, MenuItem, Order, OrderLineItem, OrderLineRequest, OrderStatus, PaymentMetadata,
    PaymentOutcome, PaymentSession, PaymentStatus, ProviderPayment, VerifyPaymentRequest,
};
use canteen_client::{
    CheckoutRequest, ClientError, ClientResult, OrderService, PaymentGateway, PickupConfirmation,
    QrVerification,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

pub fn dosa() -> MenuItem {
    MenuItem::new("a", "Dosa", Decimal::from(50), 20)
}

pub fn vada() -> MenuItem {
    MenuItem::new("b", "Vada", Decimal::from(30), 20)
}

pub fn open_canteen() -> Canteen {
    let mut canteen = Canteen::new("c1", "North Block");
    canteen.is_currently_open = Some(true);
    canteen
}

/// How the fake backend answers the next verify call
#[derive(Debug, Clone)]
pub enum VerifyScript {
    Confirm,
    /// Backend answers with `paymentStatus = failed`
    Decline,
    /// Backend refuses the signature with a 400
    Reject(String),
    /// Transport failure
    Timeout,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub orders: HashMap<String, Order>,
    /// provider order id → backend order id
    pub sessions: HashMap<String, String>,
    pub verify_script: VecDeque<VerifyScript>,
    pub created: Vec<(String, Vec<OrderLineRequest>)>,
    pub verify_requests: Vec<VerifyPaymentRequest>,
    pub initiate_calls: usize,
    pub status_updates: Vec<(String, OrderStatus)>,
    pub verify_qr_calls: Vec<String>,
    pub complete_pickup_calls: Vec<String>,
    pub get_order_calls: usize,
    pub fail_get_order: bool,
}

/// Backend stand-in with the server-side rules that matter to the client
pub struct FakeOrderService {
    pub state: Mutex<FakeState>,
    catalog: HashMap<String, MenuItem>,
    authenticated: bool,
}

impl FakeOrderService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            catalog: [dosa(), vada()]
                .into_iter()
                .map(|item| (item.id.clone(), item))
                .collect(),
            authenticated: true,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            authenticated: false,
            ..Self::new()
        }
    }

    pub fn script_verify(&self, script: impl IntoIterator<Item = VerifyScript>) {
        self.state.lock().verify_script.extend(script);
    }

    /// Put an order straight into the fake backend
    pub fn insert_order(&self, order: Order) {
        self.state.lock().orders.insert(order.id.clone(), order);
    }

    pub fn order(&self, id: &str) -> Option<Order> {
        self.state.lock().orders.get(id).cloned()
    }

    pub fn qr_for(order: &Order) -> String {
        format!("QR-{}", order.id)
    }
}

#[async_trait]
impl OrderService for FakeOrderService {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn create_order(
        &self,
        canteen_id: &str,
        items: &[OrderLineRequest],
    ) -> ClientResult<Order> {
        let lines = items
            .iter()
            .map(|line| {
                let item = self
                    .catalog
                    .get(&line.menu_item_id)
                    .ok_or_else(|| ClientError::Validation(format!("unknown item {}", line.menu_item_id)))?;
                Ok(OrderLineItem {
                    menu_item_id: item.id.clone(),
                    name: item.name.clone(),
                    unit_price: item.price,
                    quantity: line.quantity,
                })
            })
            .collect::<ClientResult<Vec<_>>>()?;

        let mut state = self.state.lock();
        let n = state.orders.len() + 1;
        let order = Order::new(format!("ord_{}", n), format!("ORD-{}", 1000 + n), "u1", canteen_id, lines);
        state.created.push((canteen_id.to_string(), items.to_vec()));
        state.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn initiate_payment(&self, order_id: &str) -> ClientResult<PaymentSession> {
        let mut state = self.state.lock();
        state.initiate_calls += 1;
        let order = state
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(order_id.to_string()))?;
        let provider_order_id = format!("order_{}", state.initiate_calls);
        state
            .sessions
            .insert(provider_order_id.clone(), order.id.clone());
        Ok(PaymentSession {
            provider_order_id,
            provider_key_id: "rzp_test".into(),
            amount_minor_units: shared::money::to_minor_units(order.total_amount)
                .map_err(|e| ClientError::Internal(e.message))?,
            currency: "INR".into(),
        })
    }

    async fn verify_payment(&self, request: &VerifyPaymentRequest) -> ClientResult<Order> {
        let mut state = self.state.lock();
        state.verify_requests.push(request.clone());
        let script = state.verify_script.pop_front().unwrap_or(VerifyScript::Confirm);
        let order_id = state
            .sessions
            .get(&request.provider_order_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(request.provider_order_id.clone()))?;
        let order = state
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(order_id.clone()))?;

        let updated = match script {
            VerifyScript::Confirm => {
                let qr = Self::qr_for(&order);
                let mut paid = order
                    .with_status(OrderStatus::Paid, PaymentStatus::Success)
                    .with_qr_code(Some(qr));
                paid.payment_id = Some(request.provider_payment_id.clone());
                paid
            }
            VerifyScript::Decline => order.with_status(OrderStatus::Pending, PaymentStatus::Failed),
            VerifyScript::Reject(message) => return Err(ClientError::Validation(message)),
            VerifyScript::Timeout => {
                return Err(ClientError::Timeout(std::time::Duration::from_secs(30)));
            }
        };
        state.orders.insert(updated.id.clone(), updated.clone());
        Ok(updated)
    }

    async fn get_order(&self, id: &str) -> ClientResult<Order> {
        let mut state = self.state.lock();
        state.get_order_calls += 1;
        if state.fail_get_order {
            return Err(ClientError::Internal("backend down".into()));
        }
        state
            .orders
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    async fn list_my_orders(&self, status: Option<OrderStatus>) -> ClientResult<Vec<Order>> {
        let state = self.state.lock();
        Ok(state
            .orders
            .values()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect())
    }

    async fn list_canteen_orders(
        &self,
        canteen_id: &str,
        status: Option<OrderStatus>,
    ) -> ClientResult<Vec<Order>> {
        let state = self.state.lock();
        Ok(state
            .orders
            .values()
            .filter(|o| o.canteen_id == canteen_id && status.is_none_or(|s| o.status == s))
            .cloned()
            .collect())
    }

    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> ClientResult<Order> {
        let mut state = self.state.lock();
        state.status_updates.push((order_id.to_string(), status));
        let order = state
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(order_id.to_string()))?;
        if !order.status.can_transition_to(status) {
            return Err(ClientError::Validation(format!(
                "cannot move from {} to {}",
                order.status, status
            )));
        }
        let payment_status = order.payment_status;
        let qr = order.qr_code().map(str::to_string);
        let updated = order.with_status(status, payment_status).with_qr_code(qr);
        state.orders.insert(updated.id.clone(), updated.clone());
        Ok(updated)
    }

    async fn verify_qr(&self, qr_data: &str) -> ClientResult<QrVerification> {
        let mut state = self.state.lock();
        state.verify_qr_calls.push(qr_data.to_string());
        let found = state
            .orders
            .values()
            .find(|o| o.qr_code() == Some(qr_data))
            .cloned();
        Ok(match found {
            Some(order) if order.status == OrderStatus::Completed => {
                QrVerification::AlreadyPickedUp {
                    message: "Order already picked up".into(),
                }
            }
            Some(order) => QrVerification::Valid(order),
            None => QrVerification::Invalid {
                message: "Invalid or expired QR code".into(),
            },
        })
    }

    async fn complete_pickup(&self, qr_data: &str) -> ClientResult<PickupConfirmation> {
        let mut state = self.state.lock();
        state.complete_pickup_calls.push(qr_data.to_string());
        let Some(order) = state
            .orders
            .values()
            .find(|o| o.qr_code() == Some(qr_data))
            .cloned()
        else {
            return Err(ClientError::Validation("Invalid or expired QR code".into()));
        };
        if order.status == OrderStatus::Completed {
            return Ok(PickupConfirmation::AlreadyPickedUp {
                message: "Order already picked up".into(),
            });
        }
        let qr = order.qr_code().map(str::to_string);
        let done = order
            .with_status(OrderStatus::Completed, PaymentStatus::Success)
            .with_qr_code(qr);
        state.orders.insert(done.id.clone(), done.clone());
        Ok(PickupConfirmation::Completed(done))
    }

    async fn get_canteen(&self, canteen_id: &str) -> ClientResult<Canteen> {
        Ok(Canteen::new(canteen_id, "North Block"))
    }
}

/// Provider stand-in that plays back scripted outcomes
pub struct FakeGateway {
    outcomes: Mutex<VecDeque<PaymentOutcome>>,
    pub opened: Mutex<Vec<CheckoutRequest>>,
    /// Notified each time a checkout opens
    pub entered: Notify,
    /// When set, `open` waits for `release` before answering
    hold: bool,
    pub release: Notify,
}

impl FakeGateway {
    pub fn new(outcomes: impl IntoIterator<Item = PaymentOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            opened: Mutex::new(Vec::new()),
            entered: Notify::new(),
            hold: false,
            release: Notify::new(),
        }
    }

    pub fn holding(outcomes: impl IntoIterator<Item = PaymentOutcome>) -> Self {
        Self {
            hold: true,
            ..Self::new(outcomes)
        }
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn open(&self, request: CheckoutRequest) -> PaymentOutcome {
        self.opened.lock().push(request);
        self.entered.notify_one();
        if self.hold {
            self.release.notified().await;
        }
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or(PaymentOutcome::Cancelled)
    }
}

/// Provider success carrying exactly the given identifiers
pub fn provider_success(payment_id: &str, order_id: &str, signature: &str) -> PaymentOutcome {
    PaymentOutcome::Success(ProviderPayment {
        provider_order_id: order_id.into(),
        provider_payment_id: payment_id.into(),
        provider_signature: signature.into(),
        metadata: PaymentMetadata {
            method: Some("upi".into()),
            ..Default::default()
        },
        raw_fields: BTreeMap::from([
            ("razorpay_payment_id".to_string(), payment_id.to_string()),
            ("razorpay_order_id".to_string(), order_id.to_string()),
            ("razorpay_signature".to_string(), signature.to_string()),
        ]),
    })
}

pub fn shared_fakes(
    outcomes: impl IntoIterator<Item = PaymentOutcome>,
) -> (Arc<FakeOrderService>, Arc<FakeGateway>) {
    (
        Arc::new(FakeOrderService::new()),
        Arc::new(FakeGateway::new(outcomes)),
    )
}
