//! Order Service Client
//!
//! `OrderService` is the seam between the lifecycle controllers and the
//! backend. `HttpOrderService` speaks the REST contract; tests plug in fakes.

use crate::wire::{self, WireCanteen, WireOrder, WirePaymentSession};
use crate::{ClientError, ClientResult, HttpClient};
use async_trait::async_trait;
use serde::Serialize;
use shared::models::{
    Canteen, Order, OrderLineRequest, OrderStatus, PaymentSession, VerifyPaymentRequest,
};
use tracing::{debug, info, instrument};

/// Result of asking the backend about a scanned QR payload
#[derive(Debug, Clone, PartialEq)]
pub enum QrVerification {
    /// The code belongs to this order and it can be handed over
    Valid(Order),
    /// The order behind the code was already collected
    AlreadyPickedUp { message: String },
    /// Unknown, malformed or expired code
    Invalid { message: String },
}

/// Result of confirming a pickup
#[derive(Debug, Clone, PartialEq)]
pub enum PickupConfirmation {
    Completed(Order),
    AlreadyPickedUp { message: String },
}

/// Order lifecycle operations against the backend
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Whether requests will carry a user token
    fn is_authenticated(&self) -> bool;

    /// Create an order; the server prices every line
    async fn create_order(
        &self,
        canteen_id: &str,
        items: &[OrderLineRequest],
    ) -> ClientResult<Order>;

    /// Open a provider payment session priced from the stored order
    async fn initiate_payment(&self, order_id: &str) -> ClientResult<PaymentSession>;

    /// Ask the backend to check the provider signature and settle the order
    async fn verify_payment(&self, request: &VerifyPaymentRequest) -> ClientResult<Order>;

    async fn get_order(&self, id: &str) -> ClientResult<Order>;

    async fn list_my_orders(&self, status: Option<OrderStatus>) -> ClientResult<Vec<Order>>;

    async fn list_canteen_orders(
        &self,
        canteen_id: &str,
        status: Option<OrderStatus>,
    ) -> ClientResult<Vec<Order>>;

    /// Owner-side fulfilment step
    async fn update_order_status(&self, order_id: &str, status: OrderStatus)
    -> ClientResult<Order>;

    async fn verify_qr(&self, qr_data: &str) -> ClientResult<QrVerification>;

    async fn complete_pickup(&self, qr_data: &str) -> ClientResult<PickupConfirmation>;

    async fn get_canteen(&self, canteen_id: &str) -> ClientResult<Canteen>;
}

/// Whether a failed QR call means the order was already collected
pub fn is_already_picked_up(err: &ClientError) -> bool {
    if matches!(err, ClientError::Conflict(_)) {
        return true;
    }
    err.backend_message()
        .map(|m| {
            let m = m.to_ascii_lowercase();
            m.contains("already picked up") || m.contains("already completed")
        })
        .unwrap_or(false)
}

fn failure_message(err: &ClientError) -> String {
    err.backend_message()
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderBody<'a> {
    canteen_id: &'a str,
    items: &'a [OrderLineRequest],
}

#[derive(Serialize)]
struct StatusBody {
    status: OrderStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QrBody<'a> {
    qr_data: &'a str,
}

/// `OrderService` over the backend REST API
#[derive(Debug, Clone)]
pub struct HttpOrderService {
    http: HttpClient,
}

impl HttpOrderService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    async fn list(&self, path: &str, status: Option<OrderStatus>) -> ClientResult<Vec<Order>> {
        let wire: Vec<WireOrder> = match status {
            Some(s) => {
                self.http
                    .get_with_query(path, &[("status", s.as_str())])
                    .await?
            }
            None => self.http.get(path).await?,
        };
        wire::into_orders(wire)
    }
}

#[async_trait]
impl OrderService for HttpOrderService {
    fn is_authenticated(&self) -> bool {
        self.http.has_token()
    }

    #[instrument(skip(self, items), fields(lines = items.len()))]
    async fn create_order(
        &self,
        canteen_id: &str,
        items: &[OrderLineRequest],
    ) -> ClientResult<Order> {
        let body = CreateOrderBody { canteen_id, items };
        let order = self
            .http
            .post::<WireOrder, _>("orders", &body)
            .await?
            .into_order()?;
        info!(order_id = %order.order_id, total = %order.total_amount, "Order created");
        Ok(order)
    }

    #[instrument(skip(self))]
    async fn initiate_payment(&self, order_id: &str) -> ClientResult<PaymentSession> {
        let session = self
            .http
            .post_empty::<WirePaymentSession>(&format!("orders/{}/payment", order_id))
            .await?
            .into_session()?;
        debug!(
            provider_order_id = %session.provider_order_id,
            amount_minor_units = session.amount_minor_units,
            "Payment session issued"
        );
        Ok(session)
    }

    #[instrument(skip(self, request), fields(provider_order_id = %request.provider_order_id))]
    async fn verify_payment(&self, request: &VerifyPaymentRequest) -> ClientResult<Order> {
        self.http
            .post::<WireOrder, _>("orders/payment/verify", request)
            .await?
            .into_order()
    }

    #[instrument(skip(self))]
    async fn get_order(&self, id: &str) -> ClientResult<Order> {
        self.http
            .get::<WireOrder>(&format!("orders/{}", id))
            .await?
            .into_order()
    }

    #[instrument(skip(self))]
    async fn list_my_orders(&self, status: Option<OrderStatus>) -> ClientResult<Vec<Order>> {
        self.list("orders/my", status).await
    }

    #[instrument(skip(self))]
    async fn list_canteen_orders(
        &self,
        canteen_id: &str,
        status: Option<OrderStatus>,
    ) -> ClientResult<Vec<Order>> {
        self.list(&format!("orders/canteen/{}", canteen_id), status)
            .await
    }

    #[instrument(skip(self))]
    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> ClientResult<Order> {
        self.http
            .patch::<WireOrder, _>(&format!("orders/{}/status", order_id), &StatusBody { status })
            .await?
            .into_order()
    }

    #[instrument(skip(self, qr_data))]
    async fn verify_qr(&self, qr_data: &str) -> ClientResult<QrVerification> {
        match self
            .http
            .post::<WireOrder, _>("orders/verify-qr", &QrBody { qr_data })
            .await
        {
            Ok(wire) => Ok(QrVerification::Valid(wire.into_order()?)),
            Err(e) if is_already_picked_up(&e) => Ok(QrVerification::AlreadyPickedUp {
                message: failure_message(&e),
            }),
            Err(e @ (ClientError::Validation(_) | ClientError::NotFound(_))) => {
                Ok(QrVerification::Invalid {
                    message: failure_message(&e),
                })
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, qr_data))]
    async fn complete_pickup(&self, qr_data: &str) -> ClientResult<PickupConfirmation> {
        match self
            .http
            .post::<WireOrder, _>("orders/complete-pickup", &QrBody { qr_data })
            .await
        {
            Ok(wire) => Ok(PickupConfirmation::Completed(wire.into_order()?)),
            Err(e) if is_already_picked_up(&e) => Ok(PickupConfirmation::AlreadyPickedUp {
                message: failure_message(&e),
            }),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn get_canteen(&self, canteen_id: &str) -> ClientResult<Canteen> {
        Ok(self
            .http
            .get::<WireCanteen>(&format!("canteens/{}", canteen_id))
            .await?
            .into_canteen())
    }
}
