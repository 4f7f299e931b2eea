//! Backend wire shapes and their normalisation into domain models
//!
//! The backend populates references inconsistently: a canteen may arrive as a
//! full object, a bare `{_id}` object or just an id string, and the same goes
//! for users and menu items. Each field decodes through one untagged enum,
//! tried in a fixed order, and nothing but plain ids and names leaves this
//! module.

use crate::{ClientError, ClientResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::models::{
    Canteen, Order, OrderLineItem, OrderStatus, PaymentSession, PaymentStatus,
};

/// Canteen reference inside an order
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CanteenRef {
    Full(CanteenObject),
    Partial(IdObject),
    Id(String),
}

/// Populated canteen: at least an id and a name
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanteenObject {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// Unpopulated reference object
#[derive(Debug, Clone, Deserialize)]
pub struct IdObject {
    #[serde(alias = "_id")]
    pub id: String,
}

impl CanteenRef {
    /// `(id, display name)`
    pub fn into_parts(self) -> (String, Option<String>) {
        match self {
            CanteenRef::Full(c) => (c.id, Some(c.name)),
            CanteenRef::Partial(c) => (c.id, None),
            CanteenRef::Id(id) => (id, None),
        }
    }
}

/// User or owner reference
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Object {
        #[serde(alias = "_id")]
        id: String,
    },
    Id(String),
}

impl UserRef {
    pub fn into_id(self) -> String {
        match self {
            UserRef::Object { id } | UserRef::Id(id) => id,
        }
    }
}

/// Menu item reference inside an order line
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MenuItemRef {
    Object {
        #[serde(alias = "_id")]
        id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        price: Option<Decimal>,
    },
    Id(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOrderLine {
    #[serde(alias = "menuItemId")]
    pub menu_item: MenuItemRef,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "unitPrice")]
    pub price: Option<Decimal>,
    pub quantity: u32,
}

impl WireOrderLine {
    fn into_line(self) -> ClientResult<OrderLineItem> {
        let (menu_item_id, ref_name, ref_price) = match self.menu_item {
            MenuItemRef::Object { id, name, price } => (id, name, price),
            MenuItemRef::Id(id) => (id, None, None),
        };
        let unit_price = self.price.or(ref_price).ok_or_else(|| {
            ClientError::InvalidResponse(format!("order line {} has no price", menu_item_id))
        })?;
        Ok(OrderLineItem {
            name: self.name.or(ref_name).unwrap_or_default(),
            menu_item_id,
            unit_price,
            quantity: self.quantity,
        })
    }
}

/// Order as the backend sends it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOrder {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default, alias = "userId")]
    pub user: Option<UserRef>,
    #[serde(alias = "canteenId")]
    pub canteen: CanteenRef,
    #[serde(default)]
    pub items: Vec<WireOrderLine>,
    pub total_amount: Decimal,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub qr_code: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WireOrder {
    /// Normalise into the domain `Order`, enforcing the total and QR rules
    pub fn into_order(self) -> ClientResult<Order> {
        let items = self
            .items
            .into_iter()
            .map(WireOrderLine::into_line)
            .collect::<ClientResult<Vec<_>>>()?;
        let (canteen_id, canteen_name) = self.canteen.into_parts();
        let order_id = self.order_id.unwrap_or_else(|| self.id.clone());

        if self.qr_code.is_some() && self.payment_status != PaymentStatus::Success {
            tracing::warn!(
                order_id = %order_id,
                payment_status = %self.payment_status,
                "Dropping QR code received before payment success"
            );
        }

        let mut order = Order::new(
            self.id,
            order_id,
            self.user.map(UserRef::into_id).unwrap_or_default(),
            canteen_id,
            items,
        )
        .with_status(self.status, self.payment_status)
        .with_qr_code(self.qr_code);

        order.total_amount = self.total_amount;
        order.canteen_name = canteen_name;
        order.payment_id = self.payment_id;
        order.created_at = self.created_at;
        order.updated_at = self.updated_at;

        order
            .verify_total()
            .map_err(|e| ClientError::InvalidResponse(e.message))?;
        Ok(order)
    }
}

/// Canteen as `GET /canteens/{id}` sends it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCanteen {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_open: Option<bool>,
    #[serde(default)]
    pub is_currently_open: Option<bool>,
    #[serde(default)]
    pub opening_time: Option<String>,
    #[serde(default)]
    pub closing_time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, alias = "owner")]
    pub owner_id: Option<UserRef>,
}

impl WireCanteen {
    pub fn into_canteen(self) -> Canteen {
        let mut canteen = Canteen::new(self.id, self.name);
        canteen.is_open = self.is_open;
        canteen.is_currently_open = self.is_currently_open;
        canteen.opening_time = self.opening_time;
        canteen.closing_time = self.closing_time;
        canteen.location = self.location;
        canteen.owner_id = self.owner_id.map(UserRef::into_id);
        canteen
    }
}

/// Payment session as issued by the backend
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePaymentSession {
    #[serde(alias = "razorpayOrderId")]
    pub provider_order_id: String,
    #[serde(alias = "keyId", alias = "key")]
    pub provider_key_id: String,
    #[serde(alias = "amount")]
    pub amount_minor_units: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "INR".to_string()
}

impl WirePaymentSession {
    pub fn into_session(self) -> ClientResult<PaymentSession> {
        if self.amount_minor_units <= 0 {
            return Err(ClientError::InvalidResponse(format!(
                "payment session {} has non-positive amount {}",
                self.provider_order_id, self.amount_minor_units
            )));
        }
        Ok(PaymentSession {
            provider_order_id: self.provider_order_id,
            provider_key_id: self.provider_key_id,
            amount_minor_units: self.amount_minor_units,
            currency: self.currency,
        })
    }
}

/// Decode an order list, failing on the first malformed entry
pub fn into_orders(wire: Vec<WireOrder>) -> ClientResult<Vec<Order>> {
    wire.into_iter().map(WireOrder::into_order).collect()
}
