//! Order persistence keyed by idempotency key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{OrderStatus, PlacedOrder, ShippingAddress};
use crate::domain::pricing::PriceBreakdown;
use crate::domain::value_objects::Money;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Corrupt order row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Everything needed to persist an order; numbering and timestamps are assigned on insert.
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub idempotency_key: String,
    pub user_id: Option<Uuid>,
    pub quantity: u32,
    pub shipping: ShippingAddress,
    pub notes: String,
    pub source: String,
    pub totals: PriceBreakdown,
}

/// Outcome of an insert: either a fresh order or the one already holding the key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inserted {
    Created(PlacedOrder),
    Existing(PlacedOrder),
}

#[derive(Clone)]
pub enum OrderStore {
    Postgres(PgOrderStore),
    Memory(Arc<MemoryOrderStore>),
}

impl OrderStore {
    pub async fn find_by_key(&self, key: &str) -> StoreResult<Option<PlacedOrder>> {
        match self {
            Self::Postgres(pg) => pg.find_by_key(key).await,
            Self::Memory(mem) => Ok(mem.find_by_key(key)),
        }
    }

    pub async fn insert(&self, order: NewOrder) -> StoreResult<Inserted> {
        match self {
            Self::Postgres(pg) => pg.insert(order).await,
            Self::Memory(mem) => Ok(mem.insert(order)),
        }
    }

    /// Most recent order by placement time, then creation time.
    pub async fn latest_for_user(&self, user_id: Uuid) -> StoreResult<Option<PlacedOrder>> {
        match self {
            Self::Postgres(pg) => pg.latest_for_user(user_id).await,
            Self::Memory(mem) => Ok(mem.latest_for_user(user_id)),
        }
    }

    /// Resolves a bearer token to the signed-in user.
    pub async fn session_user(&self, token: &str) -> StoreResult<Option<Uuid>> {
        match self {
            Self::Postgres(pg) => pg.session_user(token).await,
            Self::Memory(mem) => Ok(mem.session_user(token)),
        }
    }
}

// =============================================================================
// Postgres
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    idempotency_key: String,
    user_id: Option<Uuid>,
    quantity: i32,
    shipping: Json<ShippingAddress>,
    notes: String,
    source: String,
    subtotal_cents: i64,
    shipping_cents: i64,
    tax_cents: i64,
    total_cents: i64,
    status: String,
    placed_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for PlacedOrder {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| StoreError::Corrupt(format!("order {} has quantity {}", row.order_number, row.quantity)))?;
        let totals = PriceBreakdown::new(Money::from_cents(row.subtotal_cents), Money::from_cents(row.shipping_cents), Money::from_cents(row.tax_cents));
        if totals.total.cents() != row.total_cents {
            return Err(StoreError::Corrupt(format!("order {} total does not match its parts", row.order_number)));
        }
        Ok(Self {
            id: row.id, order_number: row.order_number, idempotency_key: row.idempotency_key, user_id: row.user_id,
            quantity, shipping: row.shipping.0, notes: row.notes, source: row.source, totals,
            status: OrderStatus::parse(&row.status), placed_at: row.placed_at, created_at: row.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
    prefix: String,
}

impl PgOrderStore {
    /// Seeds the order number sequence with `start` while the table is still empty.
    pub async fn new(pool: PgPool, prefix: impl Into<String>, start: i64) -> StoreResult<Self> {
        sqlx::query("SELECT setval('order_number_seq', $1, false) WHERE NOT EXISTS (SELECT 1 FROM orders)")
            .bind(start).execute(&pool).await?;
        Ok(Self { pool, prefix: prefix.into() })
    }

    async fn find_by_key(&self, key: &str) -> StoreResult<Option<PlacedOrder>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE idempotency_key = $1")
            .bind(key).fetch_optional(&self.pool).await?
            .map(PlacedOrder::try_from).transpose()
    }

    async fn insert(&self, order: NewOrder) -> StoreResult<Inserted> {
        let quantity = i32::try_from(order.quantity).map_err(|_| StoreError::Corrupt(format!("quantity {} out of range", order.quantity)))?;
        let row = sqlx::query_as::<_, OrderRow>(
            "INSERT INTO orders (id, order_number, idempotency_key, user_id, quantity, shipping, notes, source, subtotal_cents, shipping_cents, tax_cents, total_cents, status, placed_at, created_at) \
             VALUES ($1, $2 || '-' || nextval('order_number_seq'), $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'pending', NOW(), NOW()) \
             ON CONFLICT (idempotency_key) DO NOTHING RETURNING *")
            .bind(Uuid::now_v7()).bind(&self.prefix).bind(&order.idempotency_key).bind(order.user_id).bind(quantity)
            .bind(Json(&order.shipping)).bind(&order.notes).bind(&order.source)
            .bind(order.totals.subtotal.cents()).bind(order.totals.shipping.cents()).bind(order.totals.tax.cents()).bind(order.totals.total.cents())
            .fetch_optional(&self.pool).await?;

        match row {
            Some(row) => Ok(Inserted::Created(row.try_into()?)),
            None => self.find_by_key(&order.idempotency_key).await?
                .map(Inserted::Existing)
                .ok_or_else(|| StoreError::Corrupt(format!("conflicting order for key {} vanished", order.idempotency_key))),
        }
    }

    async fn latest_for_user(&self, user_id: Uuid) -> StoreResult<Option<PlacedOrder>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE user_id = $1 ORDER BY placed_at DESC, created_at DESC LIMIT 1")
            .bind(user_id).fetch_optional(&self.pool).await?
            .map(PlacedOrder::try_from).transpose()
    }

    async fn session_user(&self, token: &str) -> StoreResult<Option<Uuid>> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT user_id FROM sessions WHERE token = $1 AND expires_at > NOW()")
            .bind(token).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| r.0))
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Process-local store for development and tests.
pub struct MemoryOrderStore {
    prefix: String,
    next_number: AtomicI64,
    orders: Mutex<Vec<PlacedOrder>>,
    sessions: Mutex<HashMap<String, Uuid>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> { m.lock().unwrap_or_else(PoisonError::into_inner) }

impl MemoryOrderStore {
    pub fn new(prefix: impl Into<String>, start: i64) -> Self {
        Self { prefix: prefix.into(), next_number: AtomicI64::new(start), orders: Mutex::new(Vec::new()), sessions: Mutex::new(HashMap::new()) }
    }

    pub fn add_session(&self, token: impl Into<String>, user_id: Uuid) { lock(&self.sessions).insert(token.into(), user_id); }
    pub fn len(&self) -> usize { lock(&self.orders).len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn find_by_key(&self, key: &str) -> Option<PlacedOrder> {
        lock(&self.orders).iter().find(|o| o.idempotency_key == key).cloned()
    }

    fn insert(&self, order: NewOrder) -> Inserted {
        let mut orders = lock(&self.orders);
        if let Some(existing) = orders.iter().find(|o| o.idempotency_key == order.idempotency_key) {
            return Inserted::Existing(existing.clone());
        }
        let number = self.next_number.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let placed = PlacedOrder {
            id: Uuid::now_v7(), order_number: format!("{}-{number}", self.prefix), idempotency_key: order.idempotency_key,
            user_id: order.user_id, quantity: order.quantity, shipping: order.shipping, notes: order.notes, source: order.source,
            totals: order.totals, status: OrderStatus::Pending, placed_at: now, created_at: now,
        };
        orders.push(placed.clone());
        Inserted::Created(placed)
    }

    fn latest_for_user(&self, user_id: Uuid) -> Option<PlacedOrder> {
        lock(&self.orders).iter()
            .filter(|o| o.user_id == Some(user_id))
            .max_by(|a, b| a.placed_at.cmp(&b.placed_at).then(a.created_at.cmp(&b.created_at)))
            .cloned()
    }

    fn session_user(&self, token: &str) -> Option<Uuid> { lock(&self.sessions).get(token).copied() }
}
