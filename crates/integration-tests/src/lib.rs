//! Integration tests for Mercato.
//!
//! The flows run against [`MemoryBackend`], an in-memory implementation of
//! every store trait, and [`FakeGateway`] in place of the payment
//! processor. No database or network is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p mercato-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_flow` - Cart add, merge, view, reconcile, remove
//! - `checkout_flow` - COD and online checkout, payment verification
//! - `accounts` - Registration rules and seat limits
//! - `reference_data` - Reference registry maintenance
//! - `http_api` - Router-level tests with sessions

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use tower_sessions::{MemoryStore, SessionManagerLayer};
use url::Url;

use mercato_api::config::{ApiConfig, PaymentConfig};
use mercato_api::db::{
    CartSettlement, CartStore, OrderLedger, ProductCatalog, ReferenceStore, RepositoryError,
    RetentionStore, RetentionTarget, Stores, UserStore,
};
use mercato_api::middleware::cookie_key;
use mercato_api::models::{LoginKey, NewUser, Product, User};
use mercato_api::payments::{
    CreateOrderRequest, PaymentError, PaymentGateway, ProcessorOrder, SignatureVerifier,
};
use mercato_api::{AppState, routes};
use mercato_core::{
    Address, CartItem, CartItemId, Currency, Email, NewCartItem, NewOrder, NewReferenceItem,
    Order, OrderId, ProductId, ReferenceCategory, ReferenceCategoryId, ReferenceCategoryKind,
    ReferenceItem, ReferenceItemId, Role, TaxRate, UserId, carts_match,
};

/// Key secret shared by the test state and [`TestContext::sign`].
pub const KEY_SECRET: &str = "kS9f2Lq7Xw3Zp8Rt4Vn6Bm1Hj5Gd0Ya";

// =============================================================================
// In-memory stores
// =============================================================================

struct StoredUser {
    user: User,
    password_hash: String,
    deleted_at: Option<DateTime<Utc>>,
}

struct StoredProduct {
    product: Product,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Tables {
    users: Vec<StoredUser>,
    products: HashMap<ProductId, StoredProduct>,
    cart_items: Vec<CartItem>,
    orders: Vec<Order>,
    categories: Vec<ReferenceCategory>,
}

/// Every store trait backed by one mutex-guarded set of tables.
///
/// Each trait method takes the lock once, so operations are atomic with
/// respect to each other the way a single `PostgreSQL` transaction is.
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<Tables>,
    cart_writes: AtomicUsize,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Wrap this backend as the full set of store handles.
    #[must_use]
    pub fn stores(self: &Arc<Self>) -> Stores {
        Stores {
            products: self.clone(),
            users: self.clone(),
            carts: self.clone(),
            orders: self.clone(),
            reference: self.clone(),
            retention: self.clone(),
        }
    }

    /// Insert a live product.
    pub fn insert_product(&self, name: &str, price: Decimal) -> Product {
        let product = Product {
            id: ProductId::new(),
            name: name.to_owned(),
            price,
            thumbnail: Some(format!("{}.jpg", name.to_lowercase())),
        };
        self.tables().products.insert(
            product.id,
            StoredProduct {
                product: product.clone(),
                deleted_at: None,
            },
        );
        product
    }

    /// Change a product's live price.
    pub fn set_price(&self, id: ProductId, price: Decimal) {
        if let Some(stored) = self.tables().products.get_mut(&id) {
            stored.product.price = price;
        }
    }

    /// Soft-delete a product at `at`.
    pub fn delete_product(&self, id: ProductId, at: DateTime<Utc>) {
        if let Some(stored) = self.tables().products.get_mut(&id) {
            stored.deleted_at = Some(at);
        }
    }

    /// Insert a user directly, skipping registration rules.
    pub fn insert_user(&self, name: &str, role: Role) -> User {
        let user = User {
            id: UserId::new(),
            name: name.to_owned(),
            email: Email::parse(&format!("{}@example.test", name.to_lowercase()))
                .unwrap_or_else(|e| panic!("test email for {name}: {e}")),
            mobile: None,
            role,
            addresses: Vec::new(),
            created_at: Utc::now(),
        };
        self.tables().users.push(StoredUser {
            user: user.clone(),
            password_hash: String::new(),
            deleted_at: None,
        });
        user
    }

    /// Soft-delete a user at `at`.
    pub fn delete_user(&self, id: UserId, at: DateTime<Utc>) {
        if let Some(stored) = self.tables().users.iter_mut().find(|u| u.user.id == id) {
            stored.deleted_at = Some(at);
        }
    }

    /// Backdate a reference item's deletion.
    pub fn backdate_item_deletion(&self, id: ReferenceItemId, at: DateTime<Utc>) {
        for category in &mut self.tables().categories {
            for item in &mut category.items {
                if item.id == id {
                    item.deleted_at = Some(at);
                }
            }
        }
    }

    /// Raw cart rows, without going through a service.
    #[must_use]
    pub fn cart_rows(&self, user_id: UserId) -> Vec<CartItem> {
        self.tables()
            .cart_items
            .iter()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Every order in the ledger.
    #[must_use]
    pub fn all_orders(&self) -> Vec<Order> {
        self.tables().orders.clone()
    }

    /// Saved addresses of a user.
    #[must_use]
    pub fn addresses(&self, user_id: UserId) -> Vec<Address> {
        self.tables()
            .users
            .iter()
            .find(|u| u.user.id == user_id)
            .map(|u| u.user.addresses.clone())
            .unwrap_or_default()
    }

    /// Number of cart mutations (add, reprice, remove, clear) so far.
    #[must_use]
    pub fn cart_writes(&self) -> usize {
        self.cart_writes.load(Ordering::SeqCst)
    }

    fn count_cart_write(&self) {
        self.cart_writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn new_item(item: &NewReferenceItem, now: DateTime<Utc>) -> ReferenceItem {
    ReferenceItem {
        id: ReferenceItemId::new(),
        key: item.key.as_str().to_owned(),
        name: item.name.clone(),
        description: item.description.clone(),
        sort_order: item.sort_order,
        is_active: item.is_active,
        is_deleted: false,
        metadata: item.metadata.clone(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

#[async_trait]
impl ProductCatalog for MemoryBackend {
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self
            .tables()
            .products
            .get(&id)
            .filter(|stored| stored.deleted_at.is_none())
            .map(|stored| stored.product.clone()))
    }
}

#[async_trait]
impl UserStore for MemoryBackend {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| u.user.id == id && u.deleted_at.is_none())
            .map(|u| u.user.clone()))
    }

    async fn find_credentials(
        &self,
        key: LoginKey<'_>,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| key.matches(&u.user) && u.deleted_at.is_none())
            .map(|u| (u.user.clone(), u.password_hash.clone())))
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self
            .tables()
            .users
            .iter()
            .filter(|u| u.deleted_at.is_none())
            .map(|u| u.user.clone())
            .collect())
    }

    async fn count_with_role(&self, role: Role) -> Result<u64, RepositoryError> {
        let count = self
            .tables()
            .users
            .iter()
            .filter(|u| u.user.role == role && u.deleted_at.is_none())
            .count();
        Ok(count as u64)
    }

    async fn create(&self, new: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables();
        let taken = tables.users.iter().any(|u| {
            u.user.email == new.email || (new.mobile.is_some() && u.user.mobile == new.mobile)
        });
        if taken {
            return Err(RepositoryError::Conflict("user already exists".to_owned()));
        }

        let user = User {
            id: UserId::new(),
            name: new.name,
            email: new.email,
            mobile: new.mobile,
            role: new.role,
            addresses: Vec::new(),
            created_at: Utc::now(),
        };
        tables.users.push(StoredUser {
            user: user.clone(),
            password_hash: new.password_hash,
            deleted_at: None,
        });
        Ok(user)
    }

    async fn append_address(
        &self,
        id: UserId,
        address: &Address,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables();
        let stored = tables
            .users
            .iter_mut()
            .find(|u| u.user.id == id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.user.addresses.contains(address) {
            return Ok(false);
        }
        stored.user.addresses.push(address.clone());
        Ok(true)
    }
}

#[async_trait]
impl CartStore for MemoryBackend {
    async fn items(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        Ok(self.cart_rows(user_id))
    }

    async fn add(&self, new: NewCartItem) -> Result<CartItem, RepositoryError> {
        self.count_cart_write();
        let mut tables = self.tables();
        if let Some(existing) = tables
            .cart_items
            .iter_mut()
            .find(|item| item.user_id == new.user_id && item.product_id == new.product_id)
        {
            existing.quantity += new.quantity;
            return Ok(existing.clone());
        }

        let item = CartItem {
            id: CartItemId::new(),
            user_id: new.user_id,
            product_id: new.product_id,
            name: new.name,
            price: new.price,
            quantity: new.quantity,
        };
        tables.cart_items.push(item.clone());
        Ok(item)
    }

    async fn reprice(&self, id: CartItemId, price: Decimal) -> Result<(), RepositoryError> {
        self.count_cart_write();
        let mut tables = self.tables();
        let item = tables
            .cart_items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(RepositoryError::NotFound)?;
        item.price = price;
        Ok(())
    }

    async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<u64, RepositoryError> {
        self.count_cart_write();
        let mut tables = self.tables();
        let before = tables.cart_items.len();
        tables
            .cart_items
            .retain(|item| !(item.user_id == user_id && item.product_id == product_id));
        Ok((before - tables.cart_items.len()) as u64)
    }

    async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        self.count_cart_write();
        let mut tables = self.tables();
        let before = tables.cart_items.len();
        tables.cart_items.retain(|item| item.user_id != user_id);
        Ok((before - tables.cart_items.len()) as u64)
    }
}

#[async_trait]
impl OrderLedger for MemoryBackend {
    async fn place(
        &self,
        order: NewOrder,
        settlement: CartSettlement,
    ) -> Result<Order, RepositoryError> {
        let mut tables = self.tables();
        let (drained, kept): (Vec<CartItem>, Vec<CartItem>) = tables
            .cart_items
            .drain(..)
            .partition(|item| item.user_id == order.user_id);

        if let CartSettlement::Expect(snapshot) = &settlement
            && !carts_match(snapshot, &drained)
        {
            tables.cart_items = kept.into_iter().chain(drained).collect();
            return Err(RepositoryError::Conflict(
                "cart changed during checkout".to_owned(),
            ));
        }
        tables.cart_items = kept;

        let order = Order::from_new(OrderId::new(), order, Utc::now());
        tables.orders.push(order.clone());
        Ok(order)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .tables()
            .orders
            .iter()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        // Insertion order breaks ties between equal timestamps.
        orders.reverse();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn exists_for_payment(&self, payment_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.tables().orders.iter().any(|order| {
            order
                .payment
                .as_ref()
                .is_some_and(|p| p.razorpay_payment_id == payment_id)
        }))
    }
}

#[async_trait]
impl ReferenceStore for MemoryBackend {
    async fn list(&self) -> Result<Vec<ReferenceCategory>, RepositoryError> {
        Ok(self.tables().categories.clone())
    }

    async fn find(
        &self,
        kind: ReferenceCategoryKind,
    ) -> Result<Option<ReferenceCategory>, RepositoryError> {
        Ok(self
            .tables()
            .categories
            .iter()
            .find(|category| category.key == kind)
            .cloned())
    }

    async fn create(
        &self,
        kind: ReferenceCategoryKind,
        label: &str,
        items: Vec<NewReferenceItem>,
    ) -> Result<ReferenceCategory, RepositoryError> {
        let mut tables = self.tables();
        if tables.categories.iter().any(|category| category.key == kind) {
            return Err(RepositoryError::Conflict("category already exists".to_owned()));
        }

        let now = Utc::now();
        let mut items: Vec<ReferenceItem> = items.iter().map(|item| new_item(item, now)).collect();
        items.sort_by_key(|item| item.sort_order);
        let category = ReferenceCategory {
            id: ReferenceCategoryId::new(),
            category: label.to_owned(),
            key: kind,
            items,
        };
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn append(
        &self,
        id: ReferenceCategoryId,
        items: Vec<NewReferenceItem>,
    ) -> Result<ReferenceCategory, RepositoryError> {
        let mut tables = self.tables();
        let category = tables
            .categories
            .iter_mut()
            .find(|category| category.id == id)
            .ok_or(RepositoryError::NotFound)?;

        let now = Utc::now();
        category
            .items
            .extend(items.iter().map(|item| new_item(item, now)));
        category.items.sort_by_key(|item| item.sort_order);
        Ok(category.clone())
    }

    async fn soft_delete_item(&self, id: ReferenceItemId) -> Result<ReferenceItem, RepositoryError> {
        let mut tables = self.tables();
        let item = tables
            .categories
            .iter_mut()
            .flat_map(|category| category.items.iter_mut())
            .find(|item| item.id == id)
            .ok_or(RepositoryError::NotFound)?;
        if item.is_deleted {
            return Err(RepositoryError::Conflict("item already deleted".to_owned()));
        }

        let now = Utc::now();
        item.is_deleted = true;
        item.deleted_at = Some(now);
        item.updated_at = now;
        Ok(item.clone())
    }
}

#[async_trait]
impl RetentionStore for MemoryBackend {
    async fn purge(
        &self,
        target: RetentionTarget,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let expired = |deleted_at: Option<DateTime<Utc>>| deleted_at.is_some_and(|at| at < cutoff);
        let mut tables = self.tables();
        let removed = match target {
            RetentionTarget::Users => {
                let before = tables.users.len();
                tables.users.retain(|u| !expired(u.deleted_at));
                before - tables.users.len()
            }
            RetentionTarget::Products => {
                let before = tables.products.len();
                tables.products.retain(|_, p| !expired(p.deleted_at));
                before - tables.products.len()
            }
            RetentionTarget::ReferenceItems => tables
                .categories
                .iter_mut()
                .map(|category| {
                    let before = category.items.len();
                    category
                        .items
                        .retain(|item| !(item.is_deleted && expired(item.deleted_at)));
                    before - category.items.len()
                })
                .sum(),
        };
        Ok(removed as u64)
    }
}

// =============================================================================
// Payment processor stand-in
// =============================================================================

/// Records order requests and answers with sequential processor ids.
#[derive(Default)]
pub struct FakeGateway {
    requests: Mutex<Vec<CreateOrderRequest>>,
    orders: Mutex<HashMap<String, ProcessorOrder>>,
    failing: AtomicBool,
}

impl FakeGateway {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every following call fail with a 502-style error.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Register a processor order as if it had been created earlier.
    pub fn open_order(&self, id: &str, amount: i64) {
        self.orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(
                id.to_owned(),
                ProcessorOrder {
                    id: id.to_owned(),
                    amount,
                    currency: "INR".to_owned(),
                    receipt: None,
                    status: Some("created".to_owned()),
                },
            );
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<CreateOrderRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<ProcessorOrder, PaymentError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::Api {
                status: 502,
                message: "upstream unavailable".to_owned(),
            });
        }

        let mut requests = self
            .requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        requests.push(request.clone());
        let order = ProcessorOrder {
            id: format!("order_test{}", requests.len()),
            amount: request.amount,
            currency: request.currency,
            receipt: Some(request.receipt),
            status: Some("created".to_owned()),
        };
        self.orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, id: &str) -> Result<ProcessorOrder, PaymentError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::Api {
                status: 502,
                message: "upstream unavailable".to_owned(),
            });
        }

        self.orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| PaymentError::Api {
                status: 400,
                message: "The id provided does not exist".to_owned(),
            })
    }
}

// =============================================================================
// Test context
// =============================================================================

/// Configuration with an 18% tax rate and INR payments.
///
/// # Panics
///
/// Panics if the hard-coded processor URL fails to parse.
#[must_use]
pub fn test_config() -> ApiConfig {
    ApiConfig {
        database_url: SecretString::from("postgres://unused@localhost/mercato"),
        host: std::net::IpAddr::from([127, 0, 0, 1]),
        port: 0,
        base_url: "https://shop.example.test".to_owned(),
        session_secret: SecretString::from("Zq8vN3mR7tK1wX5yB9cF2hJ6pL4sD0gA"),
        tax_rate: TaxRate::STANDARD,
        retention_days: 60,
        payment: PaymentConfig {
            key_id: "rzp_test_key".to_owned(),
            key_secret: SecretString::from(KEY_SECRET),
            api_base: Url::parse("http://127.0.0.1:9").expect("static url"),
            currency: Currency::INR,
        },
        sentry_dsn: None,
        sentry_environment: None,
        log_json: false,
    }
}

/// Application state over in-memory stores, with handles for assertions.
pub struct TestContext {
    pub backend: Arc<MemoryBackend>,
    pub gateway: Arc<FakeGateway>,
    pub state: AppState,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let backend = MemoryBackend::new();
        let gateway = FakeGateway::new();
        let state = AppState::from_parts(
            test_config(),
            backend.stores(),
            gateway.clone(),
            None,
        );
        Self {
            backend,
            gateway,
            state,
        }
    }

    /// The full router with an in-memory session store and signed cookies.
    #[must_use]
    pub fn app(&self) -> Router {
        let key = cookie_key(&self.state.config().session_secret);
        routes::routes()
            .layer(
                SessionManagerLayer::new(MemoryStore::default())
                    .with_secure(false)
                    .with_signed(key),
            )
            .with_state(self.state.clone())
    }

    /// A processor signature for `order_id|payment_id` under the test key.
    #[must_use]
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        SignatureVerifier::new(SecretString::from(KEY_SECRET)).sign(order_id, payment_id)
    }

    #[must_use]
    pub fn customer(&self, name: &str) -> User {
        self.backend.insert_user(name, Role::Customer)
    }

    #[must_use]
    pub fn product(&self, name: &str, price: i64) -> Product {
        self.backend.insert_product(name, Decimal::from(price))
    }
}
