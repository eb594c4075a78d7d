//! Shared fixtures for the cart sync integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use storefront_core::{CartLine, CartSnapshot, Money, ProductId, ProductRef};
use storefront_sync::{
    AuthRedirect, BackendError, BackendResult, CartBackend, CartSync, Credential,
    SessionCredentials, StorefrontConfig,
};
use tokio::sync::{mpsc, oneshot};

// =============================================================================
// Builders
// =============================================================================

pub fn pid(id: &str) -> ProductId {
    ProductId::new(id).unwrap()
}

/// Catalog price the fake server uses for new lines.
pub fn catalog_price(id: &str) -> Money {
    match id {
        "p1" => Money::from_cents(999),
        "p2" => Money::from_cents(1500),
        "p3" => Money::from_cents(250),
        _ => Money::from_cents(100),
    }
}

pub fn product(id: &str) -> ProductRef {
    ProductRef::new(pid(id), catalog_price(id))
}

pub fn line(id: &str, quantity: i64) -> CartLine {
    CartLine::new(pid(id), quantity, catalog_price(id))
}

pub fn snapshot(lines: Vec<CartLine>) -> CartSnapshot {
    CartSnapshot {
        total_item_count: lines.iter().map(|l| l.quantity).sum(),
        subtotal: lines.iter().map(CartLine::line_total).sum(),
        lines,
    }
}

// =============================================================================
// Redirect
// =============================================================================

#[derive(Default)]
pub struct CountingRedirect {
    logins: AtomicUsize,
    expirations: AtomicUsize,
}

impl CountingRedirect {
    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn expirations(&self) -> usize {
        self.expirations.load(Ordering::SeqCst)
    }
}

impl AuthRedirect for CountingRedirect {
    fn redirect_to_login(&self) {
        self.logins.fetch_add(1, Ordering::SeqCst);
    }

    fn session_expired(&self) {
        self.expirations.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness<B> {
    pub cart: CartSync,
    pub backend: Arc<B>,
    pub session: Arc<SessionCredentials>,
    pub redirect: Arc<CountingRedirect>,
}

pub fn signed_in<B: CartBackend + 'static>(backend: B) -> Harness<B> {
    build(backend, SessionCredentials::signed_in(Credential::bearer("token")))
}

pub fn signed_out<B: CartBackend + 'static>(backend: B) -> Harness<B> {
    build(backend, SessionCredentials::new())
}

fn build<B: CartBackend + 'static>(backend: B, session: SessionCredentials) -> Harness<B> {
    let backend = Arc::new(backend);
    let session = Arc::new(session);
    let redirect = Arc::new(CountingRedirect::default());
    let cart = CartSync::new(
        backend.clone(),
        session.clone(),
        redirect.clone(),
        &StorefrontConfig::default(),
    )
    .unwrap();

    Harness {
        cart,
        backend,
        session,
        redirect,
    }
}

// =============================================================================
// Scripted Backend
// =============================================================================

/// In-memory server cart with stock limits and one-shot failure injection.
#[derive(Default)]
pub struct ScriptedBackend {
    lines: Mutex<Vec<CartLine>>,
    stock: Mutex<HashMap<ProductId, i64>>,
    failures: Mutex<HashMap<&'static str, BackendError>>,
    hanging: Mutex<HashSet<&'static str>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines(lines: Vec<CartLine>) -> Self {
        let backend = Self::default();
        *backend.lines.lock().unwrap() = lines;
        backend
    }

    pub fn set_stock(&self, id: &str, available: i64) {
        self.stock.lock().unwrap().insert(pid(id), available);
    }

    /// The next call to `op` fails with `err`.
    pub fn fail_once(&self, op: &'static str, err: BackendError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    /// Calls to `op` never answer.
    pub fn hang(&self, op: &'static str) {
        self.hanging.lock().unwrap().insert(op);
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn server_lines(&self) -> Vec<CartLine> {
        self.lines.lock().unwrap().clone()
    }

    async fn enter(&self, op: &'static str) -> BackendResult<()> {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;

        if self.hanging.lock().unwrap().contains(op) {
            std::future::pending::<()>().await;
        }

        match self.failures.lock().unwrap().remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn check_stock(&self, product_id: &ProductId, quantity: i64) -> BackendResult<()> {
        match self.stock.lock().unwrap().get(product_id) {
            Some(&available) if quantity > available => Err(BackendError::rejected(
                "OUT_OF_STOCK",
                format!("Only {} left in stock", available),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CartBackend for ScriptedBackend {
    async fn fetch_cart(&self, _credential: &Credential) -> BackendResult<CartSnapshot> {
        self.enter("fetch_cart").await?;
        Ok(snapshot(self.server_lines()))
    }

    async fn fetch_item_count(&self, _credential: &Credential) -> BackendResult<i64> {
        self.enter("fetch_item_count").await?;
        Ok(self.server_lines().iter().map(|l| l.quantity).sum())
    }

    async fn add_item(
        &self,
        _credential: &Credential,
        product_id: &ProductId,
        quantity: i64,
    ) -> BackendResult<CartLine> {
        self.enter("add_item").await?;

        let mut lines = self.lines.lock().unwrap();
        let existing = lines
            .iter()
            .find(|l| &l.product_id == product_id)
            .map(|l| l.quantity)
            .unwrap_or(0);
        self.check_stock(product_id, existing + quantity)?;

        match lines.iter_mut().find(|l| &l.product_id == product_id) {
            Some(l) => {
                l.quantity += quantity;
                Ok(l.clone())
            }
            None => {
                let new_line = line(product_id.as_str(), quantity);
                lines.push(new_line.clone());
                Ok(new_line)
            }
        }
    }

    async fn update_item(
        &self,
        _credential: &Credential,
        product_id: &ProductId,
        quantity: i64,
    ) -> BackendResult<CartLine> {
        self.enter("update_item").await?;
        self.check_stock(product_id, quantity)?;

        let mut lines = self.lines.lock().unwrap();
        match lines.iter_mut().find(|l| &l.product_id == product_id) {
            Some(l) => {
                l.quantity = quantity;
                Ok(l.clone())
            }
            None => Err(BackendError::rejected("NOT_IN_CART", "Item is no longer in your cart")),
        }
    }

    async fn remove_item(
        &self,
        _credential: &Credential,
        product_id: &ProductId,
    ) -> BackendResult<bool> {
        self.enter("remove_item").await?;
        let mut lines = self.lines.lock().unwrap();
        let before = lines.len();
        lines.retain(|l| &l.product_id != product_id);
        Ok(lines.len() < before)
    }

    async fn clear_cart(&self, _credential: &Credential) -> BackendResult<bool> {
        self.enter("clear_cart").await?;
        self.lines.lock().unwrap().clear();
        Ok(true)
    }
}

// =============================================================================
// Gated Backend
// =============================================================================

/// A request seen by [`GatedBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchCart,
    ItemCount,
    Add(ProductId, i64),
    Update(ProductId, i64),
    Remove(ProductId),
    Clear,
}

pub enum Reply {
    Cart(BackendResult<CartSnapshot>),
    Count(BackendResult<i64>),
    Line(BackendResult<CartLine>),
    Ack(BackendResult<bool>),
}

/// A parked request; the test decides when and how it answers.
pub struct Pending {
    pub call: Call,
    reply: oneshot::Sender<Reply>,
}

impl Pending {
    pub fn reply(self, reply: Reply) {
        let _ = self.reply.send(reply);
    }
}

/// Backend that parks every call until the test answers it.
pub struct GatedBackend {
    calls: mpsc::UnboundedSender<Pending>,
}

impl GatedBackend {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Pending>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (GatedBackend { calls: tx }, rx)
    }

    async fn ask(&self, call: Call) -> Reply {
        let (tx, rx) = oneshot::channel();
        if self.calls.send(Pending { call, reply: tx }).is_err() {
            return Reply::Ack(Err(BackendError::Transport("gate closed".into())));
        }
        rx.await
            .unwrap_or_else(|_| Reply::Ack(Err(BackendError::Transport("reply dropped".into()))))
    }
}

fn mismatched<T>() -> BackendResult<T> {
    Err(BackendError::InvalidResponse("mismatched reply".into()))
}

#[async_trait]
impl CartBackend for GatedBackend {
    async fn fetch_cart(&self, _credential: &Credential) -> BackendResult<CartSnapshot> {
        match self.ask(Call::FetchCart).await {
            Reply::Cart(result) => result,
            _ => mismatched(),
        }
    }

    async fn fetch_item_count(&self, _credential: &Credential) -> BackendResult<i64> {
        match self.ask(Call::ItemCount).await {
            Reply::Count(result) => result,
            _ => mismatched(),
        }
    }

    async fn add_item(
        &self,
        _credential: &Credential,
        product_id: &ProductId,
        quantity: i64,
    ) -> BackendResult<CartLine> {
        match self.ask(Call::Add(product_id.clone(), quantity)).await {
            Reply::Line(result) => result,
            _ => mismatched(),
        }
    }

    async fn update_item(
        &self,
        _credential: &Credential,
        product_id: &ProductId,
        quantity: i64,
    ) -> BackendResult<CartLine> {
        match self.ask(Call::Update(product_id.clone(), quantity)).await {
            Reply::Line(result) => result,
            _ => mismatched(),
        }
    }

    async fn remove_item(
        &self,
        _credential: &Credential,
        product_id: &ProductId,
    ) -> BackendResult<bool> {
        match self.ask(Call::Remove(product_id.clone())).await {
            Reply::Ack(result) => result,
            _ => mismatched(),
        }
    }

    async fn clear_cart(&self, _credential: &Credential) -> BackendResult<bool> {
        match self.ask(Call::Clear).await {
            Reply::Ack(result) => result,
            _ => mismatched(),
        }
    }
}
