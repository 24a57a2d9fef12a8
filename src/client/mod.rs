//! Shopper-side cart: the Cart Store service and its persistence backends.

pub mod api;
pub mod kv;
pub mod local;
pub mod repository;
pub mod service;

pub use api::{ApiClient, CouponGateway, RemoteCartRepository};
pub use kv::{FileStore, KeyValueStore, KvError, MemoryKv};
pub use local::{GuestCartEntry, LocalCartRepository, GUEST_CART_KEY};
pub use repository::CartRepository;
pub use service::{AuthSession, CartService, Notice, NoticeLevel, Notifier, RecordingNotifier, SessionState, TracingNotifier};
