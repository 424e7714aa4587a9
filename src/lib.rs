//! # salvo-connect-session
//!
//! Connect/express-style session middleware for the Salvo web framework.
//!
//! The middleware resolves a signed session id from the request cookie,
//! loads or generates a mutable session record, and decides at response
//! time whether to persist it, refresh its expiry, destroy it, or leave
//! it alone — driven by content hashing rather than explicit dirty flags,
//! with the express-session `resave` / `rolling` / `saveUninitialized` /
//! `unset` policies. Cookies use the express-compatible `s:`-prefixed
//! HMAC-SHA256 format, and stored records use the connect-redis JSON
//! shape, so sessions interoperate with Node.js applications.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use salvo_core::prelude::*;
//! use salvo_connect_session::{MemoryStore, SessionConfig, SessionDepotExt, SessionHandler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!     let config = SessionConfig::new("keyboard cat")
//!         .with_max_age(86400u64)
//!         .with_save_uninitialized(false);
//!
//!     let session_handler = SessionHandler::new(store, config).unwrap();
//!
//!     let router = Router::new().hoop(session_handler).get(index);
//!
//!     Server::new(TcpListener::bind("127.0.0.1:5800").await)
//!         .serve(router)
//!         .await;
//! }
//!
//! #[handler]
//! async fn index(depot: &mut Depot) -> String {
//!     let session = depot.session_mut().unwrap();
//!     let views: i32 = session.get("views").unwrap_or(0);
//!     session.set("views", views + 1);
//!     format!("{} views", views + 1)
//! }
//! ```

pub mod config;
pub mod cookie;
pub mod cookie_signature;
pub mod error;
pub mod handler;
pub mod session;
pub mod store;

pub use config::{IdGenerator, SameSite, SecurePolicy, SessionConfig, UnsetPolicy};
pub use cookie::SessionCookie;
pub use error::SessionError;
pub use handler::SessionHandler;
pub use session::{data_hash, Session, SessionData};
pub use store::{MemoryStore, SessionStore, StoreReadiness};

/// Extension trait for Depot to easily access session
pub mod depot_ext;
pub use depot_ext::SessionDepotExt;
