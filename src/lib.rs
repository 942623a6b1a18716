//! Typed, persisted entity stores for a medical transport dispatch console.
//!
//! Staff, vehicles, patient reports and dispatches each live in an
//! [`EntityStore`] that mirrors one collection of a pluggable
//! [`RecordStorage`]. [`Console`] wires the stores together with the
//! sign-in [`AuthStore`] and owns their `init()`/`dispose()` lifecycle.

mod auth;
pub use auth::{
    AuthState, AuthStore, Authenticator, SESSION_COLLECTION, Session, StaticAuthenticator, User,
};
mod cipher;
pub use cipher::TokenCipher;
mod console;
pub use console::{Console, ConsoleBuilder};
mod dashboard;
pub use dashboard::{Dashboard, VehicleMarker};
pub mod domain;
mod error;
mod ids;
mod record;
mod storage;
mod store;

pub use error::{AuthError, StorageError, StoreError, ValidationError};
pub use ids::{Clock, FixedClock, IdGenerator, SequentialIds, SystemClock, UuidGenerator};
pub use record::{Record, Validate};
pub use storage::{FileStorage, MemoryStorage, RecordStorage};
pub use store::{EntityStore, StoreState};
