//! Top-level entry point that owns every entity store over one injected
//! [`RecordStorage`], with an explicit `init()`/`dispose()` lifecycle.
//!
//! The console is configured via [`ConsoleBuilder`] and handed to the view
//! layer by reference; there is no global store state.

use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::{AuthStore, Authenticator, StaticAuthenticator};
use crate::cipher::TokenCipher;
use crate::dashboard::Dashboard;
use crate::domain::{Dispatch, DispatchBoard, PatientReport, Staff, Vehicle};
use crate::error::StoreError;
use crate::ids::{Clock, IdGenerator, SystemClock, UuidGenerator};
use crate::storage::{FileStorage, MemoryStorage, RecordStorage};
use crate::store::EntityStore;

/// The dispatch console's record layer.
///
/// Holds the staff, vehicle, patient-report and dispatch stores plus the
/// auth store, all sharing one storage backend, id generator and clock.
pub struct Console {
    storage: Arc<dyn RecordStorage>,
    staff: EntityStore<Staff>,
    vehicles: EntityStore<Vehicle>,
    reports: EntityStore<PatientReport>,
    dispatches: DispatchBoard,
    auth: AuthStore,
}

// Manual `Debug` to keep the output to one line per store.
impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("storage", &self.storage)
            .field("staff", &self.staff.len())
            .field("vehicles", &self.vehicles.len())
            .field("reports", &self.reports.len())
            .field("dispatches", &self.dispatches.store().len())
            .finish()
    }
}

impl Console {
    /// Create a [`ConsoleBuilder`] with default configuration.
    pub fn builder() -> ConsoleBuilder {
        ConsoleBuilder::new()
    }

    /// Populate every store from storage and restore the session token.
    ///
    /// Every store is attempted even if an earlier one fails; each failing
    /// store records its own error message.
    ///
    /// # Errors
    ///
    /// The first [`StoreError`] encountered, in the order session, staff,
    /// vehicles, reports, dispatches.
    pub async fn init(&self) -> Result<(), StoreError> {
        let session = self.auth.restore().await.map_err(StoreError::from);
        let results = [
            session.map(|_| ()),
            self.staff.load().await,
            self.vehicles.load().await,
            self.reports.load().await,
            self.dispatches.load().await,
        ];

        let mut first_error = None;
        for result in results {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!(
                    staff = self.staff.len(),
                    vehicles = self.vehicles.len(),
                    reports = self.reports.len(),
                    dispatches = self.dispatches.store().len(),
                    "console initialized"
                );
                Ok(())
            }
        }
    }

    /// Reset every in-memory cache, the active dispatch and the signed-in
    /// session to their empty state.
    ///
    /// Storage is untouched, so a later [`init`](Console::init) reloads
    /// everything. Receivers from `subscribe()` stay connected: they are
    /// notified of the emptied state and of everything after it.
    pub fn dispose(&self) {
        self.staff.reset();
        self.vehicles.reset();
        self.reports.reset();
        self.dispatches.reset();
        self.auth.reset();
        tracing::debug!("console disposed");
    }

    pub fn staff(&self) -> &EntityStore<Staff> {
        &self.staff
    }

    pub fn vehicles(&self) -> &EntityStore<Vehicle> {
        &self.vehicles
    }

    pub fn reports(&self) -> &EntityStore<PatientReport> {
        &self.reports
    }

    pub fn dispatches(&self) -> &DispatchBoard {
        &self.dispatches
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    /// The shared storage backend.
    pub fn storage(&self) -> &Arc<dyn RecordStorage> {
        &self.storage
    }

    /// Dashboard figures computed from the current caches.
    pub fn dashboard(&self) -> Dashboard {
        self.staff.with_records(|staff| {
            self.vehicles.with_records(|vehicles| {
                self.reports.with_records(|reports| {
                    self.dispatches.store().with_records(|dispatches: &[Dispatch]| {
                        Dashboard::compute(staff, vehicles, reports, dispatches)
                    })
                })
            })
        })
    }
}

/// Builder for configuring and opening a [`Console`].
///
/// Storage is chosen in this order: an explicit
/// [`storage`](ConsoleBuilder::storage), then a
/// [`FileStorage`] at [`base_dir`](ConsoleBuilder::base_dir), then a fresh
/// [`MemoryStorage`].
///
/// # Examples
///
/// ```no_run
/// use dispatch_store::Console;
///
/// # async fn example() -> Result<(), dispatch_store::StoreError> {
/// let console = Console::builder()
///     .base_dir("/var/lib/dispatch")
///     .open()
///     .await?;
/// assert!(!console.auth().is_authenticated());
/// # Ok(())
/// # }
/// ```
pub struct ConsoleBuilder {
    storage: Option<Arc<dyn RecordStorage>>,
    base_dir: Option<PathBuf>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    authenticator: Arc<dyn Authenticator>,
    encryption_key: Option<[u8; 32]>,
}

impl ConsoleBuilder {
    /// Create a builder with UUID ids, the system clock, an authenticator
    /// with no accounts and no encryption key.
    pub fn new() -> Self {
        Self {
            storage: None,
            base_dir: None,
            ids: Arc::new(UuidGenerator),
            clock: Arc::new(SystemClock),
            authenticator: Arc::new(StaticAuthenticator::new()),
            encryption_key: None,
        }
    }

    /// Use an existing storage backend. Takes precedence over
    /// [`base_dir`](ConsoleBuilder::base_dir).
    pub fn storage(mut self, storage: Arc<dyn RecordStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Persist records as files under `path`.
    pub fn base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(path.into());
        self
    }

    /// Override how record ids are generated.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Override the source of creation timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override how logins are checked.
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// AES-256 key used to seal the persisted session token.
    ///
    /// Without one, a random key is generated per console, so a token
    /// saved by one process cannot be restored by the next.
    pub fn encryption_key(mut self, key: [u8; 32]) -> Self {
        self.encryption_key = Some(key);
        self
    }

    /// Construct the console without touching storage.
    pub fn build(self) -> Console {
        let storage: Arc<dyn RecordStorage> = match (self.storage, self.base_dir) {
            (Some(storage), _) => storage,
            (None, Some(dir)) => Arc::new(FileStorage::new(dir)),
            (None, None) => Arc::new(MemoryStorage::new()),
        };
        let cipher = match self.encryption_key {
            Some(key) => TokenCipher::new(key),
            None => {
                tracing::debug!("no encryption key configured, using an ephemeral key");
                TokenCipher::ephemeral()
            }
        };

        Console {
            staff: EntityStore::new(storage.clone(), self.ids.clone(), self.clock.clone()),
            vehicles: EntityStore::new(storage.clone(), self.ids.clone(), self.clock.clone()),
            reports: EntityStore::new(storage.clone(), self.ids.clone(), self.clock.clone()),
            dispatches: DispatchBoard::new(EntityStore::new(
                storage.clone(),
                self.ids,
                self.clock,
            )),
            auth: AuthStore::new(storage.clone(), self.authenticator, cipher),
            storage,
        }
    }

    /// Construct the console and [`init`](Console::init) it.
    ///
    /// # Errors
    ///
    /// Returns the first load failure from [`Console::init`].
    pub async fn open(self) -> Result<Console, StoreError> {
        let console = self.build();
        console.init().await?;
        Ok(console)
    }
}

impl Default for ConsoleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NextOfKin, StaffDraft, StaffStatus};
    use crate::ids::{FixedClock, SequentialIds};

    fn crew(status: StaffStatus) -> StaffDraft {
        StaffDraft {
            name: "Jane".into(),
            surname: "Doe".into(),
            hpcsa_number: "PA1".into(),
            email: "jane@example.org".into(),
            contact: "082 555 0100".into(),
            next_of_kin: NextOfKin {
                name: "John Doe".into(),
                relationship: "spouse".into(),
                ..Default::default()
            },
            status,
            ..Default::default()
        }
    }

    #[test]
    fn builder_defaults_to_memory_storage() {
        let console = Console::builder().build();
        assert!(format!("{:?}", console.storage()).contains("MemoryStorage"));
    }

    #[test]
    fn builder_base_dir_uses_file_storage() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let console = Console::builder().base_dir(tmp.path()).build();
        assert!(format!("{:?}", console.storage()).contains("FileStorage"));
    }

    #[test]
    fn explicit_storage_wins_over_base_dir() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let console = Console::builder()
            .base_dir(tmp.path())
            .storage(Arc::new(MemoryStorage::new()))
            .build();
        assert!(format!("{:?}", console.storage()).contains("MemoryStorage"));
    }

    #[tokio::test]
    async fn init_reports_first_failure_but_loads_the_rest() {
        let storage = Arc::new(MemoryStorage::new());
        let console = Console::builder()
            .storage(storage.clone())
            .id_generator(Arc::new(SequentialIds::new("s")))
            .clock(Arc::new(FixedClock(0)))
            .build();
        console
            .staff()
            .add(crew(StaffStatus::Available))
            .await
            .expect("add");

        storage.fail_reads(true);
        assert!(console.init().await.is_err());
        assert_eq!(console.staff().error().as_deref(), Some("Failed to load staff"));
        assert_eq!(
            console.dispatches().store().error().as_deref(),
            Some("Failed to load dispatches")
        );

        storage.fail_reads(false);
        console.init().await.expect("init");
        assert_eq!(console.staff().len(), 1);
        assert_eq!(console.staff().error(), None);
    }

    #[tokio::test]
    async fn dispose_clears_caches_and_subscribers_see_it() {
        let console = Console::builder().build();
        let mut rx = console.staff().subscribe();
        console
            .staff()
            .add(crew(StaffStatus::OffDuty))
            .await
            .expect("add");
        rx.borrow_and_update();

        console.dispose();
        assert!(rx.has_changed().expect("sender alive"));
        assert!(rx.borrow().records.is_empty());

        // Records are still in storage.
        console.init().await.expect("init");
        assert_eq!(console.staff().len(), 1);
    }
}
