//! Reference-counted driver registration.
//!
//! Drivers are registered process-wide, but many work units may use the same
//! driver concurrently. Each unit holds a [`DriverHandle`]; the driver is
//! registered when the first handle is acquired and deregistered only when the
//! last one is released, so one unit finishing never breaks another that is
//! still running.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tracing::{debug, info, warn};

use crate::core::traits::Driver;
use crate::error::{RecordError, Result};

struct Registration {
    driver: Arc<dyn Driver>,
    handles: usize,
}

/// Registry of drivers in use.
///
/// [`DriverRegistry::global`] is the process-wide instance; tests can use an
/// owned registry from [`DriverRegistry::new`].
#[derive(Default)]
pub struct DriverRegistry {
    registrations: Mutex<HashMap<String, Registration>>,
}

static GLOBAL: OnceLock<Arc<DriverRegistry>> = OnceLock::new();

impl DriverRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The process-wide registry.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(DriverRegistry::new))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Registration>> {
        // A panic while holding the lock cannot leave a count half-updated.
        match self.registrations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Acquire a handle on `driver`, registering it if no handle is live.
    ///
    /// # Errors
    ///
    /// `RecordError::ResourceAcquisition` when the driver fails to register.
    pub fn acquire(self: &Arc<Self>, driver: Arc<dyn Driver>) -> Result<DriverHandle> {
        let id = driver.id().to_string();
        let mut registrations = self.lock();

        match registrations.get_mut(&id) {
            Some(registration) => {
                registration.handles += 1;
                debug!(driver = %id, handles = registration.handles, "driver handle acquired");
            }
            None => {
                driver.register().map_err(|e| {
                    RecordError::resource(
                        e,
                        format!("registering driver '{}' ({})", id, driver.scheme()),
                    )
                })?;
                info!(driver = %id, scheme = driver.scheme(), "driver registered");
                registrations.insert(id.clone(), Registration { driver, handles: 1 });
            }
        }

        Ok(DriverHandle {
            registry: Arc::clone(self),
            id,
            released: false,
        })
    }

    /// Number of live handles on a driver.
    pub fn handle_count(&self, id: &str) -> usize {
        self.lock().get(id).map_or(0, |r| r.handles)
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    fn release(&self, id: &str) {
        let mut registrations = self.lock();
        let Some(registration) = registrations.get_mut(id) else {
            warn!(driver = %id, "released a driver that is not registered");
            return;
        };

        registration.handles -= 1;
        if registration.handles > 0 {
            debug!(driver = %id, handles = registration.handles, "driver handle released");
            return;
        }

        if let Some(registration) = registrations.remove(id) {
            registration.driver.deregister();
            info!(driver = %id, "driver deregistered");
        }
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registrations = self.lock();
        let counts: HashMap<&str, usize> = registrations
            .iter()
            .map(|(id, r)| (id.as_str(), r.handles))
            .collect();
        f.debug_struct("DriverRegistry")
            .field("registrations", &counts)
            .finish()
    }
}

/// A live claim on a registered driver. Released explicitly or on drop.
#[derive(Debug)]
pub struct DriverHandle {
    registry: Arc<DriverRegistry>,
    id: String,
    released: bool,
}

impl DriverHandle {
    pub fn driver_id(&self) -> &str {
        &self.id
    }

    /// Release the handle now.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release(&self.id);
        }
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.release_once();
    }
}
