use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::algorithm::{KeyAlgorithm, PrivateKey, PublicKey, algorithm_for};
use crate::clock::{Clock, SystemClock};
use crate::config::KeyManagerConfig;
use crate::error::{KeyError, Result};
use crate::key_type::KeyType;
use crate::keypair::KeyPair;
use crate::ring::{KeyRing, Slot};
use crate::rotation::{self, RotationHandle};
use crate::store::KeyStore;

/// Contract consumed by the signing and key-publishing endpoints.
pub trait KeyManager: Send + Sync {
    /// Id and decoded private key of the current signing key.
    fn get_private_key(&self) -> Result<(String, PrivateKey)>;

    /// Decoded public keys of every populated slot, keyed by key id.
    fn get_public_keys(&self) -> Result<BTreeMap<String, PublicKey>>;

    /// Generate a fresh key pair of the configured type. Does not touch the ring.
    fn generate_key(&self) -> Result<KeyPair>;

    /// Persist the in-memory ring.
    fn write_entry(&self) -> Result<()>;

    fn key_type(&self) -> KeyType;
}

/// What one rotation step changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// The next slot was regenerated.
    pub prepared: bool,
    /// Current and next were swapped.
    pub rotated: bool,
}

/// Key manager backed by a JSON key file, rotating between two slots.
///
/// A single `RwLock` guards the ring. Reads (signing, key publishing) share
/// it; slot replacement, designator swaps and persistence take it
/// exclusively. Writes happen a few times per rotation period, so one coarse
/// lock is enough.
pub struct DiskKeyManager {
    config: KeyManagerConfig,
    algorithm: Box<dyn KeyAlgorithm>,
    store: KeyStore,
    clock: Arc<dyn Clock>,
    ring: RwLock<Option<KeyRing>>,
    rotation: Mutex<Option<RotationHandle>>,
}

impl DiskKeyManager {
    pub fn new(config: KeyManagerConfig) -> Result<Self> {
        config.validate()?;
        let algorithm = algorithm_for(config.key_type)?;
        let store = KeyStore::new(config.path.clone());
        Ok(Self {
            config,
            algorithm,
            store,
            clock: Arc::new(SystemClock),
            ring: RwLock::new(None),
            rotation: Mutex::new(None),
        })
    }

    /// Replace the time source used for issuance and rotation.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &KeyManagerConfig {
        &self.config
    }

    /// Load the ring from disk, or create and persist a fresh one with a
    /// single key in slot A.
    pub fn load_or_bootstrap(&self) -> Result<()> {
        let mut guard = self.ring.write().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return Err(KeyError::AlreadyInitialized);
        }

        let now = self.clock.now();
        let ring = match self.store.load(now)? {
            Some(ring) => {
                info!(path = %self.store.path().display(), "Loaded key ring");
                ring
            }
            None => {
                let ring = KeyRing::bootstrap(self.generate_key()?);
                self.store.save(&ring)?;
                info!(path = %self.store.path().display(), "Created new key ring");
                ring
            }
        };

        // Fail at startup rather than on the first signing request when the
        // file holds keys of another type.
        self.algorithm.decode_private(&ring.current().private_key)?;

        if ring.current().is_expired(now) {
            warn!(
                slot = %ring.current_slot(),
                expired_at = %ring.current().expires_at,
                "Current key has already expired; rotation will replace it"
            );
        }
        debug!(current = %ring.current_slot(), key_id = %ring.current().id, "Current key");

        *guard = Some(ring);
        Ok(())
    }

    /// Load or bootstrap the ring and start the rotation scheduler.
    ///
    /// Must be called once, from within a Tokio runtime.
    pub fn initialize(self: &Arc<Self>) -> Result<()> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(KeyError::Config(
                "initialize must run inside a Tokio runtime".into(),
            ));
        }
        self.load_or_bootstrap()?;

        let handle = rotation::spawn(Arc::downgrade(self), self.config.check_interval);
        *self.rotation.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        info!("KeyManager is initialized");
        Ok(())
    }

    /// Stop the rotation scheduler and wait for it to exit.
    pub async fn stop(&self) {
        let handle = self
            .rotation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    pub fn is_rotating(&self) -> bool {
        self.rotation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Snapshot of the in-memory ring.
    pub fn ring(&self) -> Result<KeyRing> {
        self.read(|ring| ring.clone())
    }

    pub fn current_slot(&self) -> Result<Slot> {
        self.read(|ring| ring.current_slot())
    }

    /// One scheduler step at `now`: regenerate the next slot once the
    /// current key passes half-life, then swap designators once it passes
    /// five sixths of its lifetime. Each change is persisted before it
    /// becomes visible.
    pub fn rotate_tick(&self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let mut outcome = TickOutcome::default();

        let (should_prepare, current) =
            self.read(|ring| (ring.should_prepare_next(now), ring.current_slot()))?;
        if should_prepare {
            info!(slot = %current, "Current key passed half-life, preparing successor");
            // Generation can be slow (RSA), so it runs without the lock.
            let key_pair = self.generate_key_at(now)?;
            let prepared = self.update(|ring| {
                if !ring.should_prepare_next(now) {
                    return None;
                }
                let slot = ring.next_slot();
                ring.replace_next(key_pair);
                Some(slot)
            })?;
            if let Some(slot) = prepared {
                info!(slot = %slot, "Generated new key pair before rotation");
                outcome.prepared = true;
            }
        }

        let activated = self.update(|ring| {
            (ring.should_rotate(now) && ring.swap()).then(|| ring.current_slot())
        })?;
        if let Some(slot) = activated {
            info!(slot = %slot, "Key is activated");
            outcome.rotated = true;
        }

        Ok(outcome)
    }

    pub(crate) fn tick(&self) -> Result<TickOutcome> {
        self.rotate_tick(self.clock.now())
    }

    fn generate_key_at(&self, now: DateTime<Utc>) -> Result<KeyPair> {
        let (private_key, public_key) = self.algorithm.generate()?;
        KeyPair::new(private_key, public_key, now, self.config.lifetime())
    }

    fn read<T>(&self, f: impl FnOnce(&KeyRing) -> T) -> Result<T> {
        let guard = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        let ring = guard.as_ref().ok_or(KeyError::NotInitialized)?;
        Ok(f(ring))
    }

    /// Apply `f` to a copy of the ring; if it reports a change, persist the
    /// copy and only then install it. The write lock is held throughout.
    fn update<T>(&self, f: impl FnOnce(&mut KeyRing) -> Option<T>) -> Result<Option<T>> {
        let mut guard = self.ring.write().unwrap_or_else(PoisonError::into_inner);
        let mut staged = guard.as_ref().ok_or(KeyError::NotInitialized)?.clone();
        let Some(changed) = f(&mut staged) else {
            return Ok(None);
        };
        self.store.save(&staged)?;
        *guard = Some(staged);
        Ok(Some(changed))
    }
}

impl KeyManager for DiskKeyManager {
    fn get_private_key(&self) -> Result<(String, PrivateKey)> {
        let guard = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        let current = guard.as_ref().ok_or(KeyError::NotInitialized)?.current();
        let key = self.algorithm.decode_private(&current.private_key)?;
        Ok((current.id.clone(), key))
    }

    fn get_public_keys(&self) -> Result<BTreeMap<String, PublicKey>> {
        let guard = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        let ring = guard.as_ref().ok_or(KeyError::NotInitialized)?;
        ring.key_pairs()
            .map(|kp| -> Result<(String, PublicKey)> {
                Ok((kp.id.clone(), self.algorithm.decode_public(&kp.public_key)?))
            })
            .collect()
    }

    fn generate_key(&self) -> Result<KeyPair> {
        self.generate_key_at(self.clock.now())
    }

    fn write_entry(&self) -> Result<()> {
        let guard = self.ring.write().unwrap_or_else(PoisonError::into_inner);
        let ring = guard.as_ref().ok_or(KeyError::NotInitialized)?;
        self.store.save(ring)
    }

    fn key_type(&self) -> KeyType {
        self.algorithm.key_type()
    }
}
