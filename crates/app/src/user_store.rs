//! Per-adapter registry of bridge users.
//!
//! Each adapter owns one [`UserStore`], parameterised by its own session
//! type. The inner `std::sync::Mutex` is only ever taken inside the
//! synchronous methods below, so no guard can live across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use spokes_domain::device::{Device, merge_devices};
use spokes_domain::id::{BridgeId, DeviceUid, UserId};
use spokes_domain::sensor::{ActiveSensor, ActiveSensors};
use spokes_domain::time::{self, Timestamp};

/// One registered user of a bridge variant.
#[derive(Debug, Clone)]
pub struct BridgeUser<S> {
    pub uid: UserId,
    pub bridge_id: BridgeId,
    pub session: S,
    pub devices: Vec<Device>,
    pub active_sensors: ActiveSensors,
    pub registered_at: Timestamp,
}

impl<S> BridgeUser<S> {
    #[must_use]
    pub fn new(uid: UserId, bridge_id: BridgeId, session: S) -> Self {
        Self {
            uid,
            bridge_id,
            session,
            devices: Vec::new(),
            active_sensors: ActiveSensors::default(),
            registered_at: time::now(),
        }
    }

    #[must_use]
    pub fn find_device(&self, uid: &DeviceUid) -> Option<&Device> {
        self.devices.iter().find(|d| &d.uid == uid)
    }
}

/// Result of merging a discovery pass into a user's device list.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// `true` when at least one unseen UID was appended.
    pub changed: bool,
    pub bridge_id: BridgeId,
    /// The full list after the merge.
    pub devices: Vec<Device>,
}

/// Users of one adapter, keyed by vendor-scoped uid.
#[derive(Debug)]
pub struct UserStore<S> {
    users: Mutex<HashMap<UserId, BridgeUser<S>>>,
}

impl<S> Default for UserStore<S> {
    fn default() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }
}

impl<S> UserStore<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, BridgeUser<S>>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a user, replacing any previous registration wholesale.
    pub fn insert(&self, user: BridgeUser<S>) {
        self.lock().insert(user.uid.clone(), user);
    }

    /// Register a user or, if known, only refresh its bridge id and session.
    ///
    /// Returns `true` when the user was new.
    pub fn upsert_session(&self, uid: UserId, bridge_id: BridgeId, session: S) -> bool {
        let mut users = self.lock();
        match users.get_mut(&uid) {
            Some(user) => {
                user.bridge_id = bridge_id;
                user.session = session;
                false
            }
            None => {
                users.insert(uid.clone(), BridgeUser::new(uid, bridge_id, session));
                true
            }
        }
    }

    /// Run `f` against one user while holding the lock.
    pub fn with_user<R>(&self, uid: &UserId, f: impl FnOnce(&mut BridgeUser<S>) -> R) -> Option<R> {
        self.lock().get_mut(uid).map(f)
    }

    /// Run `f` against the first user matching `pred`.
    pub fn find_user<R>(
        &self,
        pred: impl Fn(&BridgeUser<S>) -> bool,
        f: impl FnOnce(&mut BridgeUser<S>) -> R,
    ) -> Option<R> {
        self.lock().values_mut().find(|u| pred(u)).map(f)
    }

    #[must_use]
    pub fn contains(&self, uid: &UserId) -> bool {
        self.lock().contains_key(uid)
    }

    /// Uids of every registered user.
    #[must_use]
    pub fn uids(&self) -> Vec<UserId> {
        self.lock().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Merge freshly discovered devices under the lock.
    ///
    /// Returns `None` when the user is unknown (for instance removed while
    /// discovery was in flight).
    pub fn merge_devices(&self, uid: &UserId, discovered: Vec<Device>) -> Option<MergeOutcome> {
        self.with_user(uid, |user| {
            let changed = merge_devices(&mut user.devices, discovered);
            MergeOutcome {
                changed,
                bridge_id: user.bridge_id.clone(),
                devices: user.devices.clone(),
            }
        })
    }

    /// Replace the active-sensor set; returns `false` for an unknown user.
    pub fn replace_active_sensors(&self, uid: &UserId, active: Vec<ActiveSensor>) -> bool {
        self.with_user(uid, |user| user.active_sensors.replace(active))
            .is_some()
    }

    /// Snapshot of the routing context for events of one user.
    #[must_use]
    pub fn routing(&self, uid: &UserId) -> Option<(BridgeId, ActiveSensors)> {
        self.with_user(uid, |user| (user.bridge_id.clone(), user.active_sensors.clone()))
    }

    /// Clone one device of one user.
    #[must_use]
    pub fn device(&self, uid: &UserId, device: &DeviceUid) -> Option<Device> {
        self.with_user(uid, |user| user.find_device(device).cloned())
            .flatten()
    }
}

impl<S: Clone> UserStore<S> {
    /// Clone the session of one user.
    #[must_use]
    pub fn session(&self, uid: &UserId) -> Option<S> {
        self.with_user(uid, |user| user.session.clone())
    }
}
