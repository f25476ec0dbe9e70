//! # Shared Environment
//!
//! World snapshot shared between emitter threads. Refreshing holds the
//! write lock across the whole area iteration; sampling takes read locks.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use super::physics::{OwnerId, PhysicsWorld};
use super::{EnvironFlags, PhysEnviron};
use crate::util::Aabb;

/// Lock-protected world snapshot
pub struct SharedEnviron {
    world: Arc<dyn PhysicsWorld>,
    snapshot: RwLock<PhysEnviron>,
    flag_mask: EnvironFlags,
}

impl SharedEnviron {
    pub fn new(world: Arc<dyn PhysicsWorld>, flag_mask: EnvironFlags) -> Self {
        Self {
            world,
            snapshot: RwLock::new(PhysEnviron::new()),
            flag_mask,
        }
    }

    pub fn world(&self) -> &Arc<dyn PhysicsWorld> {
        &self.world
    }

    /// Re-query the whole world.
    pub fn refresh(&self) {
        let mut snapshot = self.snapshot.write();
        snapshot.query_world(&self.world, self.flag_mask, true);
    }

    /// Re-query only when an area change made the snapshot stale.
    /// Returns true when a query ran.
    pub fn refresh_if_stale(&self) -> bool {
        if self.snapshot.read().is_current() {
            return false;
        }
        let mut snapshot = self.snapshot.write();
        // another thread may have refreshed while we waited
        if snapshot.is_current() {
            return false;
        }
        snapshot.query_world(&self.world, self.flag_mask, true);
        true
    }

    /// Physics areas were added, moved or removed.
    pub fn on_area_change(&self) {
        self.snapshot.write().invalidate();
    }

    pub fn is_current(&self) -> bool {
        self.snapshot.read().is_current()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, PhysEnviron> {
        self.snapshot.read()
    }

    /// Regional snapshot for one emitter.
    pub fn query_region(
        &self,
        bb: &Aabb,
        indoors: bool,
        flag_mask: EnvironFlags,
        skip_owner: Option<OwnerId>,
    ) -> PhysEnviron {
        let source = self.snapshot.read();
        let mut region = PhysEnviron::new();
        region.query_region(&source, bb, indoors, flag_mask, true, skip_owner);
        region
    }
}
