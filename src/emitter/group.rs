//! # Emitter Group
//!
//! Arena of sub-emitters belonging to one top-level emitter. Emission runs
//! in parallel across sub-emitters; force areas are updated afterwards on
//! the calling thread since they mutate the physics world.

use rayon::prelude::*;
use slotmap::{new_key_type, SlotMap};

use super::container::ParticleContainer;
use super::scheduler::SubEmitter;
use super::source::EmitterOwner;
use super::UpdateContext;
use crate::environ::ForceAreaHost;

new_key_type! {
    /// Handle to a sub-emitter in an [`EmitterGroup`]
    pub struct SubEmitterKey;
}

struct GroupEntry {
    emitter: SubEmitter,
    container: Box<dyn ParticleContainer + Send>,
}

/// Result of one group update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupUpdateStats {
    /// Particles accepted across all containers
    pub emitted: u64,
    /// Sub-emitters dropped because their source expired
    pub removed: usize,
    /// Some force area was created, moved or released
    pub area_changed: bool,
}

/// Sub-emitters with their containers
#[derive(Default)]
pub struct EmitterGroup {
    entries: SlotMap<SubEmitterKey, GroupEntry>,
}

impl EmitterGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, emitter: SubEmitter, container: Box<dyn ParticleContainer + Send>) -> SubEmitterKey {
        self.entries.insert(GroupEntry { emitter, container })
    }

    /// Remove a sub-emitter, releasing its force area.
    pub fn remove(&mut self, key: SubEmitterKey, host: &mut dyn ForceAreaHost) -> Option<SubEmitter> {
        let mut entry = self.entries.remove(key)?;
        entry.emitter.deactivate(host);
        Some(entry.emitter)
    }

    /// Activate a sub-emitter at `age`.
    pub fn activate(&mut self, key: SubEmitterKey, age: f32) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.emitter.initialize(age, entry.container.as_mut());
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: SubEmitterKey) -> Option<&SubEmitter> {
        self.entries.get(key).map(|e| &e.emitter)
    }

    pub fn container(&self, key: SubEmitterKey) -> Option<&(dyn ParticleContainer + Send)> {
        self.entries.get(key).map(|e| e.container.as_ref())
    }

    pub fn container_mut(&mut self, key: SubEmitterKey) -> Option<&mut (dyn ParticleContainer + Send + 'static)> {
        self.entries.get_mut(key).map(|e| e.container.as_mut())
    }

    /// Tick every active sub-emitter.
    pub fn update(
        &mut self,
        owner: &dyn EmitterOwner,
        host: &mut dyn ForceAreaHost,
        ctx: &UpdateContext,
    ) -> GroupUpdateStats {
        let mut work: Vec<(SubEmitterKey, &mut GroupEntry)> = self
            .entries
            .iter_mut()
            .filter(|(_, e)| e.emitter.is_active())
            .collect();

        let results: Vec<(SubEmitterKey, Option<u32>)> = work
            .par_iter_mut()
            .map(|(key, entry)| {
                let GroupEntry { emitter, container } = &mut **entry;
                if emitter.update_state(container.as_mut(), 0.0).is_err() {
                    return (*key, None);
                }
                let mut local = *ctx;
                (*key, Some(emitter.emit_particles(container.as_mut(), owner, &mut local)))
            })
            .collect();
        drop(work);

        let mut stats = GroupUpdateStats::default();
        for (key, result) in results {
            match result {
                Some(n) => stats.emitted += n as u64,
                None => {
                    if self.remove(key, host).is_some() {
                        stats.removed += 1;
                    }
                }
            }
        }

        for entry in self.entries.values_mut() {
            if entry.emitter.update_force(host, owner).touched_world() {
                stats.area_changed = true;
            }
        }

        if stats.removed > 0 {
            log::debug!("Emitter group removed {} expired sub-emitters", stats.removed);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Weak};

    use super::*;
    use crate::config::EmissionConfig;
    use crate::emitter::{SimpleSource, SpawnBuffer};
    use crate::emitter::source::ParticleSource;
    use crate::environ::{AreaId, ForceAreaDesc};
    use crate::params::EffectParams;

    struct NoHost;

    impl ForceAreaHost for NoHost {
        fn create_force_area(&mut self, _desc: &ForceAreaDesc) -> Option<AreaId> {
            None
        }

        fn update_force_area(&mut self, _id: AreaId, _desc: &ForceAreaDesc) {}

        fn release_area(&mut self, _id: AreaId) {}
    }

    fn sub_emitter() -> (Arc<SimpleSource>, SubEmitter) {
        let source = Arc::new(SimpleSource::default());
        let weak: Weak<dyn ParticleSource> = Arc::downgrade(&(source.clone() as Arc<dyn ParticleSource>));
        let emitter = SubEmitter::new(Arc::new(EffectParams::default()), Arc::new(EmissionConfig::default()), weak);
        (source, emitter)
    }

    #[test]
    fn test_container_access_by_key() {
        let mut group = EmitterGroup::new();
        let (_source, emitter) = sub_emitter();
        let key = group.add(emitter, Box::new(SpawnBuffer::new(8, 1.0)));

        let container = group.container_mut(key).expect("container");
        container.record_rejects(3);
        assert_eq!(container.next_emitter_sequence(), 1);
        assert!(group.container(key).is_some());

        assert!(group.activate(key, 0.0));
        assert!(group.get(key).is_some_and(|e| e.is_active()));
    }

    #[test]
    fn test_unknown_key() {
        let mut group = EmitterGroup::new();
        let (_source, emitter) = sub_emitter();
        let key = group.add(emitter, Box::new(SpawnBuffer::new(8, 1.0)));
        assert!(group.remove(key, &mut NoHost).is_some());
        assert!(group.container_mut(key).is_none());
        assert!(!group.activate(key, 0.0));
        assert!(group.is_empty());
    }
}
