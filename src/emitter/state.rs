//! # Sub-Emitter Snapshots
//!
//! Save/load of scheduler timing. A restored sub-emitter continues with
//! exactly the emission sequence the saved one would have produced.

use serde::{Deserialize, Serialize};

use super::scheduler::{SubEmitter, SubEmitterState};
use crate::error::EmissionResult;
use crate::util::ChaosKey;

/// Persisted state of one sub-emitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubEmitterSnapshot {
    pub state: SubEmitterState,
    /// Key that seeds future activations
    pub seeder: ChaosKey,
    /// A force area was live when saved
    pub has_force: bool,
}

impl SubEmitterSnapshot {
    pub fn to_bytes(&self) -> EmissionResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> EmissionResult<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

impl SubEmitter {
    pub fn snapshot(&self) -> SubEmitterSnapshot {
        SubEmitterSnapshot {
            state: self.state().clone(),
            seeder: self.seeder(),
            has_force: self.force().is_expected(),
        }
    }

    /// Replace timing with a saved snapshot. A saved force area is
    /// recreated by the next force update.
    pub fn restore(&mut self, snapshot: SubEmitterSnapshot) {
        self.restore_parts(snapshot.state, snapshot.seeder, snapshot.has_force);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{Location, HUGE};
    use glam::Vec3;

    #[test]
    fn test_bincode_round_trip() {
        let mut chaos = ChaosKey::new(99);
        chaos.unit();
        let snapshot = SubEmitterSnapshot {
            state: SubEmitterState {
                activate_age: 1.5,
                start_age: 1.75,
                stop_age: HUGE,
                repeat_age: 3.5,
                last_emit_age: 2.0,
                chaos,
                emit_index: 17,
                sequence: 4,
                last_loc: Some(Location::from_translation(Vec3::new(1.0, 2.0, 3.0))),
                active: true,
            },
            seeder: ChaosKey::new(5),
            has_force: true,
        };
        let bytes = snapshot.to_bytes().unwrap();
        let restored = SubEmitterSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(restored, snapshot);
        assert_eq!(restored.state.chaos.draws(), 1);
    }

    #[test]
    fn test_truncated_bytes_fail() {
        let snapshot = SubEmitterSnapshot {
            state: SubEmitterState::default(),
            seeder: ChaosKey::new(1),
            has_force: false,
        };
        let bytes = snapshot.to_bytes().unwrap();
        assert!(SubEmitterSnapshot::from_bytes(&bytes[..bytes.len() / 2]).is_err());
    }
}
