//! # Particle Core - Emission & Environment Sampling
//!
//! CPU-side particle emission for effect systems.
//!
//! ## Modules
//!
//! - **Emitter**: sub-emitter scheduling, beams, density compensation, force fields
//! - **Environ**: cached physics areas (gravity, wind, water) and collision rays
//! - **Params**: effect parameters loaded from JSON
//! - **Util**: geometry, transforms, deterministic random streams, noise
//!
//! ## Author
//!
//! Aiblox (Alexsandro Alves de Oliveira)

pub mod config;
pub mod emitter;
pub mod environ;
pub mod error;
pub mod params;
pub mod util;

// Re-exports
pub use config::EmissionConfig;
pub use emitter::{
    EmitParticleData, EmitterGroup, EmitterOwner, MainEmitterState, ParticleContainer, ParticleSource, SimpleSource,
    SpawnBuffer, SubEmitter, SubEmitterSnapshot, UpdateContext,
};
pub use environ::{EnvironFlags, ForceAreaHost, PhysEnviron, PhysForces, PhysicsWorld, SharedEnviron};
pub use error::{EmissionError, EmissionResult};
pub use params::EffectParams;
pub use util::{Aabb, ChaosKey, Location};

use std::sync::Once;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = "particle_core";

static INIT: Once = Once::new();

/// Install the global log subscriber once. Later calls are no-ops.
pub fn initialize() {
    INIT.call_once(|| {
        init_logging();
        log::info!("{} v{} ({} {})", NAME, VERSION, std::env::consts::OS, std::env::consts::ARCH);
    });
}

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let _ = tracing_subscriber::registry().with(fmt::layer()).try_init();
}
