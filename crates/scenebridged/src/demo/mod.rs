//! Demo domains served by the standalone host.
//!
//! A real embedding registers its own handlers; these give the binary and
//! the behaviour tests something to drive.

mod scene;
mod tasks;

pub use scene::{SceneHandler, SceneObject};
pub use tasks::TaskHandler;

use crate::engine::Engine;
use crate::registry::RegistrationError;

/// Registers the `scene` and `tasks` domains.
///
/// # Errors
///
/// Fails when either domain is already registered.
pub fn register_demo_domains(engine: &mut Engine) -> Result<(), RegistrationError> {
    engine.register("scene", SceneHandler::new())?;
    engine.register("tasks", TaskHandler)?;
    Ok(())
}
