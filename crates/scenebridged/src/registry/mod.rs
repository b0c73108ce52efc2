//! Command registry: handler declarations, parameter binding and routing.
//!
//! A handler owns one domain. At registration the [`Router`] asks it to
//! declare its actions into an [`ActionTable`]; each action names its
//! parameters with a [`ParamKind`] from a closed set. Dispatch resolves the
//! domain and action ignoring case, binds the JSON parameters into typed
//! [`Arguments`], and runs the action body on the host thread:
//!
//! ```text
//! "scene.Create" {"name": "Cube", "position": [0, 1, 0]}
//!   -> domain "scene", action "Create"
//!   -> Arguments { name: String("Cube"), position: Vector3([0, 1, 0]) }
//!   -> SceneHandler::create(&mut self, &mut ActionContext, &Arguments)
//! ```

mod arguments;
mod errors;
mod handler;
mod params;
mod router;

pub use self::arguments::{ArgValue, Arguments, Color};
pub use self::errors::{CommandError, ErrorKind, RegistrationError};
pub use self::handler::{
    ActionContext, ActionDescriptor, ActionSpec, ActionTable, CommandHandler, DomainDescriptor,
};
pub use self::params::{ParamDescriptor, ParamKind, ParamSpec, bind};
pub use self::router::Router;
pub(crate) use self::router::panic_message;
