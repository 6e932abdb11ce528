// curvegen — runtime variable-binding code generator
//
// Library root. Registries are built at model-build time, frozen into one
// layout, rendered into a device header, and mirrored into a host buffer
// that is pushed to the device before each execution.

pub mod accessor;
pub mod config;
pub mod error;
pub mod header;
pub mod host;
pub mod layout;
pub mod logging;
pub mod manifest;
pub mod provenance;
pub mod registry;
pub mod sync;
pub mod types;

pub use config::{GeneratorConfig, Seatbelts};
pub use error::{CurveError, Result};
pub use host::{AssemblyState, CurveHost};
pub use registry::{EnvPropertyDecl, RegistryKind, VariableDecl};
