//! Configuration: field validators, the backend registry, the persisted
//! store and layered resolution.

pub mod argv;
pub mod fields;
pub mod registry;
pub mod resolve;
pub mod store;
pub mod value;

pub use argv::parse_overrides;
pub use registry::Backend;
pub use resolve::{
    BackendConfig, CliOverrides, CommitStyle, GenerationSettings, ValidConfig, resolve,
};
pub use store::{CONFIG_PATH_ENV_VAR, ConfigStore};
pub use value::{RawConfig, RawValue};
