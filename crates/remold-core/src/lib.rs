#![deny(clippy::all, warnings)]

mod core;

pub(crate) use crate::core::config;
pub(crate) use crate::core::tooling::error;
pub(crate) use crate::core::{fs, net};

pub use crate::core::runtime::effects;
pub use crate::core::{
    archive, assets, fetch, jar, migration, patch, pipeline, tools, update,
};

pub use crate::core::commands::{
    patches_apply, patches_rebuild, version_migrate, version_open, version_package, version_setup,
    version_update, ApplyPatchesRequest, FuzzOptions, MigrateVersionRequest, OpenVersionRequest,
    PackageVersionRequest, RebuildPatchesRequest, SetupVersionRequest, UpdateVersionRequest,
};
pub use crate::core::config::context::{CommandContext, GlobalOptions};
pub use crate::core::config::{CacheConfig, Config, EnvSnapshot, JavaConfig, NetworkConfig};
pub use crate::core::runtime::effects::{SharedEffects, SystemEffects};
pub use crate::core::runtime::process::{LoggedRun, RunOutput};
pub use crate::core::tooling::error::{classify, Error};
pub use crate::core::tooling::outcome::{CommandStatus, ExecutionOutcome};
