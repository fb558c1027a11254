#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod api;
pub mod hash;
pub mod meta;
pub mod side;
pub mod version_config;

pub use api::{
    AssetIndex, AssetIndexRef, AssetObject, CatalogEntry, Download, Downloads, JavaVersion,
    Library, LibraryArtifact, VersionCatalog, VersionManifest,
};
pub use hash::{hash_bytes, hash_file, Hash, HashAlgorithm, StreamHasher};
pub use meta::{AssetsInfo, LibraryList, Repository, ToolSpec, ToolchainMeta, META_FILE_NAME};
pub use side::Side;
pub use version_config::{ToolConfig, ToolRole, VersionConfig, VERSION_CONFIG_FILE};
