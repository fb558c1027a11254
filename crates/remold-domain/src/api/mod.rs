//! Upstream JSON documents: the version catalog, per-release manifests and
//! asset indexes.

mod assets;
mod catalog;
mod manifest;

pub use assets::{AssetIndex, AssetObject};
pub use catalog::{CatalogEntry, VersionCatalog};
pub use manifest::{
    AssetIndexRef, Download, Downloads, JavaVersion, Library, LibraryArtifact, LibraryDownloads,
    VersionManifest,
};
