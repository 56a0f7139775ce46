pub mod alias_store;
pub mod error;
pub mod manifest;
pub mod packager;

pub use alias_store::{Alias, KeyAliasStore, ALIAS_TTL};
pub use error::{AliasResolveError, HlsError, Result};
pub use manifest::MediaPlaylist;
pub use packager::{package_pcm, package_to_dir, PackagedSegment, PackagedTrack, PackagingCoordinator};
