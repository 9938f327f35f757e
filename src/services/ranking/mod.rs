pub mod loader;
pub mod model;

pub use loader::{load_with_fallback, LocalDirLoader, ModelLoader, RegistryLoader};
pub use model::{ModelArtifact, RankingModel};
