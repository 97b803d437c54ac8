pub mod artifact;
pub mod publish;
pub mod version;

pub use artifact::{
    Artifact, ArtifactName, BuildCell, BuildFailure, CellResult, CellSelection, StagingSet,
};
pub use publish::{PublishOutcome, PublishReport, TargetReport};
pub use version::Version;
