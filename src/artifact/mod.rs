// ABOUTME: Artifact descriptors, remote option bags, and archive packaging.
// ABOUTME: Everything about an archive that is known before talking to the server.

mod descriptor;
mod options;
mod package;
mod resolve;

pub use descriptor::{
    Artifact, ArtifactBuilder, ArtifactError, ArtifactType, ClassLoadOrder, WarClassLoaderPolicy,
};
pub use options::{AttributeSet, DeploymentOptions, OptionValue, keys};
pub use package::{APPLICATION_XML, ArchivePackager, DEFAULT_EAR_LEVEL, EarPackager, PackageError, application_xml};
pub use resolve::{ResolveError, resolve_artifacts};
