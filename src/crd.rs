//! `ReleaseUpgrade` CRD type definition.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `ReleaseUpgrade` spec describes one requested hot upgrade of a running
/// release from a source to a target version.
///
/// The pipeline consumes `relup.tarball` (base name only) and
/// `relup.targetVersion`; the remaining fields are informational to
/// surrounding tooling and are logged when the request is observed.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "relup.huo.io",
    version = "v1alpha1",
    kind = "ReleaseUpgrade",
    namespaced,
    printcolumn = r#"{"name":"DEPLOYMENT","type":"string","jsonPath":".spec.deployment.name"}"#,
    printcolumn = r#"{"name":"FROM","type":"string","jsonPath":".spec.relup.sourceVersion"}"#,
    printcolumn = r#"{"name":"TO","type":"string","jsonPath":".spec.relup.targetVersion"}"#,
    printcolumn = r#"{"name":"AGE","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseUpgradeSpec {
    /// Deployment running the release to be upgraded.
    pub deployment: DeploymentRef,

    /// The release upgrade descriptor.
    pub relup: RelupSpec,

    /// Host path volume the upgrade tooling stages artifacts on.
    pub volume: VolumeSpec,
}

/// Reference to the deployment hosting the target process.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
pub struct DeploymentRef {
    pub name: String,
}

/// Describes the release artifact and the version transition.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelupSpec {
    /// Name of the upgrade image/package.
    pub name: String,

    /// Container image carrying the artifact.
    pub image: String,

    /// Release tarball; only its base name is used, resolved against the
    /// operator's trusted source directory.
    pub tarball: String,

    /// Version currently running.
    pub source_version: String,

    /// Version to upgrade to.
    pub target_version: String,
}

/// Host path the artifact distribution tooling mounts.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    pub host_path: String,
}
