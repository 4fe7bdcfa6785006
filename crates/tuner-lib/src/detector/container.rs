//! Container runtime markers

use super::{read_trimmed, DetectorPaths, EnvLookup};
use tracing::debug;

/// Files a runtime drops into the container filesystem
const RUNTIME_MARKER_FILES: &[&str] = &[".dockerenv", "run/.containerenv"];

const K8S_SERVICE_ACCOUNT_DIR: &str = "var/run/secrets/kubernetes.io/serviceaccount";
const K8S_SERVICE_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";

/// Path fragments in PID 1's cgroup/mountinfo that identify a container
const RUNTIME_PATH_FRAGMENTS: &[&str] = &["docker", "kubepods", "k8s.io"];

pub fn mentions_container_runtime(content: &str) -> bool {
    RUNTIME_PATH_FRAGMENTS
        .iter()
        .any(|fragment| content.contains(fragment))
}

pub(super) fn detect_container(paths: &DetectorPaths, env: EnvLookup) -> bool {
    if let Some(marker) = RUNTIME_MARKER_FILES
        .iter()
        .find(|marker| paths.fs_root.join(marker).exists())
    {
        debug!(marker = %marker, "Container marker file present");
        return true;
    }

    if paths.fs_root.join(K8S_SERVICE_ACCOUNT_DIR).exists() {
        debug!("Kubernetes service account mounted");
        return true;
    }

    if env(K8S_SERVICE_HOST_ENV).is_some_and(|v| !v.is_empty()) {
        debug!("Kubernetes service environment present");
        return true;
    }

    for file in ["1/cgroup", "1/mountinfo"] {
        if read_trimmed(&paths.proc_root.join(file)).is_some_and(|c| mentions_container_runtime(&c))
        {
            debug!(file = %file, "Container runtime path in init process");
            return true;
        }
    }

    false
}
