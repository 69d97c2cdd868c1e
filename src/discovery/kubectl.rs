//! Discovery source backed by `kubectl get --raw`.

use serde::Deserialize;
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{DiscoveryError, DiscoverySource, ResourceCatalogEntry};

#[derive(Deserialize)]
struct ApiResourceList {
    #[serde(default)]
    resources: Vec<ResourceCatalogEntry>,
}

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Fetches `APIResourceList` documents from the cluster of one context.
///
/// `request_timeout` bounds the whole kubectl run, credential plugins
/// included. A run that outlives it is killed and reported as a failed group.
#[derive(Debug, Clone)]
pub struct KubectlDiscovery {
    /// kubectl command line, already split (`["kubectl"]`).
    command: Vec<String>,
    context: Option<String>,
    request_timeout: Duration,
}

struct Finished {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn joined(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader.and_then(|r| r.join().ok()).unwrap_or_default()
}

/// Run `command` to completion, or kill it once `deadline` has passed.
/// `Ok(None)` means the deadline hit. Pipes are drained on threads so a
/// chatty child can't stall on a full buffer; after a kill they are left
/// behind, since a surviving grandchild may still hold them open.
fn run_bounded(command: &mut Command, deadline: Duration) -> std::io::Result<Option<Finished>> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(Finished {
                status,
                stdout: joined(stdout),
                stderr: joined(stderr),
            }));
        }
        if started.elapsed() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

impl KubectlDiscovery {
    pub fn new(command: Vec<String>, request_timeout: Duration) -> Self {
        Self {
            command,
            context: None,
            request_timeout,
        }
    }

    /// Query the cluster of `context` rather than the current context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Discovery path for a group-version: core versions live under `/api`.
    pub fn api_path(group: &str) -> String {
        let group = group.trim_matches('/');
        if group.contains('/') {
            format!("/apis/{group}")
        } else {
            format!("/api/{group}")
        }
    }

    fn args(&self, group: &str) -> Vec<String> {
        let mut args = vec![
            "get".to_string(),
            "--raw".to_string(),
            Self::api_path(group),
            format!("--request-timeout={}ms", self.request_timeout.as_millis()),
        ];
        if let Some(context) = &self.context {
            args.push("--context".to_string());
            args.push(context.clone());
        }
        args
    }
}

/// Parse an `APIResourceList` body, dropping subresources (`pods/log`).
pub fn parse_resource_list(body: &[u8]) -> serde_json::Result<Vec<ResourceCatalogEntry>> {
    let list: ApiResourceList = serde_json::from_slice(body)?;
    Ok(list
        .resources
        .into_iter()
        .filter(|r| !r.name.contains('/'))
        .collect())
}

impl DiscoverySource for KubectlDiscovery {
    fn list_resource_kinds(
        &self,
        group: &str,
    ) -> Result<Vec<ResourceCatalogEntry>, DiscoveryError> {
        let Some((program, base_args)) = self.command.split_first() else {
            return Err(DiscoveryError::Client("no kubectl command configured".into()));
        };

        let mut command = Command::new(program);
        command.args(base_args).args(self.args(group));
        let Some(output) = run_bounded(&mut command, self.request_timeout)
            .map_err(|e| DiscoveryError::Client(format!("failed to run {program}: {e}")))?
        else {
            return Err(DiscoveryError::Group {
                group: group.to_string(),
                reason: format!(
                    "timed out after {}",
                    humantime::format_duration(self.request_timeout)
                ),
            });
        };

        if !output.status.success() {
            return Err(DiscoveryError::Group {
                group: group.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_resource_list(&output.stdout).map_err(|e| DiscoveryError::Group {
            group: group.to_string(),
            reason: format!("unreadable resource list: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_group_path() {
        assert_eq!(KubectlDiscovery::api_path("v1"), "/api/v1");
    }

    #[test]
    fn named_group_path() {
        assert_eq!(
            KubectlDiscovery::api_path("cert-manager.io/v1"),
            "/apis/cert-manager.io/v1"
        );
    }

    #[test]
    fn args_carry_timeout_and_context() {
        let d = KubectlDiscovery::new(vec!["kubectl".into()], Duration::from_millis(50))
            .with_context("prod");
        assert_eq!(
            d.args("apps/v1"),
            vec![
                "get",
                "--raw",
                "/apis/apps/v1",
                "--request-timeout=50ms",
                "--context",
                "prod"
            ]
        );
    }

    #[test]
    fn parse_drops_subresources() {
        let body = br#"{
            "kind": "APIResourceList",
            "groupVersion": "v1",
            "resources": [
                {"name": "pods", "singularName": "pod", "shortNames": ["po"], "kind": "Pod", "verbs": ["get", "delete"]},
                {"name": "pods/log", "singularName": "", "kind": "Pod", "verbs": ["get"]}
            ]
        }"#;
        let entries = parse_resource_list(body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "pods");
        assert_eq!(entries[0].short_names, vec!["po"]);
    }

    #[test]
    fn empty_command_is_client_error() {
        let d = KubectlDiscovery::new(vec![], Duration::from_secs(1));
        assert!(matches!(
            d.list_resource_kinds("v1"),
            Err(DiscoveryError::Client(_))
        ));
    }

    #[cfg(unix)]
    fn sh(script: &str, timeout: Duration) -> KubectlDiscovery {
        KubectlDiscovery::new(vec!["sh".into(), "-c".into(), script.into()], timeout)
    }

    #[cfg(unix)]
    #[test]
    fn reads_resource_list_from_stdout() {
        let d = sh(
            r#"echo '{"resources":[{"name":"pods","shortNames":["po"]}]}'"#,
            Duration::from_secs(5),
        );
        let entries = d.list_resource_kinds("v1").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].short_names, vec!["po"]);
    }

    #[cfg(unix)]
    #[test]
    fn failed_fetch_is_group_error() {
        let d = sh(
            "echo 'the server could not find the requested resource' >&2; exit 1",
            Duration::from_secs(5),
        );
        match d.list_resource_kinds("example.com/v1") {
            Err(DiscoveryError::Group { group, reason }) => {
                assert_eq!(group, "example.com/v1");
                assert!(reason.contains("could not find"));
            }
            other => panic!("expected group error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn hung_fetch_is_killed_at_deadline() {
        let d = sh("sleep 5", Duration::from_millis(100));
        let started = Instant::now();
        let result = d.list_resource_kinds("v1");
        assert!(started.elapsed() < Duration::from_secs(2));
        match result {
            Err(DiscoveryError::Group { reason, .. }) => assert!(reason.contains("timed out")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn missing_binary_is_client_error() {
        let d = KubectlDiscovery::new(
            vec!["kube-lock-test-no-such-binary".into()],
            Duration::from_secs(1),
        );
        assert!(matches!(
            d.list_resource_kinds("v1"),
            Err(DiscoveryError::Client(_))
        ));
    }
}
