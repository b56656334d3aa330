use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use noderig_backend::{CommandOutput, CommandRunner, CommandSpec, ProvisionError};
use noderig_npm::{CurrentVersions, NodePackages, PackageAction, PackageRequest, RuntimeTarget};

/// A tiny npm: a global scope, a registry of latest versions, and a log of
/// every invocation without the program path.
struct FakeNpm {
    version_output: String,
    installed: Mutex<BTreeMap<String, String>>,
    registry: BTreeMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl FakeNpm {
    fn new(npm_version: &str) -> Self {
        Self {
            version_output: format!("{{ npm: '{npm_version}', node: '8.11.1' }}"),
            installed: Mutex::new(BTreeMap::new()),
            registry: BTreeMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_version_output(mut self, output: &str) -> Self {
        self.version_output = output.to_string();
        self
    }

    fn installed(self, name: &str, version: &str) -> Self {
        self.installed
            .lock()
            .unwrap()
            .insert(name.to_string(), version.to_string());
        self
    }

    fn published(mut self, name: &str, version: &str) -> Self {
        self.registry.insert(name.to_string(), version.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with("install") || call.starts_with("uninstall"))
            .collect()
    }

    fn latest(&self, name: &str) -> Option<(&String, &String)> {
        self.registry
            .iter()
            .find(|(published, _)| published.eq_ignore_ascii_case(name))
    }

    fn respond(&self, args: &[String]) -> (i32, String) {
        let operands: Vec<&String> = args
            .iter()
            .skip(1)
            .filter(|arg| !arg.starts_with("--") && *arg != "true" && *arg != "false")
            .collect();
        match args[0].as_str() {
            "version" => (0, self.version_output.clone()),
            "list" => {
                let dependencies: Map<String, Value> = self
                    .installed
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|(name, version)| (name.clone(), json!({ "version": version })))
                    .collect();
                (0, json!({ "dependencies": dependencies }).to_string())
            }
            "outdated" => {
                let outdated: Map<String, Value> = self
                    .installed
                    .lock()
                    .unwrap()
                    .iter()
                    .filter_map(|(name, current)| {
                        let (_, latest) = self.latest(name)?;
                        (latest != current).then(|| {
                            (
                                name.clone(),
                                json!({ "current": current, "wanted": latest, "latest": latest }),
                            )
                        })
                    })
                    .collect();
                if outdated.is_empty() {
                    (0, String::new())
                } else {
                    (1, Value::Object(outdated).to_string())
                }
            }
            "show" => match self.latest(operands[0]) {
                Some((name, version)) => (0, json!({ "name": name, "version": version }).to_string()),
                None => (1, String::new()),
            },
            "install" => {
                let mut installed = self.installed.lock().unwrap();
                for operand in operands {
                    let (name, version) = operand.split_once('@').unwrap_or((operand, "0.0.0"));
                    installed.insert(name.to_string(), version.to_string());
                }
                (0, String::new())
            }
            "uninstall" => {
                let mut installed = self.installed.lock().unwrap();
                for operand in operands {
                    installed.remove(operand.as_str());
                }
                (0, String::new())
            }
            _ => (1, String::new()),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeNpm {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ProvisionError> {
        self.calls.lock().unwrap().push(command.args.join(" "));
        let (status, stdout) = self.respond(&command.args);
        Ok(CommandOutput {
            status: Some(status),
            stdout,
            stderr: if status == 0 { String::new() } else { "npm ERR!".to_string() },
        })
    }
}

fn packages(npm: &Arc<FakeNpm>) -> NodePackages {
    let target =
        RuntimeTarget::resolve(None, Some(Path::new("/opt/nodejs-8.11.1/bin/node")), None).unwrap();
    NodePackages::new(npm.clone(), target)
}

#[tokio::test]
async fn outdated_package_is_upgraded_to_wanted() {
    let npm = Arc::new(
        FakeNpm::new("5.6.0")
            .installed("bower", "1.3.12")
            .published("bower", "1.5.2"),
    );
    let request = PackageRequest::single("bower");

    let outcome = packages(&npm)
        .reconcile(PackageAction::Upgrade, &request)
        .await
        .unwrap();

    assert_eq!(
        outcome.check.current_versions(),
        CurrentVersions::Single(Some("1.3.12".to_string()))
    );
    assert_eq!(outcome.check.candidate_versions(), vec![Some("1.5.2".to_string())]);
    assert_eq!(
        npm.calls(),
        vec![
            "version",
            "list --json --global --depth 0",
            "outdated --json --global",
            "install --json --global --unsafe-perm true bower@1.5.2",
        ]
    );
}

#[tokio::test]
async fn second_pass_is_a_no_op() {
    let npm = Arc::new(
        FakeNpm::new("5.6.0")
            .installed("bower", "1.3.12")
            .published("bower", "1.5.2"),
    );
    let packages = packages(&npm);
    let request = PackageRequest::single("bower");

    let first = packages.reconcile(PackageAction::Upgrade, &request).await.unwrap();
    assert!(first.updated());

    let second = packages.reconcile(PackageAction::Upgrade, &request).await.unwrap();
    let third = packages.reconcile(PackageAction::Upgrade, &request).await.unwrap();

    assert!(!second.updated());
    assert_eq!(second.check, third.check);
    assert_eq!(second.check.requested[0].current.as_deref(), Some("1.5.2"));
    assert_eq!(second.check.requested[0].candidate.as_deref(), Some("1.5.2"));
    assert_eq!(npm.mutating_calls().len(), 1);
}

#[tokio::test]
async fn unparseable_npm_version_stops_before_listing() {
    let npm = Arc::new(FakeNpm::new("5.6.0").with_version_output("npm is broken"));

    let error = packages(&npm)
        .reconcile(PackageAction::Install, &PackageRequest::single("express"))
        .await
        .unwrap_err();

    assert!(matches!(error, ProvisionError::VersionParse { .. }));
    assert_eq!(npm.calls(), vec!["version"]);
}

#[tokio::test]
async fn batch_keeps_positional_current_versions() {
    let npm = Arc::new(
        FakeNpm::new("5.6.0")
            .installed("grunt", "0.4.5")
            .published("grunt", "0.4.5")
            .published("bower", "1.8.4"),
    );
    let request = PackageRequest::batch(["bower", "grunt"]);

    let outcome = packages(&npm)
        .reconcile(PackageAction::Install, &request)
        .await
        .unwrap();

    assert_eq!(
        outcome.check.current_versions(),
        CurrentVersions::Batch(vec![None, Some("0.4.5".to_string())])
    );
    assert_eq!(
        npm.mutating_calls(),
        vec!["install --json --global --unsafe-perm true bower@1.8.4"]
    );
}

#[tokio::test]
async fn names_match_case_insensitively() {
    let npm = Arc::new(
        FakeNpm::new("5.6.0")
            .installed("JSONStream", "1.3.1")
            .published("JSONStream", "1.3.1"),
    );

    let outcome = packages(&npm)
        .reconcile(PackageAction::Install, &PackageRequest::single("jsonstream"))
        .await
        .unwrap();

    assert_eq!(outcome.check.requested[0].name, "JSONStream");
    assert_eq!(outcome.check.requested[0].current.as_deref(), Some("1.3.1"));
    assert!(!outcome.updated());
    assert!(!npm.calls().iter().any(|call| call.starts_with("show")));
}

#[tokio::test]
async fn fresh_packages_skip_outdated() {
    let npm = Arc::new(
        FakeNpm::new("5.6.0")
            .installed("bower", "1.3.12")
            .published("bower", "1.5.2")
            .published("grunt-cli", "1.2.0"),
    );

    let outcome = packages(&npm)
        .reconcile(PackageAction::Install, &PackageRequest::single("grunt-cli"))
        .await
        .unwrap();

    assert_eq!(
        npm.calls(),
        vec![
            "version",
            "list --json --global --depth 0",
            "show --json --global grunt-cli",
            "install --json --global --unsafe-perm true grunt-cli@1.2.0",
        ]
    );
    // Unrequested packages are not refreshed when outdated is skipped, so a
    // newer bower goes unnoticed in this pass.
    assert_eq!(outcome.check.scope["bower"].candidate, None);
}

#[tokio::test]
async fn old_npm_falls_back_to_show() {
    let npm = Arc::new(
        FakeNpm::new("1.3.10")
            .installed("bower", "1.3.12")
            .published("bower", "1.5.2"),
    );

    packages(&npm)
        .reconcile(PackageAction::Upgrade, &PackageRequest::single("bower"))
        .await
        .unwrap();

    assert_eq!(
        npm.calls(),
        vec![
            "version",
            "list --json --global",
            "show --json --global bower",
            "install --json --global --unsafe-perm true bower@1.5.2",
        ]
    );
}

#[tokio::test]
async fn source_replaces_package_names() {
    let npm = Arc::new(FakeNpm::new("5.6.0").published("mylib", "2.0.0"));
    let request = PackageRequest::single("mylib")
        .unsafe_perm(None)
        .source(Some("/tmp/mylib-2.0.0.tgz".to_string()));

    packages(&npm)
        .reconcile(PackageAction::Install, &request)
        .await
        .unwrap();

    assert_eq!(
        npm.mutating_calls(),
        vec!["install --json --global /tmp/mylib-2.0.0.tgz"]
    );
}

#[tokio::test]
async fn remove_uninstalls_by_name_only() {
    let npm = Arc::new(
        FakeNpm::new("5.6.0")
            .installed("bower", "1.5.2")
            .published("bower", "1.5.2")
            .published("grunt", "1.0.3"),
    );
    let request = PackageRequest::batch(["bower", "grunt"]);

    let outcome = packages(&npm)
        .reconcile(PackageAction::Remove, &request)
        .await
        .unwrap();

    assert_eq!(npm.mutating_calls(), vec!["uninstall --json --global bower"]);
    assert_eq!(outcome.changes.len(), 1);
    assert!(outcome.changes[0].version.is_none());
}

#[tokio::test]
async fn project_scope_drops_global_flag() {
    let npm = Arc::new(FakeNpm::new("5.6.0").published("express", "4.16.3"));
    let request =
        PackageRequest::single("express").path(Some(std::path::PathBuf::from("/srv/app")));

    packages(&npm)
        .reconcile(PackageAction::Install, &request)
        .await
        .unwrap();

    assert_eq!(
        npm.calls()[1..],
        [
            "list --json --depth 0",
            "show --json express",
            "install --json --unsafe-perm true express@4.16.3",
        ]
    );
}
