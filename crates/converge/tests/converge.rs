//! End-to-end convergence runs against in-memory services

use async_trait::async_trait;
use rackenv_converge::Converger;
use rackenv_converge::lockfile::LOCKFILE_NAME;
use rackenv_converge::pins::PIN_FILE_NAME;
use rackenv_converge::runtime::VersionSource;
use rackenv_core::config::{ConvergeConfig, RuntimeVersionPolicy, ScanPolicy};
use rackenv_core::outcome::{Step, StepStatus};
use rackenv_core::ownership::Ownership;
use rackenv_core::profile::Profile;
use rackenv_core::services::{
    DependencyInstallRequest, DependencyManager, PackageInstaller, RuntimeManager,
};
use rackenv_core::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

const NOKOGIRI_LOCK: &str = "GEM\n  remote: https://rubygems.org/\n  specs:\n    nokogiri (1.15.4)\n    rack (3.0.8)\n\nPLATFORMS\n  ruby\n";

#[derive(Default)]
struct FakePackages {
    present: Mutex<HashSet<String>>,
    install_log: Mutex<Vec<String>>,
    broken: Option<String>,
}

#[async_trait]
impl PackageInstaller for FakePackages {
    fn name(&self) -> &'static str {
        "fake-apt"
    }

    async fn ensure_installed(&self, package: &str) -> Result<StepStatus> {
        if self.broken.as_deref() == Some(package) {
            return Err(Error::command_failed(
                format!("apt-get install -y {package}"),
                Some(100),
                "E: Unable to locate package",
            ));
        }
        if self.present.lock().unwrap().insert(package.to_string()) {
            self.install_log.lock().unwrap().push(package.to_string());
            Ok(StepStatus::Changed)
        } else {
            Ok(StepStatus::Unchanged)
        }
    }
}

struct FakeRuntime {
    current: String,
    installed: Mutex<HashSet<String>>,
    install_log: Mutex<Vec<String>>,
    fail_install: bool,
}

impl FakeRuntime {
    fn new(current: &str) -> Self {
        Self {
            current: current.to_string(),
            installed: Mutex::new(HashSet::new()),
            install_log: Mutex::new(Vec::new()),
            fail_install: false,
        }
    }
}

#[async_trait]
impl RuntimeManager for FakeRuntime {
    fn name(&self) -> &'static str {
        "fake-rbenv"
    }

    async fn current_version(&self) -> Result<String> {
        Ok(self.current.clone())
    }

    async fn is_installed(&self, version: &str) -> Result<bool> {
        Ok(self.installed.lock().unwrap().contains(version))
    }

    async fn install(&self, version: &str) -> Result<()> {
        if self.fail_install {
            return Err(Error::command_failed(
                format!("rbenv install --skip-existing {version}"),
                Some(1),
                "definition not found",
            ));
        }
        self.install_log.lock().unwrap().push(version.to_string());
        self.installed.lock().unwrap().insert(version.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RecordedInstall {
    directory: PathBuf,
    excluded: Vec<Profile>,
    user: Option<String>,
    prefix: Option<String>,
}

#[derive(Default)]
struct FakeBundler {
    declared: Option<String>,
    queried_prefixes: Mutex<Vec<Option<String>>>,
    installs: Mutex<Vec<RecordedInstall>>,
    fail: bool,
}

#[async_trait]
impl DependencyManager for FakeBundler {
    fn name(&self) -> &'static str {
        "fake-bundler"
    }

    async fn declared_runtime_version(
        &self,
        _directory: &Path,
        _ownership: &Ownership,
        activation_prefix: Option<&str>,
    ) -> Result<String> {
        self.queried_prefixes
            .lock()
            .unwrap()
            .push(activation_prefix.map(str::to_string));
        Ok(self
            .declared
            .clone()
            .unwrap_or_else(|| "No ruby version specified\n".to_string()))
    }

    async fn install(&self, request: &DependencyInstallRequest<'_>) -> Result<()> {
        if self.fail {
            return Err(Error::command_failed(
                "bundle install --without development test",
                Some(5),
                "Could not find gem",
            ));
        }
        self.installs.lock().unwrap().push(RecordedInstall {
            directory: request.directory.to_path_buf(),
            excluded: request.excluded.to_vec(),
            user: request.ownership.user.clone(),
            prefix: request.activation_prefix.map(str::to_string),
        });
        Ok(())
    }
}

fn config_with(active_profile: &str, gems: &[(&str, &[&str])]) -> ConvergeConfig {
    let mut config = ConvergeConfig {
        active_profile: active_profile.to_string(),
        ..ConvergeConfig::default()
    };
    for (gem, packages) in gems {
        config.gem_dependencies.insert(
            (*gem).to_string(),
            packages.iter().map(|p| (*p).to_string()).collect(),
        );
    }
    config
}

fn checkout(lockfile: Option<&str>) -> TempDir {
    let dir = TempDir::new().unwrap();
    if let Some(content) = lockfile {
        std::fs::write(dir.path().join(LOCKFILE_NAME), content).unwrap();
    }
    dir
}

#[tokio::test]
async fn test_nokogiri_checkout_in_test_profile() {
    let dir = checkout(Some(NOKOGIRI_LOCK));
    std::fs::write(dir.path().join(".rvmrc"), "rvm use 1.9.3").unwrap();
    std::fs::write(dir.path().join(".ruby-version"), "2.0.0").unwrap();

    let config = config_with(
        "test",
        &[("nokogiri", &["libxml2-dev"]), ("pg", &["libpq-dev"])],
    );
    let packages = FakePackages::default();
    let runtime = FakeRuntime::new("3.2.2");
    let bundler = FakeBundler::default();

    let report = Converger::new(&config, &packages, &runtime, &bundler)
        .converge(dir.path())
        .await
        .unwrap();

    assert_eq!(*packages.install_log.lock().unwrap(), ["libxml2-dev"]);
    assert_eq!(*runtime.install_log.lock().unwrap(), ["3.2.2"]);
    assert_eq!(
        std::fs::read_to_string(dir.path().join(PIN_FILE_NAME)).unwrap(),
        "3.2.2"
    );
    assert!(!dir.path().join(".rvmrc").exists());

    let installs = bundler.installs.lock().unwrap();
    assert_eq!(installs.len(), 1);
    assert_eq!(installs[0].directory, dir.path());
    assert_eq!(
        installs[0].excluded,
        [Profile::Development, Profile::Production]
    );

    assert_eq!(report.runtime_version, "3.2.2");
    assert_eq!(report.version_source, VersionSource::Manager);
    assert_eq!(
        report.excluded_profiles,
        [Profile::Development, Profile::Production]
    );
    let order: Vec<_> = report.steps.iter().map(|s| s.step).collect();
    assert_eq!(order, Step::ORDER);
    assert!(report.changed());
}

#[tokio::test]
async fn test_rerun_leaves_identical_state() {
    let dir = checkout(Some(NOKOGIRI_LOCK));
    let config = config_with("production", &[("nokogiri", &["libxml2-dev", "libxslt1-dev"])]);
    let packages = FakePackages::default();
    let runtime = FakeRuntime::new("3.3.0");
    let bundler = FakeBundler::default();
    let converger = Converger::new(&config, &packages, &runtime, &bundler);

    converger.converge(dir.path()).await.unwrap();
    let pin_after_first = std::fs::read_to_string(dir.path().join(PIN_FILE_NAME)).unwrap();

    let second = converger.converge(dir.path()).await.unwrap();
    let pin_after_second = std::fs::read_to_string(dir.path().join(PIN_FILE_NAME)).unwrap();

    assert_eq!(pin_after_first, pin_after_second);
    assert_eq!(
        *packages.install_log.lock().unwrap(),
        ["libxml2-dev", "libxslt1-dev"]
    );
    assert_eq!(*runtime.install_log.lock().unwrap(), ["3.3.0"]);
    assert_eq!(
        second.outcome(Step::InstallPackages).unwrap().status,
        StepStatus::Unchanged
    );
    assert_eq!(
        second.outcome(Step::InstallRuntime).unwrap().status,
        StepStatus::Unchanged
    );
    assert_eq!(
        second.outcome(Step::RemoveStalePins).unwrap().status,
        StepStatus::Unchanged
    );
    assert_eq!(
        second.outcome(Step::WritePin).unwrap().status,
        StepStatus::Unchanged
    );
    assert!(!second.changed());

    let installs = bundler.installs.lock().unwrap();
    assert_eq!(installs.len(), 2);
    assert_eq!(installs[0], installs[1]);
}

#[tokio::test]
async fn test_absent_gem_installs_no_packages() {
    let dir = checkout(Some("GEM\n  specs:\n    rack (3.0.8)\n"));
    let config = config_with("production", &[("nokogiri", &["libxml2-dev"])]);
    let packages = FakePackages::default();
    let runtime = FakeRuntime::new("3.2.2");
    let bundler = FakeBundler::default();

    let report = Converger::new(&config, &packages, &runtime, &bundler)
        .converge(dir.path())
        .await
        .unwrap();

    assert!(packages.install_log.lock().unwrap().is_empty());
    assert_eq!(
        report.outcome(Step::InstallPackages).unwrap().status,
        StepStatus::Unchanged
    );
}

#[tokio::test]
async fn test_missing_lockfile_is_not_an_error() {
    let dir = checkout(None);
    let config = config_with("production", &[("nokogiri", &["libxml2-dev"])]);
    let packages = FakePackages::default();
    let runtime = FakeRuntime::new("3.2.2");
    let bundler = FakeBundler::default();

    Converger::new(&config, &packages, &runtime, &bundler)
        .converge(dir.path())
        .await
        .unwrap();

    assert!(packages.install_log.lock().unwrap().is_empty());
    assert_eq!(bundler.installs.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_assume_present_installs_without_lockfile() {
    let dir = checkout(None);
    let mut config = config_with("production", &[("nokogiri", &["libxml2-dev"])]);
    config.scan_policy = ScanPolicy::AssumePresent;
    let packages = FakePackages::default();
    let runtime = FakeRuntime::new("3.2.2");
    let bundler = FakeBundler::default();

    Converger::new(&config, &packages, &runtime, &bundler)
        .converge(dir.path())
        .await
        .unwrap();

    assert_eq!(*packages.install_log.lock().unwrap(), ["libxml2-dev"]);
}

#[tokio::test]
async fn test_package_failure_aborts_remaining_steps() {
    let dir = checkout(Some(NOKOGIRI_LOCK));
    let config = config_with("production", &[("nokogiri", &["libxml2-dev", "libxslt1-dev"])]);
    let packages = FakePackages {
        broken: Some("libxml2-dev".to_string()),
        ..FakePackages::default()
    };
    let runtime = FakeRuntime::new("3.2.2");
    let bundler = FakeBundler::default();

    let err = Converger::new(&config, &packages, &runtime, &bundler)
        .converge(dir.path())
        .await
        .unwrap_err();

    match &err {
        Error::Step { step, source } => {
            assert_eq!(*step, Step::InstallPackages);
            assert!(
                matches!(source.as_ref(), Error::PackageInstall { package, .. } if package == "libxml2-dev")
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        err.failed_command(),
        Some(("apt-get install -y libxml2-dev", Some(100)))
    );

    assert!(packages.install_log.lock().unwrap().is_empty());
    assert!(runtime.install_log.lock().unwrap().is_empty());
    assert!(!dir.path().join(PIN_FILE_NAME).exists());
    assert!(bundler.installs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_runtime_install_failure_leaves_no_pin() {
    let dir = checkout(None);
    let config = config_with("production", &[]);
    let packages = FakePackages::default();
    let mut runtime = FakeRuntime::new("9.9.9");
    runtime.fail_install = true;
    let bundler = FakeBundler::default();

    let err = Converger::new(&config, &packages, &runtime, &bundler)
        .converge(dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Step { step: Step::InstallRuntime, .. }));
    assert!(!dir.path().join(PIN_FILE_NAME).exists());
    assert!(bundler.installs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_current_version_is_fatal() {
    let dir = checkout(None);
    let config = config_with("production", &[]);
    let packages = FakePackages::default();
    let runtime = FakeRuntime::new("");
    let bundler = FakeBundler::default();

    let err = Converger::new(&config, &packages, &runtime, &bundler)
        .converge(dir.path())
        .await
        .unwrap_err();

    match err {
        Error::Step { step, source } => {
            assert_eq!(step, Step::ResolveRuntime);
            assert!(matches!(*source, Error::RuntimeQuery { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_dependency_failure_is_reported_last() {
    let dir = checkout(None);
    let config = config_with("development", &[]);
    let packages = FakePackages::default();
    let runtime = FakeRuntime::new("3.2.2");
    let bundler = FakeBundler {
        fail: true,
        ..FakeBundler::default()
    };

    let err = Converger::new(&config, &packages, &runtime, &bundler)
        .converge(dir.path())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Step {
            step: Step::InstallDependencies,
            ..
        }
    ));
    // Earlier steps already converged
    assert_eq!(
        std::fs::read_to_string(dir.path().join(PIN_FILE_NAME)).unwrap(),
        "3.2.2"
    );
}

#[tokio::test]
async fn test_project_policy_uses_declared_version() {
    let dir = checkout(None);
    let mut config = config_with("production", &[]);
    config.runtime_version = RuntimeVersionPolicy::Project;
    let packages = FakePackages::default();
    let runtime = FakeRuntime::new("3.2.2");
    let bundler = FakeBundler {
        declared: Some("3.1.4p223 (legacy)\n".to_string()),
        ..FakeBundler::default()
    };

    let report = Converger::new(&config, &packages, &runtime, &bundler)
        .converge(dir.path())
        .await
        .unwrap();

    assert_eq!(*bundler.queried_prefixes.lock().unwrap(), [None]);
    assert_eq!(report.runtime_version, "3.1.4p223-legacy");
    assert_eq!(report.version_source, VersionSource::Project);
    assert_eq!(
        std::fs::read_to_string(dir.path().join(PIN_FILE_NAME)).unwrap(),
        "3.1.4p223-legacy"
    );
}

#[tokio::test]
async fn test_project_policy_falls_back_on_sentinel() {
    let dir = checkout(None);
    let mut config = config_with("production", &[]);
    config.runtime_version = RuntimeVersionPolicy::Project;
    let packages = FakePackages::default();
    let runtime = FakeRuntime::new("3.2.2");
    let bundler = FakeBundler::default();

    let report = Converger::new(&config, &packages, &runtime, &bundler)
        .converge(dir.path())
        .await
        .unwrap();

    assert_eq!(report.runtime_version, "3.2.2");
    assert_eq!(report.version_source, VersionSource::Manager);
}

#[tokio::test]
async fn test_unknown_profile_excludes_all_and_passes_prefix() {
    let dir = checkout(None);
    let mut config = config_with("staging", &[]);
    config.activation_prefix = Some("rbenv exec".to_string());
    let packages = FakePackages::default();
    let runtime = FakeRuntime::new("3.2.2");
    let bundler = FakeBundler::default();

    let report = Converger::new(&config, &packages, &runtime, &bundler)
        .converge(dir.path())
        .await
        .unwrap();

    assert_eq!(report.excluded_profiles, Profile::ALL);
    let installs = bundler.installs.lock().unwrap();
    assert_eq!(installs[0].excluded, Profile::ALL);
    assert_eq!(installs[0].user, None);
    assert_eq!(installs[0].prefix.as_deref(), Some("rbenv exec"));
}

#[tokio::test]
async fn test_missing_directory_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let config = ConvergeConfig::default();
    let packages = FakePackages::default();
    let runtime = FakeRuntime::new("3.2.2");
    let bundler = FakeBundler::default();

    let err = Converger::new(&config, &packages, &runtime, &bundler)
        .converge(&dir.path().join("gone"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Configuration { .. }));
}

#[tokio::test]
async fn test_project_policy_queries_through_activation_prefix() {
    let dir = checkout(None);
    let mut config = config_with("production", &[]);
    config.runtime_version = RuntimeVersionPolicy::Project;
    config.activation_prefix = Some("eval \"$(rbenv init -)\" &&".to_string());
    let packages = FakePackages::default();
    let runtime = FakeRuntime::new("3.2.2");
    let bundler = FakeBundler {
        declared: Some("ruby 3.3.0\n".to_string()),
        ..FakeBundler::default()
    };

    let report = Converger::new(&config, &packages, &runtime, &bundler)
        .converge(dir.path())
        .await
        .unwrap();

    assert_eq!(report.runtime_version, "ruby-3.3.0");
    assert_eq!(
        *bundler.queried_prefixes.lock().unwrap(),
        [Some("eval \"$(rbenv init -)\" &&".to_string())]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_unknown_user_fails_before_any_step() {
    let dir = checkout(Some(NOKOGIRI_LOCK));
    std::fs::write(dir.path().join(".rvmrc"), "rvm use 1.9.3").unwrap();
    let mut config = config_with("production", &[("nokogiri", &["libxml2-dev"])]);
    config.user = Some("no-such-user-rackenv".to_string());
    let packages = FakePackages::default();
    let runtime = FakeRuntime::new("3.2.2");
    let bundler = FakeBundler::default();

    let err = Converger::new(&config, &packages, &runtime, &bundler)
        .converge(dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Configuration { .. }));
    assert!(err.to_string().contains("no-such-user-rackenv"));
    assert!(packages.install_log.lock().unwrap().is_empty());
    assert!(runtime.install_log.lock().unwrap().is_empty());
    assert!(bundler.installs.lock().unwrap().is_empty());
    assert!(!dir.path().join(PIN_FILE_NAME).exists());
    assert!(dir.path().join(".rvmrc").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_unknown_group_fails_before_any_step() {
    let dir = checkout(None);
    let mut config = config_with("production", &[]);
    config.group = Some("no-such-group-rackenv".to_string());
    let packages = FakePackages::default();
    let runtime = FakeRuntime::new("3.2.2");
    let bundler = FakeBundler::default();

    let err = Converger::new(&config, &packages, &runtime, &bundler)
        .converge(dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Configuration { .. }));
    assert!(!dir.path().join(PIN_FILE_NAME).exists());
    assert!(bundler.installs.lock().unwrap().is_empty());
}
