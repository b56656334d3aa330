use std::sync::Arc;

use log::{debug, info};

use noderig_backend::{
    CommandRunner, HostInfo, ProvisionContext, RuntimeHandle, RuntimeProvider, VersionSpec,
};
use noderig_core::{CatalogDrift, HttpArchiveFetcher, NODEJS, check_catalog_freshness};
use noderig_npm::{
    JavascriptExecute, NodePackages, PackageRequest, ProjectInstall, Reconciliation, RuntimeTarget,
};
use noderig_platform::{AppPaths, ProcessRunner, detect_host};
use noderig_providers::{
    CommandSclPackages, CommandSystemPackages, RuntimeInstallation, default_providers,
    select_provider,
};

use crate::cli::{ExecArgs, NpmInstallArgs, PackageArgs, RuntimeArgs, TargetArgs};
use crate::error::AppError;
use crate::settings::Settings;

/// Everything one invocation needs: settings, host facts and collaborators.
pub struct Noderig {
    settings: Settings,
    runner: Arc<dyn CommandRunner>,
    context: ProvisionContext,
    providers: Vec<Arc<dyn RuntimeProvider>>,
}

impl Noderig {
    pub async fn new(settings: Settings, paths: &AppPaths) -> Result<Self, AppError> {
        let host = detect_host().await;
        info!("Detected host {host}");
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new());
        let context = build_context(&settings, paths, host, &runner)?;

        Ok(Self {
            settings,
            runner,
            context,
            providers: default_providers(),
        })
    }

    fn installation(
        &self,
        version: &str,
        provider: Option<&str>,
    ) -> Result<RuntimeInstallation, AppError> {
        let spec = VersionSpec::new(version);
        let provider = select_provider(&self.providers, &spec, &self.context.host, provider)?;
        Ok(RuntimeInstallation::new(provider, spec))
    }

    pub async fn install_runtime(&self, args: &RuntimeArgs) -> Result<RuntimeHandle, AppError> {
        let mut installation = self.installation(&args.version, args.provider.as_deref())?;
        Ok(installation.install(&self.context).await?)
    }

    pub async fn uninstall_runtime(&self, args: &RuntimeArgs) -> Result<(), AppError> {
        let mut installation = self.installation(&args.version, args.provider.as_deref())?;
        Ok(installation.uninstall(&self.context).await?)
    }

    pub async fn describe_runtime(&self, args: &RuntimeArgs) -> Result<RuntimeHandle, AppError> {
        let installation = self.installation(&args.version, args.provider.as_deref())?;
        Ok(installation.describe(&self.context).await?)
    }

    async fn target(&self, args: &TargetArgs) -> Result<RuntimeTarget, AppError> {
        let parent = match &args.runtime {
            Some(version) => Some(
                self.installation(version, args.provider.as_deref())?
                    .describe(&self.context)
                    .await?,
            ),
            None => None,
        };
        Ok(RuntimeTarget::resolve(
            parent.as_ref(),
            args.node.as_deref(),
            args.npm.as_deref(),
        )?)
    }

    pub async fn reconcile_packages(&self, args: PackageArgs) -> Result<Reconciliation, AppError> {
        let target = self.target(&args.target).await?;
        let unsafe_perm = args
            .unsafe_perm
            .map_or(self.settings.unsafe_perm, |flag| flag.flag());
        let request = PackageRequest::from_specs(args.packages.as_slice())
            .path(args.path)
            .user(args.user)
            .group(args.group)
            .unsafe_perm(unsafe_perm)
            .source(args.source);

        let packages = NodePackages::new(Arc::clone(&self.runner), target)
            .timeout(Some(self.settings.command_timeout()));
        Ok(packages.reconcile(args.action.into(), &request).await?)
    }

    pub async fn install_project(&self, args: NpmInstallArgs) -> Result<bool, AppError> {
        let target = self.target(&args.target).await?;
        let mut install = ProjectInstall::new(args.dir);
        install.production = !args.development;
        install.unsafe_perm = args
            .unsafe_perm
            .map_or(self.settings.unsafe_perm, |flag| flag.flag());
        install.user = args.user;
        install.group = args.group;
        Ok(install.run(self.runner.as_ref(), &target).await?)
    }

    /// Run node and return its exit status, `None` when it was killed by a signal.
    pub async fn execute(&self, args: ExecArgs) -> Result<Option<i32>, AppError> {
        let target = self.target(&args.target).await?;
        let mut execute = JavascriptExecute::new(args.args);
        execute.cwd = args.cwd;
        execute.user = args.user;
        execute.group = args.group;
        execute.environment = args.environment.into_iter().collect();

        let output = execute.run(self.runner.as_ref(), &target).await?;
        print!("{}", output.stdout);
        eprint!("{}", output.stderr);
        debug!("node exited with status {:?}", output.status);
        Ok(output.status)
    }
}

fn build_context(
    settings: &Settings,
    paths: &AppPaths,
    host: HostInfo,
    runner: &Arc<dyn CommandRunner>,
) -> Result<ProvisionContext, AppError> {
    let fetcher = HttpArchiveFetcher::new(
        paths.download_dir(),
        settings.http_timeout(),
        settings.verify_checksums,
    )?;
    let system_packages =
        CommandSystemPackages::new(Arc::clone(runner), &host, settings.command_timeout());
    let scl_packages = CommandSclPackages::new(Arc::clone(runner), settings.command_timeout());

    Ok(ProvisionContext {
        host,
        install_root: settings.install_root.clone(),
        dist_urls: settings.dist_urls(),
        fetcher: Arc::new(fetcher),
        system_packages: Arc::new(system_packages),
        scl_packages: Arc::new(scl_packages),
    })
}

/// Compare the Node.js catalog with the release index at `index_url`.
pub async fn check_catalog(settings: &Settings, index_url: &str) -> Result<CatalogDrift, AppError> {
    let client = reqwest::Client::builder()
        .timeout(settings.http_timeout())
        .user_agent(format!("noderig/{}", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(check_catalog_freshness(&client, index_url, &NODEJS).await?)
}

/// Human-readable summary of a drift report.
pub fn describe_drift(drift: &CatalogDrift) -> String {
    if drift.is_current() {
        return "nodejs catalog is up to date".to_string();
    }
    let mut lines = vec!["nodejs catalog drifted from the release index".to_string()];
    if drift.expected_first != drift.actual_first {
        lines.push(format!(
            "  default: {} (catalog has {})",
            drift.expected_first.as_deref().unwrap_or("none"),
            drift.actual_first.as_deref().unwrap_or("none")
        ));
    }
    if !drift.missing.is_empty() {
        lines.push(format!("  missing: {}", drift.missing.join(", ")));
    }
    if !drift.outdated.is_empty() {
        lines.push(format!("  outdated: {}", drift.outdated.join(", ")));
    }
    lines.join("\n")
}
