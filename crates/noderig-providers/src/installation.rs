use std::sync::Arc;

use log::{error, info};

use noderig_backend::{ProvisionContext, ProvisionError, RuntimeHandle, RuntimeProvider, VersionSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallState {
    Absent,
    Installing,
    Installed(RuntimeHandle),
    Uninstalling,
    /// Left behind by a failed install or uninstall. Only a fresh `install`
    /// moves out of it.
    Failed(ProvisionError),
}

/// One runtime request bound to the provider chosen for it.
pub struct RuntimeInstallation {
    provider: Arc<dyn RuntimeProvider>,
    spec: VersionSpec,
    state: InstallState,
}

impl RuntimeInstallation {
    #[must_use]
    pub fn new(provider: Arc<dyn RuntimeProvider>, spec: VersionSpec) -> Self {
        Self {
            provider,
            spec,
            state: InstallState::Absent,
        }
    }

    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    #[must_use]
    pub fn state(&self) -> &InstallState {
        &self.state
    }

    /// The handle of the installed runtime, if any.
    #[must_use]
    pub fn handle(&self) -> Option<&RuntimeHandle> {
        match &self.state {
            InstallState::Installed(handle) => Some(handle),
            _ => None,
        }
    }

    /// The handle the provider would produce, without installing anything.
    ///
    /// # Errors
    /// Returns an error if the spec does not resolve or the provider cannot
    /// compute its environment.
    pub async fn describe(&self, context: &ProvisionContext) -> Result<RuntimeHandle, ProvisionError> {
        let version = self.provider.resolve_version(&self.spec, context)?;
        self.provider.handle(&version, context).await
    }

    /// Resolve the spec and run the provider's install.
    ///
    /// # Errors
    /// Returns the first failure of resolution, installation or handle
    /// construction. The installation is then left in [`InstallState::Failed`].
    pub async fn install(
        &mut self,
        context: &ProvisionContext,
    ) -> Result<RuntimeHandle, ProvisionError> {
        self.state = InstallState::Installing;
        match self.run_install(context).await {
            Ok(handle) => {
                info!(
                    "Installed {} {} at {}",
                    handle.provider,
                    handle.version,
                    handle.binary.display()
                );
                self.state = InstallState::Installed(handle.clone());
                Ok(handle)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn run_install(&self, context: &ProvisionContext) -> Result<RuntimeHandle, ProvisionError> {
        let version = self.provider.resolve_version(&self.spec, context)?;
        self.provider.install(&version, context).await?;
        self.provider.handle(&version, context).await
    }

    /// Run the provider's uninstall for the resolved spec.
    ///
    /// # Errors
    /// Returns the failure of resolution or removal. The installation is then
    /// left in [`InstallState::Failed`].
    pub async fn uninstall(&mut self, context: &ProvisionContext) -> Result<(), ProvisionError> {
        self.state = InstallState::Uninstalling;
        let result = match self.provider.resolve_version(&self.spec, context) {
            Ok(version) => self.provider.uninstall(&version, context).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                info!("Uninstalled {} '{}'", self.provider.name(), self.spec);
                self.state = InstallState::Absent;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn fail(&mut self, err: ProvisionError) -> ProvisionError {
        error!("{} '{}' failed: {err}", self.provider.name(), self.spec);
        self.state = InstallState::Failed(err.clone());
        err
    }
}
