//! End-to-end build: document bytes to a published release.
//!
//! ```text
//! bytes → parse + validate → name tables → resolve templates
//!       → re-type + re-validate → generate fragments → release
//! ```

use std::path::PathBuf;

use thiserror::Error;

use crate::config::{parse_and_validate, typed_config, BuildSettings, Config, ConfigError, LoadedConfig, SettingsError};
use crate::directives::{generate_fragments, name_tables, Fragment, GenerationError};
use crate::release::{ConfigChecker, DeployError, ReleaseManager};
use crate::template::{resolve_document, Evaluator, HandlebarsEvaluator, NameTables, Node, ScopeBuilder, TemplateError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("deployment failed: {0}")]
    Deploy(#[from] DeployError),
}

/// Everything one document compiles to.
#[derive(Debug, Clone)]
pub struct Compiled {
    /// Typed view of the resolved document.
    pub config: Config,
    /// The resolved raw tree.
    pub document: Node,
    pub names: NameTables,
    pub fragments: Vec<Fragment>,
}

/// Build pipeline for one application.
pub struct Pipeline<E = HandlebarsEvaluator> {
    settings: BuildSettings,
    evaluator: E,
}

impl Pipeline<HandlebarsEvaluator> {
    pub fn new(settings: BuildSettings) -> Self {
        Self::with_evaluator(settings, HandlebarsEvaluator::new())
    }
}

impl<E: Evaluator> Pipeline<E> {
    pub fn with_evaluator(settings: BuildSettings, evaluator: E) -> Self {
        Self { settings, evaluator }
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Release manager for `<working_dir>/conf.d`.
    pub fn release_manager(&self) -> ReleaseManager {
        ReleaseManager::new(self.settings.release.conf_root())
    }

    /// Parse, validate and resolve a document.
    ///
    /// Returns the resolved raw tree together with the typed view of it;
    /// the typed view is validated again after resolution.
    pub fn resolve(&self, bytes: &[u8]) -> Result<(Config, Node), PipelineError> {
        self.settings.validate()?;

        let LoadedConfig { config, mut document } = parse_and_validate(bytes).map_err(|e| {
            tracing::warn!(error = %e, "Document rejected");
            e
        })?;
        tracing::info!(
            app = %self.settings.app_name,
            vhosts = config.vhosts.len(),
            upstreams = config.upstreams.len(),
            "Configuration loaded"
        );

        let names = name_tables(&config, &self.settings);
        resolve_document(&mut document, &ScopeBuilder::with_names(&config, &names), &self.evaluator)?;
        let config = typed_config(&document)?;
        tracing::debug!("Templates resolved");

        Ok((config, document))
    }

    /// Compile a document into release fragments without touching disk.
    pub fn compile(&self, bytes: &[u8]) -> Result<Compiled, PipelineError> {
        let (config, document) = self.resolve(bytes)?;
        let names = name_tables(&config, &self.settings);
        let fragments = generate_fragments(&config, &self.settings, &names, &self.evaluator)?;
        tracing::info!(fragments = fragments.len(), "Configuration compiled");

        Ok(Compiled {
            config,
            document,
            names,
            fragments,
        })
    }

    /// Compile and release a document; returns the published release.
    pub fn deploy<C>(
        &self,
        bytes: &[u8],
        manager: &ReleaseManager,
        checker: &C,
    ) -> Result<PathBuf, PipelineError>
    where
        C: ConfigChecker + ?Sized,
    {
        let compiled = self.compile(bytes)?;
        Ok(manager.deploy(&compiled.fragments, checker)?)
    }
}
