use crate::concurrency::ensure_not_interrupted;
use crate::lifecycle::validate_transition;
use crate::packager::{check_consumer_libs, package_artifacts, PackageReport};
use crate::CoreError;
use kiln_runtime::scm::copy_tree;
use kiln_runtime::{acquire_source, write_glue, AcquiredSource, BuildInfo, Invocation, ToolRunner};
use kiln_schema::{
    compute_package_id, configure_options, ConsumerMetadata, NormalizedRecipe, OptionOverrides,
    PackageIdentity, ResolvedOptions, Revision, Settings,
};
use kiln_store::{PackageState, StoreLayout};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One pass of a recipe through the lifecycle.
///
/// Each hook validates its state transition before doing any work, so hooks
/// called out of order fail with `CoreError::InvalidTransition` and leave the
/// pipeline where it was.
pub struct Pipeline<'a> {
    recipe: &'a NormalizedRecipe,
    settings: Settings,
    runner: &'a dyn ToolRunner,
    layout: &'a StoreLayout,
    recipe_dir: PathBuf,
    strict: bool,
    state: Option<PackageState>,
    options: Option<ResolvedOptions>,
    identity: Option<PackageIdentity>,
    source: Option<AcquiredSource>,
    build_root: Option<PathBuf>,
    report: Option<PackageReport>,
    consumer: Option<ConsumerMetadata>,
    unmatched_libs: Vec<String>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        recipe: &'a NormalizedRecipe,
        settings: Settings,
        runner: &'a dyn ToolRunner,
        layout: &'a StoreLayout,
        recipe_dir: &Path,
    ) -> Self {
        Self {
            recipe,
            settings,
            runner,
            layout,
            recipe_dir: recipe_dir.to_path_buf(),
            strict: false,
            state: None,
            options: None,
            identity: None,
            source: None,
            build_root: None,
            report: None,
            consumer: None,
            unmatched_libs: Vec::new(),
        }
    }

    /// Turn artifact mismatches (empty rules, consumer libs without a link
    /// artifact) into errors instead of warnings.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn state(&self) -> Option<PackageState> {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn options(&self) -> Option<&ResolvedOptions> {
        self.options.as_ref()
    }

    pub fn identity(&self) -> Option<&PackageIdentity> {
        self.identity.as_ref()
    }

    pub fn source(&self) -> Option<&AcquiredSource> {
        self.source.as_ref()
    }

    pub fn report(&self) -> Option<&PackageReport> {
        self.report.as_ref()
    }

    pub fn consumer(&self) -> Option<&ConsumerMetadata> {
        self.consumer.as_ref()
    }

    /// Consumer libs with no link artifact, found by `describe` outside strict mode.
    pub fn unmatched_libs(&self) -> &[String] {
        &self.unmatched_libs
    }

    pub fn package_dir(&self) -> Option<PathBuf> {
        self.identity
            .as_ref()
            .map(|id| self.layout.package_dir(&id.package_id))
    }

    fn out_of_order(&self, to: PackageState) -> CoreError {
        CoreError::InvalidTransition {
            from: self
                .state
                .map_or_else(|| "(start)".to_owned(), |s| s.to_string()),
            to: to.to_string(),
        }
    }

    /// Resolve options for the settings, derive the package identity, and
    /// allocate fresh work folders for it.
    pub fn configure(&mut self, overrides: &OptionOverrides) -> Result<&PackageIdentity, CoreError> {
        validate_transition(self.state, PackageState::Configured)?;
        self.settings.validate()?;

        let options = configure_options(&self.recipe.options, &self.settings, overrides)?;
        let identity = compute_package_id(self.recipe, &self.settings, &options);
        info!(
            "configured {}/{} as {} ({})",
            self.recipe.name, self.recipe.version, identity.short_id, self.settings.os
        );
        self.layout.prepare_work(&identity.package_id)?;

        self.options = Some(options);
        self.state = Some(PackageState::Configured);
        Ok(self.identity.insert(identity))
    }

    /// Fetch the pinned source and stage it in the build folder.
    pub fn acquire_source(&mut self, revision: &Revision) -> Result<&AcquiredSource, CoreError> {
        validate_transition(self.state, PackageState::SourceAcquired)?;
        let Some(identity) = &self.identity else {
            return Err(self.out_of_order(PackageState::SourceAcquired));
        };
        let id = identity.package_id.clone();

        let source_dir = self.layout.source_dir(&id);
        let acquired = acquire_source(
            &self.recipe.source,
            revision,
            &self.recipe_dir,
            &source_dir,
            self.runner,
        )?;

        let build_dir = self.layout.build_dir(&id);
        copy_tree(&source_dir, &build_dir)?;
        let build_root = if self.recipe.source.subfolder.is_empty() {
            build_dir
        } else {
            build_dir.join(&self.recipe.source.subfolder)
        };
        debug!("build root {}", build_root.display());

        self.build_root = Some(build_root);
        self.state = Some(PackageState::SourceAcquired);
        Ok(self.source.insert(acquired))
    }

    /// Write generator glue, then run every build step for the target OS.
    /// The first failing step aborts the build.
    pub fn build(&mut self) -> Result<(), CoreError> {
        validate_transition(self.state, PackageState::Built)?;
        let (Some(build_root), Some(options)) = (&self.build_root, &self.options) else {
            return Err(self.out_of_order(PackageState::Built));
        };

        let info = BuildInfo {
            name: &self.recipe.name,
            version: &self.recipe.version,
            settings: &self.settings,
            options,
        };
        if let Some(glue) = write_glue(&self.recipe.generator, &info, build_root)? {
            debug!("wrote generator glue {}", glue.display());
        }

        for step in self.recipe.steps.iter().filter(|s| s.runs_on(self.settings.os)) {
            ensure_not_interrupted()?;
            info!("running '{}'", step.command_line());
            let invocation = Invocation::new(&step.program, build_root)
                .args(step.args.iter().cloned())
                .env("KILN_BUILD_TYPE", self.settings.build_type.as_str());
            let output = self.runner.run_checked(&invocation)?;
            if !output.stdout.is_empty() {
                debug!("{}: {}", step.program, output.stdout.trim_end());
            }
        }

        self.state = Some(PackageState::Built);
        Ok(())
    }

    /// Apply the artifact rules to the build folder. Safe to repeat.
    pub fn package(&mut self) -> Result<&PackageReport, CoreError> {
        validate_transition(self.state, PackageState::Packaged)?;
        let (Some(build_root), Some(package_dir)) = (&self.build_root, self.package_dir()) else {
            return Err(self.out_of_order(PackageState::Packaged));
        };

        let report = package_artifacts(&self.recipe.artifacts, build_root, &package_dir, self.strict)?;
        info!("packaged {} files", report.files.len());

        self.state = Some(PackageState::Packaged);
        Ok(self.report.insert(report))
    }

    /// Compute consumer metadata and check it against the packaged files.
    pub fn describe(&mut self) -> Result<&ConsumerMetadata, CoreError> {
        validate_transition(self.state, PackageState::Described)?;
        let (Some(options), Some(report)) = (&self.options, &self.report) else {
            return Err(self.out_of_order(PackageState::Described));
        };

        let consumer = self.recipe.consumer_metadata(options);
        self.unmatched_libs = check_consumer_libs(&consumer.libs, &report.files, self.strict)?;

        self.state = Some(PackageState::Described);
        Ok(self.consumer.insert(consumer))
    }
}
