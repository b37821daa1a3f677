use crate::concurrency::ensure_not_interrupted;
use crate::packager::PackageReport;
use crate::pipeline::Pipeline;
use crate::CoreError;
use kiln_runtime::{resolve_revision, ToolRunner};
use kiln_schema::{
    compute_package_id, configure_options, parse_recipe_file, ConsumerMetadata, NormalizedRecipe,
    OptionOverrides, PackageIdentity, ResolvedOptions, Revision, Settings, SourceLock,
    LOCK_FILENAME,
};
use kiln_store::{
    IntegrityReport, MetadataStore, PackageManifest, PackageMetadata, PackageState, StoreLayout,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Central orchestration engine for Kiln packages.
///
/// Runs recipes through the lifecycle into per-package folders under the
/// store root and records every finished package in the metadata store.
/// Callers that mutate the store are expected to hold a `StoreLock`.
pub struct Engine {
    layout: StoreLayout,
    meta_store: MetadataStore,
}

#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub overrides: OptionOverrides,
    /// Take the source revision from `kiln.lock` instead of resolving it.
    pub locked: bool,
    /// Empty artifact rules and unmatched consumer libs are errors.
    pub strict_artifacts: bool,
    /// Keep the source and build folders after a successful create.
    pub keep_intermediates: bool,
}

/// Result of a successful create.
#[derive(Debug, Clone, Serialize)]
pub struct CreateResult {
    pub identity: PackageIdentity,
    pub metadata: PackageMetadata,
    pub consumer: ConsumerMetadata,
    pub report: PackageReport,
    pub unmatched_libs: Vec<String>,
    pub package_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub lock: SourceLock,
    pub path: PathBuf,
}

/// What a create would produce for given settings, without touching the store.
#[derive(Debug, Clone, Serialize)]
pub struct PackagePlan {
    pub identity: PackageIdentity,
    pub settings: Settings,
    pub options: ResolvedOptions,
    pub consumer: ConsumerMetadata,
    pub steps: Vec<String>,
}

/// Parse and normalize the recipe at `path`.
pub fn load_recipe(path: &Path) -> Result<NormalizedRecipe, CoreError> {
    Ok(parse_recipe_file(path)?.normalize()?)
}

fn recipe_dir(recipe_path: &Path) -> PathBuf {
    match recipe_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

impl Engine {
    pub fn new(store_root: impl Into<PathBuf>) -> Self {
        let layout = StoreLayout::new(store_root);
        let meta_store = MetadataStore::new(layout.clone());
        Self { layout, meta_store }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Resolve options, identity, and consumer metadata for `settings`.
    pub fn plan(
        recipe: &NormalizedRecipe,
        settings: &Settings,
        overrides: &OptionOverrides,
    ) -> Result<PackagePlan, CoreError> {
        settings.validate()?;
        let options = configure_options(&recipe.options, settings, overrides)?;
        let identity = compute_package_id(recipe, settings, &options);
        let consumer = recipe.consumer_metadata(&options);
        let steps = recipe
            .steps
            .iter()
            .filter(|s| s.runs_on(settings.os))
            .map(kiln_schema::NormalizedBuildStep::command_line)
            .collect();
        Ok(PackagePlan {
            identity,
            settings: settings.clone(),
            options,
            consumer,
            steps,
        })
    }

    /// Pin the recipe's source revision and write `kiln.lock` next to it.
    pub fn export(
        &self,
        recipe_path: &Path,
        runner: &dyn ToolRunner,
    ) -> Result<ExportResult, CoreError> {
        info!("exporting recipe {}", recipe_path.display());
        let recipe = load_recipe(recipe_path)?;
        let dir = recipe_dir(recipe_path);
        let revision = resolve_revision(&recipe.source, &dir, runner)?;
        let lock = SourceLock::from_resolved(&recipe, revision);
        lock.verify()?;

        let path = dir.join(LOCK_FILENAME);
        lock.write_to_file(&path)?;
        info!("pinned {} at {}", recipe.source.url, lock.revision);
        Ok(ExportResult { lock, path })
    }

    fn pinned_revision(
        recipe: &NormalizedRecipe,
        dir: &Path,
        runner: &dyn ToolRunner,
        locked: bool,
    ) -> Result<Revision, CoreError> {
        if locked {
            let lock = SourceLock::read_from_file(dir.join(LOCK_FILENAME))?;
            lock.verify()?;
            lock.verify_recipe_intent(recipe)?;
            debug!("using locked revision {}", lock.revision);
            Ok(lock.revision)
        } else {
            Ok(resolve_revision(&recipe.source, dir, runner)?)
        }
    }

    /// Drop what a failed create left under `work/<id>`. With `keep_intermediates`
    /// the source and build folders stay for inspection.
    fn discard_failed(&self, package_id: &str, package_dir: &Path, keep_intermediates: bool) {
        let cleanup = if keep_intermediates {
            if package_dir.exists() {
                std::fs::remove_dir_all(package_dir).map_err(kiln_store::StoreError::Io)
            } else {
                Ok(())
            }
        } else {
            self.layout.remove_work(package_id)
        };
        if let Err(e) = cleanup {
            warn!("failed to clean up work folder for {package_id}: {e}");
        }
    }

    /// Run the full lifecycle for the recipe at `recipe_path`.
    ///
    /// Fail-fast: if any hook fails or a shutdown is requested, the work
    /// folder is removed and no metadata is written. An existing package with
    /// the same id is replaced.
    pub fn create(
        &self,
        recipe_path: &Path,
        settings: &Settings,
        runner: &dyn ToolRunner,
        opts: &CreateOptions,
    ) -> Result<CreateResult, CoreError> {
        info!("creating package from {}", recipe_path.display());
        self.layout.initialize()?;

        let recipe = load_recipe(recipe_path)?;
        let dir = recipe_dir(recipe_path);
        let revision = Self::pinned_revision(&recipe, &dir, runner, opts.locked)?;

        let mut pipeline = Pipeline::new(&recipe, settings.clone(), runner, &self.layout, &dir)
            .strict(opts.strict_artifacts);
        let identity = pipeline.configure(&opts.overrides)?.clone();
        let previous = self.meta_store.get(&identity.package_id).ok();
        if previous.is_some() {
            info!("replacing existing package {}", identity.short_id);
            self.meta_store.remove(&identity.package_id)?;
        }

        let package_dir = self.layout.package_dir(&identity.package_id);
        let run = |p: &mut Pipeline<'_>| -> Result<(), CoreError> {
            ensure_not_interrupted()?;
            p.acquire_source(&revision)?;
            ensure_not_interrupted()?;
            p.build()?;
            ensure_not_interrupted()?;
            p.package()?;
            ensure_not_interrupted()?;
            p.describe()?;
            Ok(())
        };
        if let Err(e) = run(&mut pipeline) {
            warn!("create failed for {}: {e}", identity.short_id);
            self.discard_failed(&identity.package_id, &package_dir, opts.keep_intermediates);
            return Err(e);
        }

        let (Some(options), Some(report), Some(consumer)) = (
            pipeline.options().cloned(),
            pipeline.report().cloned(),
            pipeline.consumer().cloned(),
        ) else {
            return Err(CoreError::InvalidTransition {
                from: pipeline
                    .state()
                    .map_or_else(|| "(start)".to_owned(), |s| s.to_string()),
                to: PackageState::Described.to_string(),
            });
        };
        let unmatched_libs = pipeline.unmatched_libs().to_vec();

        let manifest = PackageManifest::compute(&package_dir)?;
        manifest.write_to(&package_dir)?;

        let now = chrono::Utc::now().to_rfc3339();
        let metadata = PackageMetadata {
            package_id: identity.package_id.clone(),
            short_id: identity.short_id.clone(),
            name: recipe.name.clone(),
            version: recipe.version.clone(),
            settings: settings.clone(),
            options,
            revision,
            state: PackageState::Described,
            libs: consumer.libs.clone(),
            files: manifest.files(),
            created_at: previous.map_or_else(|| now.clone(), |p| p.created_at),
            updated_at: now,
            checksum: None,
        };
        self.meta_store.put(&metadata)?;

        if !opts.keep_intermediates {
            self.layout.clean_intermediates(&identity.package_id)?;
        }

        info!(
            "created {} ({}) with {} files",
            metadata.reference(),
            identity.short_id,
            metadata.files.len()
        );
        Ok(CreateResult {
            identity,
            metadata,
            consumer,
            report,
            unmatched_libs,
            package_dir,
        })
    }

    /// Map a full id, short id, or unique prefix to a full package id.
    pub fn resolve_package_id(&self, input: &str) -> Result<String, CoreError> {
        if input.len() == 64 && self.meta_store.exists(input) {
            return Ok(input.to_owned());
        }
        let packages = self.list()?;
        if let Some(m) = packages.iter().find(|m| *m.short_id == *input) {
            return Ok(m.package_id.to_string());
        }
        let matches: Vec<_> = packages
            .iter()
            .filter(|m| m.package_id.starts_with(input))
            .collect();
        match matches.as_slice() {
            [] => Err(CoreError::PackageNotFound(input.to_owned())),
            [one] => Ok(one.package_id.to_string()),
            many => Err(CoreError::AmbiguousPackage {
                prefix: input.to_owned(),
                count: many.len(),
            }),
        }
    }

    pub fn inspect(&self, package: &str) -> Result<PackageMetadata, CoreError> {
        let id = self.resolve_package_id(package)?;
        Ok(self.meta_store.get(&id)?)
    }

    pub fn list(&self) -> Result<Vec<PackageMetadata>, CoreError> {
        Ok(self.meta_store.list()?)
    }

    /// Delete a package's metadata and folders.
    pub fn remove(&self, package: &str) -> Result<PackageMetadata, CoreError> {
        let id = self.resolve_package_id(package)?;
        let meta = self.meta_store.get(&id)?;
        self.meta_store.remove(&id)?;
        self.layout.remove_work(&id)?;
        info!("removed {} ({})", meta.reference(), meta.short_id);
        Ok(meta)
    }

    /// Check a package folder against its manifest and metadata.
    ///
    /// Metadata checksum failures surface as errors; file-level differences
    /// are reported in the returned `IntegrityReport`.
    pub fn verify(&self, package: &str) -> Result<IntegrityReport, CoreError> {
        let id = self.resolve_package_id(package)?;
        let meta = self.meta_store.get(&id)?;
        let package_dir = self.layout.package_dir(&id);
        let manifest = PackageManifest::read_from(&package_dir)?;
        let mut report = manifest.verify(&package_dir)?;

        for file in &meta.files {
            if !manifest.entries.contains_key(file) && !report.missing.contains(file) {
                report.missing.push(file.clone());
            }
        }
        if !report.is_clean() {
            warn!(
                "package {} failed verification: {} missing, {} modified, {} unexpected",
                meta.short_id,
                report.missing.len(),
                report.modified.len(),
                report.unexpected.len()
            );
        }
        Ok(report)
    }
}
