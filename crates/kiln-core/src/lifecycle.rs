use crate::CoreError;
use kiln_store::PackageState;

/// Check that a pipeline may move from `from` (`None` before any hook ran) to `to`.
///
/// The lifecycle is strictly sequential. The only repeatable step is
/// packaging, which is idempotent.
pub fn validate_transition(from: Option<PackageState>, to: PackageState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (None, PackageState::Configured)
            | (
                Some(PackageState::Configured),
                PackageState::SourceAcquired
            )
            | (Some(PackageState::SourceAcquired), PackageState::Built)
            | (
                Some(PackageState::Built | PackageState::Packaged),
                PackageState::Packaged
            )
            | (Some(PackageState::Packaged), PackageState::Described)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.map_or_else(|| "(start)".to_owned(), |s| s.to_string()),
            to: to.to_string(),
        })
    }
}
