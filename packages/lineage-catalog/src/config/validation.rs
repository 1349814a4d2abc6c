//! Configuration validation

use super::error::ConfigResult;

/// Trait for validatable configuration objects
///
/// Returns `Ok(())` if valid, `Err(ConfigError)` with details if invalid.
pub trait Validatable {
    fn validate(&self) -> ConfigResult<()>;
}

/// Check that `value` lies in `min..=max`.
pub(crate) fn check_range<T>(field: &str, value: T, min: T, max: T, hint: &str) -> ConfigResult<()>
where
    T: PartialOrd + ToString,
{
    if value < min || value > max {
        return Err(super::ConfigError::range_with_hint(
            field, value, min, max, hint,
        ));
    }
    Ok(())
}
