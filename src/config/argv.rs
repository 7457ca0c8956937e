//! Parsing of raw `--key=value` override tokens.

use crate::config::registry::Backend;
use crate::config::resolve::CliOverrides;
use crate::error::ConfigError;

/// Parse trailing override tokens into `overrides`.
///
/// `--field=value` lands in the general layer, `--BACKEND.field=value` in
/// the backend-scoped layer. Field names are not checked here; unknown
/// fields are simply never consulted by the resolver.
pub fn parse_overrides<I, S>(tokens: I, overrides: &mut CliOverrides) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for token in tokens {
        let token = token.as_ref();
        let Some((key, value)) = token
            .strip_prefix("--")
            .and_then(|rest| rest.split_once('='))
        else {
            return Err(ConfigError::invalid(token, "Expected an override of the form --key=value"));
        };

        if key.is_empty() {
            return Err(ConfigError::invalid(token, "Override key must not be empty"));
        }

        match key.split_once('.') {
            Some((scope, field)) => {
                let backend: Backend = scope
                    .parse()
                    .map_err(|_| ConfigError::UnknownKey(key.to_string()))?;
                if field.is_empty() {
                    return Err(ConfigError::invalid(token, "Override key must not be empty"));
                }
                overrides.set_scoped(backend, field, value);
            }
            None => overrides.set_general(key, value),
        }
    }

    Ok(())
}
