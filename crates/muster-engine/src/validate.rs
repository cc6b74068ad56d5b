//! Input validation
//!
//! Every rule rejects with [`EngineError::Validation`] carrying the
//! blueprint's configured message when one exists. Validation runs before
//! the lease is taken; nothing here touches the grid.

use crate::aggregate::RosterView;
use crate::error::EngineError;
use muster_blueprint::{BlueprintConfig, ConfigError, UsernameRules};
use regex::Regex;

/// Check an identity string against the configured username rules
///
/// # Errors
/// [`EngineError::Validation`] with the configured (or default) message on
/// the first rule that fails; a malformed configured pattern is a
/// configuration fault.
pub fn check_identity(identity: &str, rules: &UsernameRules) -> Result<(), EngineError> {
    let identity = identity.trim();
    if identity.is_empty() {
        return Err(EngineError::Validation("identity must not be blank".into()));
    }

    let len = identity.chars().count();
    if rules.min_length.is_some_and(|min| len < min)
        || rules.max_length.is_some_and(|max| len > max)
    {
        return Err(EngineError::Validation(message(
            rules.length_error.as_deref(),
            "identity length out of range",
        )));
    }

    if let Some(pattern) = &rules.regex {
        let re = Regex::new(&format!("^(?:{pattern})$")).map_err(|_| {
            EngineError::Configuration(ConfigError::InvalidPattern(pattern.clone()))
        })?;
        if !re.is_match(identity) {
            return Err(EngineError::Validation(message(
                rules.regex_error.as_deref(),
                "identity contains disallowed characters",
            )));
        }
    }

    if rules.no_edge_underscore && (identity.starts_with('_') || identity.ends_with('_')) {
        return Err(EngineError::Validation(message(
            rules.edge_underscore_error.as_deref(),
            "identity must not start or end with an underscore",
        )));
    }

    if let Some(max) = rules.max_underscores {
        if identity.matches('_').count() > max {
            return Err(EngineError::Validation(message(
                rules.underscores_error.as_deref(),
                "identity contains too many underscores",
            )));
        }
    }

    Ok(())
}

/// Reject identities and contact ids already on the roster
///
/// `exclude` skips the record being edited so it does not collide with
/// itself.
///
/// # Errors
/// [`EngineError::Validation`] naming the duplicated field.
pub fn check_unique(
    view: &RosterView,
    identity: &str,
    contact_id: Option<&str>,
    exclude: Option<&muster_blueprint::Coordinate>,
) -> Result<(), EngineError> {
    let identity = identity.trim();
    for person in &view.people {
        if exclude.is_some_and(|c| c == &person.source) {
            continue;
        }
        if person.identity.eq_ignore_ascii_case(identity) {
            return Err(EngineError::Validation(format!(
                "'{identity}' is already on the roster at {}",
                person.display_location
            )));
        }
        if let (Some(new_id), Some(have)) = (contact_id, &person.contact_id) {
            if !new_id.trim().is_empty() && have.eq_ignore_ascii_case(new_id.trim()) {
                return Err(EngineError::Validation(format!(
                    "contact id '{}' is already on the roster",
                    new_id.trim()
                )));
            }
        }
    }
    Ok(())
}

/// Enforce the email-on-file requirement for senior ranks
///
/// # Errors
/// [`EngineError::Validation`] when the rank meets the configured threshold
/// and no email is on file.
pub fn check_email(
    config: &BlueprintConfig,
    rank: &str,
    email: Option<&str>,
) -> Result<(), EngineError> {
    let Some(threshold) = &config.email_required_min_rank else {
        return Ok(());
    };
    if !config.ranks.at_or_above(rank, threshold) {
        return Ok(());
    }
    match email {
        Some(e) if !e.trim().is_empty() => Ok(()),
        _ => Err(EngineError::Validation(format!(
            "an email address is required for {rank} and above"
        ))),
    }
}

/// Enforce the training gate for promotions into senior ranks
///
/// `acknowledged` is the caller's explicit override; the gate warns, it
/// does not hard-block.
///
/// # Errors
/// [`EngineError::Validation`] naming the training requirement when the
/// target rank triggers the gate, the flag is unset, and the caller has not
/// acknowledged.
pub fn check_training(
    config: &BlueprintConfig,
    target_rank: &str,
    training_passed: bool,
    acknowledged: bool,
) -> Result<(), EngineError> {
    let Some(gate) = &config.training else {
        return Ok(());
    };
    if training_passed || acknowledged {
        return Ok(());
    }
    if config.ranks.at_or_above(target_rank, &gate.trigger_rank) {
        return Err(EngineError::Validation(format!(
            "{} has not been passed; required for {target_rank}",
            gate.name
        )));
    }
    Ok(())
}

fn message(configured: Option<&str>, default: &str) -> String {
    configured.unwrap_or(default).to_string()
}
