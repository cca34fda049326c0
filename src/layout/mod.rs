//! Core data structures for assembling hierarchical layouts: ports,
//! components, references, the connection solver and port naming.

pub mod component;
pub mod connect;
pub mod flatten;
pub mod naming;
pub mod port;
pub mod reference;

pub use component::{Component, RefId};
pub use connect::ConnectOptions;
pub use flatten::{FlatInstance, FlatLayout, FlatPolygon};
pub use naming::{PortClassifier, auto_rename_ports, classify_and_rename};
pub use port::{Facing, Port, PortKey, PortName};
pub use reference::Reference;

/// Broad category of a [`LayoutError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NamingCollision,
    NotFound,
    GeometryMismatch,
    Configuration,
    Immutability,
}

/// Errors raised while building, connecting or publishing layouts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("component `{component}` already has a port named `{name}`")]
    DuplicatePort { component: String, name: PortName },

    #[error(
        "ports `{first}` and `{second}` of `{component}` both resolve to `{name}` (same layer, position and orientation)"
    )]
    AmbiguousPortName {
        component: String,
        name: String,
        first: String,
        second: String,
    },

    #[error("port `{key}` not found on `{owner}`{}", suggestion_suffix(.suggestion))]
    PortNotFound {
        owner: String,
        key: PortName,
        suggestion: Option<String>,
    },

    #[error("reference #{index} not found in `{component}`")]
    ReferenceNotFound { component: String, index: usize },

    #[error("factory `{name}` is not registered{}", suggestion_suffix(.suggestion))]
    FactoryNotFound {
        name: String,
        suggestion: Option<String>,
    },

    #[error(
        "cannot connect port `{port}` (width {width}) to `{target}` (width {target_width}): widths differ"
    )]
    WidthMismatch {
        port: String,
        width: f64,
        target: String,
        target_width: f64,
    },

    #[error(
        "port `{port}` at ({x}, {y}) does not meet `{target}` at ({target_x}, {target_y}) in `{component}`"
    )]
    Misaligned {
        component: String,
        port: String,
        x: f64,
        y: f64,
        target: String,
        target_x: f64,
        target_y: f64,
    },

    #[error("invalid port `{name}`: {reason}")]
    InvalidPort { name: String, reason: String },

    #[error("{factory}: {message}")]
    Configuration { factory: String, message: String },

    #[error("component `{component}` is locked: cannot {action} after it was published")]
    Locked {
        component: String,
        action: &'static str,
    },

    #[error("component `{component}` is still under construction and cannot be instantiated")]
    Unpublished { component: String },

    #[error("factory id `{factory}` is already bound to a different parameter schema")]
    CacheKeyCollision { factory: String },
}

impl LayoutError {
    pub(crate) fn config(factory: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            factory: factory.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicatePort { .. } | Self::AmbiguousPortName { .. } => {
                ErrorKind::NamingCollision
            }
            Self::PortNotFound { .. }
            | Self::ReferenceNotFound { .. }
            | Self::FactoryNotFound { .. } => ErrorKind::NotFound,
            Self::WidthMismatch { .. } | Self::Misaligned { .. } | Self::InvalidPort { .. } => {
                ErrorKind::GeometryMismatch
            }
            Self::Configuration { .. } | Self::CacheKeyCollision { .. } => {
                ErrorKind::Configuration
            }
            Self::Locked { .. } | Self::Unpublished { .. } => ErrorKind::Immutability,
        }
    }
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean `{s}`?)"))
        .unwrap_or_default()
}

/// Closest candidate by edit distance, if it is reasonably close.
pub(crate) fn closest_match<'a, I>(needle: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let needle = needle.to_lowercase();
    candidates
        .into_iter()
        .map(|candidate| (levenshtein::levenshtein(&needle, &candidate.to_lowercase()), candidate))
        .filter(|(distance, candidate)| *distance <= (candidate.len() / 2).max(2))
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestions_pick_the_nearest_name() {
        let names = ["straight", "bend_circular", "mmi2x2"];
        assert_eq!(
            closest_match("straigt", names.iter().copied()),
            Some("straight".to_owned())
        );
        assert_eq!(closest_match("zzzzzzzzzzzz", names.iter().copied()), None);
    }

    #[test]
    fn not_found_message_includes_suggestion() {
        let err = LayoutError::FactoryNotFound {
            name: "mmi2x3".to_owned(),
            suggestion: Some("mmi2x2".to_owned()),
        };
        assert_eq!(
            err.to_string(),
            "factory `mmi2x3` is not registered (did you mean `mmi2x2`?)"
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
