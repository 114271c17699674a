//! Error types for tag registration and rendering.
//!
//! Problems in user markup are never reported here; those become
//! [`Diagnostic`]s attached to the render output.

use std::fmt;

/// A tag with the same (case-insensitive) name is already registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tag \"{name}\" is already registered")]
pub struct DuplicateTagError {
    /// Lowercased name of the colliding tag.
    pub name: String,
}

/// Errors returned by the registration and render entrypoints.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Registration collided with an existing definition.
    #[error(transparent)]
    DuplicateTag(#[from] DuplicateTagError),

    /// The tag name can never be matched by the tokenizer.
    #[error("invalid tag name: {name:?}")]
    InvalidTagName {
        /// The rejected name.
        name: String,
    },

    /// Input was rejected before parsing.
    #[error("input of {len} bytes exceeds the limit of {max} bytes")]
    InputTooLarge {
        /// Length of the rejected input.
        len: usize,
        /// Configured limit.
        max: usize,
    },
}

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A non-fatal problem found while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A child tag appeared under a parent that restricts its children.
    NotAllowedChild { parent: String, child: String },
    /// A child tag appeared under a parent it does not accept.
    NotAllowedParent { parent: String, child: String },
    /// An open tag never found its close tag.
    UnmatchedOpen { tag: String, offset: usize },
    /// A close tag had no open tag to pair with.
    UnmatchedClose { tag: String, offset: usize },
    /// An open tag was nested deeper than the configured limit.
    DepthLimit { tag: String, offset: usize, max: usize },
    /// Raw brackets survived into the rendered output.
    Misaligned,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAllowedChild { parent, child } => {
                write!(f, "{child} is not allowed as a child of {parent}")
            }
            Self::NotAllowedParent { parent, child } => {
                write!(f, "{parent} is not allowed as a parent of {child}")
            }
            Self::UnmatchedOpen { tag, offset } => write!(
                f,
                "tags appear misaligned: [{tag}] at byte {offset} is never closed"
            ),
            Self::UnmatchedClose { tag, offset } => write!(
                f,
                "tags appear misaligned: [/{tag}] at byte {offset} closes nothing"
            ),
            Self::DepthLimit { tag, offset, max } => write!(
                f,
                "[{tag}] at byte {offset} exceeds the nesting limit of {max}"
            ),
            Self::Misaligned => f.write_str("tags appear misaligned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting_messages() {
        let child = Diagnostic::NotAllowedChild {
            parent: "list".into(),
            child: "b".into(),
        };
        assert_eq!(child.to_string(), "b is not allowed as a child of list");

        let parent = Diagnostic::NotAllowedParent {
            parent: "bbcode".into(),
            child: "*".into(),
        };
        assert_eq!(parent.to_string(), "bbcode is not allowed as a parent of *");
    }

    #[test]
    fn duplicate_converts() {
        let err: Error = DuplicateTagError { name: "b".into() }.into();
        assert!(matches!(err, Error::DuplicateTag(_)));
        assert_eq!(err.to_string(), "tag \"b\" is already registered");
    }
}
