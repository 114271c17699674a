//! Parent/child nesting checks.
//!
//! Advisory only: violations become diagnostics and the tree is left as is.
use crate::{
    error::Diagnostic,
    registry::{TagRegistry, ROOT_TAG},
    tree::Node,
};

/// Check every tag against its parent, starting from the implicit root.
pub fn validate(children: &[Node], registry: &TagRegistry, diagnostics: &mut Vec<Diagnostic>) {
    check_children(ROOT_TAG, children, registry, diagnostics);
}

fn check_children(
    parent: &str,
    children: &[Node],
    registry: &TagRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for child in children {
        let Node::Tag(child) = child else {
            continue;
        };

        if !registry.child_allowed(parent, &child.name) {
            diagnostics.push(Diagnostic::NotAllowedChild {
                parent: parent.to_owned(),
                child: child.name.clone(),
            });
        }
        if !registry.parent_allowed(parent, &child.name) {
            diagnostics.push(Diagnostic::NotAllowedParent {
                parent: parent.to_owned(),
                child: child.name.clone(),
            });
        }

        check_children(&child.name, &child.children, registry, diagnostics);
    }
}
