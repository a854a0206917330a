//! Derivation of a [`RequestDescriptor`] from a generic call.

use gatekeeper_sdk::{RequestDescriptor, ScopedRequest};

/// Split an operation id at its first inner capital: `ListWorkflows` becomes
/// `("list", "workflows")`. Both halves are lowercased.
#[must_use]
pub fn split_op(operation: &str) -> (String, String) {
    let boundary = operation
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_ascii_uppercase())
        .map_or(operation.len(), |(i, _)| i);
    let (action, resource) = operation.split_at(boundary);
    (action.to_ascii_lowercase(), resource.to_ascii_lowercase())
}

/// Last `/` segment of a full method path.
#[must_use]
pub fn operation_id(method: &str) -> &str {
    method.rsplit('/').next().unwrap_or(method)
}

/// Descriptor for `method` called with `request`.
///
/// The cluster defaults to `primary_cluster` and the namespace to empty when
/// the request does not carry them.
#[must_use]
pub fn derive(
    method: &str,
    request: &dyn ScopedRequest,
    primary_cluster: &str,
) -> RequestDescriptor {
    let (action, resource) = split_op(operation_id(method));
    RequestDescriptor {
        cluster: request
            .cluster()
            .filter(|c| !c.is_empty())
            .unwrap_or(primary_cluster)
            .to_owned(),
        namespace: request.namespace().unwrap_or_default().to_owned(),
        resource,
        action,
    }
}
