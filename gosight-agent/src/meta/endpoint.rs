// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

use sha2::{Digest, Sha256};

use super::Meta;

/// Derive the endpoint id of a meta from its identity fields.
///
/// The formula is fixed so agent and server agree:
/// `"ep-" + hex(sha256(agent_id "|" host_id "|" container_id "|" service))[..32]`
/// with absent fields contributing an empty string. The same identity tuple
/// always derives the same endpoint id.
pub fn endpoint_id(meta: &Meta) -> String {
    let mut hasher = Sha256::new();
    hasher.update(meta.agent_id.as_bytes());
    hasher.update(b"|");
    hasher.update(meta.host_id.as_bytes());
    hasher.update(b"|");
    hasher.update(meta.container_id.as_bytes());
    hasher.update(b"|");
    hasher.update(meta.service.as_bytes());
    let digest = hasher.finalize();
    format!("ep-{}", hex::encode(&digest[..16]))
}
