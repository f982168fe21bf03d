//! The capability trait through which the phase pipeline reaches a concrete
//! GPU backend, plus the reference `NullBackend` used by every test in this
//! crate.
//!
//! A real backend (Vulkan, D3D12, ...) lives in its own downstream crate and
//! is out of scope here; this module only defines the contract and a
//! dependency-free stand-in for it.

use crate::access::AccessAttr;
use crate::format::{AspectMask, RgFormat};
use crate::resource::{MemoryRequirement, ResourceDesc};
use crate::transition::TransitionDecision;

#[derive(Debug, Clone, Copy)]
pub struct MemoryTypeInfo {
    pub min_alignment: u64,
    pub default_heap_size: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct SubresourceInfo {
    pub num_subresources: u32,
    pub aspect_mask: AspectMask,
}

/// Whether the barrier builder should emit conventional (early/discard/late
/// triples) or enhanced (global/texture/buffer arrays) barrier batches.
/// Mirrors the conventional-vs-enhanced split between D3D12's legacy and
/// enhanced barrier APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierStyle {
    Conventional,
    Enhanced,
}

pub trait RuntimeBackend {
    fn memory_types(&self) -> &[MemoryTypeInfo];

    fn describe_memory_type(&self, index: u32) -> &str;

    fn subresource_info(&self, desc: &ResourceDesc) -> SubresourceInfo;

    fn memory_requirement(&self, desc: &ResourceDesc) -> MemoryRequirement;

    /// Backend-specific override of `NeedTransition` for pairs it has a
    /// special rule for (copy/clear/resolve/DS/render-pass). `None` defers
    /// to the coarse same-state/read-only/UAV rule implemented by
    /// `phases::access_dag_build`.
    fn calculate_access_transition(
        &self,
        before: AccessAttr,
        after: AccessAttr,
    ) -> Option<TransitionDecision>;

    fn image_aspect_usages(&self, mask: AspectMask) -> AspectMask;

    fn barrier_style(&self) -> BarrierStyle {
        BarrierStyle::Conventional
    }
}

/// Reference backend with no device-specific overrides: one default memory
/// type, a generic format table, and no `calculate_access_transition`
/// specialization. Modeled on `rps_null_runtime_device.cpp`; this is what
/// every unit and integration test in this crate runs against instead of a
/// real GPU API. Gated behind `cfg(test)` normally; the `test-util` feature
/// lifts the gate so downstream crates can reuse it to smoke-test their own
/// node callbacks without a real device.
#[cfg(any(test, feature = "test-util"))]
pub struct NullBackend {
    memory_types: [MemoryTypeInfo; 1],
}

#[cfg(any(test, feature = "test-util"))]
impl Default for NullBackend {
    fn default() -> Self {
        NullBackend {
            memory_types: [MemoryTypeInfo {
                min_alignment: 256,
                default_heap_size: 64 * 1024 * 1024,
            }],
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
impl RuntimeBackend for NullBackend {
    fn memory_types(&self) -> &[MemoryTypeInfo] {
        &self.memory_types
    }

    fn describe_memory_type(&self, _index: u32) -> &str {
        "default"
    }

    fn subresource_info(&self, desc: &ResourceDesc) -> SubresourceInfo {
        let aspect_mask = desc.format.aspect_mask();
        let array_layers = if desc.is_image() {
            desc.depth_or_array_layers
        } else {
            1
        };
        SubresourceInfo {
            num_subresources: desc.normalized_mip_count() * array_layers * aspect_mask.plane_count(),
            aspect_mask,
        }
    }

    fn memory_requirement(&self, desc: &ResourceDesc) -> MemoryRequirement {
        let element_bytes = desc.format.element_bytes().max(1) as u64;
        let array_layers = if desc.is_image() {
            desc.depth_or_array_layers
        } else {
            1
        } as u64;
        let size = element_bytes
            * desc.width as u64
            * desc.height.max(1) as u64
            * array_layers
            * desc.normalized_mip_count().max(1) as u64;
        MemoryRequirement {
            size: size.max(1),
            alignment: self.memory_types[0].min_alignment,
            memory_type_index: 0,
        }
    }

    fn calculate_access_transition(
        &self,
        _before: AccessAttr,
        _after: AccessAttr,
    ) -> Option<TransitionDecision> {
        None
    }

    fn image_aspect_usages(&self, mask: AspectMask) -> AspectMask {
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_backend_reports_a_single_default_memory_type() {
        let backend = NullBackend::default();
        assert_eq!(backend.memory_types().len(), 1);
    }

    #[test]
    fn null_backend_sizes_a_simple_buffer() {
        let backend = NullBackend::default();
        let desc = ResourceDesc::buffer(4096);
        let req = backend.memory_requirement(&desc);
        assert_eq!(req.size, 4096);
    }

    #[test]
    fn null_backend_has_no_format_specific_transition_rule() {
        let backend = NullBackend::default();
        assert!(backend
            .calculate_access_transition(AccessAttr::RENDER_TARGET, AccessAttr::SHADER_RESOURCE)
            .is_none());
    }
}
