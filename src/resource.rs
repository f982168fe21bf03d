//! Resource declarations and the per-frame resource instance table.

use crate::access::AccessAttr;
use crate::format::RgFormat;
use crate::subresource::SubresourceRange;

pub const LIFETIME_UNDEFINED: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Buffer,
    Image1D,
    Image2D,
    Image3D,
}

bitflags! {
    #[derive(Default)]
    pub struct ResourceFlags: u8 {
        /// Survives across frames; never aliased, never destroyed by the
        /// deferred-release mechanism.
        const PERSISTENT          = 1 << 0;
        /// Views of this resource may request a format other than the one it
        /// was declared with, subject to [`RgFormat::is_format_compatible`].
        const MUTABLE_FORMAT      = 1 << 1;
        const CUBEMAP_COMPATIBLE  = 1 << 2;
        const ROW_MAJOR           = 1 << 3;
    }
}

/// Front-end-declared shape of a resource, before any phase has touched it.
#[derive(Debug, Clone)]
pub struct ResourceDesc {
    pub kind: ResourceKind,
    pub format: RgFormat,
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
    /// `0` requests auto-derivation in P1: `1 + floor(log2(max(w,h,d)))`.
    pub mip_count: u32,
    pub sample_count: u32,
    pub flags: ResourceFlags,
}

impl ResourceDesc {
    pub fn buffer(size_bytes: u32) -> Self {
        ResourceDesc {
            kind: ResourceKind::Buffer,
            format: RgFormat::BufferRaw,
            width: size_bytes,
            height: 1,
            depth_or_array_layers: 1,
            mip_count: 1,
            sample_count: 1,
            flags: ResourceFlags::empty(),
        }
    }

    pub fn image_2d(width: u32, height: u32, format: RgFormat) -> Self {
        ResourceDesc {
            kind: ResourceKind::Image2D,
            format,
            width,
            height,
            depth_or_array_layers: 1,
            mip_count: 0,
            sample_count: 1,
            flags: ResourceFlags::empty(),
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self.kind, ResourceKind::Buffer)
    }

    /// Auto-derives `mip_count` when requested as `0`; forces `1` for MSAA
    /// images, per P1's normalization rule.
    pub fn normalized_mip_count(&self) -> u32 {
        if self.sample_count > 1 {
            return 1;
        }
        if self.mip_count != 0 {
            return self.mip_count;
        }
        if !self.is_image() {
            return 1;
        }
        let max_extent = self.width.max(self.height).max(self.depth_or_array_layers);
        1 + (31 - max_extent.max(1).leading_zeros())
    }
}

pub type ResourceId = u32;

/// Sentinel written into a postamble (or preamble) `ResourceAliasingInfo`'s
/// `dst_resource` (or `src_resource`) field when the other side of the
/// aliasing event is "outside the frame" rather than a real resource.
pub const INVALID_RESOURCE: ResourceId = u32::MAX;

/// A runtime placement: `(heapId, offset)` bound to a resource, either
/// computed fresh this frame by P6 or carried over from a previous frame
/// (pre-allocated).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocPlacement {
    pub heap_id: u32,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryRequirement {
    pub size: u64,
    pub alignment: u64,
    pub memory_type_index: u32,
}

/// One resource's full per-frame state, threaded through every phase.
#[derive(Debug, Clone)]
pub struct ResourceInstance {
    pub desc: ResourceDesc,
    pub full_subresource_range: SubresourceRange,
    pub all_accesses: AccessAttr,
    pub initial_access: AccessAttr,
    pub is_external: bool,
    pub is_temporal_parent: bool,
    pub temporal_layer_offset: u32,
    pub temporal_slice_count: u32,

    pub lifetime_begin: u32,
    pub lifetime_end: u32,

    pub is_aliased: bool,
    pub alloc_placement: Option<AllocPlacement>,
    pub alloc_requirement: MemoryRequirement,
    pub final_accesses: Vec<(SubresourceRange, u32)>,
}

impl ResourceInstance {
    pub fn new(desc: ResourceDesc) -> Self {
        let aspect_mask = desc.format.aspect_mask();
        let full_subresource_range = SubresourceRange::new(
            aspect_mask,
            (0, desc.normalized_mip_count() as u16),
            (
                0,
                if desc.is_image() {
                    desc.depth_or_array_layers as u16
                } else {
                    1
                },
            ),
        );
        ResourceInstance {
            desc,
            full_subresource_range,
            all_accesses: AccessAttr::empty(),
            initial_access: AccessAttr::UNKNOWN,
            is_external: false,
            is_temporal_parent: false,
            temporal_layer_offset: 0,
            temporal_slice_count: 0,
            lifetime_begin: LIFETIME_UNDEFINED,
            lifetime_end: LIFETIME_UNDEFINED,
            is_aliased: false,
            alloc_placement: None,
            alloc_requirement: MemoryRequirement::default(),
            final_accesses: Vec::new(),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.desc.flags.contains(ResourceFlags::PERSISTENT)
    }

    pub fn is_scheduled(&self) -> bool {
        self.lifetime_begin != LIFETIME_UNDEFINED
    }

    /// `parent.temporalLayerOffset + sliceIndex`: temporal slices are plain
    /// resource ids offset from the parent's, sharing its declaration but
    /// tracked independently by the scheduler.
    pub fn temporal_slice_id(&self, parent_id: ResourceId, slice_index: u32) -> ResourceId {
        debug_assert!(self.is_temporal_parent);
        debug_assert!(slice_index < self.temporal_slice_count);
        parent_id + self.temporal_layer_offset + slice_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_count_auto_derives_from_max_extent() {
        let desc = ResourceDesc::image_2d(512, 300, RgFormat::R8g8b8a8Unorm);
        assert_eq!(desc.normalized_mip_count(), 10);
    }

    #[test]
    fn msaa_forces_single_mip() {
        let mut desc = ResourceDesc::image_2d(512, 512, RgFormat::R8g8b8a8Unorm);
        desc.sample_count = 4;
        assert_eq!(desc.normalized_mip_count(), 1);
    }

    #[test]
    fn persistent_resources_are_never_aliased_by_construction() {
        let mut desc = ResourceDesc::buffer(1024);
        desc.flags |= ResourceFlags::PERSISTENT;
        let res = ResourceInstance::new(desc);
        assert!(res.is_persistent());
        assert!(!res.is_aliased);
    }
}
