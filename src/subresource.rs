//! Packed subresource ranges and the `Clip` set-difference operation that
//! drives the multi-subresource path of access-DAG construction.

use smallvec::SmallVec;

use crate::format::AspectMask;

/// `{ aspectMask, [baseMip,endMip), [baseArrayLayer,endArrayLayer) }` — a box
/// in (aspect, mip, array-layer) space. Buffers and other non-mip/array
/// resources always carry the trivial `[0,1) x [0,1)` range with `COLOR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubresourceRange {
    pub aspect_mask: AspectMask,
    pub base_mip: u16,
    pub end_mip: u16,
    pub base_array_layer: u16,
    pub end_array_layer: u16,
}

/// At most this many disjoint boxes are needed to express `B \ A` for two
/// axis-aligned subresource boxes: one for the aspect-plane complement, two
/// for the mip-range complement, two for the array-layer complement.
pub const MAX_CLIP_COMPLEMENTS: usize = 5;

pub type ClipComplements = SmallVec<[SubresourceRange; MAX_CLIP_COMPLEMENTS]>;

impl SubresourceRange {
    pub fn new(aspect_mask: AspectMask, mips: (u16, u16), array_layers: (u16, u16)) -> Self {
        SubresourceRange {
            aspect_mask,
            base_mip: mips.0,
            end_mip: mips.1,
            base_array_layer: array_layers.0,
            end_array_layer: array_layers.1,
        }
    }

    pub fn single_subresource(aspect_mask: AspectMask) -> Self {
        SubresourceRange::new(aspect_mask, (0, 1), (0, 1))
    }

    pub fn num_mips(&self) -> u32 {
        (self.end_mip - self.base_mip) as u32
    }

    pub fn num_array_layers(&self) -> u32 {
        (self.end_array_layer - self.base_array_layer) as u32
    }

    pub fn num_subresources(&self) -> u32 {
        self.num_mips() * self.num_array_layers() * self.aspect_mask.plane_count()
    }

    pub fn is_empty(&self) -> bool {
        self.aspect_mask.is_empty() || self.base_mip >= self.end_mip || self.base_array_layer >= self.end_array_layer
    }

    /// Whether this range covers a single subresource (used to pick the
    /// fast path in access-DAG construction).
    pub fn is_single_subresource(&self) -> bool {
        self.num_mips() == 1 && self.num_array_layers() == 1 && self.aspect_mask.plane_count() <= 1
    }

    pub fn intersects(&self, other: &SubresourceRange) -> bool {
        !self.aspect_mask.intersection(other.aspect_mask).is_empty()
            && self.base_mip < other.end_mip
            && other.base_mip < self.end_mip
            && self.base_array_layer < other.end_array_layer
            && other.base_array_layer < self.end_array_layer
    }

    /// `Clip(self=A, b=B) -> (overlap, complements)` where `complements`
    /// covers `B \ A` as up to [`MAX_CLIP_COMPLEMENTS`] disjoint ranges.
    /// `overlap` is `None` when `A` and `B` do not intersect, in which case
    /// `complements` is simply `[B]`.
    pub fn clip(&self, b: &SubresourceRange) -> (Option<SubresourceRange>, ClipComplements) {
        let a = self;
        if !a.intersects(b) {
            let mut complements = ClipComplements::new();
            complements.push(*b);
            return (None, complements);
        }

        let overlap_aspect = a.aspect_mask.intersection(b.aspect_mask);
        let overlap_mip = (a.base_mip.max(b.base_mip), a.end_mip.min(b.end_mip));
        let overlap_layer = (
            a.base_array_layer.max(b.base_array_layer),
            a.end_array_layer.min(b.end_array_layer),
        );

        let overlap = SubresourceRange::new(overlap_aspect, overlap_mip, overlap_layer);

        let mut complements = ClipComplements::new();

        let aspect_complement = b.aspect_mask.difference(a.aspect_mask);
        if !aspect_complement.is_empty() {
            complements.push(SubresourceRange::new(
                aspect_complement,
                (b.base_mip, b.end_mip),
                (b.base_array_layer, b.end_array_layer),
            ));
        }

        if overlap_mip.0 > b.base_mip {
            complements.push(SubresourceRange::new(
                overlap_aspect,
                (b.base_mip, overlap_mip.0),
                (b.base_array_layer, b.end_array_layer),
            ));
        }
        if overlap_mip.1 < b.end_mip {
            complements.push(SubresourceRange::new(
                overlap_aspect,
                (overlap_mip.1, b.end_mip),
                (b.base_array_layer, b.end_array_layer),
            ));
        }

        if overlap_layer.0 > b.base_array_layer {
            complements.push(SubresourceRange::new(
                overlap_aspect,
                overlap_mip,
                (b.base_array_layer, overlap_layer.0),
            ));
        }
        if overlap_layer.1 < b.end_array_layer {
            complements.push(SubresourceRange::new(
                overlap_aspect,
                overlap_mip,
                (overlap_layer.1, b.end_array_layer),
            ));
        }

        (Some(overlap), complements)
    }

    /// Strips DS read/write bits for an aspect plane absent from this range,
    /// and drops the SRV bit when the only remaining plane is write-only.
    /// Mirrors the write-bit-gates-SRV-removal precedence used by the
    /// multi-subresource clipping path during access-DAG construction.
    pub fn filter_access_by_range(
        &self,
        access: crate::access::AccessAttr,
    ) -> crate::access::AccessAttr {
        use crate::access::AccessAttr;
        let mut out = access;
        if !self.aspect_mask.contains(AspectMask::DEPTH) {
            out.remove(AccessAttr::DEPTH_READ | AccessAttr::DEPTH_WRITE);
        }
        if !self.aspect_mask.contains(AspectMask::STENCIL) {
            out.remove(AccessAttr::STENCIL_READ | AccessAttr::STENCIL_WRITE);
        }
        let other_plane_writes = (self.aspect_mask.contains(AspectMask::DEPTH)
            && access.contains(AccessAttr::STENCIL_WRITE)
            && !self.aspect_mask.contains(AspectMask::STENCIL))
            || (self.aspect_mask.contains(AspectMask::STENCIL)
                && access.contains(AccessAttr::DEPTH_WRITE)
                && !self.aspect_mask.contains(AspectMask::DEPTH));
        if other_plane_writes {
            out.remove(AccessAttr::SHADER_RESOURCE);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::AspectMask;

    fn mips(base: u16, end: u16, layer_base: u16, layer_end: u16) -> SubresourceRange {
        SubresourceRange::new(AspectMask::COLOR, (base, end), (layer_base, layer_end))
    }

    #[test]
    fn clip_disjoint_returns_no_overlap() {
        let a = mips(0, 1, 0, 1);
        let b = mips(1, 2, 0, 1);
        let (overlap, complements) = a.clip(&b);
        assert!(overlap.is_none());
        assert_eq!(complements.len(), 1);
        assert_eq!(complements[0], b);
    }

    #[test]
    fn clip_mid_mip_splits_into_before_and_after() {
        let a = mips(2, 3, 0, 1);
        let b = mips(0, 5, 0, 1);
        let (overlap, complements) = a.clip(&b);
        let overlap = overlap.unwrap();
        assert_eq!(overlap, mips(2, 3, 0, 1));
        assert_eq!(complements.len(), 2);
        assert!(complements.contains(&mips(0, 2, 0, 1)));
        assert!(complements.contains(&mips(3, 5, 0, 1)));
    }

    #[test]
    fn clip_partition_covers_full_incoming_range() {
        let a = SubresourceRange::new(AspectMask::DEPTH, (1, 2), (0, 1));
        let b = SubresourceRange::new(AspectMask::DEPTH | AspectMask::STENCIL, (0, 4), (0, 2));
        let (overlap, complements) = a.clip(&b);
        let total: u32 =
            overlap.map(|o| o.num_subresources()).unwrap_or(0) + complements.iter().map(|c| c.num_subresources()).sum::<u32>();
        assert_eq!(total, b.num_subresources());
    }

    #[test]
    fn single_subresource_detection() {
        assert!(mips(0, 1, 0, 1).is_single_subresource());
        assert!(!mips(0, 2, 0, 1).is_single_subresource());
    }
}
