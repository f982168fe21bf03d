//! Resource format metadata: element size and aspect-mask tables.
//!
//! The real table a production backend would expose is far larger (block
//! compression, planar YUV, typeless views...); this crate only needs enough
//! of it to drive [`crate::subresource`] math and the [`crate::backend::NullBackend`]
//! reference backend, mirroring the scope of `rps_null_runtime_device.cpp`'s
//! own format table.

bitflags! {
    #[derive(Default)]
    pub struct AspectMask: u8 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

impl AspectMask {
    pub fn plane_count(self) -> u32 {
        self.bits().count_ones()
    }
}

/// Closed enumeration of the formats this crate understands well enough to
/// size and aspect-classify. Real GPU format tables run into the hundreds;
/// this one covers the common render-target/depth/typed-buffer cases that
/// the phase pipeline's own tests and examples exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RgFormat {
    Unknown,
    R8Unorm,
    R8g8b8a8Unorm,
    R16g16b16a16Float,
    R32g32b32a32Float,
    D32Float,
    D24UnormS8Uint,
    D32FloatS8Uint,
    BufferRaw,
}

impl Default for RgFormat {
    fn default() -> Self {
        RgFormat::Unknown
    }
}

impl RgFormat {
    pub fn aspect_mask(self) -> AspectMask {
        match self {
            RgFormat::D32Float => AspectMask::DEPTH,
            RgFormat::D24UnormS8Uint | RgFormat::D32FloatS8Uint => {
                AspectMask::DEPTH | AspectMask::STENCIL
            }
            RgFormat::Unknown => AspectMask::empty(),
            _ => AspectMask::COLOR,
        }
    }

    pub fn element_bytes(self) -> u32 {
        match self {
            RgFormat::Unknown => 0,
            RgFormat::R8Unorm => 1,
            RgFormat::R8g8b8a8Unorm => 4,
            RgFormat::R16g16b16a16Float => 8,
            RgFormat::R32g32b32a32Float => 16,
            RgFormat::D32Float => 4,
            RgFormat::D24UnormS8Uint => 4,
            RgFormat::D32FloatS8Uint => 8,
            RgFormat::BufferRaw => 1,
        }
    }

    pub fn is_depth_stencil(self) -> bool {
        self.aspect_mask()
            .intersects(AspectMask::DEPTH | AspectMask::STENCIL)
    }

    /// Whether `self` and `other` may be reinterpreted through a
    /// `mutable_format` resource's typed views (same element size, same
    /// aspect classification).
    pub fn is_format_compatible(self, other: RgFormat) -> bool {
        self.element_bytes() == other.element_bytes() && self.aspect_mask() == other.aspect_mask()
    }
}
