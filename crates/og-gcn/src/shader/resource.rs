//! GPU resource descriptors (V#, T#, S#)
//!
//! The analyzer allocates one descriptor per observed resource access; the
//! payload is filled in later from guest state through [`GuestState`].

use super::deps::{DependencyNode, GuestState};
use bitflags::bitflags;
use og_core::error::{GcnError, Result};
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared descriptor handle. Identity is stable from analysis through
/// translation and later payload refreshes.
pub type ResourceHandle = Arc<RwLock<ResourceDescriptor>>;

/// Descriptor class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture,
    Sampler,
}

impl ResourceKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Buffer => "buffer",
            Self::Texture => "texture",
            Self::Sampler => "sampler",
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceFlags: u8 {
        /// Payload has been read from guest state at least once
        const LOADED = 0x01;
        /// 256-bit descriptor (full T#)
        const WIDE_256 = 0x02;
    }
}

/// Buffer resource (V#)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferView {
    pub base_address: u64,
    pub stride: u32,
    pub num_records: u32,
    pub dst_sel: [u8; 4],
    pub num_format: u8,
    pub data_format: u8,
    pub add_tid_enable: bool,
}

impl BufferView {
    pub fn decode(words: &[u32; 4]) -> Self {
        Self {
            base_address: words[0] as u64 | (((words[1] & 0xFFFF) as u64) << 32),
            stride: (words[1] >> 16) & 0x3FFF,
            num_records: words[2],
            dst_sel: [
                (words[3] & 0x7) as u8,
                ((words[3] >> 3) & 0x7) as u8,
                ((words[3] >> 6) & 0x7) as u8,
                ((words[3] >> 9) & 0x7) as u8,
            ],
            num_format: ((words[3] >> 12) & 0x7) as u8,
            data_format: ((words[3] >> 15) & 0xF) as u8,
            add_tid_enable: (words[3] >> 23) & 1 != 0,
        }
    }

    /// Addressable size in bytes
    pub fn size_bytes(&self) -> u64 {
        if self.stride == 0 {
            self.num_records as u64
        } else {
            self.num_records as u64 * self.stride as u64
        }
    }
}

/// Texture resource (T#)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureView {
    pub base_address: u64,
    pub min_lod: u16,
    pub data_format: u8,
    pub num_format: u8,
    pub width: u32,
    pub height: u32,
    pub dst_sel: [u8; 4],
    pub base_level: u8,
    pub last_level: u8,
    pub tiling_index: u8,
    pub texture_type: u8,
    /// Only present in 256-bit descriptors
    pub depth: u32,
    pub pitch: u32,
}

impl TextureView {
    pub fn decode(words: &[u32]) -> Self {
        let word = |i: usize| words.get(i).copied().unwrap_or(0);
        let (w0, w1, w2, w3) = (word(0), word(1), word(2), word(3));
        let wide = words.len() >= 8;
        Self {
            base_address: ((w0 as u64) | (((w1 & 0xFF) as u64) << 32)) << 8,
            min_lod: ((w1 >> 8) & 0xFFF) as u16,
            data_format: ((w1 >> 20) & 0x3F) as u8,
            num_format: ((w1 >> 26) & 0xF) as u8,
            width: (w2 & 0x3FFF) + 1,
            height: ((w2 >> 14) & 0x3FFF) + 1,
            dst_sel: [
                (w3 & 0x7) as u8,
                ((w3 >> 3) & 0x7) as u8,
                ((w3 >> 6) & 0x7) as u8,
                ((w3 >> 9) & 0x7) as u8,
            ],
            base_level: ((w3 >> 12) & 0xF) as u8,
            last_level: ((w3 >> 16) & 0xF) as u8,
            tiling_index: ((w3 >> 20) & 0x1F) as u8,
            texture_type: ((w3 >> 28) & 0xF) as u8,
            depth: if wide { (word(4) & 0x1FFF) + 1 } else { 1 },
            pitch: if wide { ((word(4) >> 13) & 0x3FFF) + 1 } else { 0 },
        }
    }
}

/// Sampler state (S#)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplerView {
    pub clamp: [u8; 3],
    pub max_aniso_ratio: u8,
    pub depth_compare_func: u8,
    pub force_unnormalized: bool,
    pub min_lod: u16,
    pub max_lod: u16,
    pub lod_bias: u16,
    pub xy_mag_filter: u8,
    pub xy_min_filter: u8,
    pub z_filter: u8,
    pub mip_filter: u8,
    pub border_color_type: u8,
}

impl SamplerView {
    pub fn decode(words: &[u32; 4]) -> Self {
        let [w0, w1, w2, w3] = *words;
        Self {
            clamp: [
                (w0 & 0x7) as u8,
                ((w0 >> 3) & 0x7) as u8,
                ((w0 >> 6) & 0x7) as u8,
            ],
            max_aniso_ratio: ((w0 >> 9) & 0x7) as u8,
            depth_compare_func: ((w0 >> 12) & 0x7) as u8,
            force_unnormalized: (w0 >> 15) & 1 != 0,
            min_lod: (w1 & 0xFFF) as u16,
            max_lod: ((w1 >> 12) & 0xFFF) as u16,
            lod_bias: (w2 & 0x3FFF) as u16,
            xy_mag_filter: ((w2 >> 20) & 0x3) as u8,
            xy_min_filter: ((w2 >> 22) & 0x3) as u8,
            z_filter: ((w2 >> 24) & 0x3) as u8,
            mip_filter: ((w2 >> 26) & 0x3) as u8,
            border_color_type: ((w3 >> 30) & 0x3) as u8,
        }
    }
}

/// Decoded descriptor contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourcePayload {
    #[default]
    Unloaded,
    Buffer(BufferView),
    Texture(TextureView),
    Sampler(SamplerView),
}

/// One GPU-visible binding discovered by the analyzer
#[derive(Debug, PartialEq)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub flags: ResourceFlags,
    /// Where the descriptor bits come from
    pub dependency: Arc<DependencyNode>,
    pub payload: ResourcePayload,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, dependency: Arc<DependencyNode>, wide: bool) -> Self {
        let mut flags = ResourceFlags::empty();
        flags.set(ResourceFlags::WIDE_256, wide);
        Self {
            kind,
            flags,
            dependency,
            payload: ResourcePayload::Unloaded,
        }
    }

    pub fn into_handle(self) -> ResourceHandle {
        Arc::new(RwLock::new(self))
    }

    /// Descriptor width in bytes
    pub fn size_bytes(&self) -> usize {
        if self.flags.contains(ResourceFlags::WIDE_256) {
            32
        } else {
            16
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.flags.contains(ResourceFlags::LOADED)
    }

    /// Re-read the descriptor bits from guest state and decode the payload
    pub fn refresh(&mut self, guest: &dyn GuestState) -> Result<()> {
        let bytes = self.dependency.read_bytes(guest, self.size_bytes())?;
        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let head: [u32; 4] = words
            .get(..4)
            .and_then(|w| w.try_into().ok())
            .ok_or_else(|| {
                GcnError::UnresolvedDependency(format!(
                    "{} descriptor needs 16 bytes, got {}",
                    self.kind.name(),
                    bytes.len()
                ))
            })?;

        self.payload = match self.kind {
            ResourceKind::Buffer => ResourcePayload::Buffer(BufferView::decode(&head)),
            ResourceKind::Texture => ResourcePayload::Texture(TextureView::decode(&words)),
            ResourceKind::Sampler => ResourcePayload::Sampler(SamplerView::decode(&head)),
        };
        self.flags |= ResourceFlags::LOADED;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::deps::DependencyGraph;

    struct Registers(Vec<u32>);

    impl GuestState for Registers {
        fn sgpr(&self, index: u32) -> u32 {
            self.0[index as usize]
        }

        fn resolve_indirect_read(&self, _address: u64, _size: usize) -> Option<Vec<u8>> {
            None
        }
    }

    #[test]
    fn test_buffer_view_decode() {
        let v = BufferView::decode(&[0x1000_0000, 0x0010_0002, 64, 0x0002_7FAC]);
        assert_eq!(v.base_address, 0x2_1000_0000);
        assert_eq!(v.stride, 16);
        assert_eq!(v.num_records, 64);
        assert_eq!(v.dst_sel, [4, 5, 6, 7]);
        assert_eq!(v.num_format, 7);
        assert_eq!(v.data_format, 4);
        assert_eq!(v.size_bytes(), 1024);
    }

    #[test]
    fn test_texture_view_decode() {
        // 256x128, base 0x12_3456_7800
        let words = [0x1234_5678, 0x0000_0000, (127 << 14) | 255, 0x9000_0000, 0, 0, 0, 0];
        let t = TextureView::decode(&words);
        assert_eq!(t.base_address, 0x12_3456_7800);
        assert_eq!(t.width, 256);
        assert_eq!(t.height, 128);
        assert_eq!(t.texture_type, 9);
        assert_eq!(t.depth, 1);
        assert_eq!(t.pitch, 1);
    }

    #[test]
    fn test_sampler_view_decode() {
        let s = SamplerView::decode(&[0b010_001_000, 0, (1 << 20) | (2 << 22), 0]);
        assert_eq!(s.clamp, [0, 1, 2]);
        assert_eq!(s.xy_mag_filter, 1);
        assert_eq!(s.xy_min_filter, 2);
    }

    #[test]
    fn test_refresh_from_user_data_registers() {
        let mut graph = DependencyGraph::new();
        let node = graph.scalar_register(4);
        let handle = ResourceDescriptor::new(ResourceKind::Buffer, node, false).into_handle();
        assert!(!handle.read().is_loaded());

        let guest = Registers(vec![0, 0, 0, 0, 0x1000, 0x0004_0000, 16, 0]);
        handle.write().refresh(&guest).unwrap();

        let desc = handle.read();
        assert!(desc.is_loaded());
        match desc.payload {
            ResourcePayload::Buffer(v) => {
                assert_eq!(v.base_address, 0x1000);
                assert_eq!(v.stride, 4);
                assert_eq!(v.num_records, 16);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_refresh_failure_leaves_flags() {
        let mut graph = DependencyGraph::new();
        let base = graph.scalar_register(0);
        let offset = graph.immediate(0);
        let node = graph.memory_indirect(&base, &offset);
        let mut desc = ResourceDescriptor::new(ResourceKind::Texture, node, true);
        assert_eq!(desc.size_bytes(), 32);
        assert!(desc.refresh(&Registers(vec![0; 2])).is_err());
        assert!(!desc.is_loaded());
    }
}
