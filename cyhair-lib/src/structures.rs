use zerocopy::byteorder::little_endian::{F32, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const MAGIC: [u8; 4] = *b"HAIR";
pub const HEADER_SIZE: usize = 128;
pub const INFO_SIZE: usize = 88;

pub const FLAG_SEGMENTS: u32 = 0x01;
pub const FLAG_POINTS: u32 = 0x02;
pub const FLAG_THICKNESS: u32 = 0x04;
pub const FLAG_TRANSPARENCY: u32 = 0x08;
pub const FLAG_COLOR: u32 = 0x10;

/// Info text stamped into every file this crate writes.
pub const WRITER_INFO: &str = "Generated by cyhair_writer.";

// Header defaults emitted by the writer when an attribute is stored explicitly.
pub const WRITER_DEFAULT_SEGMENTS: u32 = 0;
pub const WRITER_DEFAULT_THICKNESS: f32 = 1.0;
pub const WRITER_DEFAULT_TRANSPARENCY: f32 = 0.5;
pub const WRITER_DEFAULT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

// Defaults of a freshly constructed, empty strand set.
pub const DEFAULT_THICKNESS: f32 = 0.01;
pub const DEFAULT_TRANSPARENCY: f32 = 1.0;
pub const DEFAULT_COLOR: [f32; 3] = [0.5, 0.5, 0.5];

/// The on-disk header record, field for field.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub(crate) struct RawHeader {
    pub magic: [u8; 4],
    pub strand_count: U32,
    pub point_count: U32,
    pub flags: U32,
    pub default_segments: U32,
    pub default_thickness: F32,
    pub default_transparency: F32,
    pub default_color: [F32; 3],
    pub info: [u8; INFO_SIZE],
}

const _: () = assert!(size_of::<RawHeader>() == HEADER_SIZE);

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub strand_count: u32,
    pub point_count: u32,
    pub flags: u32,
    pub default_segments: u32,
    pub default_thickness: f32,
    pub default_transparency: f32,
    pub default_color: [f32; 3],
    pub info: String,
}

impl Header {
    #[inline]
    pub fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

/// A per-strand or per-point stream that is either stored in the file or
/// replaced by a single header-level value.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute<T> {
    Explicit(Vec<T>),
    Default(T),
}

impl<T: Copy> Attribute<T> {
    /// True when the stream would be written as its own section.
    pub fn is_present(&self) -> bool {
        matches!(self, Attribute::Explicit(v) if !v.is_empty())
    }

    /// Expands the stream to `n` values. Explicit streams are returned as-is,
    /// whatever their length.
    pub fn materialize(&self, n: usize) -> Vec<T> {
        match self {
            Attribute::Explicit(v) => v.clone(),
            Attribute::Default(d) => vec![*d; n],
        }
    }

    /// Number of stored values, or `n` for a default.
    pub fn len_or(&self, n: usize) -> usize {
        match self {
            Attribute::Explicit(v) => v.len(),
            Attribute::Default(_) => n,
        }
    }

    /// The header value for this attribute, falling back to `fallback` when
    /// the values are stored explicitly.
    pub fn default_or(&self, fallback: T) -> T {
        match self {
            Attribute::Explicit(_) => fallback,
            Attribute::Default(d) => *d,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrandSet {
    pub segments: Attribute<u32>,
    pub points: Vec<[f32; 3]>,
    pub thicknesses: Attribute<f32>,
    pub transparencies: Attribute<f32>,
    pub colors: Attribute<[f32; 3]>,
    pub info: String,
}

impl Default for StrandSet {
    fn default() -> Self {
        StrandSet {
            segments: Attribute::Explicit(Vec::new()),
            points: Vec::new(),
            thicknesses: Attribute::Default(DEFAULT_THICKNESS),
            transparencies: Attribute::Default(DEFAULT_TRANSPARENCY),
            colors: Attribute::Default(DEFAULT_COLOR),
            info: String::new(),
        }
    }
}

impl StrandSet {
    #[inline]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Strand count; for default segments, derived from the point count.
    pub fn num_strands(&self) -> usize {
        match &self.segments {
            Attribute::Explicit(v) => v.len(),
            Attribute::Default(d) => self.num_points() / (*d as usize + 1),
        }
    }

    pub fn segment_counts(&self) -> Vec<u32> {
        self.segments.materialize(self.num_strands())
    }

    /// Segment count + 1 per strand, in `usize` to hold `u32::MAX + 1`.
    pub fn points_per_strand(&self) -> Vec<usize> {
        self.segment_counts()
            .iter()
            .map(|&s| s as usize + 1)
            .collect()
    }

    /// Index of the first point of each strand.
    pub fn strand_offsets(&self) -> Vec<usize> {
        self.points_per_strand()
            .iter()
            .scan(0usize, |offset, &n| {
                let start = *offset;
                *offset = offset.saturating_add(n);
                Some(start)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_large_segment_counts_do_not_overflow() {
        let set = StrandSet {
            segments: Attribute::Explicit(vec![u32::MAX, u32::MAX]),
            ..StrandSet::default()
        };
        let per_strand = u32::MAX as usize + 1;
        assert_eq!(set.points_per_strand(), vec![per_strand, per_strand]);
        assert_eq!(set.strand_offsets(), vec![0, per_strand]);
    }
}
