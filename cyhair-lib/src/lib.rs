pub mod combine;
mod common;
pub mod config;
pub mod error;
pub mod structures;

use common::narrow_segment;
use common::read_f32s;
use common::read_u16s;
use common::read_vec3s;
use common::section_len;
use common::take_section;
use common::to_u32;
use common::write_f32s;
use common::write_vec3s;
use error::{CyHairError, Result};
use std::fs;
use std::path::Path;
use structures::RawHeader;
use structures::{Attribute, Header, StrandSet};
use structures::{FLAG_COLOR, FLAG_POINTS, FLAG_SEGMENTS, FLAG_THICKNESS, FLAG_TRANSPARENCY};
use structures::{HEADER_SIZE, INFO_SIZE, MAGIC, WRITER_INFO};
use structures::{
    WRITER_DEFAULT_COLOR, WRITER_DEFAULT_SEGMENTS, WRITER_DEFAULT_THICKNESS,
    WRITER_DEFAULT_TRANSPARENCY,
};
use tracing::{debug, warn};
use zerocopy::byteorder::little_endian::{F32, U32};
use zerocopy::{FromBytes, IntoBytes};

pub use combine::{combine, combine_files, CombineInput};
pub use config::{parse_config, read_config, CyHairInput};

/// What the writer does with a per-point stream holding more values than
/// there are points.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OversizePolicy {
    /// Write only the first `point_count` values.
    #[default]
    Truncate,
    /// Fail with [`CyHairError::Invariant`].
    Reject,
}

pub fn decode_header(data: &[u8]) -> Result<(Header, &[u8])> {
    let (raw, body) = RawHeader::read_from_prefix(data).map_err(|_| {
        CyHairError::Format(format!(
            "header needs {} bytes, have {}",
            HEADER_SIZE,
            data.len()
        ))
    })?;

    if raw.magic != MAGIC {
        return Err(CyHairError::Format(format!(
            "invalid magic {:?}, expected {:?}",
            String::from_utf8_lossy(&raw.magic),
            String::from_utf8_lossy(&MAGIC)
        )));
    }

    // Writers are not required to nul-terminate the info field.
    let info_len = memchr::memchr(0, &raw.info).unwrap_or(INFO_SIZE);
    let color = raw.default_color;

    let header = Header {
        strand_count: raw.strand_count.get(),
        point_count: raw.point_count.get(),
        flags: raw.flags.get(),
        default_segments: raw.default_segments.get(),
        default_thickness: raw.default_thickness.get(),
        default_transparency: raw.default_transparency.get(),
        default_color: [color[0].get(), color[1].get(), color[2].get()],
        info: String::from_utf8_lossy(&raw.info[..info_len]).into_owned(),
    };
    Ok((header, body))
}

pub fn encode_header(header: &Header) -> Result<[u8; HEADER_SIZE]> {
    let info = header.info.as_bytes();
    if info.len() >= INFO_SIZE {
        return Err(CyHairError::Invariant(format!(
            "info text is {} bytes, at most {} fit",
            info.len(),
            INFO_SIZE - 1
        )));
    }

    let mut raw = RawHeader {
        magic: MAGIC,
        strand_count: U32::new(header.strand_count),
        point_count: U32::new(header.point_count),
        flags: U32::new(header.flags),
        default_segments: U32::new(header.default_segments),
        default_thickness: F32::new(header.default_thickness),
        default_transparency: F32::new(header.default_transparency),
        default_color: header.default_color.map(F32::new),
        info: [0; INFO_SIZE],
    };
    raw.info[..info.len()].copy_from_slice(info);

    let mut out = [0u8; HEADER_SIZE];
    out.copy_from_slice(raw.as_bytes());
    Ok(out)
}

fn decode_segments(header: &Header, body: &[u8], offset: &mut usize) -> Result<Attribute<u32>> {
    let point_count = header.point_count as u64;

    if !header.has(FLAG_SEGMENTS) {
        let implied = header.strand_count as u64 * (header.default_segments as u64 + 1);
        if implied != point_count {
            return Err(CyHairError::Format(format!(
                "{} strands of {} default segments need {} points, header declares {}",
                header.strand_count, header.default_segments, implied, point_count
            )));
        }
        return Ok(Attribute::Default(header.default_segments));
    }

    let len = section_len(header.strand_count, 2, "segments")?;
    let segments = read_u16s(take_section(body, offset, len, "segments")?);
    let implied: u64 = segments.iter().map(|&s| s as u64 + 1).sum();
    if implied != point_count {
        return Err(CyHairError::Format(format!(
            "segments describe {} points, header declares {}",
            implied, point_count
        )));
    }
    Ok(Attribute::Explicit(segments))
}

fn decode_scalars(
    header: &Header,
    body: &[u8],
    offset: &mut usize,
    flag: u32,
    default: f32,
    section: &'static str,
) -> Result<Attribute<f32>> {
    if !header.has(flag) {
        return Ok(Attribute::Default(default));
    }
    let len = section_len(header.point_count, 4, section)?;
    Ok(Attribute::Explicit(read_f32s(take_section(
        body, offset, len, section,
    )?)))
}

pub fn decode_sections(header: &Header, body: &[u8]) -> Result<StrandSet> {
    let mut offset = 0;

    let segments = decode_segments(header, body, &mut offset)?;

    let points = if header.has(FLAG_POINTS) {
        let len = section_len(header.point_count, 12, "points")?;
        read_vec3s(take_section(body, &mut offset, len, "points")?)
    } else if header.point_count > 0 {
        return Err(CyHairError::Format(format!(
            "header declares {} points but has no points section",
            header.point_count
        )));
    } else {
        Vec::new()
    };

    let thicknesses = decode_scalars(
        header,
        body,
        &mut offset,
        FLAG_THICKNESS,
        header.default_thickness,
        "thickness",
    )?;
    let transparencies = decode_scalars(
        header,
        body,
        &mut offset,
        FLAG_TRANSPARENCY,
        header.default_transparency,
        "transparency",
    )?;

    let colors = if header.has(FLAG_COLOR) {
        let len = section_len(header.point_count, 12, "color")?;
        Attribute::Explicit(read_vec3s(take_section(body, &mut offset, len, "color")?))
    } else {
        Attribute::Default(header.default_color)
    };

    if offset < body.len() {
        debug!(
            trailing = body.len() - offset,
            "ignoring bytes after the last section"
        );
    }

    Ok(StrandSet {
        segments,
        points,
        thicknesses,
        transparencies,
        colors,
        info: header.info.clone(),
    })
}

/// Computes flags, counts and header defaults for `set`.
pub fn build_header(set: &StrandSet) -> Result<Header> {
    let num_points = set.num_points();

    let strand_count = match &set.segments {
        Attribute::Explicit(v) if v.is_empty() && num_points > 0 => {
            return Err(CyHairError::Invariant(format!(
                "{} points but no strand segments",
                num_points
            )));
        }
        Attribute::Explicit(v) => v.len(),
        Attribute::Default(0) if num_points > 0 => {
            return Err(CyHairError::Invariant(format!(
                "{} strands would have 0 default segments, must be within 1..={}",
                num_points,
                u16::MAX
            )));
        }
        Attribute::Default(d) => {
            let per_strand = *d as u64 + 1;
            if num_points as u64 % per_strand != 0 {
                return Err(CyHairError::Invariant(format!(
                    "{} points do not split into strands of {} default segments",
                    num_points, d
                )));
            }
            (num_points as u64 / per_strand) as usize
        }
    };

    let mut flags = 0;
    if set.segments.is_present() {
        flags |= FLAG_SEGMENTS;
    }
    if !set.points.is_empty() {
        flags |= FLAG_POINTS;
    }
    if set.thicknesses.is_present() {
        flags |= FLAG_THICKNESS;
    }
    if set.transparencies.is_present() {
        flags |= FLAG_TRANSPARENCY;
    }
    if set.colors.is_present() {
        flags |= FLAG_COLOR;
    }

    Ok(Header {
        strand_count: to_u32(strand_count, "strand count")?,
        point_count: to_u32(num_points, "point count")?,
        flags,
        default_segments: set.segments.default_or(WRITER_DEFAULT_SEGMENTS),
        default_thickness: set.thicknesses.default_or(WRITER_DEFAULT_THICKNESS),
        default_transparency: set
            .transparencies
            .default_or(WRITER_DEFAULT_TRANSPARENCY),
        default_color: set.colors.default_or(WRITER_DEFAULT_COLOR),
        info: WRITER_INFO.to_string(),
    })
}

/// Clamps a per-point stream to the write bound of `num_points` values.
fn bounded<'a, T>(
    values: &'a [T],
    num_points: usize,
    policy: OversizePolicy,
    section: &str,
) -> Result<&'a [T]> {
    if values.len() < num_points {
        return Err(CyHairError::Invariant(format!(
            "{} stream has {} values for {} points",
            section,
            values.len(),
            num_points
        )));
    }
    if values.len() > num_points {
        match policy {
            OversizePolicy::Truncate => {
                warn!(
                    section,
                    values = values.len(),
                    points = num_points,
                    "truncating oversized stream"
                );
            }
            OversizePolicy::Reject => {
                return Err(CyHairError::Invariant(format!(
                    "{} stream has {} values, more than the {} points",
                    section,
                    values.len(),
                    num_points
                )));
            }
        }
    }
    Ok(&values[..num_points])
}

pub fn encode_sections(
    set: &StrandSet,
    policy: OversizePolicy,
    output: &mut Vec<u8>,
) -> Result<()> {
    let num_points = set.num_points();

    if let Attribute::Explicit(segments) = &set.segments {
        let described: u64 = segments.iter().map(|&s| s as u64 + 1).sum();
        if !segments.is_empty() && described != num_points as u64 {
            return Err(CyHairError::Invariant(format!(
                "segments describe {} points, strand set holds {}",
                described, num_points
            )));
        }
        output.reserve(segments.len() * 2);
        for (i, &s) in segments.iter().enumerate() {
            output.extend_from_slice(&narrow_segment(i, s)?.to_le_bytes());
        }
    }

    write_vec3s(output, &set.points);

    if let Attribute::Explicit(v) = &set.thicknesses {
        if !v.is_empty() {
            write_f32s(output, bounded(v, num_points, policy, "thickness")?);
        }
    }
    if let Attribute::Explicit(v) = &set.transparencies {
        if !v.is_empty() {
            write_f32s(output, bounded(v, num_points, policy, "transparency")?);
        }
    }
    if let Attribute::Explicit(v) = &set.colors {
        if !v.is_empty() {
            write_vec3s(output, bounded(v, num_points, policy, "color")?);
        }
    }
    Ok(())
}

pub fn decode(data: &[u8]) -> Result<StrandSet> {
    let (header, body) = decode_header(data)?;
    debug!(
        strands = header.strand_count,
        points = header.point_count,
        flags = header.flags,
        "decoding CyHair"
    );
    decode_sections(&header, body)
}

pub fn encode(set: &StrandSet, output: &mut Vec<u8>) -> Result<()> {
    encode_with_policy(set, OversizePolicy::default(), output)
}

pub fn encode_with_policy(
    set: &StrandSet,
    policy: OversizePolicy,
    output: &mut Vec<u8>,
) -> Result<()> {
    let header = build_header(set)?;
    output.clear();
    output.extend_from_slice(&encode_header(&header)?);
    encode_sections(set, policy, output)
}

pub fn load(path: impl AsRef<Path>) -> Result<StrandSet> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|e| CyHairError::io(path, e))?;
    debug!(path = %path.display(), bytes = data.len(), "loaded file");
    decode(&data).map_err(|e| e.in_file(path))
}

pub fn save(path: impl AsRef<Path>, set: &StrandSet) -> Result<()> {
    save_with_policy(path, set, OversizePolicy::default())
}

/// Encodes `set` fully before touching `path`, so a failed encode never
/// leaves a file behind. An existing file is overwritten.
pub fn save_with_policy(
    path: impl AsRef<Path>,
    set: &StrandSet,
    policy: OversizePolicy,
) -> Result<()> {
    let path = path.as_ref();
    let mut buf = Vec::new();
    encode_with_policy(set, policy, &mut buf).map_err(|e| e.in_file(path))?;
    fs::write(path, &buf).map_err(|e| CyHairError::io(path, e))?;
    debug!(path = %path.display(), bytes = buf.len(), "saved file");
    Ok(())
}

cfg_if::cfg_if! {
if #[cfg(feature = "async")] {
    #[inline(never)]
    pub async fn load_async(path: impl AsRef<Path>) -> Result<StrandSet> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| CyHairError::io(path, e))?;
        decode(&data).map_err(|e| e.in_file(path))
    }

    #[inline(never)]
    pub async fn save_async(
        path: impl AsRef<Path>,
        set: &StrandSet,
        policy: OversizePolicy,
    ) -> Result<()> {
        let path = path.as_ref();
        let mut buf = Vec::new();
        encode_with_policy(set, policy, &mut buf).map_err(|e| e.in_file(path))?;
        tokio::fs::write(path, &buf)
            .await
            .map_err(|e| CyHairError::io(path, e))
    }

    /// Same as [`combine_files`], reading inputs one after another.
    #[inline(never)]
    pub async fn combine_files_async(inputs: &[CyHairInput]) -> Result<StrandSet> {
        let mut loaded = Vec::with_capacity(inputs.len());
        for input in inputs {
            let strands = load_async(&input.filename).await?;
            loaded.push(CombineInput::from_config(input, strands));
        }
        combine(&loaded)
    }
}
}
