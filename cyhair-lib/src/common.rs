use crate::error::{CyHairError, Result};

/// Splits `len` bytes off the front of `data` at `offset`, advancing it.
#[inline]
pub(crate) fn take_section<'b>(
    data: &'b [u8],
    offset: &mut usize,
    len: usize,
    section: &'static str,
) -> Result<&'b [u8]> {
    let available = data.len().saturating_sub(*offset);
    if len > available {
        return Err(CyHairError::TruncatedFile {
            section,
            needed: len,
            available,
        });
    }
    let start = *offset;
    *offset += len;
    Ok(&data[start..start + len])
}

/// Byte length of `count` elements of `width` bytes, or a format error on overflow.
#[inline]
pub(crate) fn section_len(count: u32, width: usize, section: &'static str) -> Result<usize> {
    (count as usize).checked_mul(width).ok_or_else(|| {
        CyHairError::Format(format!(
            "{} section of {} elements overflows the address space",
            section, count
        ))
    })
}

#[inline]
pub(crate) fn read_u16s(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]) as u32)
        .collect()
}

#[inline]
pub(crate) fn read_f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[inline]
pub(crate) fn read_vec3s(bytes: &[u8]) -> Vec<[f32; 3]> {
    bytes
        .chunks_exact(12)
        .map(|b| {
            let f = |i: usize| f32::from_le_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]]);
            [f(0), f(4), f(8)]
        })
        .collect()
}

#[inline]
pub(crate) fn write_f32s(output: &mut Vec<u8>, values: &[f32]) {
    output.reserve(values.len() * 4);
    for v in values {
        output.extend_from_slice(&v.to_le_bytes());
    }
}

#[inline]
pub(crate) fn write_vec3s(output: &mut Vec<u8>, values: &[[f32; 3]]) {
    output.reserve(values.len() * 12);
    for v in values {
        write_f32s(output, v);
    }
}

/// Narrows a segment count to its on-disk u16, rejecting 0 and values above `u16::MAX`.
#[inline]
pub(crate) fn narrow_segment(strand: usize, segments: u32) -> Result<u16> {
    match u16::try_from(segments) {
        Ok(s) if s > 0 => Ok(s),
        _ => Err(CyHairError::Invariant(format!(
            "strand {} has {} segments, must be within 1..={}",
            strand,
            segments,
            u16::MAX
        ))),
    }
}

#[inline]
pub(crate) fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| CyHairError::Invariant(format!("{} {} does not fit in 32 bits", what, value)))
}
