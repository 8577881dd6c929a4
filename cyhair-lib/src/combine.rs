use tracing::info;

use crate::config::CyHairInput;
use crate::error::{CyHairError, Result};
use crate::structures::{Attribute, StrandSet, WRITER_DEFAULT_COLOR, WRITER_DEFAULT_TRANSPARENCY};

/// One source of the merge together with its thickness directives.
#[derive(Debug, Clone)]
pub struct CombineInput {
    pub label: String,
    pub strands: StrandSet,
    pub thickness_override: Option<f32>,
    pub thickness_scale: f32,
}

impl CombineInput {
    pub fn new(label: impl Into<String>, strands: StrandSet) -> Self {
        CombineInput {
            label: label.into(),
            strands,
            thickness_override: None,
            thickness_scale: 1.0,
        }
    }

    pub fn from_config(input: &CyHairInput, strands: StrandSet) -> Self {
        CombineInput {
            label: input.filename.display().to_string(),
            strands,
            thickness_override: input.thickness_override(),
            thickness_scale: input.thickness_scale,
        }
    }
}

fn append_thicknesses(input: &CombineInput, out: &mut Vec<f32>) -> Result<()> {
    let num_points = input.strands.num_points();
    let scale = input.thickness_scale;

    if let Some(t) = input.thickness_override {
        out.extend(std::iter::repeat(t * scale).take(num_points));
        return Ok(());
    }

    match &input.strands.thicknesses {
        Attribute::Explicit(v) if v.len() == num_points => {
            out.extend(v.iter().map(|&t| t * scale));
            Ok(())
        }
        Attribute::Explicit(v) => Err(CyHairError::InconsistentAttribute {
            input: input.label.clone(),
            attribute: "thickness",
            expected: num_points,
            actual: v.len(),
        }),
        Attribute::Default(t) => {
            out.extend(std::iter::repeat(t * scale).take(num_points));
            Ok(())
        }
    }
}

/// Concatenates `inputs` in order. Transparency and color are not carried
/// over: the result always stores them as header defaults.
pub fn combine(inputs: &[CombineInput]) -> Result<StrandSet> {
    let total_points: usize = inputs.iter().map(|i| i.strands.num_points()).sum();
    let total_strands: usize = inputs.iter().map(|i| i.strands.num_strands()).sum();

    let mut points = Vec::with_capacity(total_points);
    let mut segments = Vec::with_capacity(total_strands);
    let mut thicknesses = Vec::with_capacity(total_points);

    for (i, input) in inputs.iter().enumerate() {
        let strands = &input.strands;
        info!(
            index = i,
            input = %input.label,
            points = strands.num_points(),
            thicknesses = strands.thicknesses.len_or(strands.num_points()),
            segments = strands.num_strands(),
            "combining hair"
        );

        if let Attribute::Default(d) = &strands.segments {
            let per_strand = *d as usize + 1;
            if strands.num_points() % per_strand != 0 {
                return Err(CyHairError::InconsistentAttribute {
                    input: input.label.clone(),
                    attribute: "segments",
                    expected: strands.num_strands() * per_strand,
                    actual: strands.num_points(),
                });
            }
        }
        append_thicknesses(input, &mut thicknesses)?;
        points.extend_from_slice(&strands.points);
        segments.extend(strands.segment_counts());
    }

    Ok(StrandSet {
        segments: Attribute::Explicit(segments),
        points,
        thicknesses: Attribute::Explicit(thicknesses),
        transparencies: Attribute::Default(WRITER_DEFAULT_TRANSPARENCY),
        colors: Attribute::Default(WRITER_DEFAULT_COLOR),
        info: String::new(),
    })
}

/// Loads every configured file, one at a time, and combines them.
pub fn combine_files(inputs: &[CyHairInput]) -> Result<StrandSet> {
    let loaded = inputs
        .iter()
        .map(|input| Ok(CombineInput::from_config(input, crate::load(&input.filename)?)))
        .collect::<Result<Vec<_>>>()?;
    combine(&loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strands(segments: Vec<u32>, thicknesses: Attribute<f32>) -> StrandSet {
        let num_points: u32 = segments.iter().map(|s| s + 1).sum();
        let points = (0..num_points)
            .map(|p| [p as f32, 0.5 * p as f32, -(p as f32)])
            .collect();
        StrandSet {
            segments: Attribute::Explicit(segments),
            points,
            thicknesses,
            ..StrandSet::default()
        }
    }

    #[test]
    fn test_order_is_preserved() {
        let a = strands(vec![1], Attribute::Explicit(vec![0.1, 0.2]));
        let b = strands(vec![2, 1], Attribute::Explicit(vec![0.3; 5]));
        let out = combine(&[
            CombineInput::new("a", a.clone()),
            CombineInput::new("b", b.clone()),
        ])
        .unwrap();

        assert_eq!(out.segments, Attribute::Explicit(vec![1, 2, 1]));
        let expected: Vec<[f32; 3]> = a.points.iter().chain(&b.points).copied().collect();
        assert_eq!(out.points, expected);
        assert_eq!(
            out.thicknesses,
            Attribute::Explicit(vec![0.1, 0.2, 0.3, 0.3, 0.3, 0.3, 0.3])
        );
    }

    #[test]
    fn test_override_ignores_file_thickness() {
        let mut input = CombineInput::new("a", strands(vec![2], Attribute::Explicit(vec![9.0; 3])));
        input.thickness_override = Some(2.0);
        input.thickness_scale = 3.0;
        let out = combine(&[input]).unwrap();
        assert_eq!(out.thicknesses, Attribute::Explicit(vec![6.0; 3]));
    }

    #[test]
    fn test_scale_applies_to_file_thickness() {
        let mut input = CombineInput::new(
            "a",
            strands(vec![1, 1], Attribute::Explicit(vec![1.0, 2.0, 3.0, 4.0])),
        );
        input.thickness_scale = 2.0;
        let out = combine(&[input]).unwrap();
        assert_eq!(out.thicknesses, Attribute::Explicit(vec![2.0, 4.0, 6.0, 8.0]));
    }

    #[test]
    fn test_default_thickness_expands_per_point() {
        let mut input = CombineInput::new("a", strands(vec![3], Attribute::Default(0.25)));
        input.thickness_scale = 4.0;
        let out = combine(&[input]).unwrap();
        assert_eq!(out.thicknesses, Attribute::Explicit(vec![1.0; 4]));
    }

    #[test]
    fn test_inconsistent_thickness_is_rejected() {
        let bad = strands(vec![2], Attribute::Explicit(vec![1.0, 1.0]));
        let err = combine(&[
            CombineInput::new("good", strands(vec![1], Attribute::Explicit(vec![1.0; 2]))),
            CombineInput::new("bad", bad),
        ])
        .unwrap_err();
        match err {
            CyHairError::InconsistentAttribute {
                input,
                attribute,
                expected,
                actual,
            } => {
                assert_eq!(input, "bad");
                assert_eq!(attribute, "thickness");
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_points_per_strand_mapping() {
        let a = strands(vec![2], Attribute::Explicit(vec![1.0; 3]));
        let b = strands(vec![4], Attribute::Explicit(vec![1.0; 5]));
        let out = combine(&[CombineInput::new("a", a), CombineInput::new("b", b)]).unwrap();
        assert_eq!(out.points_per_strand(), vec![3, 5]);
        assert_eq!(out.strand_offsets(), vec![0, 3]);
    }

    #[test]
    fn test_default_segments_are_materialized() {
        let input = StrandSet {
            segments: Attribute::Default(1),
            points: vec![[0.0; 3]; 6],
            thicknesses: Attribute::Default(1.0),
            ..StrandSet::default()
        };
        let out = combine(&[CombineInput::new("a", input)]).unwrap();
        assert_eq!(out.segments, Attribute::Explicit(vec![1, 1, 1]));
    }

    #[test]
    fn test_default_segments_must_divide_points() {
        let input = StrandSet {
            segments: Attribute::Default(2),
            points: vec![[0.0; 3]; 7],
            thicknesses: Attribute::Default(1.0),
            ..StrandSet::default()
        };
        match combine(&[CombineInput::new("uneven", input)]).unwrap_err() {
            CyHairError::InconsistentAttribute {
                input,
                attribute,
                expected,
                actual,
            } => {
                assert_eq!(input, "uneven");
                assert_eq!(attribute, "segments");
                assert_eq!(expected, 6);
                assert_eq!(actual, 7);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_transparency_and_color_are_dropped() {
        let mut input = strands(vec![1], Attribute::Explicit(vec![1.0; 2]));
        input.transparencies = Attribute::Explicit(vec![0.2; 2]);
        input.colors = Attribute::Explicit(vec![[0.1, 0.2, 0.3]; 2]);
        let out = combine(&[CombineInput::new("a", input)]).unwrap();
        assert!(!out.transparencies.is_present());
        assert!(!out.colors.is_present());
    }

    #[test]
    fn test_empty_input_list() {
        let out = combine(&[]).unwrap();
        assert_eq!(out.num_points(), 0);
        assert_eq!(out.num_strands(), 0);
    }
}
