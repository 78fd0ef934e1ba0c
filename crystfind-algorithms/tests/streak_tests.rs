use crystfind_algorithms::{streak_mask_once, StreakMaskConfig, StreakMaskContext};
use crystfind_core::geometry::{FrameSource, RawShape};
use crystfind_core::{Error, Result};
use crystfind_geometry::{PanelLayout, PanelTransform};
use ndarray::Array3;

const SHAPE: (usize, usize, usize) = (2, 10, 20);

fn stacked_layout() -> PanelLayout {
    PanelLayout::stacked(RawShape::from(SHAPE))
        .with_center(Some((10, 10)))
        .unwrap()
}

fn config() -> StreakMaskConfig {
    StreakMaskConfig::new().with_width(20).with_sigma(1.0)
}

/// Streak entering panel 0 from its left border plus an interior blob on
/// panel 1.
fn streak_frame() -> Array3<f64> {
    let mut frame = Array3::from_elem(SHAPE, 1.0);
    for c in 0..9 {
        frame[[0, 5, c]] = 100.0;
    }
    for (r, c) in [(4, 12), (4, 13), (5, 12), (5, 13)] {
        frame[[1, r, c]] = 100.0;
    }
    frame
}

fn masked_pixels(mask: &Array3<bool>) -> Vec<(usize, usize, usize)> {
    mask.indexed_iter()
        .filter_map(|(pos, &keep)| (!keep).then_some(pos))
        .collect()
}

#[test]
fn test_edge_streak_is_masked() {
    let context = StreakMaskContext::create(stacked_layout(), config()).unwrap();
    assert!(context.is_usable());

    let mask = context.streak_mask(streak_frame().view()).unwrap().unwrap();
    assert_eq!(mask.dim(), SHAPE);

    // The 2x2 box sum spreads the streak one row down and one column right.
    let mut expected = Vec::new();
    for r in 5..=6 {
        for c in 0..=9 {
            expected.push((0, r, c));
        }
    }
    assert_eq!(masked_pixels(&mask), expected);

    // The interior blob is bright but never reaches a panel edge.
    assert!(mask[[1, 4, 12]] && mask[[1, 5, 13]]);
}

#[test]
fn test_quiet_frame_keeps_everything() {
    let context = StreakMaskContext::create(stacked_layout(), config()).unwrap();
    let frame = Array3::from_elem(SHAPE, 1.0);
    let mask = context.streak_mask(frame.view()).unwrap().unwrap();
    assert!(mask.iter().all(|&keep| keep));
}

#[test]
fn test_one_shot_matches_context() {
    let frame = streak_frame();
    let context = StreakMaskContext::create(stacked_layout(), config()).unwrap();
    let from_context = context.streak_mask(frame.view()).unwrap();
    let once = streak_mask_once(stacked_layout(), frame.view(), &config()).unwrap();
    assert_eq!(from_context, once);

    // Reusing the context does not change its answer.
    let quiet = Array3::from_elem(SHAPE, 1.0);
    context.streak_mask(quiet.view()).unwrap();
    assert_eq!(context.streak_mask(frame.view()).unwrap(), from_context);
}

#[test]
fn test_rotated_panel_with_gap() {
    // Panel 1 sits rotated by 180 degrees below a one-row gap.
    let layout = PanelLayout::new(
        RawShape::from(SHAPE),
        (21, 20),
        vec![
            PanelTransform::identity(),
            PanelTransform::rotated_180(10, 20, 11, 0),
        ],
        Some((10, 10)),
    )
    .unwrap();

    let mut frame = Array3::from_elem(SHAPE, 1.0);
    for c in 0..8 {
        frame[[1, 5, c]] = 100.0;
    }

    let mask = streak_mask_once(&layout, frame.view(), &config())
        .unwrap()
        .unwrap();

    let mut expected = Vec::new();
    for r in 4..=5 {
        for c in 0..8 {
            expected.push((1, r, c));
        }
    }
    assert_eq!(masked_pixels(&mask), expected);
}

#[test]
fn test_centerless_geometry_is_unusable() {
    let layout = PanelLayout::stacked(RawShape::from(SHAPE));
    let context = StreakMaskContext::create(layout, config()).unwrap();
    assert!(!context.is_usable());
    for _ in 0..3 {
        assert!(context
            .streak_mask(streak_frame().view())
            .unwrap()
            .is_none());
    }
    assert!(streak_mask_once(context.geometry(), streak_frame().view(), &config())
        .unwrap()
        .is_none());
}

#[test]
fn test_unusable_context_ignores_frame_shape() {
    let layout = PanelLayout::stacked(RawShape::from(SHAPE));
    let context = StreakMaskContext::create(layout, config()).unwrap();
    let small = Array3::from_elem((1, 5, 5), 1.0);
    assert!(context.streak_mask(small.view()).unwrap().is_none());
}

#[test]
fn test_shape_mismatch() {
    let context = StreakMaskContext::create(stacked_layout(), config()).unwrap();
    let frame = Array3::from_elem((2, 10, 19), 1.0);
    assert!(matches!(
        context.streak_mask(frame.view()),
        Err(Error::ShapeMismatch { .. })
    ));
}

struct Event(Option<Array3<f64>>);

impl FrameSource for Event {
    fn raw_frame(&self) -> Result<Array3<f64>> {
        self.0
            .clone()
            .ok_or_else(|| Error::FrameSource("no detector data in event".into()))
    }
}

#[test]
fn test_frame_source() {
    let context = StreakMaskContext::create(stacked_layout(), config()).unwrap();
    let frame = streak_frame();

    let from_source = context
        .streak_mask_from_source(&Event(Some(frame.clone())))
        .unwrap();
    assert_eq!(from_source, context.streak_mask(frame.view()).unwrap());

    assert!(matches!(
        context.streak_mask_from_source(&Event(None)),
        Err(Error::FrameSource(_))
    ));

    // An unusable context never asks the source.
    let unusable =
        StreakMaskContext::create(PanelLayout::stacked(RawShape::from(SHAPE)), config()).unwrap();
    assert!(unusable
        .streak_mask_from_source(&Event(None))
        .unwrap()
        .is_none());
}
