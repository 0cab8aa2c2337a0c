//! Property tests for keyframe interpolation.

use proptest::prelude::*;
use reframe_project_model::{interpolate, CameraState, Easing, ZoomKeyframe, TRANSITION_WINDOW_SECS};

fn easing() -> impl Strategy<Value = Easing> {
    prop_oneof![
        Just(Easing::Linear),
        Just(Easing::EaseOut),
        Just(Easing::EaseInOut),
    ]
}

fn keyframe_at(time: f64) -> impl Strategy<Value = ZoomKeyframe> {
    (1.0f64..4.0, 0.0f64..=1.0, 0.0f64..=1.0, easing()).prop_map(move |(z, x, y, e)| {
        ZoomKeyframe::new(time, z, x, y).with_easing(e)
    })
}

/// Strictly increasing keyframe list with gaps in `[0.05, 2.5]` seconds.
fn keyframes() -> impl Strategy<Value = Vec<ZoomKeyframe>> {
    prop::collection::vec(0.05f64..2.5, 1..8).prop_flat_map(|gaps| {
        let mut time = 0.5;
        let times: Vec<f64> = gaps
            .into_iter()
            .map(|gap| {
                time += gap;
                time
            })
            .collect();
        times.into_iter().map(keyframe_at).collect::<Vec<_>>()
    })
}

fn distance(a: &CameraState, b: &CameraState) -> f64 {
    (a.zoom_factor - b.zoom_factor)
        .abs()
        .max((a.position_x - b.position_x).abs())
        .max((a.position_y - b.position_y).abs())
}

proptest! {
    #[test]
    fn empty_keyframes_are_identity(t in -100.0f64..100.0) {
        prop_assert_eq!(interpolate(t, &[]), CameraState::IDENTITY);
    }

    #[test]
    fn arrival_is_continuous(ks in keyframes(), eps_exp in 7i32..12) {
        let eps = 10f64.powi(-eps_exp);
        for k in &ks {
            let before = interpolate(k.time - eps, &ks);
            let at = interpolate(k.time, &ks);
            prop_assert!(distance(&before, &at) < 1e-4, "jump at {}: {:?} -> {:?}", k.time, before, at);
            prop_assert_eq!(at, k.camera());
        }
    }

    #[test]
    fn chained_departure_is_continuous(ks in keyframes()) {
        for pair in ks.windows(2) {
            if pair[1].time - pair[0].time > TRANSITION_WINDOW_SECS {
                continue;
            }
            let at = interpolate(pair[0].time, &ks);
            let after = interpolate(pair[0].time + 1e-9, &ks);
            prop_assert!(distance(&at, &after) < 1e-4);
        }
    }

    #[test]
    fn holds_last_target_exactly(ks in keyframes(), extra in 0.0f64..50.0) {
        let last = ks[ks.len() - 1];
        prop_assert_eq!(interpolate(last.time + extra, &ks), last.camera());
    }

    #[test]
    fn values_stay_within_keyframe_bounds(ks in keyframes(), t in 0.0f64..25.0) {
        let cam = interpolate(t, &ks);
        let max_zoom = ks.iter().map(|k| k.zoom_factor).fold(1.0, f64::max);
        prop_assert!(cam.zoom_factor >= 1.0 - 1e-9 && cam.zoom_factor <= max_zoom + 1e-9);
        prop_assert!((-1e-9..=1.0 + 1e-9).contains(&cam.position_x));
        prop_assert!((-1e-9..=1.0 + 1e-9).contains(&cam.position_y));
    }
}
