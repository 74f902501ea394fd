use super::*;
use crate::foundation::core::FrameIndex;
use serde_json::json;

fn only_element(doc: &AnimationDoc) -> &Element {
    &doc.timeline.layers[0].frames[0].elements[0]
}

#[test]
fn parses_verbose_descriptor() {
    let desc = json!({
        "ANIMATION": {
            "name": "Hero",
            "TIMELINE": {"LAYERS": [{
                "Layer_name": "body",
                "Frames": [{
                    "index": 2,
                    "duration": 3,
                    "elements": [
                        {"ATLAS_SPRITE_instance": {"name": "torso", "Matrix3D": {"m00": 1, "m11": 1, "m30": 4, "m31": 5}}},
                        {"SYMBOL_Instance": {"SYMBOL_name": "arm", "firstFrame": 2, "loop": "playonce"}}
                    ]
                }]
            }]}
        },
        "metadata": {"framerate": 24}
    });
    let doc = AnimationDoc::from_json(&desc).unwrap();
    assert_eq!(doc.name.as_deref(), Some("Hero"));
    assert_eq!(doc.frame_rate, Some(24.0));

    let layer = &doc.timeline.layers[0];
    assert_eq!(layer.name, "body");
    let rec = &layer.frames[0];
    assert_eq!(rec.range, FrameRange::from_start_duration(2, 3));
    assert!(rec.range.contains(FrameIndex(4)));

    match &rec.elements[0] {
        Element::Atlas(a) => {
            assert_eq!(a.sprite, "torso");
            assert_eq!(a.transform, Affine::translate((4.0, 5.0)));
        }
        other => panic!("expected atlas element, got {other:?}"),
    }
    match &rec.elements[1] {
        Element::Symbol(s) => {
            assert_eq!(s.symbol, "arm");
            assert_eq!(s.first_frame, 2);
            assert_eq!(s.loop_mode, Some(LoopMode::PlayOnce));
            assert_eq!(s.transform, Affine::IDENTITY);
        }
        other => panic!("expected symbol element, got {other:?}"),
    }
}

#[test]
fn parses_compact_descriptor() {
    let desc = json!({
        "AN": {
            "N": "run",
            "SN": "run_symbol",
            "TL": {"L": [{"LN": "l0", "FR": [{
                "I": 0,
                "DU": 2,
                "E": [{"SI": {"SN": "S", "FF": 1, "LP": "LP", "M3D": [2,0,0,0, 0,2,0,0, 0,0,1,0, 10,20,0,1]}}]
            }]}]}
        },
        "MD": {"FRT": 30}
    });
    let doc = AnimationDoc::from_json(&desc).unwrap();
    assert_eq!(doc.name.as_deref(), Some("run"));
    assert_eq!(doc.frame_rate, Some(30.0));
    match only_element(&doc) {
        Element::Symbol(s) => {
            assert_eq!(s.symbol, "S");
            assert_eq!(s.first_frame, 1);
            assert_eq!(s.loop_mode, Some(LoopMode::Loop));
            assert_eq!(s.transform.as_coeffs(), [2.0, 0.0, 0.0, 2.0, 10.0, 20.0]);
        }
        other => panic!("expected symbol element, got {other:?}"),
    }
}

#[test]
fn duration_defaults_to_one() {
    let desc = json!({"TL": {"L": [{"FR": [{"I": 4, "DU": 0}, {"E": []}]}]}});
    let doc = AnimationDoc::from_json(&desc).unwrap();
    let frames = &doc.timeline.layers[0].frames;
    assert_eq!(frames[0].range, FrameRange::from_start_duration(4, 1));
    assert_eq!(frames[1].range, FrameRange::from_start_duration(0, 1));
    assert!(doc.name.is_none());
}

#[test]
fn bare_layers_count_as_timeline() {
    let desc = json!({"LAYERS": []});
    let doc = AnimationDoc::from_json(&desc).unwrap();
    assert!(doc.timeline.is_empty());
}

#[test]
fn missing_timeline_is_structural_error() {
    let err = AnimationDoc::from_json(&json!({"ANIMATION": {"name": "x"}})).unwrap_err();
    assert!(err.is_structural());
    assert!(err.to_string().starts_with("validation error:"));

    let err = AnimationDoc::from_json(&json!([1, 2])).unwrap_err();
    assert!(err.to_string().starts_with("descriptor error:"));
}

#[test]
fn unnamed_or_unknown_elements_are_dropped() {
    let desc = json!({"TL": {"L": [{"FR": [{"E": [
        {"ASI": {"M3D": []}},
        {"SHAPE": {}},
        {"ASI": {"N": "ok"}}
    ]}]}]}});
    let doc = AnimationDoc::from_json(&desc).unwrap();
    let elements = &doc.timeline.layers[0].frames[0].elements;
    assert_eq!(elements.len(), 1);
    assert!(matches!(&elements[0], Element::Atlas(a) if a.sprite == "ok"));
}

#[test]
fn transform_priority_prefers_decomposed() {
    let inst = json!({
        "DecomposedMatrix": {"Position": {"x": 3, "y": 4}, "Rotation": {"z": 0}, "Scaling": {"x": 2, "y": 2}},
        "Matrix3D": [1,0,0,0, 0,1,0,0, 0,0,1,0, 99,99,0,1],
        "transformationPoint": {"x": 7, "y": 7}
    });
    let t = local_transform(&inst);
    assert_eq!(t.as_coeffs(), [2.0, 0.0, 0.0, 2.0, 3.0, 4.0]);

    let inst = json!({"M3D": [1,0,0,0, 0,1,0,0, 0,0,1,0, 8,9,0,1], "TRP": {"x": 1, "y": 1}});
    assert_eq!(local_transform(&inst), Affine::translate((8.0, 9.0)));

    let inst = json!({"transformationPoint": {"x": 1.5, "y": -2}});
    assert_eq!(local_transform(&inst), Affine::translate((1.5, -2.0)));

    assert_eq!(local_transform(&json!({})), Affine::IDENTITY);
}

#[test]
fn decomposed_rotation_in_degrees_is_converted() {
    let inst = json!({"DCM": {"POS": {"x": 0, "y": 0}, "RST": 90, "SCL": {"x": 1, "y": 1}}});
    let p = local_transform(&inst) * kurbo::Point::new(1.0, 0.0);
    assert!(p.x.abs() < 1e-9);
    assert!((p.y - 1.0).abs() < 1e-9);
}

#[test]
fn non_numeric_matrix_entries_poison_the_transform() {
    let inst = json!({"M3D": ["x", 0, 0, 0, 0, 1]});
    assert!(!affine::is_finite(local_transform(&inst)));
}
