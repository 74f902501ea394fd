use super::*;
use serde_json::json;

fn sprite_list() -> Value {
    json!({
        "ATLAS": {
            "SPRITES": [
                {"SPRITE": {"name": "walk_0001", "x": 0, "y": 0, "w": 10, "h": 12, "rotated": false}},
                {"SPRITE": {"name": "arm.png", "x": 10, "y": 0, "w": 4, "h": 8, "rotated": true}},
                {"SPRITE": {"name": "brazo_izquierdo", "x": 14, "y": 0, "w": 6, "h": 6}},
                {"SPRITE": {"name": "leg_0002", "x": 20, "y": 0, "w": 2, "h": 2}},
                {"SPRITE": {"name": "hand_0002", "x": 22, "y": 0, "w": 3, "h": 3}}
            ]
        },
        "meta": {"size": {"w": 64, "h": 64}}
    })
}

#[test]
fn parses_sprite_list_in_descriptor_order() {
    let idx = build_atlas_index(&sprite_list()).unwrap();
    assert_eq!(idx.shape(), AtlasShape::SpriteList);
    assert_eq!(idx.len(), 5);
    let names: Vec<&str> = idx.iter().map(|(n, _)| n).collect();
    assert_eq!(
        names,
        ["walk_0001", "arm.png", "brazo_izquierdo", "leg_0002", "hand_0002"]
    );
    assert_eq!(idx.get("walk_0001"), Some(SpriteRect::new(0, 0, 10, 12)));
    assert!(idx.get("arm.png").unwrap().rotated);
}

#[test]
fn parses_frame_map_object_and_array() {
    let map = json!({"frames": {
        "a.png": {"frame": {"x": 1, "y": 2, "w": 3, "h": 4}, "rotated": true},
        "b.png": {"frame": {"x": 5, "y": 6, "w": 7, "h": 8}}
    }});
    let idx = build_atlas_index(&map).unwrap();
    assert_eq!(idx.shape(), AtlasShape::FrameMap);
    assert_eq!(
        idx.get("a.png"),
        Some(SpriteRect::new(1, 2, 3, 4).with_rotated(true))
    );

    let arr = json!({"frames": [
        {"filename": "c", "frame": {"x": 0, "y": 0, "w": 2, "h": 2}}
    ]});
    let idx = build_atlas_index(&arr).unwrap();
    assert_eq!(idx.get("c"), Some(SpriteRect::new(0, 0, 2, 2)));
}

#[test]
fn falls_back_to_recursive_scan() {
    let desc = json!({"pages": [{"regions": [
        {"name": "deep", "x": "3", "y": 4, "w": 5, "h": 6},
        {"name": "no_rect", "x": 1}
    ]}]});
    let idx = build_atlas_index(&desc).unwrap();
    assert_eq!(idx.shape(), AtlasShape::RecursiveScan);
    assert_eq!(idx.len(), 1);
    assert_eq!(idx.get("deep"), Some(SpriteRect::new(3, 4, 5, 6)));
}

#[test]
fn sprite_list_wins_over_frame_map() {
    let desc = json!({
        "ATLAS": {"SPRITES": [{"SPRITE": {"name": "s", "x": 0, "y": 0, "w": 1, "h": 1}}]},
        "frames": {"f": {"frame": {"x": 0, "y": 0, "w": 1, "h": 1}}}
    });
    let idx = build_atlas_index(&desc).unwrap();
    assert_eq!(idx.shape(), AtlasShape::SpriteList);
    assert!(idx.get("f").is_none());
}

#[test]
fn empty_descriptor_is_validation_error() {
    let err = build_atlas_index(&json!({"meta": {}})).unwrap_err();
    assert!(err.is_structural());
    assert!(err.to_string().contains("no sprites"));
}

#[test]
fn rejects_out_of_range_match_threshold() {
    let opts = MatchOpts {
        max_normalized_distance: 1.5,
    };
    assert!(build_atlas_index_with(&sprite_list(), opts).is_err());
}

#[test]
fn later_duplicates_replace_rect_in_place() {
    let desc = json!([
        {"name": "a", "x": 0, "y": 0, "w": 1, "h": 1},
        {"name": "b", "x": 0, "y": 0, "w": 1, "h": 1},
        {"name": "a", "x": 9, "y": 9, "w": 2, "h": 2}
    ]);
    let idx = build_atlas_index(&desc).unwrap();
    assert_eq!(idx.len(), 2);
    assert_eq!(idx.iter().next(), Some(("a", SpriteRect::new(9, 9, 2, 2))));
}

#[test]
fn resolve_exact_and_extension_variants() {
    let idx = build_atlas_index(&sprite_list()).unwrap();

    let m = idx.resolve("walk_0001").unwrap();
    assert_eq!((m.name, m.kind), ("walk_0001", MatchKind::Exact));

    let m = idx.resolve("arm").unwrap();
    assert_eq!((m.name, m.kind), ("arm.png", MatchKind::Extension));

    let m = idx.resolve("walk_0001.png").unwrap();
    assert_eq!((m.name, m.kind), ("walk_0001", MatchKind::Extension));
}

#[test]
fn resolve_numeric_part_ignores_padding() {
    let idx = build_atlas_index(&sprite_list()).unwrap();
    let m = idx.resolve("walk_1.png").unwrap();
    assert_eq!(m.name, "walk_0001");
    assert_eq!(m.kind, MatchKind::Numeric);
    assert_eq!(m.rect, SpriteRect::new(0, 0, 10, 12));
}

#[test]
fn resolve_numeric_ties_prefer_closest_name() {
    let idx = build_atlas_index(&sprite_list()).unwrap();
    assert_eq!(idx.resolve("hand_2").unwrap().name, "hand_0002");
    assert_eq!(idx.resolve("leg-2").unwrap().name, "leg_0002");
}

#[test]
fn resolve_normalized_then_fuzzy() {
    let idx = build_atlas_index(&sprite_list()).unwrap();

    let m = idx.resolve("Brazo Izquierdo").unwrap();
    assert_eq!((m.name, m.kind), ("brazo_izquierdo", MatchKind::Normalized));

    let m = idx.resolve("brazo_izqierdo").unwrap();
    assert_eq!(m.name, "brazo_izquierdo");
    assert!(matches!(m.kind, MatchKind::Fuzzy { distance } if distance < 0.1));
}

#[test]
fn resolve_unrelated_name_misses() {
    let idx = build_atlas_index(&sprite_list()).unwrap();
    assert!(idx.resolve("torso").is_none());
    assert!(idx.resolve("").is_none());
}

#[test]
fn fuzzy_threshold_is_configurable() {
    let strict = MatchOpts {
        max_normalized_distance: 0.0,
    };
    let idx = build_atlas_index_with(&sprite_list(), strict).unwrap();
    assert!(idx.resolve("brazo_izqierdo").is_none());
}
