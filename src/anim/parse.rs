//! Animation descriptor parsing.
//!
//! Accepts both the verbose (`ANIMATION`, `TIMELINE`, `LAYERS`, ...) and compact
//! (`AN`, `TL`, `L`, ...) key sets of Animate texture-atlas exports.

use serde_json::Value;

use crate::{
    anim::model::{AtlasInstance, Element, FrameRecord, Layer, LoopMode, SymbolInstance, Timeline},
    foundation::core::{Affine, FrameRange, Vec2},
    foundation::error::{SpriteFrameError, SpriteFrameResult},
    foundation::json,
    transform::affine,
};

const ANIMATION: &[&str] = &["ANIMATION", "AN"];
const TIMELINE: &[&str] = &["TIMELINE", "TL"];
const LAYERS: &[&str] = &["LAYERS", "L"];
const FRAMES: &[&str] = &["Frames", "FR"];
const ELEMENTS: &[&str] = &["elements", "E"];
const SYMBOL_INSTANCE: &[&str] = &["SYMBOL_Instance", "SI"];
const SPRITE_INSTANCE: &[&str] = &["ATLAS_SPRITE_instance", "ASI"];

/// Main timeline of an animation descriptor plus the job-level metadata it carries.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct AnimationDoc {
    /// Animation (or root symbol) name, used for frame file names.
    pub name: Option<String>,
    /// Frames per second declared in the descriptor metadata.
    pub frame_rate: Option<f64>,
    /// Main timeline.
    pub timeline: Timeline,
}

impl AnimationDoc {
    /// Parse the main timeline.
    ///
    /// Fails only when the descriptor is not an object or carries no timeline at all.
    pub fn from_json(desc: &Value) -> SpriteFrameResult<Self> {
        if !desc.is_object() {
            return Err(SpriteFrameError::descriptor(
                "animation descriptor must be a JSON object",
            ));
        }
        let root = json::field(desc, ANIMATION).unwrap_or(desc);
        let timeline = parse_timeline(root)
            .or_else(|| parse_timeline(desc))
            .ok_or_else(|| {
                SpriteFrameError::validation("no main timeline found in animation descriptor")
            })?;

        let name = json::text(root, &["name", "SYMBOL_name", "N", "SN"])
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let frame_rate = [desc, root]
            .into_iter()
            .filter_map(|v| json::field(v, &["metadata", "MD"]))
            .find_map(|md| json::number(md, &["framerate", "frameRate", "FRT"]))
            .filter(|fps| fps.is_finite() && *fps > 0.0);

        tracing::debug!(
            name = name.as_deref().unwrap_or(""),
            layers = timeline.layers.len(),
            "parsed animation descriptor"
        );
        Ok(Self {
            name,
            frame_rate,
            timeline,
        })
    }
}

/// Timeline carried by `owner`, either under `TIMELINE`/`TL` or as bare `LAYERS`/`L`.
pub(crate) fn parse_timeline(owner: &Value) -> Option<Timeline> {
    let tl = match json::field(owner, TIMELINE) {
        Some(tl) => tl,
        None if json::field(owner, LAYERS).is_some() => owner,
        None => return None,
    };
    let layers = json::array(tl, LAYERS)
        .map(|ls| ls.iter().map(parse_layer).collect())
        .unwrap_or_default();
    Some(Timeline { layers })
}

fn parse_layer(v: &Value) -> Layer {
    Layer {
        name: json::text(v, &["Layer_name", "LN"]).unwrap_or_default(),
        frames: json::array(v, FRAMES)
            .map(|fs| fs.iter().map(parse_frame_record).collect())
            .unwrap_or_default(),
    }
}

fn parse_frame_record(v: &Value) -> FrameRecord {
    let start = json::index(v, &["index", "I"]).unwrap_or(0);
    let duration = json::index(v, &["duration", "DU"])
        .filter(|d| *d > 0)
        .unwrap_or(1);
    let elements = json::array(v, ELEMENTS)
        .map(|es| es.iter().filter_map(parse_element).collect())
        .unwrap_or_default();
    FrameRecord {
        range: FrameRange::from_start_duration(start, duration),
        elements,
    }
}

fn parse_element(v: &Value) -> Option<Element> {
    if let Some(si) = json::field(v, SYMBOL_INSTANCE) {
        let Some(symbol) = json::text(si, &["SYMBOL_name", "SN"]) else {
            tracing::warn!("symbol instance without a symbol name; skipped");
            return None;
        };
        return Some(Element::Symbol(SymbolInstance {
            symbol,
            transform: local_transform(si),
            first_frame: json::index(si, &["firstFrame", "FF"]).unwrap_or(0),
            loop_mode: json::text(si, &["loop", "LP"]).and_then(|t| LoopMode::parse(&t)),
        }));
    }
    if let Some(asi) = json::field(v, SPRITE_INSTANCE) {
        let Some(sprite) = json::text(asi, &["name", "N"]) else {
            tracing::warn!("atlas sprite instance without a name; skipped");
            return None;
        };
        return Some(Element::Atlas(AtlasInstance {
            sprite,
            transform: local_transform(asi),
        }));
    }
    tracing::debug!("unrecognized timeline element; skipped");
    None
}

/// Local transform by priority: decomposed record, 3D matrix, transformation point, identity.
pub(crate) fn local_transform(inst: &Value) -> Affine {
    if let Some(d) = json::field(inst, &["DecomposedMatrix", "DCM"]).filter(|d| d.is_object()) {
        return decomposed(d);
    }
    if let Some(m) = json::field(inst, &["Matrix3D", "M3D"])
        && let Some(t) = matrix3d(m)
    {
        return t;
    }
    if let Some(p) = json::field(inst, &["transformationPoint", "TRP"]).filter(|p| p.is_object()) {
        return Affine::translate(Vec2::new(
            json::number_or(p, &["x"], 0.0),
            json::number_or(p, &["y"], 0.0),
        ));
    }
    affine::identity()
}

fn decomposed(d: &Value) -> Affine {
    let xy = |keys: &[&str], default: f64| {
        json::field(d, keys).map_or(Vec2::new(default, default), |p| {
            Vec2::new(
                json::number_or(p, &["x", "X"], default),
                json::number_or(p, &["y", "Y"], default),
            )
        })
    };
    let rotation = match json::field(d, &["Rotation", "RST"]) {
        Some(r) if r.is_object() => json::number_or(r, &["z", "Z"], 0.0),
        Some(r) => json::to_f64(r).unwrap_or(0.0),
        None => 0.0,
    };
    affine::from_decomposed(
        xy(&["Position", "POS"], 0.0),
        rotation,
        xy(&["Scaling", "SCL"], 1.0),
    )
}

fn matrix3d(m: &Value) -> Option<Affine> {
    match m {
        Value::Array(items) => {
            // Non-numeric entries become NaN so the compositor rejects the command.
            let values: Vec<f64> = items
                .iter()
                .map(|v| json::to_f64(v).unwrap_or(f64::NAN))
                .collect();
            Some(affine::from_matrix3d(&values))
        }
        Value::Object(_) => {
            let at = |key: &str, default: f64| json::number_or(m, &[key], default);
            Some(Affine::new([
                at("m00", 1.0),
                at("m01", 0.0),
                at("m10", 0.0),
                at("m11", 1.0),
                at("m30", 0.0),
                at("m31", 0.0),
            ]))
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/anim/parse.rs"]
mod tests;
