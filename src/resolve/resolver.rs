use std::collections::HashSet;
use std::fmt;

use crate::{
    anim::model::{AtlasInstance, Element, FrameRecord, SymbolInstance, Timeline},
    anim::symbols::SymbolTable,
    atlas::index::{AtlasIndex, MatchKind},
    foundation::core::{Affine, FrameIndex, SpriteRect},
    transform::affine,
};

/// Resolver tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ResolveOpts {
    /// Deepest allowed nesting of symbol instances; deeper branches are truncated.
    pub max_depth: u32,
    /// Most commands plus issues one frame may produce; the walk stops once reached.
    pub max_commands: usize,
}

impl Default for ResolveOpts {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_commands: 100_000,
        }
    }
}

/// One fully resolved paint instruction: a source region and its world transform.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct DrawCommand {
    pub source_rect: SpriteRect,
    pub transform: Affine,
    /// Canonical atlas key the reference resolved to.
    pub source_name: String,
}

/// Recoverable data-quality condition met while resolving a frame.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub enum ResolveIssue {
    MissingSprite { reference: String },
    MissingSymbol { symbol: String },
    DepthLimit { symbol: String, depth: u32 },
    /// The symbol instances itself, directly or through other symbols.
    Cycle { symbol: String },
    BudgetExceeded { limit: usize },
    LowConfidenceMatch {
        reference: String,
        key: String,
        distance: f64,
    },
}

impl fmt::Display for ResolveIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSprite { reference } => {
                write!(f, "sprite '{reference}' not found in atlas")
            }
            Self::MissingSymbol { symbol } => write!(f, "symbol '{symbol}' not defined"),
            Self::DepthLimit { symbol, depth } => {
                write!(f, "symbol '{symbol}' truncated at nesting depth {depth}")
            }
            Self::Cycle { symbol } => {
                write!(f, "symbol '{symbol}' instances itself; recursion cut")
            }
            Self::BudgetExceeded { limit } => {
                write!(f, "frame stopped after {limit} commands and issues")
            }
            Self::LowConfidenceMatch {
                reference,
                key,
                distance,
            } => write!(
                f,
                "sprite '{reference}' matched '{key}' with low confidence (distance {distance:.2})"
            ),
        }
    }
}

/// Commands of one frame plus every recoverable issue met on the way.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct ResolveReport {
    pub commands: Vec<DrawCommand>,
    pub issues: Vec<ResolveIssue>,
}

/// Flatten `timeline` at `frame` into draw commands.
///
/// Unresolvable elements are skipped; see [`resolve_frame_report`] to observe them.
pub fn resolve_frame(
    timeline: &Timeline,
    symbols: &SymbolTable,
    atlas: &AtlasIndex,
    frame: FrameIndex,
    opts: &ResolveOpts,
) -> Vec<DrawCommand> {
    resolve_frame_report(timeline, symbols, atlas, frame, opts).commands
}

/// Depth-first walk of `timeline` and every nested symbol active at `frame`.
///
/// Layer and element order is preserved as draw order. Never fails: misses and truncated
/// branches are reported as [`ResolveIssue`]s. A symbol is never entered again below itself,
/// and each truncated symbol is reported once per frame.
#[tracing::instrument(skip(timeline, symbols, atlas, opts), fields(frame = frame.0))]
pub fn resolve_frame_report(
    timeline: &Timeline,
    symbols: &SymbolTable,
    atlas: &AtlasIndex,
    frame: FrameIndex,
    opts: &ResolveOpts,
) -> ResolveReport {
    let mut walk = Walk {
        symbols,
        atlas,
        opts: *opts,
        path: Vec::new(),
        truncated: HashSet::new(),
        exhausted: false,
        report: ResolveReport::default(),
    };
    walk.timeline(timeline, frame, affine::identity(), 0);
    walk.report
}

struct Walk<'a> {
    symbols: &'a SymbolTable,
    atlas: &'a AtlasIndex,
    opts: ResolveOpts,
    /// Symbols entered on the way down to the current element.
    path: Vec<&'a str>,
    /// Symbols already reported as cut by depth or cycle.
    truncated: HashSet<&'a str>,
    exhausted: bool,
    report: ResolveReport,
}

impl<'a> Walk<'a> {
    fn timeline(&mut self, tl: &'a Timeline, frame: FrameIndex, parent: Affine, depth: u32) {
        for layer in &tl.layers {
            let Some(rec) = layer.active_at(frame) else {
                continue;
            };
            for el in &rec.elements {
                if self.exhausted {
                    return;
                }
                match el {
                    Element::Atlas(a) => self.sprite(a, parent),
                    Element::Symbol(s) => self.symbol(s, rec, frame, parent, depth),
                }
            }
        }
    }

    /// Whether one more command or issue fits the frame budget. The first refusal records a
    /// single [`ResolveIssue::BudgetExceeded`].
    fn charge(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        let spent = self.report.commands.len() + self.report.issues.len();
        if spent < self.opts.max_commands {
            return true;
        }
        self.exhausted = true;
        tracing::warn!(limit = self.opts.max_commands, "resolve budget exhausted; rest of frame dropped");
        self.report.issues.push(ResolveIssue::BudgetExceeded {
            limit: self.opts.max_commands,
        });
        false
    }

    fn issue(&mut self, issue: ResolveIssue) {
        if self.charge() {
            self.report.issues.push(issue);
        }
    }

    fn sprite(&mut self, inst: &AtlasInstance, parent: Affine) {
        let atlas = self.atlas;
        let Some(hit) = atlas.resolve(&inst.sprite) else {
            tracing::warn!(sprite = %inst.sprite, "sprite not found in atlas; element skipped");
            self.issue(ResolveIssue::MissingSprite {
                reference: inst.sprite.clone(),
            });
            return;
        };
        if let MatchKind::Fuzzy { distance } = hit.kind {
            self.issue(ResolveIssue::LowConfidenceMatch {
                reference: inst.sprite.clone(),
                key: hit.name.to_string(),
                distance,
            });
        }
        if !self.charge() {
            return;
        }
        let world = affine::compose(parent, inst.transform);
        self.report.commands.push(DrawCommand {
            source_rect: hit.rect,
            transform: affine::compose(world, hit.rect.orientation()),
            source_name: hit.name.to_string(),
        });
    }

    fn symbol(
        &mut self,
        inst: &'a SymbolInstance,
        rec: &FrameRecord,
        frame: FrameIndex,
        parent: Affine,
        depth: u32,
    ) {
        let symbols = self.symbols;
        let Some(def) = symbols.get(&inst.symbol) else {
            tracing::warn!(symbol = %inst.symbol, "symbol not defined; element skipped");
            self.issue(ResolveIssue::MissingSymbol {
                symbol: inst.symbol.clone(),
            });
            return;
        };
        let name = inst.symbol.as_str();
        if self.path.contains(&name) {
            if self.truncated.insert(name) {
                tracing::warn!(symbol = name, "symbol instances itself; recursion cut");
                self.issue(ResolveIssue::Cycle {
                    symbol: inst.symbol.clone(),
                });
            }
            return;
        }
        if depth >= self.opts.max_depth {
            if self.truncated.insert(name) {
                tracing::warn!(symbol = name, depth, "symbol nesting limit reached; branch truncated");
                self.issue(ResolveIssue::DepthLimit {
                    symbol: inst.symbol.clone(),
                    depth,
                });
            }
            return;
        }

        let local = frame.0.saturating_sub(rec.start().0);
        let child = match inst.loop_mode {
            Some(mode) => mode.map(local, inst.first_frame, def.timeline.len_frames()),
            None => local.saturating_add(inst.first_frame),
        };
        self.path.push(name);
        self.timeline(
            &def.timeline,
            FrameIndex(child),
            affine::compose(parent, inst.transform),
            depth + 1,
        );
        self.path.pop();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/resolve/resolver.rs"]
mod tests;
