use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    anim::{model::Timeline, parse::parse_timeline},
    foundation::json,
};

const DICTIONARY: &[&str] = &["SYMBOL_DICTIONARY", "SD"];
const SYMBOLS: &[&str] = &["Symbols", "S"];
const SYMBOL_NAME: &[&str] = &["SYMBOL_name", "SN", "name"];

/// A reusable animated element with its own timeline.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SymbolDefinition {
    pub name: String,
    pub timeline: Timeline,
}

/// Where the symbol definitions were found in the animation descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum SymbolSource {
    /// Array of records, each carrying its own name.
    RecordList,
    /// Object keyed by symbol name.
    KeyedMap,
    /// Symbol-like objects found anywhere in the document.
    RecursiveScan,
    /// Nothing symbol-like in the document.
    Absent,
}

impl SymbolSource {
    const PRIORITY: [SymbolSource; 3] = [
        SymbolSource::RecordList,
        SymbolSource::KeyedMap,
        SymbolSource::RecursiveScan,
    ];

    fn parse(self, desc: &Value) -> Vec<SymbolDefinition> {
        match self {
            SymbolSource::RecordList => match dictionary(desc) {
                Some(Value::Array(list)) => list.iter().filter_map(symbol_record).collect(),
                _ => Vec::new(),
            },
            SymbolSource::KeyedMap => match dictionary(desc) {
                Some(Value::Object(map)) => map
                    .iter()
                    .filter_map(|(name, v)| {
                        Some(SymbolDefinition {
                            name: name.clone(),
                            timeline: parse_timeline(v)?,
                        })
                    })
                    .collect(),
                _ => Vec::new(),
            },
            SymbolSource::RecursiveScan => {
                let mut out = Vec::new();
                scan_symbols(desc, &mut out);
                out
            }
            SymbolSource::Absent => Vec::new(),
        }
    }
}

/// Symbol name -> definition lookup. Holds no per-frame state.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    symbols: BTreeMap<String, SymbolDefinition>,
    source: Option<SymbolSource>,
}

impl SymbolTable {
    pub fn get(&self, name: &str) -> Option<&SymbolDefinition> {
        self.symbols.get(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbol names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.symbols.keys().map(String::as_str)
    }

    pub fn source(&self) -> SymbolSource {
        self.source.unwrap_or(SymbolSource::Absent)
    }

    /// Insert or replace a definition.
    pub fn insert(&mut self, def: SymbolDefinition) {
        self.symbols.insert(def.name.clone(), def);
    }
}

/// Index every symbol definition in an animation descriptor.
///
/// Never fails: a descriptor without symbols yields an empty table.
pub fn build_symbol_table(desc: &Value) -> SymbolTable {
    for source in SymbolSource::PRIORITY {
        let defs = source.parse(desc);
        if defs.is_empty() {
            continue;
        }
        tracing::debug!(?source, symbols = defs.len(), "parsed symbol dictionary");
        let mut table = SymbolTable {
            symbols: BTreeMap::new(),
            source: Some(source),
        };
        // Later definitions with the same name win.
        for def in defs {
            table.insert(def);
        }
        return table;
    }
    SymbolTable::default()
}

fn dictionary(desc: &Value) -> Option<&Value> {
    json::field(desc, DICTIONARY)
        .and_then(|d| json::field(d, SYMBOLS))
        .or_else(|| json::field(desc, &["SYMBOLS", "symbols"]))
}

fn symbol_record(v: &Value) -> Option<SymbolDefinition> {
    let name = json::text(v, SYMBOL_NAME)?;
    Some(SymbolDefinition {
        name,
        timeline: parse_timeline(v)?,
    })
}

fn scan_symbols(v: &Value, out: &mut Vec<SymbolDefinition>) {
    match v {
        Value::Object(map) => {
            let tagged = json::field(v, &["SYMBOL_name", "SN"]).is_some()
                && json::field(v, &["TIMELINE", "TL"]).is_some();
            if tagged && let Some(def) = symbol_record(v) {
                out.push(def);
            }
            for child in map.values() {
                scan_symbols(child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                scan_symbols(child, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "../../tests/unit/anim/symbols.rs"]
mod tests;
