//! Layer definitions and the caption metadata index built from them.
//!
//! ```text
//! LayersDocument
//!   ├── wmslayers:    Vec<LayerRecord>   (indexed, may carry sublayer captions)
//!   ├── wfslayers:    Vec<LayerRecord>
//!   ├── vectorlayers: Vec<LayerRecord>
//!   └── wfstlayers:   Vec<LayerRecord>
//! ```

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

use crate::common::display_string;

/// Identifier of a configured layer.
///
/// Ids are JSON scalars; the kind is part of the identity so the string `"7"`
/// and the number `7` never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayerId {
    kind: IdKind,
    text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum IdKind {
    String,
    Number,
    Bool,
    Null,
}

impl LayerId {
    /// Returns `None` for arrays and objects, which never identify a layer.
    pub fn from_value(value: &Value) -> Option<Self> {
        let kind = match value {
            Value::String(_) => IdKind::String,
            Value::Number(_) => IdKind::Number,
            Value::Bool(_) => IdKind::Bool,
            Value::Null => IdKind::Null,
            Value::Array(_) | Value::Object(_) => return None,
        };
        Some(LayerId {
            kind,
            text: display_string(value),
        })
    }
}

impl From<&str> for LayerId {
    fn from(s: &str) -> Self {
        LayerId {
            kind: IdKind::String,
            text: s.to_string(),
        }
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Caption metadata resolved for one layer id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerMeta {
    /// The record's caption verbatim; `None` when the record has no caption key.
    pub caption: Option<Value>,
    pub sublayer_captions: Option<Vec<String>>,
}

pub type LayerMetaMap = IndexMap<LayerId, LayerMeta>;

/// Read-only view of one configured layer.
#[derive(Debug, Clone, Copy)]
pub struct LayerRecord<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> LayerRecord<'a> {
    /// Accepts only objects that carry an `id` key.
    pub fn from_value(value: &'a Value) -> Option<Self> {
        let fields = value.as_object()?;
        fields.contains_key("id").then_some(LayerRecord { fields })
    }

    pub fn id(&self) -> Option<LayerId> {
        self.fields.get("id").and_then(LayerId::from_value)
    }

    pub fn caption(&self) -> Option<&'a Value> {
        self.fields.get("caption")
    }

    /// Sub-identifiers of a composite layer.
    pub fn sub_ids(&self) -> Option<&'a Vec<Value>> {
        self.fields.get("layers").and_then(Value::as_array)
    }

    pub fn layers_info(&self) -> Option<&'a Vec<Value>> {
        self.fields.get("layersInfo").and_then(Value::as_array)
    }

    /// Captions of the sub-layers, in declared order.
    ///
    /// Only composite layers (two or more sub-identifiers) with an info table
    /// produce a list. Sub-layers without a non-blank caption are dropped.
    pub fn sublayer_captions(&self) -> Option<Vec<String>> {
        let sub_ids = self.sub_ids()?;
        if sub_ids.len() < 2 {
            return None;
        }
        let layers_info = self.layers_info()?;

        let mut info_by_id: IndexMap<LayerId, &Map<String, Value>> = IndexMap::new();
        for info in layers_info {
            let Some(info) = info.as_object() else {
                continue;
            };
            if let Some(id) = info.get("id").and_then(LayerId::from_value) {
                info_by_id.insert(id, info);
            }
        }

        let captions: Vec<String> = sub_ids
            .iter()
            .filter_map(LayerId::from_value)
            .filter_map(|sub_id| info_by_id.get(&sub_id))
            .filter_map(|info| info.get("caption").and_then(Value::as_str))
            .filter(|caption| !caption.trim().is_empty())
            .map(str::to_string)
            .collect();

        (!captions.is_empty()).then_some(captions)
    }
}

/// The four layer categories of a layers definition file.
#[derive(Debug, Clone, Default)]
pub struct LayersDocument {
    pub wmslayers: Vec<Value>,
    pub wfslayers: Vec<Value>,
    pub vectorlayers: Vec<Value>,
    pub wfstlayers: Vec<Value>,
}

impl LayersDocument {
    /// Missing categories are empty; a category that is present but not an
    /// array is logged and treated as empty.
    pub fn from_value(document: &Value) -> Self {
        let category = |key: &str| -> Vec<Value> {
            match document.get(key) {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(records)) => records.clone(),
                Some(_) => {
                    warn!("Ignoring '{}': expected an array of layers", key);
                    Vec::new()
                }
            }
        };

        LayersDocument {
            wmslayers: category("wmslayers"),
            wfslayers: category("wfslayers"),
            vectorlayers: category("vectorlayers"),
            wfstlayers: category("wfstlayers"),
        }
    }

    fn secondary_records(&self) -> impl Iterator<Item = LayerRecord<'_>> {
        self.wfslayers
            .iter()
            .chain(&self.vectorlayers)
            .chain(&self.wfstlayers)
            .filter_map(LayerRecord::from_value)
    }
}

/// Builds the id -> caption metadata index.
///
/// WFS, vector and WFS-T layers are only indexed from inside the WMS loop, so
/// without WMS layers the index is empty. A WMS entry always overwrites a
/// secondary entry with the same id.
pub fn build_layer_meta_map(document: &LayersDocument) -> LayerMetaMap {
    let mut map = LayerMetaMap::new();

    for wms in document.wmslayers.iter().filter_map(LayerRecord::from_value) {
        let meta = LayerMeta {
            caption: wms.caption().cloned(),
            sublayer_captions: wms.sublayer_captions(),
        };

        for record in document.secondary_records() {
            if let Some(id) = record.id() {
                map.insert(
                    id,
                    LayerMeta {
                        caption: record.caption().cloned(),
                        sublayer_captions: None,
                    },
                );
            }
        }

        if let Some(id) = wms.id() {
            map.insert(id, meta);
        }
    }

    debug!("Indexed caption metadata for {} layers", map.len());
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: Value) -> LayersDocument {
        LayersDocument::from_value(&value)
    }

    #[test]
    fn test_blank_sublayer_captions_are_dropped() {
        let doc = document(json!({
            "wmslayers": [{
                "id": "base",
                "caption": "Base",
                "layers": ["a", "b"],
                "layersInfo": [
                    {"id": "a", "caption": ""},
                    {"id": "b", "caption": "Roads"}
                ]
            }]
        }));
        let map = build_layer_meta_map(&doc);
        let meta = map.get(&LayerId::from("base")).expect("indexed");
        assert_eq!(meta.caption, Some(json!("Base")));
        assert_eq!(meta.sublayer_captions, Some(vec!["Roads".to_string()]));
    }

    #[test]
    fn test_single_sublayer_never_produces_captions() {
        let doc = document(json!({
            "wmslayers": [{
                "id": "base",
                "layers": ["a"],
                "layersInfo": [{"id": "a", "caption": "Roads"}]
            }]
        }));
        let map = build_layer_meta_map(&doc);
        let meta = map.get(&LayerId::from("base")).expect("indexed");
        assert_eq!(meta.caption, None);
        assert_eq!(meta.sublayer_captions, None);
    }

    #[test]
    fn test_all_blank_sublayers_produce_no_list() {
        let doc = document(json!({
            "wmslayers": [{
                "id": "base",
                "layers": ["a", "b", "c"],
                "layersInfo": [
                    {"id": "a", "caption": "   "},
                    {"id": "b"},
                    {"id": "c", "caption": 5}
                ]
            }]
        }));
        let map = build_layer_meta_map(&doc);
        assert_eq!(map[&LayerId::from("base")].sublayer_captions, None);
    }

    #[test]
    fn test_sublayer_captions_follow_declared_order_and_last_info_wins() {
        let doc = document(json!({
            "wmslayers": [{
                "id": "base",
                "layers": ["b", "missing", "a"],
                "layersInfo": [
                    {"id": "a", "caption": "First A"},
                    {"id": "b", "caption": " Bees "},
                    {"id": "a", "caption": "Second A"}
                ]
            }]
        }));
        let map = build_layer_meta_map(&doc);
        assert_eq!(
            map[&LayerId::from("base")].sublayer_captions,
            Some(vec![" Bees ".to_string(), "Second A".to_string()])
        );
    }

    #[test]
    fn test_no_wms_layers_yields_empty_map() {
        let doc = document(json!({
            "wfslayers": [{"id": "w", "caption": "WFS"}],
            "vectorlayers": [{"id": "v", "caption": "Vector"}]
        }));
        assert!(build_layer_meta_map(&doc).is_empty());
    }

    #[test]
    fn test_secondary_layers_indexed_and_overwritten_by_wms() {
        let doc = document(json!({
            "wmslayers": [{"id": "shared", "caption": "From WMS"}],
            "wfslayers": [{"id": "shared", "caption": "From WFS"}, {"id": "w"}],
            "vectorlayers": [{"id": "v", "caption": "Vector"}],
            "wfstlayers": [{"caption": "no id"}, "not a record"]
        }));
        let map = build_layer_meta_map(&doc);
        assert_eq!(map.len(), 3);
        assert_eq!(map[&LayerId::from("shared")].caption, Some(json!("From WMS")));
        assert_eq!(map[&LayerId::from("w")].caption, None);
        assert_eq!(map[&LayerId::from("v")].caption, Some(json!("Vector")));
    }

    #[test]
    fn test_invalid_wms_records_are_skipped() {
        let doc = document(json!({
            "wmslayers": [null, 3, {"caption": "no id"}, {"id": "ok", "caption": "Ok"}]
        }));
        let map = build_layer_meta_map(&doc);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&LayerId::from("ok")));
    }

    #[test]
    fn test_id_kind_is_part_of_identity() {
        assert_ne!(
            LayerId::from_value(&json!("7")),
            LayerId::from_value(&json!(7))
        );
        assert_eq!(
            LayerId::from_value(&json!(7)),
            LayerId::from_value(&json!(7.0))
        );
        assert_eq!(LayerId::from_value(&json!({"a": 1})), None);
    }

    #[test]
    fn test_non_array_category_is_empty() {
        let doc = document(json!({"wmslayers": {"id": "x"}, "wfslayers": null}));
        assert!(doc.wmslayers.is_empty());
        assert!(doc.wfslayers.is_empty());
    }
}
