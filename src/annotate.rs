use serde_json::{Map, Value};
use tracing::trace;

use crate::common::is_truthy;
use crate::layers::{LayerId, LayerMeta, LayerMetaMap};

pub const CAPTION_KEY: &str = "caption";
pub const LAYERS_KEY: &str = "layers";
pub const GROUPS_KEY: &str = "groups";
pub const INFOBOX_KEY: &str = "infobox";

/// Annotates every root group in order.
pub fn annotate_groups(groups: &mut [Value], index: &LayerMetaMap) {
    for group in groups.iter_mut() {
        annotate_group(group, index);
    }
}

/// Walks a group depth-first and rewrites every leaf layer whose id is in
/// the index. Leaves without a usable id and non-object entries are left
/// untouched.
pub fn annotate_group(group: &mut Value, index: &LayerMetaMap) {
    let Some(group) = group.as_object_mut() else {
        return;
    };

    if let Some(Value::Array(layers)) = group.get_mut(LAYERS_KEY) {
        for layer in layers.iter_mut() {
            let Value::Object(entry) = layer else {
                continue;
            };
            let Some(meta) = entry
                .get("id")
                .filter(|id| is_truthy(id))
                .and_then(LayerId::from_value)
                .and_then(|id| index.get(&id))
            else {
                continue;
            };
            annotate_entry(entry, meta);
        }
    }

    if let Some(Value::Array(children)) = group.get_mut(GROUPS_KEY) {
        annotate_groups(children, index);
    }
}

/// Rewrites a leaf's attributes in place.
///
/// The leaf's own caption is discarded. The resolved caption, followed by the
/// sublayer caption list, is spliced in directly after `infobox`, or appended
/// when the leaf has no `infobox`. An existing `layers` key keeps its position
/// but takes the sublayer caption list as its value. The map itself is reused,
/// so references to the entry see the new attributes.
pub fn annotate_entry(entry: &mut Map<String, Value>, meta: &LayerMeta) {
    let caption = meta.caption.clone();
    let sublayers = meta
        .sublayer_captions
        .as_ref()
        .map(|captions| Value::Array(captions.iter().cloned().map(Value::String).collect()));
    let has_infobox = entry.contains_key(INFOBOX_KEY);

    let original = std::mem::take(entry);
    for (key, value) in original {
        if key == CAPTION_KEY {
            continue;
        }
        let is_anchor = key == INFOBOX_KEY;
        let value = match (&sublayers, key.as_str()) {
            (Some(list), LAYERS_KEY) => list.clone(),
            _ => value,
        };
        entry.insert(key, value);
        if is_anchor {
            place_caption(entry, &caption, &sublayers);
        }
    }

    if !has_infobox {
        place_caption(entry, &caption, &sublayers);
    }

    trace!("Annotated layer entry: {:?}", entry.keys().collect::<Vec<_>>());
}

fn place_caption(entry: &mut Map<String, Value>, caption: &Option<Value>, sublayers: &Option<Value>) {
    if let Some(caption) = caption {
        entry.insert(CAPTION_KEY.to_string(), caption.clone());
    }
    if let Some(sublayers) = sublayers {
        entry.insert(LAYERS_KEY.to_string(), sublayers.clone());
    }
}
