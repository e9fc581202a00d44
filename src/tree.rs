//! Directory-style text rendering of an annotated group tree.
//!
//! ```text
//! ├── Base maps/
//! │   ├── Orthophoto
//! │   └── Topography
//! │       ├── Roads
//! │       └── Rivers
//! └── Overlays/
//!     └── Parcels
//! ```

use serde_json::Value;

use crate::annotate::{CAPTION_KEY, GROUPS_KEY, LAYERS_KEY};
use crate::common::display_string;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const OPEN_INDENT: &str = "│   ";
const CLOSED_INDENT: &str = "    ";

const UNNAMED_GROUP: &str = "(unnamed group)";
const UNNAMED_LAYER: &str = "(unnamed layer)";

/// Renders the root groups into one line per group, layer and sublayer.
pub fn build_tree_lines(groups: &[Value]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        push_group(&mut lines, group, "", i == groups.len() - 1);
    }
    lines
}

/// The tree listing as written to disk: lines joined by `\n`.
pub fn render_tree(groups: &[Value]) -> String {
    build_tree_lines(groups).join("\n")
}

fn connector(is_last: bool) -> &'static str {
    if is_last {
        LAST_BRANCH
    } else {
        BRANCH
    }
}

fn indent(is_last: bool) -> &'static str {
    if is_last {
        CLOSED_INDENT
    } else {
        OPEN_INDENT
    }
}

fn non_empty_array<'a>(value: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    value
        .get(key)
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
}

pub fn group_name(group: &Value) -> String {
    if let Some(name) = group.get("name").and_then(Value::as_str) {
        return name.to_string();
    }
    match group.get("id") {
        None | Some(Value::Null) => UNNAMED_GROUP.to_string(),
        Some(id) => display_string(id),
    }
}

pub fn layer_caption(layer: &Value) -> String {
    if let Some(caption) = layer
        .get(CAPTION_KEY)
        .and_then(Value::as_str)
        .filter(|caption| !caption.is_empty())
    {
        return caption.to_string();
    }
    match layer.get("id") {
        None | Some(Value::Null) => UNNAMED_LAYER.to_string(),
        Some(id) => display_string(id),
    }
}

fn push_group(lines: &mut Vec<String>, group: &Value, prefix: &str, is_last: bool) {
    lines.push(format!("{}{}{}/", prefix, connector(is_last), group_name(group)));

    let child_prefix = format!("{}{}", prefix, indent(is_last));
    let children = non_empty_array(group, GROUPS_KEY);

    if let Some(layers) = group.get(LAYERS_KEY).and_then(Value::as_array) {
        for (i, layer) in layers.iter().enumerate() {
            let is_last_layer = i == layers.len() - 1 && children.is_none();
            push_layer(lines, layer, &child_prefix, is_last_layer);
        }
    }

    if let Some(children) = children {
        for (i, child) in children.iter().enumerate() {
            push_group(lines, child, &child_prefix, i == children.len() - 1);
        }
    }
}

fn push_layer(lines: &mut Vec<String>, layer: &Value, prefix: &str, is_last: bool) {
    let caption = layer_caption(layer);
    lines.push(format!("{}{}{}", prefix, connector(is_last), caption));

    let Some(sublayers) = non_empty_array(layer, LAYERS_KEY) else {
        return;
    };

    // Blank entries and repeats of the layer's own caption are not listed.
    let sublayers: Vec<String> = sublayers
        .iter()
        .map(display_string)
        .filter(|sub| {
            let trimmed = sub.trim();
            !trimmed.is_empty() && trimmed != caption
        })
        .collect();

    let sub_prefix = format!("{}{}", prefix, indent(is_last));
    for (i, sub) in sublayers.iter().enumerate() {
        lines.push(format!(
            "{}{}{}",
            sub_prefix,
            connector(i == sublayers.len() - 1),
            sub
        ));
    }
}
