use crate::dom::{Document, LINE_WRAPPER_ATTR, NodeId};

const LINE_CONTAINERS: &[&str] = &["p", "li", "dd", "dt", "td", "th"];
const DOCUMENT_LEVEL: &[&str] = &["body", "html"];
const LINE_WRAPPER_KIND: &str = "person_name";

/// Picks the element that should represent a person-name match: the run of
/// siblings between `<br>` separators inside the nearest line container,
/// wrapped in a new line span unless it already is exactly one. Falls back to
/// the span's parent when there is no line container.
pub fn choose_line_wrapper(doc: &mut Document, span: NodeId) -> NodeId {
    let fallback = doc.parent(span).unwrap_or(span);
    let Some(container) = line_container(doc, span) else {
        return fallback;
    };
    let Some(top) = std::iter::once(span)
        .chain(doc.ancestors(span))
        .find(|&node| doc.parent(node) == Some(container))
    else {
        return fallback;
    };

    let children = doc.children(container).to_vec();
    let Some(index) = children.iter().position(|&child| child == top) else {
        return fallback;
    };
    let start = children[..index]
        .iter()
        .rposition(|&child| doc.is_element(child, "br"))
        .map_or(0, |br| br + 1);
    let end = children[index..]
        .iter()
        .position(|&child| doc.is_element(child, "br"))
        .map_or(children.len(), |br| index + br);

    if end - start == 1 && doc.attr(children[start], LINE_WRAPPER_ATTR).is_some() {
        return children[start];
    }

    doc.wrap_run(
        container,
        start..end,
        "span",
        [(LINE_WRAPPER_ATTR.to_string(), LINE_WRAPPER_KIND.to_string())],
    )
    .unwrap_or(fallback)
}

fn line_container(doc: &Document, span: NodeId) -> Option<NodeId> {
    for ancestor in doc.ancestors(span) {
        let tag = doc.tag_name(ancestor)?;
        if LINE_CONTAINERS.contains(&tag) {
            return Some(ancestor);
        }
        if DOCUMENT_LEVEL.contains(&tag) {
            return None;
        }
    }
    None
}
