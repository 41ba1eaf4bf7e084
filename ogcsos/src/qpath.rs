//! Prefixed element paths (`sos:contents/sos:Contents`) rewritten into
//! namespace-qualified form, and the element-tree searches that use them.

use std::fmt;

use xmltree::{Element, XMLNode};

use crate::namespaces::NamespaceTable;

/// One step of a qualified path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `{uri}local`
    Qualified { namespace: String, local: String },
    /// Kept as written: no prefix, or a prefix unknown to the table.
    Literal(String),
}

impl Segment {
    fn matches(&self, element: &Element) -> bool {
        match self {
            Segment::Qualified { namespace, local } => {
                element.namespace.as_deref() == Some(namespace.as_str()) && element.name == *local
            }
            Segment::Literal(tag) => element.namespace.is_none() && element.name == *tag,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Qualified { namespace, local } => write!(f, "{{{namespace}}}{local}"),
            Segment::Literal(tag) => f.write_str(tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedPath {
    segments: Vec<Segment>,
}

impl QualifiedPath {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl fmt::Display for QualifiedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Rewrites each `prefix:local` segment whose prefix is bound in `table`.
///
/// Never fails: unresolved segments stay literal and simply match nothing.
pub fn qualify(path: &str, table: &NamespaceTable) -> QualifiedPath {
    let segments = path
        .split('/')
        .map(|tag| {
            let parts: Vec<&str> = tag.split(':').collect();
            match parts.as_slice() {
                [prefix, local] => match table.uri(prefix) {
                    Some(uri) => Segment::Qualified {
                        namespace: uri.to_string(),
                        local: (*local).to_string(),
                    },
                    None => Segment::Literal(tag.to_string()),
                },
                _ => Segment::Literal(tag.to_string()),
            }
        })
        .collect();
    QualifiedPath { segments }
}

/// All elements reached from `root`'s children by following `path`.
pub fn find_all<'a>(root: &'a Element, path: &QualifiedPath) -> Vec<&'a Element> {
    let mut current = vec![root];
    for segment in &path.segments {
        current = current
            .into_iter()
            .flat_map(|parent| child_elements(parent).filter(|e| segment.matches(e)))
            .collect();
        if current.is_empty() {
            break;
        }
    }
    current
}

pub fn find<'a>(root: &'a Element, path: &QualifiedPath) -> Option<&'a Element> {
    find_all(root, path).into_iter().next()
}

/// Shorthand for `find(root, &qualify(path, table))`.
pub fn find_in<'a>(root: &'a Element, path: &str, table: &NamespaceTable) -> Option<&'a Element> {
    find(root, &qualify(path, table))
}

pub fn find_all_in<'a>(root: &'a Element, path: &str, table: &NamespaceTable) -> Vec<&'a Element> {
    find_all(root, &qualify(path, table))
}

pub(crate) fn child_elements(parent: &Element) -> impl Iterator<Item = &Element> {
    parent.children.iter().filter_map(|node| match node {
        XMLNode::Element(elem) => Some(elem),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::{OWS, SOS, default_namespaces};

    #[test]
    fn qualify_known_prefixes() {
        let table = default_namespaces();
        let path = qualify("sos:contents/sos:Contents/swes:offering", &table);
        assert_eq!(
            path.to_string(),
            "{http://www.opengis.net/sos/2.0}contents/{http://www.opengis.net/sos/2.0}Contents/{http://www.opengis.net/swes/2.0}offering"
        );
        assert!(
            path.segments()
                .iter()
                .all(|s| matches!(s, Segment::Qualified { .. }))
        );
    }

    #[test]
    fn qualify_leaves_unknown_and_bare_segments() {
        let table = NamespaceTable::new().with_binding("ows", OWS);
        let path = qualify("ows:Operation/foo:bar/plain/a:b:c", &table);
        assert_eq!(
            path.segments(),
            &[
                Segment::Qualified {
                    namespace: OWS.to_string(),
                    local: "Operation".to_string()
                },
                Segment::Literal("foo:bar".to_string()),
                Segment::Literal("plain".to_string()),
                Segment::Literal("a:b:c".to_string()),
            ]
        );
    }

    #[test]
    fn find_follows_namespaces_not_prefixes() {
        let xml = r#"<x:Root xmlns:x="http://www.opengis.net/sos/2.0">
  <x:contents><x:Contents><x:item>1</x:item><x:item>2</x:item></x:Contents></x:contents>
  <plain>3</plain>
</x:Root>"#;
        let root = Element::parse(xml.as_bytes()).unwrap();
        let table = NamespaceTable::new().with_binding("sos", SOS);

        let items = find_all_in(&root, "sos:contents/sos:Contents/sos:item", &table);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].get_text().unwrap(), "2");

        assert!(find_in(&root, "plain", &table).is_some());
        assert!(find_in(&root, "x:contents", &table).is_none());
        assert!(find_in(&root, "sos:missing/sos:item", &table).is_none());
    }
}
