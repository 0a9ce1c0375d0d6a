//! Cursor tests
//!
//! Position transitions, identity equality and the query-surface properties.

use gumbo_dom::{Cursor, CursorNodeType, Error, ParseSession, Position};
use pretty_assertions::assert_eq;

const NAVIGATION_HTML: &str =
    "<html><body class=\"gumbo\">boo!<span>Pillz here!</span><p id=\"tag123\"></p></body></html>";

fn session() -> ParseSession {
    ParseSession::parse(NAVIGATION_HTML).unwrap()
}

/// Follow a `/a/b/@c` style path from the document
fn select(cursor: &Cursor, path: &str) -> Option<Cursor> {
    let mut cursor = cursor.clone();
    for step in path.split('/').filter(|step| !step.is_empty()) {
        let moved = match step.strip_prefix('@') {
            Some(attribute) => cursor.move_to_attribute(attribute).unwrap(),
            None => cursor.move_to_child(step).unwrap(),
        };
        if !moved {
            return None;
        }
    }
    Some(cursor)
}

// ============================================================================
// QUERY SURFACE
// ============================================================================

#[test]
fn test_select_attribute() {
    let session = session();
    let node = select(&session.cursor(), "/html/body/@class").unwrap();
    assert_eq!(node.node_type(), CursorNodeType::Attribute);
    assert_eq!(node.value().unwrap(), "gumbo");
    assert_eq!(node.name(), "class");
    assert_eq!(node.local_name(), "class");
    assert_eq!(node.prefix(), "");
}

#[test]
fn test_select_element() {
    let session = session();
    let node = select(&session.cursor(), "/html/body/span").unwrap();
    assert_eq!(node.node_type(), CursorNodeType::Element);
    assert_eq!(node.value().unwrap(), "Pillz here!");
    assert_eq!(node.name(), "span");
    assert_eq!(node.local_name(), "span");
}

#[test]
fn test_select_missing_path() {
    let session = session();
    assert!(select(&session.cursor(), "/html/body/table").is_none());
    assert!(select(&session.cursor(), "/html/body/@id").is_none());
}

#[test]
fn test_move_to_id() {
    let session = session();
    let mut cursor = session.cursor();
    assert!(cursor.move_to_id("tag123").unwrap());
    assert_eq!(cursor.name(), "p");
    assert!(cursor.is_empty_element().unwrap());
}

#[test]
fn test_move_to_missing_id_keeps_position() {
    let session = session();
    let mut cursor = session.cursor();
    let before = cursor.clone();
    assert!(!cursor.move_to_id("nope").unwrap());
    assert_eq!(cursor, before);
}

#[test]
fn test_node_types() {
    let session = ParseSession::parse("<!--c--><p>text</p> ").unwrap();
    let mut cursor = session.cursor();
    assert_eq!(cursor.node_type(), CursorNodeType::Root);
    assert_eq!(cursor.value().unwrap(), "");

    assert!(cursor.move_to_first_child().unwrap());
    assert_eq!(cursor.node_type(), CursorNodeType::Comment);
    assert_eq!(cursor.name(), "");

    assert!(cursor.move_to_next().unwrap());
    assert_eq!(cursor.node_type(), CursorNodeType::Element);
    assert!(!cursor.is_empty_element().unwrap());
}

#[test]
fn test_namespaced_attribute_prefix() {
    let session =
        ParseSession::parse("<svg><a xlink:href=\"#target\"></a></svg>").unwrap();
    let node = select(&session.cursor(), "/html/body/svg/a").unwrap();
    let mut attribute = node.clone();
    assert!(attribute.move_to_first_attribute().unwrap());
    assert_eq!(attribute.prefix(), "xlink");
    assert_eq!(attribute.local_name(), "href");
    assert_eq!(attribute.name(), "xlink:href");
    assert_eq!(attribute.value().unwrap(), "#target");
}

// ============================================================================
// TRANSITIONS
// ============================================================================

#[test]
fn test_first_child_parent_round_trip() {
    let session = session();
    let mut cursor = select(&session.cursor(), "/html/body").unwrap();
    let start = cursor.clone();
    assert!(cursor.move_to_first_child().unwrap());
    assert_ne!(cursor, start);
    assert!(cursor.move_to_parent());
    assert_eq!(cursor, start);
}

#[test]
fn test_sibling_boundaries() {
    let session = session();
    let mut cursor = select(&session.cursor(), "/html/body").unwrap();
    assert!(cursor.move_to_first_child().unwrap());
    assert_eq!(cursor.node_type(), CursorNodeType::Text);
    assert!(!cursor.move_to_previous().unwrap());

    assert!(cursor.move_to_next().unwrap());
    assert_eq!(cursor.name(), "span");
    assert!(cursor.move_to_next().unwrap());
    assert_eq!(cursor.name(), "p");
    assert!(!cursor.move_to_next().unwrap());

    assert!(cursor.move_to_previous().unwrap());
    assert_eq!(cursor.name(), "span");
}

#[test]
fn test_document_has_no_parent_or_siblings() {
    let session = session();
    let mut cursor = session.cursor();
    assert!(!cursor.move_to_parent());
    assert!(!cursor.move_to_next().unwrap());
    assert!(!cursor.move_to_previous().unwrap());
    assert!(!cursor.move_to_first_attribute().unwrap());
}

#[test]
fn test_attribute_walk() {
    let session = ParseSession::parse("<div a=1 b=2 c=3></div>").unwrap();
    let mut cursor = select(&session.cursor(), "/html/body/div").unwrap();
    assert!(!cursor.move_to_next_attribute().unwrap());

    assert!(cursor.move_to_first_attribute().unwrap());
    let mut names = vec![cursor.name()];
    while cursor.move_to_next_attribute().unwrap() {
        names.push(cursor.name());
    }
    assert_eq!(names, vec!["a", "b", "c"]);

    // attributes have no children, siblings or attributes of their own
    assert!(!cursor.move_to_first_child().unwrap());
    assert!(!cursor.move_to_next().unwrap());
    assert!(!cursor.move_to_first_attribute().unwrap());
    assert!(!cursor.move_to_parent());
    assert!(!cursor.is_empty_element().unwrap());
}

#[test]
fn test_clone_copies_position_only() {
    let session = session();
    let original = select(&session.cursor(), "/html/body").unwrap();
    let mut copy = original.clone();
    assert_eq!(copy, original);

    assert!(copy.move_to_first_child().unwrap());
    assert_ne!(copy, original);
    assert_eq!(original.name(), "body");
}

#[test]
fn test_equality_is_by_identity() {
    let first = ParseSession::parse(NAVIGATION_HTML).unwrap();
    let second = ParseSession::parse(NAVIGATION_HTML).unwrap();
    let a = select(&first.cursor(), "/html/body").unwrap();
    let b = select(&second.cursor(), "/html/body").unwrap();
    assert_eq!(a.name(), b.name());
    assert_ne!(a, b);
}

#[test]
fn test_move_to_requires_same_session() {
    let first = ParseSession::parse(NAVIGATION_HTML).unwrap();
    let second = ParseSession::parse(NAVIGATION_HTML).unwrap();
    let target = select(&first.cursor(), "/html/body/span").unwrap();

    let mut same = first.cursor();
    assert!(same.move_to(&target));
    assert!(same.is_same_position(&target));

    let mut other = second.cursor();
    assert!(!other.move_to(&target));
    assert!(matches!(other.position(), Position::Node(_)));
    assert_eq!(other.node_type(), CursorNodeType::Root);
}

// ============================================================================
// RELEASE
// ============================================================================

#[test]
fn test_moves_after_release() {
    let session = ParseSession::parse(NAVIGATION_HTML).unwrap();
    let mut cursor = select(&session.cursor(), "/html/body").unwrap();
    session.release();

    // body's children were never decoded
    assert_eq!(
        cursor.move_to_first_child(),
        Err(Error::Disposed { object: "Element" })
    );
    // html's children were, so moving among them still works
    assert!(cursor.move_to_previous().unwrap());
    assert_eq!(cursor.name(), "head");
    assert!(cursor.move_to_parent());
    assert_eq!(cursor.name(), "html");
}

#[test]
fn test_cursor_does_not_keep_session_alive() {
    let session = session();
    session.materialize_all().unwrap();
    let mut cursor = select(&session.cursor(), "/html/body/span").unwrap();
    assert!(cursor.session().is_some());
    drop(session);

    assert!(cursor.session().is_none());
    assert_eq!(
        cursor.move_to_id("tag123"),
        Err(Error::Disposed {
            object: "ParseSession"
        })
    );
    assert_eq!(cursor.name(), "span");

    // the decoded tree stays navigable
    assert!(cursor.move_to_next().unwrap());
    assert_eq!(cursor.name(), "p");
    assert!(cursor.move_to_first_attribute().unwrap());
    assert_eq!(cursor.value().unwrap(), "tag123");
    assert!(!cursor.move_to_parent());
}
