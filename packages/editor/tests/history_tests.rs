//! End-to-end scenarios for the undo/redo engine
//!
//! This covers:
//! - Gesture grouping and coalescing through the session API
//! - History truncation and linear-history semantics
//! - Transaction atomicity and rollback
//! - Before-undo/redo notifications and vetoes
//! - Selection re-anchoring across deletes and replays

use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use surveyforge_editor::{EditorSession, ModifiedKind, NodeKind, SessionState, SurveyDocument};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

struct Fixture {
    session: EditorSession,
    page1: String,
    page2: String,
    q1: String,
    q2: String,
}

/// Two pages; q1 (with choices) and q2 (visible when q1 = 1) on page one
fn fixture() -> Fixture {
    init_tracing();

    let mut doc = SurveyDocument::new("Customer Feedback");
    let root = doc.root_id().to_string();

    let page1 = doc.new_node(NodeKind::Page, "page1");
    let page1_id = page1.id.clone();
    doc.attach(&root, 0, page1).unwrap();

    let page2 = doc.new_node(NodeKind::Page, "page2");
    let page2_id = page2.id.clone();
    doc.attach(&root, 1, page2).unwrap();

    let q1 = doc
        .new_node(NodeKind::Question, "q1")
        .with_property("choices", json!(["yes", "no"]));
    let q1_id = q1.id.clone();
    doc.attach(&page1_id, 0, q1).unwrap();

    let q2 = doc
        .new_node(NodeKind::Question, "q2")
        .with_property("visibleIf", json!("{q1} = 1"));
    let q2_id = q2.id.clone();
    doc.attach(&page1_id, 1, q2).unwrap();

    Fixture {
        session: EditorSession::new(doc),
        page1: page1_id,
        page2: page2_id,
        q1: q1_id,
        q2: q2_id,
    }
}

#[test]
fn test_fifty_rapid_writes_undo_as_one_step() {
    let mut f = fixture();

    f.session.begin_transaction(Some("Resize"));
    for width in 1..=50 {
        f.session
            .set_property(&f.q1, "width", json!(width))
            .unwrap();
    }
    f.session.stop_transaction();

    assert_eq!(
        f.session.document().find(&f.q1).unwrap().property("width"),
        Some(&json!(50))
    );

    // One transaction, one undo step, back to "never set"
    assert!(f.session.undo().unwrap());
    assert_eq!(
        f.session.document().find(&f.q1).unwrap().property("width"),
        None
    );
    assert!(!f.session.can_undo());

    assert!(f.session.redo().unwrap());
    assert_eq!(
        f.session.document().find(&f.q1).unwrap().property("width"),
        Some(&json!(50))
    );
}

#[test]
fn test_drag_across_pages_is_one_transaction_preserving_identity() {
    let mut f = fixture();
    f.session.select(Some(&f.q1));

    // The drag layer detaches from the source page and re-attaches on the
    // target page, each via its own instrumented call, inside one gesture
    let snapshot = f.session.document().find(&f.q1).unwrap().clone();
    f.session.begin_transaction(Some("Drag question"));
    f.session.remove_element(&f.q1).unwrap();
    f.session.add_element(&f.page2, 0, snapshot).unwrap();
    f.session.stop_transaction();

    assert_eq!(
        f.session.document().position_of(&f.q1),
        Some((f.page2.clone(), 0))
    );
    // The node kept its identity through the reparent, so focus survived
    assert_eq!(f.session.selected_id(), Some(f.q1.as_str()));
    assert_eq!(f.session.undo_name(), Some("Drag question"));

    // One undo step puts it back on the source page
    assert!(f.session.undo().unwrap());
    assert_eq!(
        f.session.document().position_of(&f.q1),
        Some((f.page1.clone(), 0))
    );
    assert!(!f.session.can_undo());
    assert!(f.session.can_redo());
}

#[test]
fn test_new_edit_truncates_redo_history() {
    let mut f = fixture();

    f.session.set_property(&f.q1, "title", json!("v1")).unwrap();
    f.session.set_property(&f.q1, "title", json!("v2")).unwrap();
    f.session.set_property(&f.q1, "title", json!("v3")).unwrap();

    f.session.undo().unwrap();
    f.session.undo().unwrap();
    assert!(f.session.can_redo());

    f.session
        .set_property(&f.q1, "title", json!("branch"))
        .unwrap();
    assert!(!f.session.can_redo());

    // The undone tail is gone for good
    assert!(f.session.undo().unwrap());
    assert_eq!(
        f.session.document().find(&f.q1).unwrap().property("title"),
        Some(&json!("v1"))
    );
}

#[test]
fn test_multi_element_transaction_reverts_atomically() {
    let mut f = fixture();

    f.session.begin_transaction(Some("Batch edit"));
    f.session
        .set_property(&f.q1, "isRequired", json!(true))
        .unwrap();
    f.session
        .set_property(&f.q2, "isRequired", json!(true))
        .unwrap();
    f.session.stop_transaction();

    assert!(f.session.undo().unwrap());
    let doc = f.session.document();
    assert_eq!(doc.find(&f.q1).unwrap().property("isRequired"), None);
    assert_eq!(doc.find(&f.q2).unwrap().property("isRequired"), None);
}

#[test]
fn test_empty_transaction_appends_nothing() {
    let mut f = fixture();

    f.session.begin_transaction(Some("Hover"));
    f.session.stop_transaction();

    assert!(!f.session.can_undo());
    assert_eq!(f.session.state(), SessionState::Saved);
}

#[test]
fn test_unbalanced_stop_does_not_corrupt_grouping() {
    let mut f = fixture();

    // Stray stop with nothing open: warned no-op
    f.session.stop_transaction();

    f.session.begin_transaction(Some("Real gesture"));
    f.session.set_property(&f.q1, "title", json!("t")).unwrap();
    f.session.stop_transaction();

    assert!(f.session.can_undo());
    assert_eq!(f.session.undo_name(), Some("Real gesture"));
}

#[test]
fn test_rollback_abandons_the_gesture() {
    let mut f = fixture();
    let pristine = f.session.document().root().clone();

    f.session.begin_transaction(Some("Cancelled drag"));
    f.session.set_property(&f.q1, "title", json!("mid")).unwrap();
    f.session.remove_element(&f.q2).unwrap();
    f.session.rollback_transaction();

    assert_eq!(f.session.document().root(), &pristine);
    assert!(!f.session.can_undo());
}

#[test]
fn test_undo_redo_report_unavailable_as_false() {
    let mut f = fixture();

    assert!(!f.session.undo().unwrap());
    assert!(!f.session.redo().unwrap());

    f.session.set_property(&f.q1, "title", json!("x")).unwrap();
    assert!(f.session.undo().unwrap());
    assert!(!f.session.undo().unwrap());
}

#[test]
fn test_before_undo_veto_blocks_replay() {
    let mut f = fixture();
    f.session.set_property(&f.q1, "title", json!("kept")).unwrap();

    f.session.events().before_undo.subscribe(|_| false);

    assert!(!f.session.undo().unwrap());
    assert_eq!(
        f.session.document().find(&f.q1).unwrap().property("title"),
        Some(&json!("kept"))
    );
    assert!(f.session.can_undo());
}

#[test]
fn test_modified_notifications_carry_the_kind() {
    let mut f = fixture();

    let kinds = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&kinds);
    f.session.events().modified.subscribe(move |e| {
        sink.borrow_mut().push(e.kind);
    });

    f.session.set_property(&f.q1, "title", json!("x")).unwrap();
    f.session.undo().unwrap();
    f.session.redo().unwrap();

    assert_eq!(
        *kinds.borrow(),
        vec![ModifiedKind::Commit, ModifiedKind::Undo, ModifiedKind::Redo]
    );
}

#[test]
fn test_deleting_focused_subtree_falls_back_to_survivor() {
    let mut f = fixture();

    // panel1 on page1 holding q3; focus q3
    let panel = f.session.new_node(NodeKind::Panel, "panel1");
    let panel_id = f.session.add_element(&f.page1, 2, panel).unwrap();
    let q3 = f.session.new_node(NodeKind::Question, "q3");
    let q3_id = f.session.add_element(&panel_id, 0, q3).unwrap();
    f.session.select(Some(&q3_id));

    f.session.remove_element(&panel_id).unwrap();

    // Never a dangling id: focus fell back to the nearest surviving ancestor
    assert_eq!(f.session.selected_id(), Some(f.page1.as_str()));

    // Restoring the subtree keeps selection valid too
    f.session.undo().unwrap();
    let selected = f.session.selected_id().unwrap().to_string();
    assert!(f.session.document().contains(&selected));
}

#[test]
fn test_add_element_is_undoable() {
    let mut f = fixture();

    let q4 = f
        .session
        .new_node(NodeKind::Question, "q4")
        .with_property("title", json!("Extra"));
    let q4_id = f.session.add_element(&f.page2, 0, q4).unwrap();
    assert!(f.session.document().contains(&q4_id));

    f.session.undo().unwrap();
    assert!(!f.session.document().contains(&q4_id));

    f.session.redo().unwrap();
    assert_eq!(
        f.session.document().find(&q4_id).unwrap().property("title"),
        Some(&json!("Extra"))
    );
}

#[test]
fn test_collection_edits_round_trip_through_history() {
    let mut f = fixture();

    f.session
        .insert_item(&f.q1, "choices", 1, json!("maybe"))
        .unwrap();
    assert_eq!(
        f.session.document().find(&f.q1).unwrap().property("choices"),
        Some(&json!(["yes", "maybe", "no"]))
    );

    f.session
        .reorder_items(
            &f.q1,
            "choices",
            vec![json!("no"), json!("maybe"), json!("yes")],
        )
        .unwrap();
    f.session.remove_item(&f.q1, "choices", 1).unwrap();
    assert_eq!(
        f.session.document().find(&f.q1).unwrap().property("choices"),
        Some(&json!(["no", "yes"]))
    );

    // Three implicit transactions, three undo steps back to the original
    f.session.undo().unwrap();
    f.session.undo().unwrap();
    f.session.undo().unwrap();
    assert_eq!(
        f.session.document().find(&f.q1).unwrap().property("choices"),
        Some(&json!(["yes", "no"]))
    );
}

#[test]
fn test_insert_item_into_unset_property_undoes_to_unset() {
    let mut f = fixture();

    f.session
        .insert_item(&f.q2, "choices", 0, json!("first"))
        .unwrap();
    assert_eq!(
        f.session.document().find(&f.q2).unwrap().property("choices"),
        Some(&json!(["first"]))
    );

    // Materializing the array and inserting grouped into one transaction
    f.session.undo().unwrap();
    assert_eq!(
        f.session.document().find(&f.q2).unwrap().property("choices"),
        None
    );
}

#[test]
fn test_same_parent_reorder_move() {
    let mut f = fixture();

    // q1 before q2; drop q1 after q2 (resting index 1)
    f.session.move_element(&f.q1, &f.page1, 1).unwrap();
    let doc = f.session.document();
    assert_eq!(doc.position_of(&f.q1), Some((f.page1.clone(), 1)));
    assert_eq!(doc.position_of(&f.q2), Some((f.page1.clone(), 0)));

    f.session.undo().unwrap();
    let doc = f.session.document();
    assert_eq!(doc.position_of(&f.q1), Some((f.page1.clone(), 0)));
    assert_eq!(doc.position_of(&f.q2), Some((f.page1.clone(), 1)));
}

#[test]
fn test_export_json_reflects_edits() -> anyhow::Result<()> {
    let mut f = fixture();
    f.session.set_property(&f.q1, "title", json!("Exported"))?;

    let value = f.session.export_json();
    let restored = surveyforge_model::document_from_json(&value)?;
    assert_eq!(
        restored.find(&f.q1).unwrap().property("title"),
        Some(&json!("Exported"))
    );
    Ok(())
}

#[test]
fn test_nested_gestures_seal_once() {
    let mut f = fixture();

    f.session.begin_transaction(Some("Outer gesture"));
    f.session.begin_transaction(None);
    f.session.set_property(&f.q1, "title", json!("inner")).unwrap();
    f.session.stop_transaction();
    // Still open: the inner stop must not have committed anything
    assert!(f.session.is_transaction_open());
    f.session.set_property(&f.q2, "title", json!("outer")).unwrap();
    f.session.stop_transaction();

    assert!(!f.session.is_transaction_open());
    assert!(f.session.undo().unwrap());
    let doc = f.session.document();
    assert_eq!(doc.find(&f.q1).unwrap().property("title"), None);
    assert_eq!(doc.find(&f.q2).unwrap().property("title"), None);
    assert!(!f.session.can_undo());
}

/// Moving a subtree keeps descendants intact through undo cycles
#[test]
fn test_panel_move_round_trip_keeps_descendants() {
    let mut f = fixture();

    let panel = f.session.new_node(NodeKind::Panel, "panel1");
    let panel_id = f.session.add_element(&f.page1, 2, panel).unwrap();
    let q3 = f.session.new_node(NodeKind::Question, "q3");
    let q3_id = f.session.add_element(&panel_id, 0, q3).unwrap();

    f.session.move_element(&panel_id, &f.page2, 0).unwrap();
    assert!(f.session.document().is_descendant(&f.page2, &q3_id));

    f.session.undo().unwrap();
    assert!(f.session.document().is_descendant(&f.page1, &q3_id));
}
