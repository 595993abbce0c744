use pretty_assertions::assert_eq;
use rstest::rstest;
use toggle_block_core::{
    Block, BlockHost, BlockId, InputOutcome, Key, KeyPress, MemoryHost, Outline, Status,
    ToggleConfig, ToggleEngine, ToggleError, ToggleId, TreeQuery,
};

fn fk(host: &MemoryHost, ix: usize) -> Option<&str> {
    host.block(ix)
        .and_then(Block::foreign_key)
        .map(ToggleId::as_str)
}

fn hidden(host: &MemoryHost) -> Vec<bool> {
    host.blocks().iter().map(|b| b.hidden).collect()
}

#[test]
fn create_close_and_reopen() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![Block::paragraph("> Notes")]);

    assert_eq!(
        engine.handle_key(&mut host, 0, KeyPress::new(Key::Space)),
        InputOutcome::Handled
    );
    let root_id = host.block(0).unwrap().root_id().cloned().unwrap();
    assert_eq!(host.block(0).unwrap().text, "Notes");
    assert_eq!(host.block(0).unwrap().status(), Some(Status::Open));

    assert_eq!(
        engine.handle_key(&mut host, 0, KeyPress::new(Key::Enter).at(5)),
        InputOutcome::Handled
    );
    host.block_mut(1).unwrap().text = "a".into();
    engine.handle_key(&mut host, 1, KeyPress::new(Key::Enter));
    host.block_mut(2).unwrap().text = "b".into();
    engine.handle_key(&mut host, 2, KeyPress::new(Key::Enter));
    host.block_mut(3).unwrap().text = "c".into();

    assert_eq!(host.texts(), vec!["Notes", "a", "b", "c"]);
    for ix in 1..=3 {
        assert_eq!(fk(&host, ix), Some(root_id.as_str()));
    }
    assert_eq!(engine.tracked(&root_id).map(|s| s.len()), Some(3));
    assert_eq!(hidden(&host), vec![false; 4]);

    assert_eq!(engine.handle_icon_click(&mut host, 0), InputOutcome::Handled);
    assert_eq!(host.block(0).unwrap().status(), Some(Status::Closed));
    assert_eq!(hidden(&host), vec![false, true, true, true]);

    engine.handle_icon_click(&mut host, 0);
    assert_eq!(host.block(0).unwrap().status(), Some(Status::Open));
    assert_eq!(hidden(&host), vec![false; 4]);
}

#[rstest]
#[case("> Title", Some("Title"))]
#[case(">Title", Some("Title"))]
#[case(">  two spaces", Some(" two spaces"))]
#[case("no prefix", None)]
fn shortcut_creates_toggle(#[case] text: &str, #[case] header: Option<&str>) {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![Block::paragraph(text)]);
    let created = engine.create_toggle_with_shortcut(&mut host, 0).unwrap();

    assert_eq!(created.is_some(), header.is_some());
    assert_eq!(host.blocks_count(), 1);
    match header {
        Some(header) => {
            let block = host.block(0).unwrap();
            assert!(block.is_toggle_kind());
            assert_eq!(block.text, header);
            assert_eq!(block.root_id(), created.as_ref());
        }
        None => assert_eq!(host.texts(), vec![text]),
    }
}

#[test]
fn enter_on_closed_root_opens_and_splits_header() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![Block::toggle(
        "HelloWorld",
        "fk-t".into(),
        Status::Closed,
    )]);

    let ix = engine.create_item_from_root(&mut host, 0, 5).unwrap();
    assert_eq!(ix, 1);
    assert_eq!(host.texts(), vec!["Hello", "World"]);
    assert_eq!(host.block(0).unwrap().status(), Some(Status::Open));
    assert_eq!(fk(&host, 1), Some("fk-t"));
    assert!(!host.block(1).unwrap().hidden);
    assert_eq!(host.caret(), Some(1));
    assert!(host.block(0).unwrap().root.as_ref().unwrap().placeholder_hidden);
}

#[test]
fn header_split_respects_char_boundaries() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![Block::toggle("héllo", "fk-t".into(), Status::Open)]);
    engine.create_item_from_root(&mut host, 0, 2).unwrap();
    assert_eq!(host.texts(), vec!["h", "éllo"]);
}

#[test]
fn extracting_the_only_item_leaves_an_empty_toggle() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("T", "fk-t".into(), Status::Open),
        Block::paragraph("x").in_toggle("fk-t"),
    ]);

    assert_eq!(engine.extract(&mut host, 1).unwrap(), 1);
    assert_eq!(engine.settle(&mut host), 1);

    let block = host.block(1).unwrap();
    assert_eq!(block.foreign_key(), None);
    assert_eq!(block.tags.item_id, None);
    assert!(!block.tags.marked);
    assert_eq!(
        TreeQuery::new(&host).descendant_count(&"fk-t".into()),
        0
    );
    assert!(!host.block(0).unwrap().root.as_ref().unwrap().placeholder_hidden);
}

#[test]
fn extract_moves_item_past_the_subtree() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("T", "fk-t".into(), Status::Open),
        Block::paragraph("a").in_toggle("fk-t"),
        Block::paragraph("b").in_toggle("fk-t"),
        Block::paragraph("c").in_toggle("fk-t"),
        Block::paragraph("after"),
    ]);
    host.open_toolbar();

    let outcome = engine.handle_key(&mut host, 1, KeyPress::new(Key::Tab).shift());
    assert_eq!(outcome, InputOutcome::Handled);
    engine.settle(&mut host);

    assert_eq!(host.texts(), vec!["T", "b", "c", "a", "after"]);
    assert_eq!(fk(&host, 3), None);
    assert_eq!(host.caret(), Some(3));
    assert!(!host.is_toolbar_open());
}

#[test]
fn extract_from_nested_toggle_promotes_one_level() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("A", "fk-a".into(), Status::Open),
        Block::toggle("B", "fk-b".into(), Status::Open).in_toggle("fk-a"),
        Block::paragraph("b1").in_toggle("fk-b"),
        Block::paragraph("b2").in_toggle("fk-b"),
        Block::paragraph("a2").in_toggle("fk-a"),
    ]);

    engine.extract(&mut host, 2).unwrap();
    engine.settle(&mut host);

    assert_eq!(host.texts(), vec!["A", "B", "b2", "b1", "a2"]);
    assert_eq!(fk(&host, 3), Some("fk-a"));
    assert_eq!(TreeQuery::new(&host).descendant_count(&"fk-a".into()), 4);
    assert_eq!(TreeQuery::new(&host).descendant_count(&"fk-b".into()), 1);
}

#[test]
fn backspace_on_header_unwraps_the_toggle() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("Head\nsecond line", "fk-t".into(), Status::Open),
        Block::paragraph("a").in_toggle("fk-t"),
        Block::toggle("N", "fk-n".into(), Status::Closed).in_toggle("fk-t"),
        Block::paragraph("n1").in_toggle("fk-n"),
        Block::paragraph("after"),
    ]);

    let outcome = engine.handle_key(&mut host, 0, KeyPress::new(Key::Backspace));
    assert_eq!(outcome, InputOutcome::Handled);

    assert_eq!(host.texts(), vec!["Head", "a", "N", "n1", "after"]);
    assert!(host.block(0).unwrap().root.is_none());
    assert_eq!(fk(&host, 1), None);
    assert_eq!(fk(&host, 2), None);
    assert_eq!(fk(&host, 3), Some("fk-n"));
    assert!(host.block(3).unwrap().hidden);
    assert!(engine.tracked(&"fk-t".into()).is_none());
    assert_eq!(host.caret(), Some(0));
}

#[test]
fn unwrapping_a_nested_toggle_keeps_its_content_in_the_parent() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("A", "fk-a".into(), Status::Open),
        Block::toggle("B", "fk-b".into(), Status::Open)
            .with_id("B")
            .in_toggle("fk-a"),
        Block::paragraph("b1").in_toggle("fk-b"),
        Block::paragraph("a2").in_toggle("fk-a"),
    ]);
    engine.attach(&mut host, 1, &"fk-a".into(), None).unwrap();

    engine.unwrap_toggle(&mut host, 1).unwrap();

    assert_eq!(host.texts(), vec!["A", "B", "b1", "a2"]);
    assert!(host.block(1).unwrap().root.is_none());
    assert_eq!(
        (0..4).map(|ix| fk(&host, ix)).collect::<Vec<_>>(),
        vec![None, Some("fk-a"), Some("fk-a"), Some("fk-a")]
    );
    assert!(Outline::from_host(&host).is_contiguous(&host));
    let tracked = engine.tracked(&"fk-a".into()).unwrap();
    assert!(!tracked.contains(&"B".into()));
    assert!(tracked.contains(&host.block(1).unwrap().id));
    assert_eq!(host.caret(), Some(1));
}

#[test]
fn attach_orders_tracked_items_by_direct_children() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("A", "fk-a".into(), Status::Open),
        Block::paragraph("a1").with_id("a1").in_toggle("fk-a"),
        Block::toggle("B", "fk-b".into(), Status::Open)
            .with_id("B")
            .in_toggle("fk-a"),
        Block::paragraph("b1").in_toggle("fk-b"),
        Block::paragraph("b2").in_toggle("fk-b"),
        Block::paragraph("x").with_id("x"),
        Block::paragraph("a3").with_id("a3").in_toggle("fk-a"),
    ]);
    let fk_a: ToggleId = "fk-a".into();
    for ix in [1, 2, 6, 5] {
        engine.attach(&mut host, ix, &fk_a, None).unwrap();
    }

    let ids: Vec<&str> = engine
        .tracked(&fk_a)
        .unwrap()
        .iter()
        .map(BlockId::as_str)
        .collect();
    assert_eq!(ids, vec!["a1", "B", "x", "a3"]);
}

#[test]
fn backspace_mid_header_is_ignored() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![Block::toggle("T", "fk-t".into(), Status::Open)]);
    let outcome = engine.handle_key(&mut host, 0, KeyPress::new(Key::Backspace).at(1));
    assert_eq!(outcome, InputOutcome::Ignored);
    assert!(host.block(0).unwrap().root.is_some());
}

#[test]
fn tab_nests_after_focus_returns_to_root() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("T", "fk-t".into(), Status::Closed),
        Block::paragraph("a").in_toggle("fk-t"),
        Block::paragraph("p"),
    ]);

    assert_eq!(
        engine.handle_key(&mut host, 2, KeyPress::new(Key::Tab)),
        InputOutcome::Handled
    );
    assert_eq!(
        host.block(2).unwrap().tags.pending_nest,
        Some("fk-t".into())
    );
    assert_eq!(fk(&host, 2), None);
    assert_eq!(host.caret(), Some(0));

    engine.settle(&mut host);
    let block = host.block(2).unwrap();
    assert_eq!(fk(&host, 2), Some("fk-t"));
    assert_eq!(block.tags.pending_nest, None);
    assert!(block.hidden);
}

#[test]
fn tab_after_plain_block_is_ignored() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![Block::paragraph("x"), Block::paragraph("y")]);
    assert_eq!(
        engine.handle_key(&mut host, 1, KeyPress::new(Key::Tab)),
        InputOutcome::Ignored
    );
    assert!(engine.pending().is_empty());
}

#[test]
fn clicking_placeholder_adds_first_item() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![Block::toggle("T", "fk-t".into(), Status::Open)]);
    engine.render_all(&mut host).unwrap();
    assert!(!host.block(0).unwrap().root.as_ref().unwrap().placeholder_hidden);

    engine.click_placeholder(&mut host, 0).unwrap();
    assert_eq!(host.blocks_count(), 2);
    assert_eq!(fk(&host, 1), Some("fk-t"));
    assert!(host.block(0).unwrap().root.as_ref().unwrap().placeholder_hidden);
}

#[test]
fn item_backspace_only_untracks_at_offset_zero() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("T", "fk-t".into(), Status::Open),
        Block::paragraph("a"),
    ]);
    engine.attach(&mut host, 1, &"fk-t".into(), None).unwrap();

    assert!(!engine.item_backspace(&host, 1, 1));
    assert!(engine.item_backspace(&host, 1, 0));
    assert_eq!(engine.tracked(&"fk-t".into()).map(|s| s.len()), Some(0));
}

#[test]
fn attach_rejects_cycles_and_orphans() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("A", "fk-a".into(), Status::Open),
        Block::toggle("B", "fk-b".into(), Status::Open).in_toggle("fk-a"),
    ]);
    assert_eq!(
        engine.attach(&mut host, 0, &"fk-b".into(), None),
        Err(ToggleError::CycleReference("fk-b".into()))
    );
    assert_eq!(
        engine.attach(&mut host, 0, &"fk-z".into(), None),
        Err(ToggleError::OrphanReference("fk-z".into()))
    );
    assert_eq!(fk(&host, 0), None);
}

#[test]
fn highlight_selects_every_descendant() {
    let engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("A", "fk-a".into(), Status::Open),
        Block::toggle("B", "fk-b".into(), Status::Open).in_toggle("fk-a"),
        Block::paragraph("b1").in_toggle("fk-b"),
        Block::paragraph("after"),
    ]);
    assert_eq!(engine.highlight_items(&mut host, &"fk-a".into()), 2);
    let selected: Vec<bool> = host.blocks().iter().map(|b| b.selected).collect();
    assert_eq!(selected, vec![false, true, true, false]);
}

#[test]
fn read_only_engine_only_toggles_visibility() {
    let mut engine = ToggleEngine::read_only(ToggleConfig::default());
    let mut host = MemoryHost::new(vec![
        Block::toggle("T", "fk-t".into(), Status::Open),
        Block::paragraph("a").in_toggle("fk-t"),
        Block::paragraph("> x"),
    ]);

    assert_eq!(
        engine.handle_key(&mut host, 2, KeyPress::new(Key::Space)),
        InputOutcome::Ignored
    );
    assert_eq!(engine.extract(&mut host, 1), Err(ToggleError::ReadOnly));
    assert_eq!(engine.delete_toggle(&host, 0), Err(ToggleError::ReadOnly));
    assert!(host.journal().is_empty());

    assert_eq!(engine.handle_icon_click(&mut host, 0), InputOutcome::Handled);
    assert!(host.block(1).unwrap().hidden);
}
