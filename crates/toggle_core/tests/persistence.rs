use pretty_assertions::assert_eq;
use toggle_block_core::{
    Block, BlockHost, EditorValue, MemoryHost, Status, ToggleEngine, ToggleId, TreeQuery,
};

fn fk(host: &MemoryHost, ix: usize) -> Option<&str> {
    host.block(ix)
        .and_then(Block::foreign_key)
        .map(ToggleId::as_str)
}

fn document() -> MemoryHost {
    MemoryHost::new(vec![
        Block::paragraph("intro").with_id("p0"),
        Block::toggle("Notes", "fk-n".into(), Status::Closed).with_id("t"),
        Block::paragraph("a").with_id("a").in_toggle("fk-n"),
        Block::toggle("Inner", "fk-m".into(), Status::Open)
            .with_id("m")
            .in_toggle("fk-n"),
        Block::paragraph("m1").with_id("m1").in_toggle("fk-m"),
        Block::paragraph("after").with_id("after"),
    ])
}

#[test]
fn save_recomputes_descendant_count() {
    let engine = ToggleEngine::default();
    let host = document();

    let data = engine.save_toggle(&host, 1).unwrap();
    assert_eq!(data.text, "Notes");
    assert_eq!(data.status, Status::Closed);
    assert_eq!(data.fk.as_str(), "fk-n");
    assert_eq!(data.items, 3);

    let value = EditorValue::from_host(&engine, &host).unwrap();
    assert_eq!(
        value.blocks[1].data,
        serde_json::json!({"text": "Notes", "status": "closed", "fk": "fk-n", "items": 3})
    );
    assert_eq!(value.blocks[2].data, serde_json::json!({"text": "a"}));
}

#[test]
fn save_and_load_round_trip() {
    let engine = ToggleEngine::default();
    let json = EditorValue::from_host(&engine, &document())
        .unwrap()
        .to_json_pretty()
        .unwrap();

    let mut loaded_engine = ToggleEngine::default();
    let host = EditorValue::from_json_str(&json)
        .unwrap()
        .load(&mut loaded_engine)
        .unwrap();

    assert_eq!(
        host.texts(),
        vec!["intro", "Notes", "a", "Inner", "m1", "after"]
    );
    let root = host.block(1).unwrap();
    assert_eq!(root.root_id().map(ToggleId::as_str), Some("fk-n"));
    assert_eq!(root.status(), Some(Status::Closed));
    assert_eq!(fk(&host, 0), None);
    assert_eq!(fk(&host, 2), Some("fk-n"));
    assert_eq!(fk(&host, 3), Some("fk-n"));
    assert_eq!(fk(&host, 4), Some("fk-m"));
    assert_eq!(fk(&host, 5), None);
    assert_eq!(
        TreeQuery::new(&host).descendant_count(&"fk-n".into()),
        3
    );

    let hidden: Vec<bool> = host.blocks().iter().map(|b| b.hidden).collect();
    assert_eq!(hidden, vec![false, false, true, true, true, false]);
    assert!(host.journal().is_empty());
    assert_eq!(loaded_engine.tracked(&"fk-n".into()).map(|s| s.len()), Some(2));
}

#[test]
fn advisory_count_past_the_end_is_ignored() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("T", "fk-t".into(), Status::Open).with_items(5),
        Block::paragraph("p"),
    ]);

    assert_eq!(engine.render_toggle(&mut host, 0).unwrap(), 0);
    assert_eq!(fk(&host, 1), None);
    assert_eq!(host.block(0).unwrap().root.as_ref().unwrap().items, 0);
}

#[test]
fn render_stops_at_a_block_owned_by_another_toggle() {
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("A", "fk-a".into(), Status::Open).with_items(3),
        Block::paragraph("a1"),
        Block::paragraph("z1").in_toggle("fk-z"),
        Block::toggle("Z", "fk-z".into(), Status::Open),
    ]);

    assert_eq!(engine.render_all(&mut host).unwrap(), 2);
    assert_eq!(fk(&host, 1), Some("fk-a"));
    assert_eq!(fk(&host, 2), Some("fk-z"));
    assert_eq!(host.block(0).unwrap().root.as_ref().unwrap().items, 1);
}

#[test]
fn missing_schema_and_version_use_defaults() {
    let value = EditorValue::from_json_str(
        r#"{"blocks":[{"type":"toggle","data":{"text":"T","items":0}}]}"#,
    )
    .unwrap();
    assert_eq!(value.schema, "toggle-block");
    assert_eq!(value.version, 1);

    let blocks = value.into_blocks().unwrap();
    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].is_toggle_kind());
    assert_eq!(blocks[0].status(), Some(Status::Open));
}
