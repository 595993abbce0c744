use anyhow::{Context as _, Result, anyhow};
use toggle_block_core::{
    Block, BlockHost, Direction, DragSession, EditorValue, Key, KeyPress, MemoryHost, Outline,
    Status, ToggleEngine,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoryId {
    CreateAndCollapse,
    NestedVisibility,
    MoveDown,
    DragIntoToggle,
    DeleteNested,
    SaveAndLoad,
}

impl StoryId {
    pub const ALL: [StoryId; 6] = [
        StoryId::CreateAndCollapse,
        StoryId::NestedVisibility,
        StoryId::MoveDown,
        StoryId::DragIntoToggle,
        StoryId::DeleteNested,
        StoryId::SaveAndLoad,
    ];

    pub fn title(self) -> &'static str {
        match self {
            StoryId::CreateAndCollapse => "Create and collapse",
            StoryId::NestedVisibility => "Nested visibility",
            StoryId::MoveDown => "Move down past a toggle",
            StoryId::DragIntoToggle => "Drag into a toggle",
            StoryId::DeleteNested => "Delete nested toggle",
            StoryId::SaveAndLoad => "Save and load",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            StoryId::CreateAndCollapse => "create",
            StoryId::NestedVisibility => "visibility",
            StoryId::MoveDown => "move",
            StoryId::DragIntoToggle => "drag",
            StoryId::DeleteNested => "delete",
            StoryId::SaveAndLoad => "persist",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.slug() == slug)
    }
}

/// Prints each step of a story as an indented outline.
struct Narrator {
    step: usize,
}

impl Narrator {
    fn new(id: StoryId) -> Self {
        println!("== {} ==", id.title());
        Self { step: 0 }
    }

    fn show(&mut self, label: &str, host: &MemoryHost) {
        self.step += 1;
        println!("{}. {label}", self.step);
        let outline = Outline::from_host(host);
        for line in outline.dump().lines() {
            println!("   {line}");
        }
        if !outline.is_contiguous(host) {
            log::warn!("outline is no longer contiguous after step {}", self.step);
        }
    }
}

pub fn run(id: StoryId) -> Result<()> {
    match id {
        StoryId::CreateAndCollapse => create_and_collapse(),
        StoryId::NestedVisibility => nested_visibility(),
        StoryId::MoveDown => move_down(),
        StoryId::DragIntoToggle => drag_into_toggle(),
        StoryId::DeleteNested => delete_nested(),
        StoryId::SaveAndLoad => save_and_load(),
    }
}

fn create_and_collapse() -> Result<()> {
    let mut narrator = Narrator::new(StoryId::CreateAndCollapse);
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![Block::paragraph("> Notes")]);

    engine.handle_key(&mut host, 0, KeyPress::new(Key::Space));
    narrator.show("type \"> \" and space", &host);

    engine.handle_key(&mut host, 0, KeyPress::new(Key::Enter).at(5));
    for (ix, text) in ["a", "b", "c"].into_iter().enumerate() {
        let item = ix + 1;
        host.block_mut(item)
            .ok_or_else(|| anyhow!("missing item {item}"))?
            .text = text.to_string();
        if item < 3 {
            engine.handle_key(&mut host, item, KeyPress::new(Key::Enter));
        }
    }
    narrator.show("press enter three times", &host);

    engine.handle_icon_click(&mut host, 0);
    narrator.show("click the icon", &host);

    engine.handle_icon_click(&mut host, 0);
    narrator.show("click it again", &host);
    Ok(())
}

fn nested_visibility() -> Result<()> {
    let mut narrator = Narrator::new(StoryId::NestedVisibility);
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("A", "fk-a".into(), Status::Open),
        Block::paragraph("B").in_toggle("fk-a"),
        Block::toggle("C", "fk-c".into(), Status::Closed).in_toggle("fk-a"),
        Block::paragraph("D").in_toggle("fk-c"),
    ]);
    engine.render_all(&mut host)?;
    narrator.show("A open, C closed", &host);

    engine.toggle_status(&mut host, 0)?;
    narrator.show("close A", &host);

    engine.toggle_status(&mut host, 0)?;
    narrator.show("open A, C keeps its own state", &host);
    Ok(())
}

fn move_down() -> Result<()> {
    let mut narrator = Narrator::new(StoryId::MoveDown);
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("X", "fk-x".into(), Status::Open),
        Block::paragraph("x1").in_toggle("fk-x"),
        Block::paragraph("x2").in_toggle("fk-x"),
        Block::toggle("Y", "fk-y".into(), Status::Open),
        Block::paragraph("y1").in_toggle("fk-y"),
    ]);
    narrator.show("two toggles", &host);

    host.move_block(1, 0)?;
    host.set_current_block(1);
    engine.move_toggle(&mut host, 0, Direction::Down)?;
    narrator.show("move X down", &host);
    Ok(())
}

fn drag_into_toggle() -> Result<()> {
    let mut narrator = Narrator::new(StoryId::DragIntoToggle);
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("T", "fk-t".into(), Status::Open),
        Block::paragraph("t1").in_toggle("fk-t"),
        Block::paragraph("loose"),
    ]);
    narrator.show("a loose paragraph", &host);

    host.set_current_block(2);
    let session = DragSession::begin(&host).context("nothing under the caret")?;
    host.move_block(1, 2)?;
    engine.handle_drop(&mut host, &session, 0);
    narrator.show("drop it on the header", &host);
    Ok(())
}

fn delete_nested() -> Result<()> {
    let mut narrator = Narrator::new(StoryId::DeleteNested);
    let mut engine = ToggleEngine::default();
    let mut host = MemoryHost::new(vec![
        Block::toggle("R", "fk-r".into(), Status::Open),
        Block::paragraph("i1").in_toggle("fk-r"),
        Block::toggle("N", "fk-n".into(), Status::Open).in_toggle("fk-r"),
        Block::paragraph("n1").in_toggle("fk-n"),
        Block::paragraph("n2").in_toggle("fk-n"),
        Block::paragraph("after"),
    ]);
    narrator.show("outer toggle with a nested one", &host);

    let count = engine.delete_toggle(&host, 0)?;
    engine.settle(&mut host);
    narrator.show(&format!("delete R ({count} blocks)"), &host);
    Ok(())
}

fn save_and_load() -> Result<()> {
    let mut narrator = Narrator::new(StoryId::SaveAndLoad);
    let engine = ToggleEngine::default();
    let host = MemoryHost::new(vec![
        Block::toggle("Notes", "fk-n".into(), Status::Closed),
        Block::paragraph("a").in_toggle("fk-n"),
        Block::paragraph("b").in_toggle("fk-n"),
        Block::paragraph("after"),
    ]);
    narrator.show("before save", &host);

    let json = EditorValue::from_host(&engine, &host)?.to_json_pretty()?;
    println!("{json}");

    let mut loaded_engine = ToggleEngine::default();
    let loaded = EditorValue::from_json_str(&json)?.load(&mut loaded_engine)?;
    narrator.show("after load", &loaded);

    let value: serde_json::Value = serde_json::from_str(&json)?;
    log::info!("saved {} blocks", value["blocks"].as_array().map_or(0, Vec::len));
    Ok(())
}
