mod gallery;

use anyhow::{Result, bail};

use crate::gallery::StoryId;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let selected = match std::env::args().nth(1) {
        Some(slug) => match StoryId::from_slug(&slug) {
            Some(id) => vec![id],
            None => {
                let known: Vec<&str> = StoryId::ALL.iter().map(|id| id.slug()).collect();
                bail!("unknown story {slug:?}, expected one of {}", known.join(", "));
            }
        },
        None => StoryId::ALL.to_vec(),
    };

    for id in selected {
        gallery::run(id)?;
        println!();
    }
    Ok(())
}
