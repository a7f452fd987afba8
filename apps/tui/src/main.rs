//! DeepResearch TUI: a single-form terminal front end for the research
//! pipeline, built with `ratatui` + `crossterm`.

mod app;
mod form;
mod widgets;

use color_eyre::eyre::Result;

fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    app::init_tracing()?;
    app::run()
}
