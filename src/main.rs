/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::KeyCode;

use config::GameConfig;
use sim::catalog::Catalog;
use sim::event::GameEvent;
use sim::level::Level;
use sim::step;
use ui::input::InputState;
use ui::renderer::{Renderer, Theme};

const FRAME_SLEEP: Duration = Duration::from_millis(5);

const KEYS_RESTART: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R')];

fn main() {
    let config = GameConfig::load();

    // A catalog named on the command line must load; the configured
    // default may be absent (the built-in test chamber runs instead).
    let arg_path = std::env::args().nth(1).map(PathBuf::from);
    let explicit = arg_path.is_some();
    let path = arg_path.unwrap_or_else(|| config.catalog_path.clone());

    let catalog = match Catalog::load(&path) {
        Ok(c) if !c.is_empty() => Some(c),
        Ok(_) => {
            if explicit {
                eprintln!("{} holds no levels", path.display());
                return;
            }
            None
        }
        Err(e) => {
            if explicit {
                eprintln!("{e}");
                return;
            }
            None
        }
    };

    let mut renderer = Renderer::new(Theme::default());
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let result = game_loop(catalog.as_ref(), &config, &mut renderer);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    println!();
    println!("Thanks for playing Rockfall!");
    match result {
        Ok(true) => {
            let total = catalog.as_ref().map(|c| c.len()).unwrap_or(1);
            println!("All {total} caves cleared.");
        }
        Ok(false) => {}
        Err(e) => eprintln!("Game error: {e}"),
    }
}

fn game_loop(
    catalog: Option<&Catalog>,
    config: &GameConfig,
    renderer: &mut Renderer,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    kb.honor_release = renderer.enhanced_keys();

    let tick_rate = Duration::from_millis(config.speed.tick_rate_ms);
    let dt = config.speed.tick_rate_ms as f32 / 1000.0;
    let mut last_tick = Instant::now();

    let mut current = 0usize;
    let mut level = load_level(catalog, current, config);
    announce(&mut level);
    if catalog.is_none() {
        level.set_message("No level catalog found, running the test chamber", 180);
    }

    loop {
        kb.drain_events();

        if kb.ctrl_c_pressed() || kb.any_pressed(&[KeyCode::Esc]) {
            return Ok(false);
        }
        if kb.any_pressed(KEYS_RESTART) {
            level = load_level(catalog, current, config);
            announce(&mut level);
            renderer.invalidate();
        }

        if last_tick.elapsed() >= tick_rate {
            let events = step::step(&mut level, kb.frame_input(), dt);

            let mut completed = false;
            for event in &events {
                match event {
                    GameEvent::AllPickupsCollected => {
                        level.set_message("The exit is open!", 90);
                    }
                    GameEvent::LevelCompleted => completed = true,
                    _ => {}
                }
            }

            if completed {
                let total = catalog.map(|c| c.len()).unwrap_or(1);
                if current + 1 < total {
                    current += 1;
                    level = load_level(catalog, current, config);
                    announce(&mut level);
                    renderer.invalidate();
                } else {
                    return Ok(true);
                }
            }

            last_tick = Instant::now();
        }

        renderer.render(&mut level)?;
        std::thread::sleep(FRAME_SLEEP);
    }
}

/// Build the level at `index`, or the test chamber when no catalog is
/// available.
fn load_level(catalog: Option<&Catalog>, index: usize, config: &GameConfig) -> Level {
    let record = catalog.and_then(|c| c.record(index).ok());
    match (catalog, record) {
        (Some(c), Some(rec)) => {
            Level::from_record(rec, index, c.len(), config.speed.clone(), &config.grid)
        }
        _ => Level::test_level(config.speed.clone(), &config.grid),
    }
}

/// Show the level title on the message line, or the first decode notice
/// when the record had problems worth reporting.
fn announce(level: &mut Level) {
    let msg = match level.notices.first() {
        Some(n) => n.clone(),
        None => level.title.clone(),
    };
    if !msg.is_empty() {
        level.set_message(&msg, 120);
    }
}
