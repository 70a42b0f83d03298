// src/main.rs

use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};

use looper_engine::LooperConfig;
use looper_engine::audio_runtime::LooperRuntime;
use looper_engine::controller::LooperController;

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => LooperConfig::load_from_disk(&path)?,
        None => LooperConfig::default(),
    };

    let runtime = LooperRuntime::new(&config)?;
    let mut looper = LooperController::new(runtime);

    enable_raw_mode()?;
    let res = run(&mut looper);
    disable_raw_mode()?;

    println!("\nbye");
    res
}

fn run(looper: &mut LooperController) -> anyhow::Result<()> {
    // ~20 fps
    let frame = Duration::from_millis(50);
    looper.run_tick()?;

    loop {
        if event::poll(frame)? {
            if let Event::Key(ev) = event::read()? {
                if ev.kind == KeyEventKind::Press {
                    if looper.should_quit(ev.code, ev.modifiers) {
                        return Ok(());
                    }
                    looper.handle_key(ev.code);
                }
            }
        }
        looper.run_tick()?;
    }
}
