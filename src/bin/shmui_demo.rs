//! shmui demo - kotak 200x200 dengan counter klik
//!
//! Dijalankan oleh runtime renderer, yang menyuntikkan endpoint lewat
//! environment (`z71200_SHM`, `z71200_SOCK`, ...).
//!
//! # Usage
//!
//! ```text
//! z71200 -- cargo run --release --bin shmui_demo -- --dump
//! ```
//!
//! # Options
//!
//! - `--dump` - Print tree yang ter-mount setelah inflate
//! - `--log-level LEVEL` - trace, debug, info, warn, error (default: info)

use std::cell::Cell;
use std::rc::Rc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use shmui::protocol::{decoder, px, Color, Div, Node, StateKind, Text};
use shmui::{callback, Error, Session};

#[derive(Debug, Parser)]
#[command(name = "shmui_demo")]
#[command(about = "Mounts a clickable counter into a running renderer")]
struct Cli {
    /// Print the encoded tree after mounting
    #[arg(long)]
    dump: bool,

    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,
}

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match run(&cli) {
        Ok(()) | Err(Error::ConnectionClosed) => info!("renderer closed the session"),
        Err(err) => {
            error!("session failed: {err}");
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> shmui::Result<()> {
    let mut session = Session::from_env()?;

    let label = session.text_cell("clicks: 0")?;
    let clicks = Rc::new(Cell::new(0u64));

    let on_click = {
        let label = label.clone();
        let clicks = clicks.clone();
        callback(move |session| {
            clicks.set(clicks.get() + 1);
            // Digit bertambah → capacity terlampaui → relokasi + patch
            label.update(session, &format!("clicks: {}", clicks.get()))?;
            info!(clicks = clicks.get(), "clicked");
            Ok(())
        })
    };

    let tree = Div::new()
        .width(px(200.0))
        .height(px(200.0))
        .radius(px(8.0))
        .background_when(
            StateKind::Clicked,
            Color::rgb("ff0000")?,
            Some(Color::rgb("cccccc")?),
        )
        .on_click(on_click)
        .child(Text::new(px(16.0), px(16.0), &label));

    let root = session.mount(&tree)?;
    info!(root, "tree mounted");

    if cli.dump {
        let words = session.read_tree(root, tree.word_count())?;
        print!("{}", decoder::dump(&words));
    }

    session.run()
}
