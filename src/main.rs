use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, info};

mod clock;
mod controller;
mod domain;
mod facets;
mod inputter;
mod location;
mod logging;
mod model;
mod pager;
mod projector;
mod record;
mod refresh;
mod source;
mod table;
mod ui;

use clock::SystemClock;
use controller::Controller;
use domain::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_EVENT_POLL_MS, DEFAULT_PAGE_SIZE, DEFAULT_REFRESH_INTERVAL_MS, TRConfig, TRError,
};
use model::{Model, Screen, Status};
use source::{CustomerSource, TicketSource};
use ui::TableUI;

/// Terminal tracker for repair tickets and customers
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory holding tickets.csv and customers.csv
    #[arg(short, long, default_value = ".")]
    data_dir: String,

    /// Start location, e.g. "/tickets?searchText=dave&page=2"
    #[arg(short, long, default_value = "/tickets")]
    location: String,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    #[arg(long, default_value_t = DEFAULT_REFRESH_INTERVAL_MS)]
    refresh_interval_ms: u64,

    #[arg(long, default_value_t = DEFAULT_DEBOUNCE_MS)]
    debounce_ms: u64,

    #[arg(long, default_value_t = DEFAULT_EVENT_POLL_MS)]
    event_poll_ms: u64,

    #[arg(long, default_value = "rtrack.log")]
    log_file: String,

    /// error, warn, info, debug or trace. RUST_LOG takes precedence.
    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,
}

fn expand(path: &str) -> Result<PathBuf, TRError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| TRError::loading_failed(e.to_string()))
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

fn run(args: Args) -> Result<(), TRError> {
    logging::init_logging(&expand(&args.log_file)?, args.log_level)?;
    info!("Starting rtrack with {args:?}");

    let config = TRConfig::default()
        .data_dir(expand(&args.data_dir)?)
        .location(args.location)
        .page_size(args.page_size.max(1))
        .refresh_interval(Duration::from_millis(args.refresh_interval_ms))
        .debounce(Duration::from_millis(args.debounce_ms))
        .event_poll_time(args.event_poll_ms);

    let screens = vec![
        Screen::tickets(Arc::new(TicketSource::new(&config.data_dir))),
        Screen::customers(Arc::new(CustomerSource::new(&config.data_dir))),
    ];
    let mut model = Model::init(&config, screens, Box::new(SystemClock))?;
    let mut ui = TableUI::new();
    let controller = Controller::new(model.event_poll_time());

    let mut terminal = ratatui::init();

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        };
    }

    info!("Bye");
    Ok(())
}
