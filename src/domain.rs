use std::io::Error;
use std::path::PathBuf;
use std::time::Duration;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use tracing_error::SpanTrace;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 500_000;
pub const DEFAULT_EVENT_POLL_MS: u64 = 100;

pub const HELP_TEXT: &str = "\
q           Quit
?           Show this help
Tab         Switch screen, or complete a filter from its suggestions
j/k ↓/↑     Move row selection
h/l ←/→     Move column selection
n/p         Next / previous page
g/G         First / last page
s           Toggle sort on column (asc, desc, off)
S           Add column to the sort chain
c           Clear sorting
f           Edit filter of the current column
F           Clear all filters
/           Search records
r           Refresh table
Enter       Open the selected record
Esc         Close popup / record / input";

#[derive(Debug)]
pub enum TRError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String, SpanTrace),
    FileNotFound(PathBuf),
    PermissionDenied(PathBuf),
    InvalidLocation(String),
}

impl TRError {
    pub fn loading_failed(message: impl Into<String>) -> Self {
        TRError::LoadingFailed(message.into(), SpanTrace::capture())
    }
}

impl From<Error> for TRError {
    fn from(err: Error) -> Self {
        TRError::IoError(err)
    }
}

impl From<PolarsError> for TRError {
    fn from(err: PolarsError) -> Self {
        TRError::PolarsError(err)
    }
}

impl From<url::ParseError> for TRError {
    fn from(err: url::ParseError) -> Self {
        TRError::InvalidLocation(err.to_string())
    }
}

#[derive(Debug, Clone, Setters)]
pub struct TRConfig {
    pub data_dir: PathBuf,
    pub location: String,
    pub page_size: usize,
    pub debounce: Duration,
    pub refresh_interval: Duration,
    pub event_poll_time: u64,
}

impl Default for TRConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            location: "/tickets".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            refresh_interval: Duration::from_millis(DEFAULT_REFRESH_INTERVAL_MS),
            event_poll_time: DEFAULT_EVENT_POLL_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Filter,
    Search,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    Help,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    ToggleSort,
    ToggleSortChain,
    ClearSorting,
    EditFilter,
    ClearFilters,
    Search,
    Refresh,
    SwitchScreen,
    Enter,
    Exit,
    RawKey(KeyEvent),
    Tick,
}
