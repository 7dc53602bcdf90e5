use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::crossterm::event::{KeyCode, KeyEvent};
use tracing::{debug, error, info, trace, warn};

use crate::clock::Clock;
use crate::domain::{CMDMode, HELP_TEXT, Message, TRConfig, TRError};
use crate::inputter::{DebouncedInput, InputResult, Inputter};
use crate::location::{Location, Navigator, Router, ScopedLocation, SharedRouter};
use crate::pager::{PAGE_KEY, Pager};
use crate::projector::{ColumnDef, Formatter};
use crate::record::{FieldValue, Record};
use crate::refresh::{FetchResult, Fetcher, RefreshScheduler};
use crate::source::DataSource;
use crate::table::{SortDescriptor, SortDirection, TableController};

pub const SEARCH_KEY: &str = "searchText";
const NO_RESULTS: &str = "No results found";
const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    RECORD,
    POPUP,
    CMDINPUT,
}

/// Static description of one screen.
pub struct Screen {
    pub name: &'static str,
    pub path: &'static str,
    pub detail_path: &'static str,
    pub detail_param: &'static str,
    pub columns: Vec<ColumnDef>,
    pub sorting: Vec<SortDescriptor>,
    pub source: Arc<dyn DataSource>,
}

impl Screen {
    pub fn tickets(source: Arc<dyn DataSource>) -> Self {
        Screen {
            name: "Tickets",
            path: "/tickets",
            detail_path: "/tickets/form",
            detail_param: "ticketId",
            columns: vec![
                ColumnDef::new("ticketDate", Formatter::Date, Some(14)),
                ColumnDef::new("title", Formatter::Passthrough, Some(25)),
                ColumnDef::new("tech", Formatter::Passthrough, Some(14)),
                ColumnDef::new("firstName", Formatter::Passthrough, None),
                ColumnDef::new("lastName", Formatter::Passthrough, None),
                ColumnDef::new("email", Formatter::Passthrough, Some(25)),
                ColumnDef::new("completed", Formatter::BoolStatus, Some(11)),
            ],
            sorting: vec![SortDescriptor::ascending("ticketDate")],
            source,
        }
    }

    pub fn customers(source: Arc<dyn DataSource>) -> Self {
        Screen {
            name: "Customers",
            path: "/customers",
            detail_path: "/customers/form",
            detail_param: "customerId",
            columns: vec![
                ColumnDef::new("firstName", Formatter::Passthrough, None),
                ColumnDef::new("lastName", Formatter::Passthrough, None),
                ColumnDef::new("email", Formatter::Passthrough, Some(25)),
                ColumnDef::new("phone", Formatter::Passthrough, Some(14)),
                ColumnDef::new("city", Formatter::Passthrough, None),
                ColumnDef::new("zip", Formatter::Passthrough, Some(8)),
            ],
            sorting: Vec::new(),
            source,
        }
    }
}

struct TablePage {
    name: &'static str,
    path: &'static str,
    table: TableController,
    source: Arc<dyn DataSource>,
    scheduler: RefreshScheduler,
    filter_input: DebouncedInput,
    filter_column: Option<usize>,
    curser_row: usize,
    curser_column: usize,
    empty_message: Option<String>,
}

impl TablePage {
    fn query(&self) -> &str {
        self.scheduler.query()
    }

    fn clamp_curser(&mut self) {
        let rows = self.table.visible_rows().count();
        self.curser_row = self.curser_row.min(rows.saturating_sub(1));
    }

    fn current_column(&self) -> &ColumnDef {
        &self.table.columns()[self.curser_column]
    }

    /// Commits an in-flight filter edit and leaves the input.
    fn blur_filter(&mut self) {
        if let Some(column) = self.filter_column.take() {
            if let Some(value) = self.filter_input.blur() {
                let id = self.table.columns()[column].id.clone();
                self.table.set_filter(&id, &value);
            }
        }
    }

    /// Replaces the filter text with the first suggestion containing it.
    fn complete_filter(&mut self, now: Instant) {
        let Some(column) = self.filter_column else {
            return;
        };
        let typed = self.filter_input.get().input.to_lowercase();
        let suggestion = self
            .table
            .suggestions(column)
            .iter()
            .find(|s| s.to_lowercase().contains(&typed))
            .cloned();
        if let Some(value) = suggestion {
            trace!("Completing filter {typed:?} to {value:?}");
            self.filter_input.input(&value, now);
        }
    }

    fn teardown(&mut self) {
        self.blur_filter();
        self.filter_input.cancel();
        self.scheduler.shutdown();
    }
}

pub struct HeaderView {
    pub title: String,
    pub width: Option<u16>,
    pub sort: Option<SortDirection>,
    pub filter: String,
    pub suggestions: usize,
    pub status_column: bool,
}

pub struct UIData {
    pub name: String,
    pub search_text: String,
    pub headers: Vec<HeaderView>,
    pub rows: Vec<Vec<String>>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub page_index: usize,
    pub page_count: usize,
    pub total_results: usize,
    pub can_previous: bool,
    pub can_next: bool,
    pub can_clear_sorting: bool,
    pub can_clear_filters: bool,
    pub empty_message: Option<String>,
    pub suggestions: Vec<String>,
    pub record: Option<Vec<(String, String)>>,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub input_pending: bool,
    pub auto_refresh: bool,
    pub status_message: String,
    pub status_fresh: bool,
}

struct RecordView {
    page: usize,
    id: i64,
}

pub struct Model {
    config: TRConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    clock: Box<dyn Clock>,
    router: SharedRouter,
    pages: Vec<TablePage>,
    current: usize,
    fetcher: Fetcher,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    record_view: Option<RecordView>,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &TRConfig, screens: Vec<Screen>, clock: Box<dyn Clock>) -> Result<Self, TRError> {
        if screens.is_empty() {
            return Err(TRError::loading_failed("No screens configured"));
        }
        let router = Router::new(&config.location)?.shared();
        let now = clock.now();
        let initial_path = router.borrow().path().to_string();

        let current = match screens.iter().position(|s| s.path == initial_path) {
            Some(current) => current,
            None => {
                warn!("Unknown location {initial_path}, showing {}", screens[0].path);
                router.borrow_mut().navigate_to(screens[0].path, &[])?;
                0
            }
        };

        let pages: Vec<TablePage> = screens
            .into_iter()
            .enumerate()
            .map(|(idx, screen)| Self::build_page(config, &router, screen, idx == current, now))
            .collect();

        let mut model = Model {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            clock,
            router,
            pages,
            current,
            fetcher: Fetcher::new(),
            input: Inputter::default(),
            cmd_mode: None,
            record_view: None,
            status_message: String::new(),
            last_status_message_update: now,
        };
        model.set_status_message(format!("Started rtrack! {}", model.pages[current].name));
        Ok(model)
    }

    /// Performs the initial fetch. A failure shows an empty table rather than
    /// an error.
    fn build_page(
        config: &TRConfig,
        router: &SharedRouter,
        screen: Screen,
        active: bool,
        now: Instant,
    ) -> TablePage {
        let location = ScopedLocation::new(router.clone(), screen.path);
        let query = location.query_param(SEARCH_KEY).unwrap_or_default();
        let (records, empty_message) = match screen.source.fetch(&query) {
            Ok(records) => {
                let message = records.is_empty().then(|| NO_RESULTS.to_string());
                (records, message)
            }
            Err(e) => {
                error!("Initial fetch for {} failed: {e:?}", screen.name);
                (Vec::new(), Some(NO_RESULTS.to_string()))
            }
        };
        info!("{} starts with {} records", screen.name, records.len());

        let pager = Pager::new(Box::new(location), config.page_size);
        let table = TableController::new(screen.columns, records, pager)
            .with_sorting(screen.sorting)
            .with_detail_route(screen.detail_path, screen.detail_param);

        let mut scheduler = RefreshScheduler::new(config.refresh_interval);
        scheduler.restart(&query, now);
        if !active {
            scheduler.shutdown();
        }

        TablePage {
            name: screen.name,
            path: screen.path,
            table,
            source: screen.source,
            scheduler,
            filter_input: DebouncedInput::new(config.debounce),
            filter_column: None,
            curser_row: 0,
            curser_column: 0,
            empty_message,
        }
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn event_poll_time(&self) -> u64 {
        self.config.event_poll_time
    }

    pub fn quit(&mut self) {
        self.shutdown();
        self.status = Status::QUITTING;
    }

    /// Cancels every pending timer. Nothing fires after this.
    pub fn shutdown(&mut self) {
        for page in self.pages.iter_mut() {
            page.filter_input.cancel();
            page.scheduler.shutdown();
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = self.clock.now();
    }

    fn page(&self) -> &TablePage {
        &self.pages[self.current]
    }

    fn page_mut(&mut self) -> &mut TablePage {
        &mut self.pages[self.current]
    }

    pub fn update(&mut self, message: Message) -> Result<(), TRError> {
        trace!("Update: Modus {:?}, Message {:?}", self.modus, message);
        match self.modus {
            Modus::TABLE => match message {
                Message::Quit => self.quit(),
                Message::Help => self.show_help(),
                Message::MoveUp => self.move_selection_up(),
                Message::MoveDown => self.move_selection_down(),
                Message::MoveLeft => self.move_selection_left(),
                Message::MoveRight => self.move_selection_right(),
                Message::NextPage => self.change_page(TableController::next_page),
                Message::PreviousPage => self.change_page(TableController::previous_page),
                Message::FirstPage => self.change_page(TableController::first_page),
                Message::LastPage => self.change_page(TableController::last_page),
                Message::ToggleSort => self.toggle_sort(false),
                Message::ToggleSortChain => self.toggle_sort(true),
                Message::ClearSorting => self.clear_sorting(),
                Message::EditFilter => self.enter_cmd_mode(CMDMode::Filter),
                Message::ClearFilters => self.clear_filters(),
                Message::Search => self.enter_cmd_mode(CMDMode::Search),
                Message::Refresh => self.refresh_now(),
                Message::SwitchScreen => self.switch_screen()?,
                Message::Enter => self.activate_row()?,
                _ => (),
            },
            Modus::RECORD => match message {
                Message::Quit => self.quit(),
                Message::Help => self.show_help(),
                Message::Exit | Message::Enter => self.close_record(),
                _ => (),
            },
            Modus::POPUP => match message {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter => self.exit_popup(),
                _ => (),
            },
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = message {
                    self.raw_input(key)?
                }
            }
        }
        self.tick();
        Ok(())
    }

    /// Fires due timers and applies finished fetches.
    fn tick(&mut self) {
        if self.status == Status::QUITTING {
            return;
        }
        let now = self.clock.now();

        let page = &mut self.pages[self.current];
        if let Some(column) = page.filter_column {
            if let Some(value) = page.filter_input.poll(now) {
                let id = page.table.columns()[column].id.clone();
                page.table.set_filter(&id, &value);
                page.clamp_curser();
            }
        }

        for (idx, page) in self.pages.iter_mut().enumerate() {
            if let Some(request) = page.scheduler.poll(now) {
                debug!("Scheduled refresh of {}", page.name);
                self.fetcher.dispatch(idx, page.source.clone(), request);
            }
        }

        for result in self.fetcher.completed() {
            self.apply_fetch(result);
        }
    }

    pub fn apply_fetch(&mut self, result: FetchResult) {
        let Some(page) = self.pages.get_mut(result.table) else {
            error!("Fetch result for unknown table {}", result.table);
            return;
        };
        if !page.scheduler.accept(&result.request) {
            return;
        }
        match result.records {
            Ok(records) => {
                page.empty_message = records.is_empty().then(|| NO_RESULTS.to_string());
                if page.table.replace_records(records) {
                    page.clamp_curser();
                    info!("{} refreshed", page.name);
                }
            }
            Err(e) => warn!("Refresh of {} failed: {e:?}", page.name),
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn exit_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    fn move_selection_up(&mut self) {
        let page = self.page_mut();
        page.curser_row = page.curser_row.saturating_sub(1);
    }

    fn move_selection_down(&mut self) {
        let page = self.page_mut();
        page.curser_row += 1;
        page.clamp_curser();
    }

    fn move_selection_left(&mut self) {
        let page = self.page_mut();
        page.curser_column = page.curser_column.saturating_sub(1);
    }

    fn move_selection_right(&mut self) {
        let page = self.page_mut();
        if page.curser_column + 1 < page.table.columns().len() {
            page.curser_column += 1;
        }
    }

    fn change_page(&mut self, action: fn(&mut TableController)) {
        let page = self.page_mut();
        action(&mut page.table);
        page.clamp_curser();
        let state = page.table.page();
        let pages = page.table.page_count().max(1);
        self.set_status_message(format!("Page {} of {pages}", state.index + 1));
    }

    fn toggle_sort(&mut self, chain: bool) {
        let page = self.page_mut();
        let column = page.current_column().id.clone();
        if chain {
            page.table.toggle_sort_chain(&column);
        } else {
            page.table.toggle_sort(&column);
        }
    }

    fn clear_sorting(&mut self) {
        self.page_mut().table.reset_sorting();
        self.set_status_message("Sorting cleared");
    }

    fn clear_filters(&mut self) {
        let page = self.page_mut();
        page.filter_input.cancel();
        page.table.reset_filters();
        page.clamp_curser();
        self.set_status_message("Filters cleared");
    }

    fn refresh_now(&mut self) {
        let now = self.clock.now();
        let page = &mut self.pages[self.current];
        let request = page.scheduler.request_now(now);
        self.fetcher.dispatch(self.current, page.source.clone(), request);
        self.set_status_message("Refreshing ...");
    }

    fn switch_screen(&mut self) -> Result<(), TRError> {
        let next = (self.current + 1) % self.pages.len();
        if next == self.current {
            return Ok(());
        }
        self.page_mut().teardown();
        self.current = next;

        let page = self.page();
        let mut params = vec![(SEARCH_KEY, page.query().to_string())];
        params.push((PAGE_KEY, (page.table.page().index + 1).to_string()));
        self.router.borrow_mut().replace_to(page.path, &params)?;
        self.show_current_page();
        Ok(())
    }

    /// Re-arms the current page after it became visible again.
    fn show_current_page(&mut self) {
        let now = self.clock.now();
        let page = &mut self.pages[self.current];
        page.table.sync_page_from_location();
        page.clamp_curser();
        let query = page.query().to_string();
        page.scheduler.restart(&query, now);
        let request = page.scheduler.request_now(now);
        self.fetcher.dispatch(self.current, page.source.clone(), request);
        let name = page.name;
        self.set_status_message(name);
    }

    fn activate_row(&mut self) -> Result<(), TRError> {
        let page = &self.pages[self.current];
        let activated = page
            .table
            .activate(page.curser_row, &mut *self.router.borrow_mut())?;
        if let Some(id) = activated {
            debug!("Opening record {id} of {}", page.name);
            self.page_mut().teardown();
            self.record_view = Some(RecordView {
                page: self.current,
                id,
            });
            self.previous_modus = self.modus;
            self.modus = Modus::RECORD;
        }
        Ok(())
    }

    fn close_record(&mut self) {
        self.record_view = None;
        {
            let mut router = self.router.borrow_mut();
            if !router.back() {
                warn!("Record view without a list to return to");
            }
            trace!("History depth is {}", router.depth());
        }
        self.previous_modus = Modus::RECORD;
        self.modus = Modus::TABLE;
        self.show_current_page();
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        match mode {
            CMDMode::Filter => {
                let page = self.page_mut();
                let column = page.current_column().id.clone();
                let value = page.table.filter_value(&column).to_string();
                page.filter_input.load(&value);
                page.filter_column = Some(page.curser_column);
            }
            CMDMode::Search => {
                self.input.clear();
                let query = self.page().query().to_string();
                self.input.set(&query);
            }
        }
    }

    fn leave_cmd_mode(&mut self) {
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        self.cmd_mode = None;
    }

    fn raw_input(&mut self, key: KeyEvent) -> Result<(), TRError> {
        match self.cmd_mode {
            Some(CMDMode::Filter) => {
                let now = self.clock.now();
                let page = self.page_mut();
                if key.code == KeyCode::Tab {
                    page.complete_filter(now);
                    return Ok(());
                }
                let result = page.filter_input.read(key, now);
                if result.finished {
                    page.blur_filter();
                    page.clamp_curser();
                    self.leave_cmd_mode();
                }
            }
            Some(CMDMode::Search) => {
                let result = self.input.read(key);
                if result.finished {
                    self.leave_cmd_mode();
                    if !result.canceled {
                        self.search(result.input.trim())?;
                    }
                }
            }
            None => {
                info!("Cmd mode is none!");
                self.leave_cmd_mode();
            }
        }
        Ok(())
    }

    /// Runs a new search on the current screen. Like submitting the search
    /// form, this starts a new history entry without a page parameter.
    fn search(&mut self, query: &str) -> Result<(), TRError> {
        info!("Searching {} for {query:?}", self.page().name);
        let path = self.page().path;
        self.router
            .borrow_mut()
            .navigate_to(path, &[(SEARCH_KEY, query.to_string())])?;
        let now = self.clock.now();
        let page = self.page_mut();
        page.table.first_page();
        page.curser_row = 0;
        page.scheduler.restart(query, now);
        let request = page.scheduler.request_now(now);
        let source = page.source.clone();
        self.fetcher.dispatch(self.current, source, request);
        self.set_status_message(format!("Searching for \"{query}\" ..."));
        Ok(())
    }

    // -------------------- View data ---------------------- //

    fn record_fields(record: &Record) -> Vec<(String, String)> {
        let mut fields = vec![("id".to_string(), record.id().to_string())];
        fields.extend(record.fields().map(|(name, value)| {
            let value = match value {
                FieldValue::Text(s) => s.clone(),
                FieldValue::Bool(b) => b.to_string(),
                FieldValue::Date(d) => d.format("%b %-d, %Y %H:%M").to_string(),
                FieldValue::Int(i) => i.to_string(),
                FieldValue::Missing => String::new(),
            };
            (name.clone(), value)
        }));
        fields
    }

    pub fn get_uidata(&self) -> UIData {
        let page = self.page();
        let table = &page.table;

        let headers = table
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let editing = page.filter_column == Some(idx) && self.modus == Modus::CMDINPUT;
                HeaderView {
                    title: column.title.clone(),
                    width: column.width,
                    sort: table.sort_direction(&column.id),
                    filter: if editing {
                        page.filter_input.get().input
                    } else {
                        table.filter_value(&column.id).to_string()
                    },
                    suggestions: table.suggestions(idx).len(),
                    status_column: column.formatter == Formatter::BoolStatus,
                }
            })
            .collect();

        let rows = table
            .visible_rows()
            .map(|(_, cells)| cells.iter().map(|c| c.display.clone()).collect())
            .collect();

        let record = self.record_view.as_ref().and_then(|view| {
            self.pages[view.page]
                .table
                .record(view.id)
                .map(Self::record_fields)
        });

        let (cmdinput, suggestions) = match self.cmd_mode {
            Some(CMDMode::Filter) => (
                page.filter_input.get(),
                page.filter_column
                    .map(|c| table.suggestions(c).to_vec())
                    .unwrap_or_default(),
            ),
            Some(CMDMode::Search) => (self.input.get(), Vec::new()),
            None => (InputResult::default(), Vec::new()),
        };

        UIData {
            name: page.name.to_string(),
            search_text: page.query().to_string(),
            headers,
            rows,
            selected_row: page.curser_row,
            selected_column: page.curser_column,
            page_index: table.page().index,
            page_count: table.page_count(),
            total_results: table.filtered_count(),
            can_previous: table.can_previous(),
            can_next: table.can_next(),
            can_clear_sorting: !table.sorting().is_empty(),
            can_clear_filters: !table.filters().is_empty(),
            empty_message: page.empty_message.clone(),
            suggestions,
            record,
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            cmdinput,
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.modus == Modus::CMDINPUT,
            input_pending: page.filter_column.is_some() && page.filter_input.is_pending(),
            auto_refresh: page.scheduler.is_running(),
            status_message: self.status_message.clone(),
            status_fresh: self.clock.now().duration_since(self.last_status_message_update)
                < STATUS_MESSAGE_TIMEOUT,
        }
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        self.shutdown();
    }
}
