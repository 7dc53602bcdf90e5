use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::CMDMode;
use crate::model::{Model, UIData};
use crate::projector::COMPLETED_LABEL;
use crate::table::SortDirection;

const MAX_SUGGESTIONS: usize = 8;

#[derive(Default)]
pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let data = model.get_uidata();

        let [title, body, footer, status] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        Self::draw_title(&data, frame, title);
        match &data.record {
            Some(fields) => Self::draw_record(fields, frame, body),
            None => {
                self.draw_table(&data, frame, body);
                if data.cmd_mode == Some(CMDMode::Filter) {
                    Self::draw_suggestions(&data, frame, body);
                }
            }
        }
        Self::draw_footer(&data, frame, footer);
        Self::draw_status(&data, frame, status);

        if data.show_popup {
            Self::draw_popup(&data, frame);
        }
    }

    fn draw_title(data: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans = vec![format!(" {} ", data.name).bold().reversed()];
        if data.auto_refresh {
            spans.push(" ⟳".green());
        }
        if !data.search_text.is_empty() {
            spans.push("  search: ".dim());
            spans.push(data.search_text.clone().yellow());
        }
        frame.render_widget(Line::from(spans), area);
    }

    fn sort_mark(sort: Option<SortDirection>) -> &'static str {
        match sort {
            Some(SortDirection::Ascending) => " ↑",
            Some(SortDirection::Descending) => " ↓",
            None => " ↕",
        }
    }

    fn draw_table(&mut self, data: &UIData, frame: &mut Frame, area: Rect) {
        let header = Row::new(data.headers.iter().map(|h| {
            let filter = if h.filter.is_empty() {
                format!("filter ({})", h.suggestions).dim()
            } else {
                h.filter.clone().yellow()
            };
            Cell::from(Text::from(vec![
                Line::from(vec![h.title.clone().bold(), Span::raw(Self::sort_mark(h.sort))]),
                Line::from(filter),
            ]))
        }))
        .height(2)
        .bottom_margin(1);

        let widths: Vec<Constraint> = data
            .headers
            .iter()
            .map(|h| match h.width {
                Some(w) => Constraint::Length(w),
                None => Constraint::Fill(1),
            })
            .collect();

        let block = Block::default().borders(Borders::TOP | Borders::BOTTOM);
        if data.rows.is_empty() {
            let message = data.empty_message.as_deref().unwrap_or("Nothing to show");
            let inner = block.inner(area);
            frame.render_widget(block, area);
            let [head, rest] =
                Layout::vertical([Constraint::Length(3), Constraint::Min(1)]).areas(inner);
            frame.render_widget(Table::new(Vec::<Row>::new(), widths).header(header), head);
            frame.render_widget(Paragraph::new(message.italic()).centered(), rest);
            return;
        }

        let rows = data.rows.iter().map(|row| {
            Row::new(row.iter().zip(data.headers.iter()).map(|(value, h)| {
                if !h.status_column {
                    return Cell::from(value.as_str());
                }
                if value == COMPLETED_LABEL {
                    Cell::from("✔").style(Style::default().fg(Color::Green))
                } else if value.is_empty() {
                    Cell::from("")
                } else {
                    Cell::from("○").style(Style::default().fg(Color::Yellow))
                }
            }))
        });

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .column_spacing(1)
            .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
            .column_highlight_style(Style::default().add_modifier(Modifier::UNDERLINED))
            .highlight_symbol("> ");

        self.table_state.select(Some(data.selected_row));
        self.table_state.select_column(Some(data.selected_column));
        frame.render_stateful_widget(table, area, &mut self.table_state);
    }

    /// Unique values of the column being filtered, shown below its header.
    fn draw_suggestions(data: &UIData, frame: &mut Frame, area: Rect) {
        let needle = data.cmdinput.input.to_lowercase();
        let items: Vec<ListItem> = data
            .suggestions
            .iter()
            .filter(|s| s.to_lowercase().contains(&needle))
            .take(MAX_SUGGESTIONS)
            .map(|s| ListItem::new(s.as_str()))
            .collect();
        if items.is_empty() {
            return;
        }
        let height = items.len() as u16 + 2;
        let x = area.x + (data.selected_column as u16 * 12).min(area.width.saturating_sub(30));
        let popup = Rect::new(x, area.y + 4, 30.min(area.width), height.min(area.height.saturating_sub(4)));
        frame.render_widget(Clear, popup);
        frame.render_widget(
            List::new(items).block(Block::bordered().title(" suggestions ".dim())),
            popup,
        );
    }

    fn draw_record(fields: &[(String, String)], frame: &mut Frame, area: Rect) {
        let id = fields
            .iter()
            .find(|(name, _)| name == "id")
            .map(|(_, v)| v.as_str())
            .unwrap_or_default();
        let rows = fields
            .iter()
            .map(|(name, value)| Row::new(vec![Cell::from(name.as_str().bold()), Cell::from(value.as_str())]));
        let table = Table::new(rows, [Constraint::Length(16), Constraint::Fill(1)])
            .block(Block::bordered().title(format!(" Record {id} ")))
            .column_spacing(2);
        frame.render_widget(table, area);
    }

    fn hint(label: &'static str, key: &'static str, enabled: bool) -> Vec<Span<'static>> {
        let style = if enabled {
            Style::default()
        } else {
            Style::default().add_modifier(Modifier::DIM)
        };
        vec![
            Span::styled(format!(" {label} "), style),
            Span::styled(format!("<{key}>"), style.fg(Color::Blue).add_modifier(Modifier::BOLD)),
        ]
    }

    fn draw_footer(data: &UIData, frame: &mut Frame, area: Rect) {
        let noun = if data.total_results == 1 { "result" } else { "results" };
        let mut spans = vec![Span::raw(format!(
            " Page {} of {} [{} total {noun}] ",
            data.page_index + 1,
            data.page_count.max(1),
            data.total_results
        ))];
        spans.extend(Self::hint("Previous", "p", data.can_previous));
        spans.extend(Self::hint("Next", "n", data.can_next));
        spans.extend(Self::hint("Clear Sorting", "c", data.can_clear_sorting));
        spans.extend(Self::hint("Refresh", "r", true));
        spans.extend(Self::hint("Clear Filters", "F", data.can_clear_filters));
        frame.render_widget(Line::from(spans), area);
    }

    fn draw_status(data: &UIData, frame: &mut Frame, area: Rect) {
        if data.active_cmdinput {
            let prompt = match data.cmd_mode {
                Some(CMDMode::Filter) => "filter: ",
                Some(CMDMode::Search) => "search: ",
                None => "",
            };
            let mut spans = vec![prompt.bold(), Span::raw(data.cmdinput.input.clone())];
            if data.input_pending {
                spans.push(" …".dim());
            }
            let line = Line::from(spans);
            frame.render_widget(line, area);
            let x = area.x + (prompt.len() + data.cmdinput.curser_pos) as u16;
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
            return;
        }
        let message = if data.status_fresh {
            data.status_message.clone().italic()
        } else {
            data.status_message.clone().dim()
        };
        frame.render_widget(Line::from(vec![Span::raw(" "), message, " ? help".dim()]), area);
    }

    fn centered(area: Rect, width: u16, height: u16) -> Rect {
        let [area] = Layout::horizontal([Constraint::Percentage(width)])
            .flex(Flex::Center)
            .areas(area);
        let [area] = Layout::vertical([Constraint::Percentage(height)])
            .flex(Flex::Center)
            .areas(area);
        area
    }

    fn draw_popup(data: &UIData, frame: &mut Frame) {
        let area = Self::centered(frame.area(), 60, 70);
        frame.render_widget(Clear, area);
        let popup = Paragraph::new(data.popup_message.as_str())
            .block(Block::bordered().title(" Help ".bold()).title_bottom(" <Esc> close ".dim()))
            .wrap(Wrap { trim: false });
        frame.render_widget(popup, area);
    }
}
