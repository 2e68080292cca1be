use std::time::Duration;

use chrono::Local;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::HELP_TEXT;
use crate::engine::{PageSlice, SortDirection, SortKey};
use crate::model::{Model, Modus};
use crate::realtime::LogLevel;
use crate::record::LinkStatus;

pub const HEADER_HEIGHT: u16 = 1;
pub const SUMMARY_HEIGHT: u16 = 4;
pub const CHARTDATA_HEIGHT: u16 = 2;
pub const CMDLINE_HEIGHT: u16 = 1;
pub const LOG_PANEL_HEIGHT: u16 = 12;
const URL_DISPLAY_WIDTH: usize = 50;
const SEARCH_PROMPT: &str = "search: ";
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(5);

#[derive(Default)]
pub struct DashboardUI {
    table_state: TableState,
}

impl DashboardUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let log_height = if model.logs().visible() { LOG_PANEL_HEIGHT } else { 0 };
        let [header, summary, chartdata, table, logs, cmdline] = Layout::vertical([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Length(SUMMARY_HEIGHT),
            Constraint::Length(CHARTDATA_HEIGHT),
            Constraint::Min(5),
            Constraint::Length(log_height),
            Constraint::Length(CMDLINE_HEIGHT),
        ])
        .areas(frame.area());

        Self::draw_header(model, frame, header);
        Self::draw_summary(model, frame, summary);
        Self::draw_chartdata(model, frame, chartdata);
        self.draw_table(model, frame, table);
        if model.logs().visible() {
            Self::draw_logs(model, frame, logs);
        }
        Self::draw_cmdline(model, frame, cmdline);

        if model.modus() == Modus::Help {
            Self::draw_popup(frame, HELP_TEXT);
        }
    }

    fn draw_header(model: &Model, frame: &mut Frame, area: Rect) {
        let updated = model
            .last_update()
            .map(|t| t.format("%d/%m/%Y %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        let mut spans = vec![
            " Link monitor ".bold().reversed(),
            format!("  {}", Local::now().format("%H:%M:%S")).into(),
            format!("  updated: {updated}").dark_gray(),
        ];
        if model.busy() {
            spans.push("  fetching…".yellow());
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_summary(model: &Model, frame: &mut Frame, area: Rect) {
        let s = model.summary();
        let next = model
            .next_check()
            .map(|t| format!("next: {}", t.format("%H:%M")))
            .unwrap_or_default();
        let cards = [
            ("Total links", s.total_links.to_string(), String::new(), Color::Cyan),
            ("Status 200", s.success.to_string(), format!("{}%", s.success_percent), Color::Green),
            ("Errors", s.errors.to_string(), format!("{}%", s.error_percent), Color::Red),
            ("Last check", s.last_check.clone(), next, Color::Blue),
        ];
        let areas = Layout::horizontal([Constraint::Ratio(1, 4); 4]).split(area);
        for ((title, value, detail, color), area) in cards.into_iter().zip(areas.iter()) {
            let text = vec![
                Line::from(Span::styled(value, Style::default().fg(color).add_modifier(Modifier::BOLD))),
                Line::from(detail.dark_gray()),
            ];
            frame.render_widget(Paragraph::new(text).block(Block::bordered().title(title)), *area);
        }
    }

    fn draw_chartdata(model: &Model, frame: &mut Frame, area: Rect) {
        let b = model.breakdown();
        let health = Line::from(vec![
            " Health  ".bold(),
            format!("healthy {}  ", b.healthy).green(),
            format!("warnings {}  ", b.warning).yellow(),
            format!("errors {}", b.error).red(),
        ]);

        let mut codes = vec![" Codes   ".bold()];
        for (status, count) in model.histogram() {
            codes.push(Span::styled(format!("{status}: {count}  "), Style::default().fg(status_color(status))));
        }
        frame.render_widget(Paragraph::new(vec![health, Line::from(codes)]), area);
    }

    fn draw_table(&mut self, model: &Model, frame: &mut Frame, area: Rect) {
        let engine = model.engine();
        let slice = engine.page_slice();

        let header = Row::new(SortKey::ALL.iter().enumerate().map(|(i, key)| {
            let marker = if engine.sort_key() == Some(*key) {
                match engine.sort_direction() {
                    SortDirection::Ascending => " ▲",
                    SortDirection::Descending => " ▼",
                }
            } else {
                ""
            };
            Cell::from(format!("{} {}{}", i + 1, key.title(), marker))
        }))
        .style(Style::default().add_modifier(Modifier::BOLD))
        .bottom_margin(1);

        let rows = slice.records.iter().map(|r| {
            Row::new(vec![
                Cell::from(truncate_url(&r.url)),
                Cell::from(status_label(&r.status)).style(Style::default().fg(status_color(&r.status))),
                flag_cell(r.layout_ok),
                flag_cell(r.pattern_ok),
                Cell::from(r.timestamp.clone()),
            ])
        });

        let widths = [
            Constraint::Min(30),
            Constraint::Length(10),
            Constraint::Length(13),
            Constraint::Length(14),
            Constraint::Length(21),
        ];

        let title = if engine.is_empty() && model.last_update().is_none() {
            " Links (waiting for data) ".to_string()
        } else if engine.filter_term().is_empty() {
            " Links ".to_string()
        } else {
            format!(" Links matching \"{}\" ", engine.filter_term())
        };
        let table = Table::new(rows, widths)
            .header(header)
            .block(
                Block::bordered()
                    .title(title)
                    .title_bottom(Line::from(pagination_label(&slice)).centered()),
            )
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

        let selected = (!slice.records.is_empty()).then_some(model.selected_row());
        self.table_state.select(selected);
        frame.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn draw_logs(model: &Model, frame: &mut Frame, area: Rect) {
        let logs = model.logs();
        let mut lines: Vec<Line> = logs
            .history()
            .iter()
            .map(|l| Line::from(l.as_str().dark_gray()))
            .collect();
        lines.extend(
            logs.entries()
                .iter()
                .map(|e| Line::from(Span::styled(e.line(), Style::default().fg(level_color(e.level))))),
        );

        // Keep the newest lines in view unless the user scrolled up
        let inner_height = area.height.saturating_sub(2) as usize;
        let end = lines.len().saturating_sub(logs.scroll());
        let begin = end.saturating_sub(inner_height);
        let visible: Vec<Line> = lines.drain(begin..end).collect();

        frame.render_widget(
            Paragraph::new(visible).block(Block::bordered().title(" Logs ")),
            area,
        );
    }

    fn draw_cmdline(model: &Model, frame: &mut Frame, area: Rect) {
        let line = if model.modus() == Modus::Search {
            let input = model.search_input();
            frame.set_cursor_position((search_cursor_x(area, input.cursor_pos), area.y));
            Line::from(vec![SEARCH_PROMPT.bold(), input.input.clone().into()])
        } else {
            let (message, at) = model.status_message();
            if at.elapsed() < STATUS_MESSAGE_TTL && !message.is_empty() {
                Line::from(message.to_string())
            } else if let Some(entry) = model.logs().last() {
                Line::from(Span::styled(entry.line(), Style::default().fg(level_color(entry.level))))
            } else {
                Line::from("? for help".dark_gray())
            }
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_popup(frame: &mut Frame, text: &str) {
        let area = centered(frame.area(), 64, text.lines().count() as u16 + 2);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(text)
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(" Help ").title_bottom(Line::from(" Esc ").centered())),
            area,
        );
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Column of the search cursor, kept inside the command line.
fn search_cursor_x(area: Rect, cursor_pos: usize) -> u16 {
    let offset = u16::try_from(cursor_pos).unwrap_or(u16::MAX);
    area.x
        .saturating_add(SEARCH_PROMPT.len() as u16)
        .saturating_add(offset)
        .min(area.right().saturating_sub(1))
}

fn flag_cell(ok: bool) -> Cell<'static> {
    let (label, color) = if ok { ("Yes", Color::Green) } else { ("No", Color::Red) };
    Cell::from(label).style(Style::default().fg(color))
}

pub fn truncate_url(url: &str) -> String {
    if url.chars().count() > URL_DISPLAY_WIDTH {
        let mut short: String = url.chars().take(URL_DISPLAY_WIDTH).collect();
        short.push_str("...");
        short
    } else {
        url.to_string()
    }
}

pub fn status_label(status: &LinkStatus) -> String {
    match status {
        LinkStatus::Success => "200 OK".to_string(),
        LinkStatus::Error => "Error".to_string(),
        LinkStatus::Other(code) => code.to_string(),
    }
}

fn status_color(status: &LinkStatus) -> Color {
    match status {
        LinkStatus::Success => Color::Green,
        LinkStatus::Error => Color::Red,
        LinkStatus::Other(_) => Color::Yellow,
    }
}

fn level_color(level: LogLevel) -> Color {
    match level {
        LogLevel::Info => Color::Gray,
        LogLevel::Success => Color::Green,
        LogLevel::Warning => Color::Yellow,
        LogLevel::Error => Color::Red,
    }
}

/// An empty working set is reported as "No matching links" rather than
/// "page 1 of 0".
pub fn pagination_label(slice: &PageSlice) -> String {
    if slice.total_pages == 0 {
        " No matching links ".to_string()
    } else {
        format!(
            " Page {} of {} ({} links) ",
            slice.current_page, slice.total_pages, slice.matching
        )
    }
}
