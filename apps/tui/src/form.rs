//! The research form: query input, status line, final answer, and an
//! expandable list of sources.

use crossterm::event::{KeyCode, KeyModifiers};
use deepresearch_core::validate_query;
use deepresearch_shared::{CONTENT_PREVIEW_CHARS, DeepResearchError, PipelineState, Result};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::widgets::{Severity, status_line};

/// Shown while a query is running.
pub(crate) const RESEARCHING: &str = "Researching... This may take a moment.";

/// Which part of the form receives key presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Query,
    Sources,
}

/// What the app loop should do after a key press.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum FormAction {
    None,
    /// Run the pipeline for this query, as typed.
    Submit(String),
}

pub(crate) struct ResearchForm {
    query: String,
    focus: Focus,
    status: String,
    severity: Severity,
    result: Option<PipelineState>,
    selected: usize,
    expanded: Vec<bool>,
}

impl ResearchForm {
    pub(crate) fn new() -> Self {
        Self {
            query: String::new(),
            focus: Focus::Query,
            status: "Enter a research query and press Enter.".to_string(),
            severity: Severity::Info,
            result: None,
            selected: 0,
            expanded: Vec::new(),
        }
    }

    pub(crate) fn is_editing(&self) -> bool {
        self.focus == Focus::Query
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> FormAction {
        match self.focus {
            Focus::Query => match code {
                KeyCode::Enter => return self.submit(),
                KeyCode::Backspace => {
                    self.query.pop();
                }
                KeyCode::Tab | KeyCode::Esc if self.has_sources() => {
                    self.focus = Focus::Sources;
                }
                KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => {
                    self.query.push(c);
                }
                _ => {}
            },
            Focus::Sources => match code {
                KeyCode::Up | KeyCode::Char('k') => {
                    self.selected = self.selected.saturating_sub(1);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    if self.selected + 1 < self.expanded.len() {
                        self.selected += 1;
                    }
                }
                KeyCode::Enter | KeyCode::Char(' ') => {
                    if let Some(open) = self.expanded.get_mut(self.selected) {
                        *open = !*open;
                    }
                }
                KeyCode::Tab | KeyCode::Char('/') | KeyCode::Char('i') => {
                    self.focus = Focus::Query;
                }
                _ => {}
            },
        }
        FormAction::None
    }

    /// Validate the query. A blank query only produces a warning.
    fn submit(&mut self) -> FormAction {
        match validate_query(&self.query) {
            Ok(_) => {
                self.set_status(Severity::Info, RESEARCHING);
                FormAction::Submit(self.query.clone())
            }
            Err(DeepResearchError::Validation { message }) => {
                self.set_status(Severity::Warning, message);
                FormAction::None
            }
            Err(e) => {
                self.set_status(Severity::Error, e.to_string());
                FormAction::None
            }
        }
    }

    /// Show the result of a run. A failure clears any earlier result.
    pub(crate) fn apply_outcome(&mut self, outcome: Result<PipelineState>) {
        match outcome {
            Ok(state) => {
                let sources = state.research_items().len();
                self.expanded = vec![false; sources];
                self.selected = 0;
                self.result = Some(state);
                self.set_status(
                    Severity::Info,
                    format!("Done: {sources} source(s). Tab to browse sources."),
                );
            }
            Err(e) => {
                self.result = None;
                self.expanded.clear();
                self.selected = 0;
                self.focus = Focus::Query;
                self.set_status(Severity::Error, format!("An error occurred: {e}"));
            }
        }
    }

    fn has_sources(&self) -> bool {
        !self.expanded.is_empty()
    }

    fn set_status(&mut self, severity: Severity, msg: impl Into<String>) {
        self.severity = severity;
        self.status = msg.into();
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),      // Query input
                Constraint::Length(1),      // Status
                Constraint::Percentage(35), // Final answer
                Constraint::Min(3),         // Sources
            ])
            .split(area);

        // Query field
        let query_style = if self.focus == Focus::Query {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let query_block = Block::default()
            .borders(Borders::ALL)
            .title(" Enter your research query ")
            .border_style(query_style);
        let query_text = if self.query.is_empty() && self.focus == Focus::Query {
            Paragraph::new("e.g., What are the latest advancements in AI for healthcare?")
                .style(Style::default().fg(Color::DarkGray))
        } else {
            Paragraph::new(self.query.as_str())
        };
        f.render_widget(query_text.block(query_block), chunks[0]);

        f.render_widget(status_line(&self.status, self.severity), chunks[1]);

        // Final answer
        let answer = self
            .result
            .as_ref()
            .and_then(|s| s.final_answer.as_deref())
            .unwrap_or_default();
        let answer_p = Paragraph::new(answer)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title(" Final Answer "));
        f.render_widget(answer_p, chunks[2]);

        // Sources
        let sources_style = if self.focus == Focus::Sources {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let (lines, selected_line) = self.source_lines();
        let visible = chunks[3].height.saturating_sub(2) as usize;
        let scroll = selected_line.saturating_sub(visible.saturating_sub(1));
        let sources_p = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((scroll as u16, 0))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Research Data (↑/↓ select · Space expand) ")
                    .border_style(sources_style),
            );
        f.render_widget(sources_p, chunks[3]);
    }

    /// Lines for the sources panel, plus the line index of the selected header.
    fn source_lines(&self) -> (Vec<Line<'_>>, usize) {
        let mut lines = Vec::new();
        let mut selected_line = 0;

        for (i, item) in self
            .result
            .as_ref()
            .map(PipelineState::research_items)
            .unwrap_or_default()
            .iter()
            .enumerate()
        {
            let open = self.expanded.get(i).copied().unwrap_or(false);
            let is_selected = i == self.selected && self.focus == Focus::Sources;
            if i == self.selected {
                selected_line = lines.len();
            }

            let marker = if open { "▾" } else { "▸" };
            let header_style = if is_selected {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            };
            lines.push(Line::styled(
                format!("{marker} Source: {}", item.url),
                header_style,
            ));

            if open {
                let (preview, truncated) = item.content_preview(CONTENT_PREVIEW_CHARS);
                let ellipsis = if truncated { "..." } else { "" };
                lines.push(Line::from(vec![
                    Span::styled("  Summary: ", Style::default().add_modifier(Modifier::BOLD)),
                    Span::raw(item.summary.as_str()),
                ]));
                lines.push(Line::from(vec![
                    Span::styled("  Content: ", Style::default().add_modifier(Modifier::BOLD)),
                    Span::raw(format!("{preview}{ellipsis} [Read more]({})", item.url)),
                ]));
                lines.push(Line::from(""));
            }
        }

        (lines, selected_line)
    }
}
