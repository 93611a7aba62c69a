mod format;
mod overlay;
mod views;

use crate::app::{App, Mode, Screen};
use crate::event::NoticeLevel;
use midas::models::money::format_grouped;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  draw_header(frame, chunks[0], app);

  let content = if app.details().is_some() {
    let split = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
      .split(chunks[1]);
    if let Some(details) = app.details() {
      overlay::draw_details(frame, split[1], details, app);
    }
    split[0]
  } else {
    chunks[1]
  };

  match app.screen() {
    Screen::Transactions => views::transactions::draw(frame, content, app),
    Screen::Limits => views::limits::draw(frame, content, app),
  }

  match app.mode() {
    Mode::Command => overlay::draw_command_overlay(
      frame,
      chunks[1],
      app.command_input(),
      &app.autocomplete_suggestions(),
      app.selected_suggestion(),
    ),
    Mode::Form => {
      if let Some(form) = app.form() {
        overlay::draw_form(frame, chunks[1], form);
      }
    }
    Mode::Normal | Mode::Search => {}
  }

  draw_status_bar(frame, chunks[2], app);
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
  let separator = || Span::styled("│", Style::default().fg(Color::DarkGray));
  let mut spans = vec![
    Span::styled(" midas ", Style::default().fg(Color::Cyan).bold()),
    separator(),
    Span::styled(
      format!(" {} ", format::host(app.api_url())),
      Style::default().fg(Color::White),
    ),
    separator(),
    Span::styled(
      format!(" {} ", app.period().label()),
      Style::default().fg(Color::Yellow).bold(),
    ),
    separator(),
  ];

  match app.balance() {
    Some(balance) => {
      spans.push(Span::styled(
        format!(" +{} ", format_grouped(balance.total_income)),
        Style::default().fg(Color::Green),
      ));
      spans.push(Span::styled(
        format!("-{} ", format_grouped(balance.total_expense)),
        Style::default().fg(Color::Red),
      ));
      spans.push(Span::styled(
        format!("= {} ", format_grouped(balance.balance)),
        Style::default().fg(format::signed_color(balance.balance)).bold(),
      ));
    }
    None => spans.push(Span::styled(" balance … ", Style::default().fg(Color::DarkGray))),
  }

  if let Some(debt) = app.debt() {
    spans.push(separator());
    spans.push(Span::styled(
      format!(" debts {} ", format_grouped(debt.net())),
      Style::default().fg(format::signed_color(debt.net())),
    ));
  }

  if app.is_loading() {
    spans.push(Span::styled(" ⟳", Style::default().fg(Color::Yellow)));
  } else if app.is_stale() {
    spans.push(Span::styled(" (cached)", Style::default().fg(Color::DarkGray)));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  let (content, style) = match app.mode() {
    Mode::Search => (
      format!("/{}_", app.search_input()),
      Style::default().fg(Color::Cyan),
    ),
    Mode::Command => (
      format!(":{}", app.command_input()),
      Style::default().fg(Color::Yellow),
    ),
    Mode::Form => (
      " Tab:next field  Enter:save  Esc:cancel".to_string(),
      Style::default().fg(Color::DarkGray),
    ),
    Mode::Normal => match app.notice() {
      Some(notice) => (format!(" {}", notice.message), notice_style(notice.level)),
      None => (hints(app).to_string(), Style::default().fg(Color::DarkGray)),
    },
  };

  frame.render_widget(Paragraph::new(content).style(style), area);
}

fn hints(app: &App) -> &'static str {
  match app.screen() {
    Screen::Transactions if app.marking() => {
      " space:mark  a:mark all  d:delete marked  v/Esc:done"
    }
    Screen::Transactions => {
      " :command  /search  [/]:month  n:new  e:edit  d:delete  v:select  m:more  q:quit"
    }
    Screen::Limits => " :command  [/]:month  n:new  e:edit  d:delete  q:quit",
  }
}

fn notice_style(level: NoticeLevel) -> Style {
  match level {
    NoticeLevel::Info => Style::default().fg(Color::Green),
    NoticeLevel::Warning => Style::default().fg(Color::Yellow),
    NoticeLevel::Error => Style::default().fg(Color::Red).bold(),
  }
}
