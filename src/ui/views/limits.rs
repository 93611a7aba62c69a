use crate::app::App;
use crate::ui::format::{truncate, usage_color};
use midas::models::money::format_grouped;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use rust_decimal::prelude::ToPrimitive;

const BAR_WIDTH: usize = 20;

pub fn draw(frame: &mut Frame, area: Rect, app: &App) {
  let usage = app.limit_usage();
  let block = Block::default()
    .borders(Borders::ALL)
    .title(format!(" Limits [{}] ", app.period().label()))
    .border_style(Style::default().fg(Color::Cyan));

  if usage.is_empty() {
    let message = if app.is_loading() {
      "Loading..."
    } else {
      "No limits for this period. Press n to add one."
    };
    let paragraph = Paragraph::new(message)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = usage
    .iter()
    .map(|u| {
      let color = usage_color(u.percent);
      let percent = u
        .percent
        .map(|p| format!("{:>6}%", p))
        .unwrap_or_else(|| "     -".to_string());
      let line = Line::from(vec![
        Span::styled(
          format!("{:<20}", truncate(&u.limit.label(), 20)),
          Style::default().fg(Color::White),
        ),
        Span::styled(bar(u.percent), Style::default().fg(color)),
        Span::styled(percent, Style::default().fg(color).bold()),
        Span::styled(
          format!(
            "  {} / {}",
            format_grouped(u.spent),
            format_grouped(u.limit.amount.value())
          ),
          Style::default().fg(Color::DarkGray),
        ),
        if u.exceeded() {
          Span::styled("  over", Style::default().fg(Color::Red).bold())
        } else {
          Span::raw("")
        },
      ]);
      ListItem::new(line)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut state = ListState::default();
  state.select(Some(app.selected()));
  frame.render_stateful_widget(list, area, &mut state);
}

fn bar(percent: Option<rust_decimal::Decimal>) -> String {
  let filled = percent
    .and_then(|p| p.to_f64())
    .map(|p| ((p / 100.0) * BAR_WIDTH as f64).round().clamp(0.0, BAR_WIDTH as f64) as usize)
    .unwrap_or(0);
  format!(" [{}{}]", "█".repeat(filled), " ".repeat(BAR_WIDTH - filled))
}
