use crate::app::App;
use crate::ui::format::{signed_color, truncate};
use midas::models::money::format_grouped;
use midas::models::Transaction;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw(frame: &mut Frame, area: Rect, app: &App) {
  let groups = app.groups();

  let mut title = format!(" Transactions [{}] ", app.period().label());
  if let Some(search) = app.search() {
    title.push_str(&format!("/{}/ ", search));
  }
  if app.marking() {
    title.push_str(&format!("· {} marked ", app.marked_count()));
  }
  let block = Block::default()
    .borders(Borders::ALL)
    .title(title)
    .border_style(Style::default().fg(Color::Cyan));

  if groups.is_empty() {
    let message = if app.is_loading() {
      "Loading..."
    } else {
      "No transactions for this period"
    };
    let paragraph = Paragraph::new(message)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let mut items = Vec::new();
  let mut highlighted = None;
  let mut row = 0;
  for group in &groups {
    let day_total: rust_decimal::Decimal = group.items.iter().map(|t| t.signed_amount()).sum();
    items.push(ListItem::new(Line::from(vec![
      Span::styled(
        group.date.format("%a %d %b").to_string(),
        Style::default().fg(Color::Yellow).bold(),
      ),
      Span::styled(
        format!("  {}", format_grouped(day_total)),
        Style::default().fg(Color::DarkGray),
      ),
    ])));

    for transaction in &group.items {
      if row == app.selected() {
        highlighted = Some(items.len());
      }
      items.push(ListItem::new(row_line(app, transaction)));
      row += 1;
    }
  }

  if app.has_more() {
    items.push(ListItem::new(Span::styled(
      "  m: load more",
      Style::default().fg(Color::DarkGray),
    )));
  }

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut state = ListState::default();
  state.select(highlighted);
  frame.render_stateful_widget(list, area, &mut state);
}

fn row_line<'a>(app: &App, transaction: &'a Transaction) -> Line<'a> {
  let mark = if !app.marking() {
    "  "
  } else if app.is_marked(&transaction.id) {
    "◉ "
  } else {
    "○ "
  };

  let category = transaction
    .category_name()
    .map(str::to_string)
    .or_else(|| {
      transaction
        .category_id
        .as_deref()
        .and_then(|id| app.category_name(id))
    })
    .unwrap_or_else(|| "—".to_string());

  let amount = transaction.signed_amount();
  let mut spans = vec![
    Span::styled(mark, Style::default().fg(Color::Cyan)),
    Span::styled(
      format!("{:>14} ", format_grouped(amount)),
      Style::default().fg(signed_color(amount)),
    ),
    Span::styled(
      format!("{:<4}", transaction.currency),
      Style::default().fg(Color::DarkGray),
    ),
    Span::styled(
      format!("{:<18}", truncate(&category, 18)),
      Style::default().fg(Color::White),
    ),
    Span::raw(truncate(transaction.description.as_deref().unwrap_or_default(), 40)),
  ];
  if transaction.limit_warning.is_some() {
    spans.push(Span::styled(" !", Style::default().fg(Color::Yellow).bold()));
  }
  Line::from(spans)
}
