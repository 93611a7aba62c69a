use crate::app::{App, Details};
use crate::commands::Command;
use crate::form::FormBuffer;
use midas::models::money::format_grouped;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

const MAX_SUGGESTIONS: usize = 6;

/// Box of `width` x `height` anchored near the top-left of `area`.
fn anchored(area: Rect, width: u16, height: u16) -> Rect {
  Rect::new(
    area.x + 1,
    area.y + 1,
    width.min(area.width.saturating_sub(2)),
    height.min(area.height.saturating_sub(2)),
  )
}

pub fn draw_command_overlay(
  frame: &mut Frame,
  area: Rect,
  input: &str,
  suggestions: &[&Command],
  selected: usize,
) {
  let shown = suggestions.len().min(MAX_SUGGESTIONS);
  let width = (area.width * 60 / 100).clamp(30, 60);
  let popup = anchored(area, width, 3 + shown as u16);

  frame.render_widget(Clear, popup);
  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Yellow))
    .title(" Command ");
  let inner = block.inner(popup);
  frame.render_widget(block, popup);
  if inner.height == 0 {
    return;
  }

  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Length(1), Constraint::Min(0)])
    .split(inner);

  let prompt = Line::from(vec![
    Span::styled(":", Style::default().fg(Color::Yellow)),
    Span::raw(input),
    Span::styled("_", Style::default().fg(Color::Yellow)),
  ]);
  frame.render_widget(Paragraph::new(prompt), rows[0]);

  if shown == 0 || rows[1].height == 0 {
    return;
  }
  let items: Vec<ListItem> = suggestions
    .iter()
    .take(MAX_SUGGESTIONS)
    .map(|cmd| {
      ListItem::new(Line::from(vec![
        Span::styled(format!("{:<14}", cmd.name), Style::default().fg(Color::Cyan)),
        Span::styled(cmd.description, Style::default().fg(Color::DarkGray)),
      ]))
    })
    .collect();
  let list = List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
  let mut state = ListState::default();
  state.select(Some(selected));
  frame.render_stateful_widget(list, rows[1], &mut state);
}

pub fn draw_form(frame: &mut Frame, area: Rect, form: &FormBuffer) {
  let extra = if form.error.is_some() { 2 } else { 0 };
  let popup = anchored(area, 56, form.labels.len() as u16 + 2 + extra);

  frame.render_widget(Clear, popup);
  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Yellow))
    .title(format!(" {} ", form.title));

  let mut lines: Vec<Line> = form
    .labels
    .iter()
    .zip(&form.values)
    .enumerate()
    .map(|(i, (label, value))| {
      let focused = i == form.focus;
      let label_style = if focused {
        Style::default().fg(Color::Yellow).bold()
      } else {
        Style::default().fg(Color::DarkGray)
      };
      let mut spans = vec![
        Span::styled(format!("{:>12}: ", label), label_style),
        Span::raw(value.as_str()),
      ];
      if focused {
        spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
      }
      Line::from(spans)
    })
    .collect();

  if let Some(error) = &form.error {
    lines.push(Line::raw(""));
    lines.push(Line::styled(error.as_str(), Style::default().fg(Color::Red)));
  }

  frame.render_widget(Paragraph::new(lines).block(block), popup);
}

pub fn draw_details(frame: &mut Frame, area: Rect, details: Details<'_>, app: &App) {
  let label = |text: &'static str| Span::styled(format!("{:<12}", text), Style::default().fg(Color::DarkGray));

  let (title, lines) = match details {
    Details::Transaction(t) => {
      let category = t
        .category_name()
        .map(str::to_string)
        .or_else(|| t.category_id.as_deref().and_then(|id| app.category_name(id)))
        .unwrap_or_else(|| "—".to_string());
      let mut lines = vec![
        Line::from(vec![label("Type"), Span::raw(t.kind.to_string())]),
        Line::from(vec![
          label("Amount"),
          Span::raw(format!("{} {}", format_grouped(t.amount.value()), t.currency)),
        ]),
        Line::from(vec![label("Category"), Span::raw(category)]),
        Line::from(vec![label("Date"), Span::raw(t.transaction_date.to_string())]),
        Line::from(vec![
          label("Description"),
          Span::raw(t.description.clone().unwrap_or_default()),
        ]),
      ];
      if let Some(warning) = &t.limit_warning {
        lines.push(Line::raw(""));
        lines.push(Line::styled(warning.clone(), Style::default().fg(Color::Yellow)));
      }
      (" Transaction ", lines)
    }
    Details::Limit(l) => (
      " Limit ",
      vec![
        Line::from(vec![label("Category"), Span::raw(l.label())]),
        Line::from(vec![label("Ceiling"), Span::raw(format_grouped(l.amount.value()))]),
        Line::from(vec![
          label("Period"),
          Span::raw(format!("{} .. {}", l.period_start, l.period_end)),
        ]),
      ],
    ),
  };

  let block = Block::default()
    .borders(Borders::ALL)
    .title(title)
    .title_bottom(" e:edit  Esc:close ")
    .border_style(Style::default().fg(Color::Yellow));
  frame.render_widget(
    Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
    area,
  );
}
