use ratatui::prelude::Color;
use rust_decimal::Decimal;

/// Truncate to at most `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

pub fn signed_color(value: Decimal) -> Color {
  if value < Decimal::ZERO {
    Color::Red
  } else {
    Color::Green
  }
}

/// Bar color for a limit at `percent` of its ceiling
pub fn usage_color(percent: Option<Decimal>) -> Color {
  match percent {
    Some(p) if p >= Decimal::ONE_HUNDRED => Color::Red,
    Some(p) if p >= Decimal::from(75) => Color::Yellow,
    Some(_) => Color::Green,
    None => Color::DarkGray,
  }
}

/// Host part of the API URL for the header
pub fn host(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}
