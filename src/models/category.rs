use serde::{Deserialize, Serialize};

use crate::cache::Cacheable;

use super::TransactionKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub icon: Option<String>,
  #[serde(default)]
  pub color: Option<String>,
  /// Which side of the ledger this category is offered for
  #[serde(rename = "type", default)]
  pub kind: Option<TransactionKind>,
  #[serde(default)]
  pub is_default: bool,
}

impl Category {
  pub fn label(&self) -> String {
    match &self.icon {
      Some(icon) if !icon.is_empty() => format!("{} {}", icon, self.name),
      _ => self.name.clone(),
    }
  }
}

impl Cacheable for Category {
  fn cache_key(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "category"
  }
}
