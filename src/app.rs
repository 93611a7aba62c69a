use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::{stdout, Stdout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use midas::api::{BulkDeleteReport, Committed};
use midas::config::Config;
use midas::edit::EditSessionController;
use midas::feed::{DateGroup, PagedFeed};
use midas::models::{
  BalanceSnapshot, DebtBalance, Limit, LimitForm, LimitUsage, Period, PeriodFilter, Transaction,
  TransactionFilter, TransactionForm, YearMonth,
};
use midas::selection::SelectionController;
use midas::store::Store;

use crate::commands::{self, Command, CommandKind};
use crate::event::{Event, EventHandler, Notice};
use crate::form::FormBuffer;
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
  Transactions,
  Limits,
}

/// Input mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
  Search,
  Form,
}

/// What submitting the open form does
enum FormTarget {
  NewTransaction(TransactionForm),
  EditTransaction,
  NewLimit(LimitForm),
  EditLimit,
}

/// Entity shown in the details panel
pub enum Details<'a> {
  Transaction(&'a Transaction),
  Limit(&'a Limit),
}

pub struct App {
  store: Arc<Store>,
  config: Config,

  screen: Screen,
  mode: Mode,
  month: YearMonth,

  /// Row cursor on the current screen
  selected: usize,

  command_input: String,
  selected_suggestion: usize,

  /// Search text being typed (after pressing /)
  search_input: String,
  /// Search applied to the transaction list
  search: Option<String>,

  feed: PagedFeed<Transaction, TransactionFilter>,
  marks: SelectionController<Transaction, TransactionFilter>,
  transaction_editor: EditSessionController<Transaction, TransactionFilter>,
  limit_editor: EditSessionController<Limit, PeriodFilter>,
  form: Option<(FormBuffer, FormTarget)>,

  notice: Option<Notice>,
  event_tx: mpsc::UnboundedSender<Event>,
  should_quit: bool,
}

impl App {
  pub fn new(config: Config, store: Arc<Store>, month: YearMonth) -> Self {
    let (tx, _rx) = mpsc::unbounded_channel();

    Self {
      feed: store.transaction_feed(),
      marks: store.transaction_selection(),
      transaction_editor: store.transaction_editor(),
      limit_editor: store.limit_editor(),
      store,
      config,
      screen: Screen::Transactions,
      mode: Mode::Normal,
      month,
      selected: 0,
      command_input: String::new(),
      selected_suggestion: 0,
      search_input: String::new(),
      search: None,
      form: None,
      notice: None,
      event_tx: tx,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();
    events.watch("transactions", self.store.transactions.subscribe());
    events.watch("limits", self.store.limits.subscribe());
    events.watch("balance", self.store.balance.subscribe());
    events.watch("debt_balance", self.store.debt_balance.subscribe());
    events.watch("category_chart", self.store.category_chart.subscribe());
    events.watch("categories", self.store.categories.subscribe());

    let refresher = self.store.scheduler().start();

    self.store.warm_start(&self.transaction_filter());
    self.load_globals();
    self.load_period();

    let result = self.event_loop(&mut terminal, &mut events).await;

    refresher.stop().await;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      if let Some(event) = events.next().await {
        self.handle_event(event).await;
      }
    }
    Ok(())
  }

  async fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key).await,
      Event::Tick => {}
      Event::Changed(collection) => {
        debug!(collection, "Cache changed");
        if collection == "transactions" {
          self.marks.sync();
        }
        self.clamp_selection();
      }
      Event::Notice(notice) => self.notice = Some(notice),
    }
  }

  async fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key).await,
      Mode::Command => self.handle_command_mode_key(key).await,
      Mode::Search => self.handle_search_mode_key(key),
      Mode::Form => self.handle_form_key(key).await,
    }
  }

  async fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    self.notice = None;
    match key.code {
      KeyCode::Char('q') => self.should_quit = true,
      KeyCode::Esc => self.back(),

      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
      KeyCode::Char('[') => self.change_month(self.month.prev()),
      KeyCode::Char(']') => self.change_month(self.month.next()),
      KeyCode::Enter => self.open_details(),

      KeyCode::Char('e') => self.begin_edit(),
      KeyCode::Char('n') => self.begin_create(),
      KeyCode::Char('d') => self.delete().await,

      KeyCode::Char('v') if self.screen == Screen::Transactions => {
        if self.marks.is_active() {
          self.marks.exit();
        } else {
          self.marks.enter();
        }
      }
      KeyCode::Char(' ') if self.marks.is_active() => {
        if let Some(id) = self.current_transaction().map(|t| t.id) {
          self.marks.toggle(&id);
        }
      }
      KeyCode::Char('a') if self.marks.is_active() => {
        self.marks.select_all_visible();
      }
      KeyCode::Char('m') if self.screen == Screen::Transactions => self.load_more().await,

      KeyCode::Char(':') => {
        self.mode = Mode::Command;
        self.command_input.clear();
      }
      KeyCode::Char('/') if self.screen == Screen::Transactions => {
        self.mode = Mode::Search;
        self.search_input = self.search.clone().unwrap_or_default();
      }

      _ => {}
    }
  }

  async fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        let command = commands::resolve(&self.command_input, self.selected_suggestion);
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
        if let Some(command) = command {
          self.execute_command(command).await;
        }
      }
      KeyCode::Tab | KeyCode::Down => {
        let count = commands::get_suggestions(&self.command_input).len();
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + 1) % count;
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let count = commands::get_suggestions(&self.command_input).len();
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + count - 1) % count;
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0;
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0;
      }
      _ => {}
    }
  }

  fn handle_search_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.search_input.clear();
      }
      KeyCode::Enter => {
        self.mode = Mode::Normal;
        let term = self.search_input.trim();
        self.search = (!term.is_empty()).then(|| term.to_string());
        self.selected = 0;
        self.load_period();
      }
      KeyCode::Backspace => {
        self.search_input.pop();
      }
      KeyCode::Char(c) => {
        self.search_input.push(c);
      }
      _ => {}
    }
  }

  async fn handle_form_key(&mut self, key: KeyEvent) {
    let Some((buffer, _)) = self.form.as_mut() else {
      self.mode = Mode::Normal;
      return;
    };

    match key.code {
      KeyCode::Esc => self.close_form(),
      KeyCode::Enter => self.submit_form().await,
      KeyCode::Tab | KeyCode::Down => buffer.next(),
      KeyCode::BackTab | KeyCode::Up => buffer.prev(),
      KeyCode::Backspace => buffer.pop(),
      KeyCode::Char(c) => buffer.push(c),
      _ => {}
    }
  }

  async fn execute_command(&mut self, command: CommandKind) {
    match command {
      CommandKind::Transactions => self.switch_screen(Screen::Transactions),
      CommandKind::Limits => self.switch_screen(Screen::Limits),
      CommandKind::Refresh => {
        let store = self.store.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
          let notice = match store.refresh_now().await {
            None => Notice::info("Refreshed"),
            Some(e) => Notice::error(format!("Refresh failed: {}", e)),
          };
          let _ = tx.send(Event::Notice(notice));
        });
      }
      CommandKind::Quit => self.should_quit = true,
    }
  }

  fn switch_screen(&mut self, screen: Screen) {
    if self.screen == screen {
      return;
    }
    self.marks.exit();
    self.transaction_editor.cancel();
    self.limit_editor.cancel();
    self.screen = screen;
    self.selected = 0;
    if screen == Screen::Limits {
      self.load_limit_usage();
    }
  }

  fn back(&mut self) {
    if self.transaction_editor.is_open() || self.limit_editor.is_open() {
      self.transaction_editor.cancel();
      self.limit_editor.cancel();
    } else if self.marks.is_active() {
      self.marks.exit();
    } else if self.search.is_some() {
      self.search = None;
      self.selected = 0;
      self.load_period();
    }
  }

  fn change_month(&mut self, month: YearMonth) {
    info!(month = %month, "Switching month");
    self.month = month;
    self.selected = 0;
    self.load_period();
    if self.screen == Screen::Limits {
      self.load_limit_usage();
    }
  }

  fn load_period(&self) {
    let store = self.store.clone();
    let filter = self.transaction_filter();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      if let Err(e) = store.show(filter).await {
        let _ = tx.send(Event::Notice(Notice::error(format!("Load failed: {}", e))));
      }
    });
  }

  fn load_limit_usage(&self) {
    let store = self.store.clone();
    let period = self.period();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      if let Err(e) = store.show_limit_usage(period).await {
        let _ = tx.send(Event::Notice(Notice::error(format!("Load failed: {}", e))));
      }
    });
  }

  fn load_globals(&self) {
    let store = self.store.clone();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      if let Err(e) = store.load_globals().await {
        let _ = tx.send(Event::Notice(Notice::error(format!("Load failed: {}", e))));
      }
    });
  }

  async fn load_more(&mut self) {
    if !self.feed.has_more() {
      return;
    }
    if let Err(e) = self.feed.load_more().await {
      self.notice = Some(Notice::error(format!("Load more failed: {}", e)));
    }
  }

  fn open_details(&mut self) {
    match self.screen {
      Screen::Transactions => {
        if let Some(id) = self.current_transaction().map(|t| t.id) {
          self.transaction_editor.open_details_by_id(&id);
        }
      }
      Screen::Limits => {
        if let Some(usage) = self.current_usage() {
          self.limit_editor.open_details(usage.limit);
        }
      }
    }
  }

  fn begin_edit(&mut self) {
    match self.screen {
      Screen::Transactions => {
        if !self.transaction_editor.edit_current() {
          let Some(row) = self.current_transaction() else {
            return;
          };
          self.transaction_editor.begin_edit(row);
        }
        if let Some(form) = self.transaction_editor.form() {
          let buffer = FormBuffer::new("Edit transaction", form);
          self.open_form(buffer, FormTarget::EditTransaction);
        }
      }
      Screen::Limits => {
        if !self.limit_editor.edit_current() {
          let Some(usage) = self.current_usage() else {
            return;
          };
          self.limit_editor.begin_edit(usage.limit);
        }
        if let Some(form) = self.limit_editor.form() {
          let buffer = FormBuffer::new("Edit limit", form);
          self.open_form(buffer, FormTarget::EditLimit);
        }
      }
    }
  }

  fn begin_create(&mut self) {
    match self.screen {
      Screen::Transactions => {
        let form = TransactionForm::blank(self.store.clock().today(), &self.config.default_currency);
        let buffer = FormBuffer::new("New transaction", &form);
        self.open_form(buffer, FormTarget::NewTransaction(form));
      }
      Screen::Limits => {
        let form = LimitForm {
          category_id: String::new(),
          amount: Default::default(),
        };
        let buffer = FormBuffer::new("New limit for this month", &form);
        self.open_form(buffer, FormTarget::NewLimit(form));
      }
    }
  }

  fn open_form(&mut self, buffer: FormBuffer, target: FormTarget) {
    self.form = Some((buffer, target));
    self.mode = Mode::Form;
  }

  fn close_form(&mut self) {
    if let Some((_, target)) = self.form.take() {
      match target {
        FormTarget::EditTransaction => self.transaction_editor.cancel(),
        FormTarget::EditLimit => self.limit_editor.cancel(),
        FormTarget::NewTransaction(_) | FormTarget::NewLimit(_) => {}
      }
    }
    self.mode = Mode::Normal;
  }

  async fn submit_form(&mut self) {
    let Some((mut buffer, mut target)) = self.form.take() else {
      return;
    };

    let outcome = match &mut target {
      FormTarget::NewTransaction(form) => {
        if !buffer.apply_to(form) {
          self.form = Some((buffer, target));
          return;
        }
        match form.into_create() {
          Ok(payload) => self
            .store
            .create_transaction(payload)
            .await
            .map(|c| saved(c, "Transaction added")),
          Err(e) => Err(e),
        }
      }
      FormTarget::EditTransaction => {
        let applied = self
          .transaction_editor
          .form_mut()
          .is_some_and(|form| buffer.apply_to(form));
        if !applied {
          self.form = Some((buffer, target));
          return;
        }
        self
          .transaction_editor
          .submit()
          .await
          .map(|c| saved(c, "Transaction saved"))
      }
      FormTarget::NewLimit(form) => {
        if !buffer.apply_to(form) {
          self.form = Some((buffer, target));
          return;
        }
        self
          .store
          .create_limit(form)
          .await
          .map(|c| refreshed(c, "Limit added".to_string()))
      }
      FormTarget::EditLimit => {
        let applied = self
          .limit_editor
          .form_mut()
          .is_some_and(|form| buffer.apply_to(form));
        if !applied {
          self.form = Some((buffer, target));
          return;
        }
        self
          .limit_editor
          .submit()
          .await
          .map(|c| refreshed(c, "Limit saved".to_string()))
      }
    };

    match outcome {
      Ok(notice) => {
        self.notice = Some(notice);
        self.mode = Mode::Normal;
      }
      Err(e) => {
        buffer.error = Some(e.to_string());
        self.form = Some((buffer, target));
      }
    }
  }

  async fn delete(&mut self) {
    let result = match self.screen {
      Screen::Transactions if self.marks.is_active() => {
        if self.marks.is_empty() {
          return;
        }
        self.marks.delete_selected().await.map(bulk_notice)
      }
      Screen::Transactions => {
        let Some(row) = self.current_transaction() else {
          return;
        };
        self
          .store
          .delete_transaction(&row.id)
          .await
          .map(|c| refreshed(c, "Transaction deleted".to_string()))
      }
      Screen::Limits => {
        let Some(usage) = self.current_usage() else {
          return;
        };
        self
          .store
          .delete_limit(&usage.limit.id)
          .await
          .map(|c| refreshed(c, "Limit deleted".to_string()))
      }
    };

    self.notice = Some(match result {
      Ok(notice) => notice,
      Err(e) => Notice::error(format!("Delete failed: {}", e)),
    });
    self.clamp_selection();
  }

  fn move_selection(&mut self, delta: i32) {
    let len = self.row_count();
    if len > 0 {
      self.selected = (self.selected as i32 + delta).rem_euclid(len as i32) as usize;
    }
  }

  fn clamp_selection(&mut self) {
    let len = self.row_count();
    if self.selected >= len {
      self.selected = len.saturating_sub(1);
    }
  }

  fn row_count(&self) -> usize {
    match self.screen {
      Screen::Transactions => self.store.transactions.len(),
      Screen::Limits => self.store.limits.len(),
    }
  }

  fn transaction_filter(&self) -> TransactionFilter {
    let filter = TransactionFilter::for_period(self.period());
    match &self.search {
      Some(term) => filter.with_search(term.clone()),
      None => filter,
    }
  }

  fn current_transaction(&self) -> Option<Transaction> {
    self.rows().into_iter().nth(self.selected)
  }

  fn current_usage(&self) -> Option<LimitUsage> {
    self.limit_usage().into_iter().nth(self.selected)
  }

  /// Transactions in display order.
  fn rows(&self) -> Vec<Transaction> {
    self
      .feed
      .groups()
      .into_iter()
      .flat_map(|group| group.items)
      .collect()
  }

  // Accessors for UI rendering
  pub fn screen(&self) -> Screen {
    self.screen
  }

  pub fn mode(&self) -> Mode {
    self.mode
  }

  pub fn period(&self) -> Period {
    Period::Month(self.month)
  }

  pub fn selected(&self) -> usize {
    self.selected
  }

  pub fn groups(&self) -> Vec<DateGroup<Transaction>> {
    self.feed.groups()
  }

  pub fn has_more(&self) -> bool {
    self.feed.has_more()
  }

  pub fn is_loading(&self) -> bool {
    self.store.transactions.is_busy() || self.store.limits.is_busy()
  }

  pub fn is_stale(&self) -> bool {
    self.store.transactions.is_stale()
  }

  pub fn marking(&self) -> bool {
    self.marks.is_active()
  }

  pub fn is_marked(&self, id: &str) -> bool {
    self.marks.is_selected(id)
  }

  pub fn marked_count(&self) -> usize {
    self.marks.len()
  }

  pub fn limit_usage(&self) -> Vec<LimitUsage> {
    let mut usage = self.store.limit_usage();
    usage.sort_by(|a, b| a.limit.label().cmp(&b.limit.label()));
    usage
  }

  pub fn balance(&self) -> Option<BalanceSnapshot> {
    self.store.balance.items().into_iter().next()
  }

  pub fn debt(&self) -> Option<DebtBalance> {
    self.store.debt_balance.items().into_iter().next()
  }

  pub fn category_name(&self, id: &str) -> Option<String> {
    self.store.categories.get(id).map(|c| c.label())
  }

  pub fn details(&self) -> Option<Details<'_>> {
    match self.screen {
      Screen::Transactions => self.transaction_editor.current().map(Details::Transaction),
      Screen::Limits => self.limit_editor.current().map(Details::Limit),
    }
  }

  pub fn form(&self) -> Option<&FormBuffer> {
    self.form.as_ref().map(|(buffer, _)| buffer)
  }

  pub fn notice(&self) -> Option<&Notice> {
    self.notice.as_ref()
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn search_input(&self) -> &str {
    &self.search_input
  }

  pub fn search(&self) -> Option<&str> {
    self.search.as_deref()
  }

  pub fn api_url(&self) -> &str {
    &self.config.api.url
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(&self.command_input)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }
}

/// Success notice for a write whose follow-up refresh may have failed.
fn refreshed<R>(committed: Committed<R>, message: String) -> Notice {
  match committed.refresh_error {
    Some(e) => Notice::warning(format!("{}, but refresh failed: {}", message, e)),
    None => Notice::info(message),
  }
}

/// Like [`refreshed`], surfacing the server's limit warning when present.
fn saved(committed: Committed<Transaction>, message: &str) -> Notice {
  match committed.value.limit_warning.clone() {
    Some(warning) if committed.refresh_error.is_none() => Notice::warning(warning),
    _ => refreshed(committed, message.to_string()),
  }
}

fn bulk_notice(committed: Committed<BulkDeleteReport>) -> Notice {
  let report = &committed.value;
  let summary = report.summary();
  if let Some(e) = &committed.refresh_error {
    Notice::warning(format!("{}, but refresh failed: {}", summary, e))
  } else if report.is_complete() {
    Notice::info(summary)
  } else if report.deleted_count > 0 {
    Notice::warning(summary)
  } else {
    Notice::error(summary)
  }
}
