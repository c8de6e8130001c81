//! Session command picker
//!
//! Selector state for choosing the command a new session runs. The first
//! item always mirrors the typed query; configured candidates follow.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::core::session::{ChoiceRequest, PickOutcome};

/// Where an item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// The command as typed
    Entered,
    /// A configured candidate or template
    Candidate,
}

/// One row of the picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerItem {
    pub label: String,
    pub description: String,
    pub kind: ItemKind,
}

/// Command picker state
pub struct CommandPicker {
    pub title: String,
    /// Current typed value
    pub query: String,
    pub items: Vec<PickerItem>,
    /// Currently selected index
    pub selected: usize,
    /// Scroll offset
    pub scroll_offset: usize,
    /// Maximum visible items
    pub max_visible: usize,
    default_command: String,
    launcher_hint: String,
}

impl CommandPicker {
    pub fn new(request: &ChoiceRequest) -> Self {
        let mut items = vec![PickerItem {
            label: String::new(),
            description: String::new(),
            kind: ItemKind::Entered,
        }];
        items.extend(request.candidates.iter().map(|c| PickerItem {
            label: c.command.clone(),
            description: c.description.clone().unwrap_or_default(),
            kind: ItemKind::Candidate,
        }));

        let mut picker = Self {
            title: request.title.clone(),
            query: String::new(),
            items,
            selected: 0,
            scroll_offset: 0,
            max_visible: 8,
            default_command: request.default_command.clone(),
            launcher_hint: request.launcher_hint.clone(),
        };
        picker.refresh_entered();
        picker
    }

    /// Placeholder shown while the query is empty
    pub fn placeholder(&self) -> &str {
        &self.default_command
    }

    /// Keep the entered item in sync with the query
    fn refresh_entered(&mut self) {
        let shown = if self.query.trim().is_empty() {
            self.default_command.as_str()
        } else {
            self.query.as_str()
        };
        let description = format!("Run: {} {}", self.launcher_hint, shown);
        if let Some(entered) = self.items.first_mut() {
            entered.label = self.query.clone();
            entered.description = description;
        }
    }

    /// Add character to query
    pub fn input_char(&mut self, ch: char) {
        self.query.push(ch);
        self.selected = 0;
        self.scroll_offset = 0;
        self.refresh_entered();
    }

    /// Remove last character
    pub fn backspace(&mut self) {
        self.query.pop();
        self.refresh_entered();
    }

    /// Move selection up
    pub fn select_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.adjust_scroll();
        }
    }

    /// Move selection down
    pub fn select_down(&mut self) {
        if self.selected + 1 < self.items.len() {
            self.selected += 1;
            self.adjust_scroll();
        }
    }

    /// Copy the selected candidate into the query for editing
    pub fn complete(&mut self) {
        if let Some(item) = self.items.get(self.selected) {
            if item.kind == ItemKind::Candidate {
                self.query = item.label.clone();
                self.selected = 0;
                self.scroll_offset = 0;
                self.refresh_entered();
            }
        }
    }

    /// Item index of the `num`th visible candidate (1-based)
    fn quick_pick_index(&self, num: usize) -> Option<usize> {
        self.items
            .iter()
            .enumerate()
            .skip(self.scroll_offset)
            .take(self.max_visible)
            .filter(|(_, item)| item.kind == ItemKind::Candidate)
            .nth(num.checked_sub(1)?)
            .map(|(idx, _)| idx)
    }

    /// Number shown next to an item; the entered row has none
    pub fn quick_pick_number(&self, index: usize) -> Option<usize> {
        (1..=9).find(|&num| self.quick_pick_index(num) == Some(index))
    }

    /// Select the `num`th visible candidate (1-9) and accept it
    pub fn select_number(&mut self, num: usize) -> Option<String> {
        let index = self.quick_pick_index(num)?;
        self.selected = index;
        Some(self.accept())
    }

    /// Adjust scroll offset
    fn adjust_scroll(&mut self) {
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + self.max_visible {
            self.scroll_offset = self.selected - self.max_visible + 1;
        }
    }

    /// Value accepted right now: a highlighted candidate, else the query
    pub fn accept(&self) -> String {
        match self.items.get(self.selected) {
            Some(item) if item.kind == ItemKind::Candidate => item.label.clone(),
            _ => self.query.clone(),
        }
    }

    /// Get visible items for rendering
    /// Returns: (display_index, item, is_selected)
    pub fn visible_items(&self) -> Vec<(usize, &PickerItem, bool)> {
        self.items
            .iter()
            .enumerate()
            .skip(self.scroll_offset)
            .take(self.max_visible)
            .map(|(idx, item)| (idx - self.scroll_offset, item, idx == self.selected))
            .collect()
    }

    /// Apply a key press. Returns the outcome once the choice is settled.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<PickOutcome> {
        match key.code {
            KeyCode::Esc => Some(PickOutcome::Cancelled),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(PickOutcome::Cancelled)
            }
            KeyCode::Enter => Some(PickOutcome::Accepted(self.accept())),
            KeyCode::Up => {
                self.select_up();
                None
            }
            KeyCode::Down => {
                self.select_down();
                None
            }
            KeyCode::Tab => {
                self.complete();
                None
            }
            KeyCode::Backspace => {
                self.backspace();
                None
            }
            KeyCode::Char(c) => {
                // Number selection only when query is empty
                if self.query.is_empty() {
                    if let Some(num) = c.to_digit(10).filter(|n| (1..=9).contains(n)) {
                        if let Some(value) = self.select_number(num as usize) {
                            return Some(PickOutcome::Accepted(value));
                        }
                    }
                }
                self.input_char(c);
                None
            }
            _ => None,
        }
    }
}
