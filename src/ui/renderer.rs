//! Picker renderer using crossterm
//!
//! Draws the command picker as a bordered box on the alternate screen and
//! runs its key loop until the choice is accepted or dismissed.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyEventKind},
    execute,
    style::{Color, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use tracing::debug;
use unicode_width::UnicodeWidthChar;

use super::picker::{CommandPicker, ItemKind};
use crate::core::session::{ChoiceRequest, CommandChooser, PickOutcome};

/// Picker colors
#[derive(Debug, Clone, Copy)]
struct PickerColors {
    bg: Color,
    fg: Color,
    selected_bg: Color,
    selected_fg: Color,
    query_fg: Color,
    hint_fg: Color,
}

impl Default for PickerColors {
    fn default() -> Self {
        Self {
            bg: Color::Rgb { r: 0, g: 0, b: 139 },
            fg: Color::Rgb { r: 255, g: 255, b: 255 },
            selected_bg: Color::Rgb { r: 255, g: 255, b: 255 },
            selected_fg: Color::Rgb { r: 0, g: 0, b: 0 },
            query_fg: Color::Rgb { r: 200, g: 200, b: 0 },
            hint_fg: Color::Rgb { r: 150, g: 150, b: 150 },
        }
    }
}

/// Take chars of `text` until `max_width` columns are used.
/// Returns the prefix and its display width.
fn fit_width(text: &str, max_width: usize) -> (String, usize) {
    let mut width = 0;
    let fitted = text
        .chars()
        .take_while(|c| {
            let w = c.width().unwrap_or(1);
            if width + w <= max_width {
                width += w;
                true
            } else {
                false
            }
        })
        .collect();
    (fitted, width)
}

/// Terminal renderer for the picker
pub struct PickerRenderer {
    initialized: bool,
    colors: PickerColors,
}

impl PickerRenderer {
    pub fn new() -> Self {
        Self {
            initialized: false,
            colors: PickerColors::default(),
        }
    }

    /// Initialize the terminal
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Clear(ClearType::All))?;
        stdout.flush()?;
        self.initialized = true;
        Ok(())
    }

    /// Cleanup
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        let mut stdout = io::stdout();
        execute!(stdout, ResetColor, Show, LeaveAlternateScreen)?;
        terminal::disable_raw_mode()?;
        self.initialized = false;
        Ok(())
    }

    /// Draw the picker centered on screen
    pub fn render(&self, picker: &CommandPicker) -> io::Result<()> {
        let (width, height) = terminal::size()?;
        let mut stdout = io::stdout();
        execute!(stdout, Hide, ResetColor, Clear(ClearType::All))?;
        self.render_picker(&mut stdout, picker, width, height)?;
        stdout.flush()
    }

    fn render_picker<W: Write>(
        &self,
        stdout: &mut W,
        picker: &CommandPicker,
        width: u16,
        height: u16,
    ) -> io::Result<()> {
        let cs = &self.colors;
        let box_width = 72.min(width.saturating_sub(4)) as usize;
        let box_height = (picker.max_visible + 4).min(height.saturating_sub(2) as usize);
        if box_width < 16 || box_height < 5 {
            return Ok(());
        }
        let start_x = (width as usize - box_width) / 2;
        let start_y = (height as usize - box_height) / 2;

        execute!(stdout, SetBackgroundColor(cs.bg), SetForegroundColor(cs.fg))?;

        // Top border with title
        let (title, title_width) = fit_width(&picker.title, box_width.saturating_sub(6));
        execute!(stdout, MoveTo(start_x as u16, start_y as u16))?;
        write!(stdout, "┌─ {} ", title)?;
        write!(stdout, "{}┐", "─".repeat(box_width.saturating_sub(title_width + 5)))?;

        // Query line: "│ > query                           │"
        let prefix_len = 4; // "│ > "
        let max_query_width = box_width.saturating_sub(prefix_len + 1);
        execute!(stdout, MoveTo(start_x as u16, (start_y + 1) as u16))?;
        write!(stdout, "│ > ")?;
        let (shown, shown_width) = if picker.query.is_empty() {
            execute!(stdout, SetForegroundColor(cs.hint_fg))?;
            fit_width(picker.placeholder(), max_query_width)
        } else {
            execute!(stdout, SetForegroundColor(cs.query_fg))?;
            fit_width(&picker.query, max_query_width)
        };
        write!(stdout, "{}", shown)?;
        execute!(stdout, SetForegroundColor(cs.fg))?;
        let padding = box_width.saturating_sub(prefix_len + shown_width + 1);
        write!(stdout, "{:padding$}│", "", padding = padding)?;

        // Separator
        execute!(stdout, MoveTo(start_x as u16, (start_y + 2) as u16))?;
        write!(stdout, "├{}┤", "─".repeat(box_width - 2))?;

        let items = picker.visible_items();
        for (display_idx, item, is_selected) in items.iter() {
            let y = start_y + 3 + display_idx;
            if y >= start_y + box_height - 1 {
                break;
            }
            execute!(stdout, MoveTo(start_x as u16, y as u16))?;
            if *is_selected {
                execute!(stdout, SetBackgroundColor(cs.selected_bg), SetForegroundColor(cs.selected_fg))?;
            }

            // "│ N. label  description│"
            let row_prefix = match picker.quick_pick_number(picker.scroll_offset + display_idx) {
                Some(num) => format!("│{:2}. ", num),
                None => "│    ".to_string(),
            };
            let row_prefix_len = 5;
            write!(stdout, "{}", row_prefix)?;

            let label = match item.kind {
                ItemKind::Entered if item.label.is_empty() => picker.placeholder(),
                _ => item.label.as_str(),
            };
            let max_row = box_width.saturating_sub(row_prefix_len + 1);
            let (label, label_width) = fit_width(label, max_row);
            write!(stdout, "{}", label)?;

            let mut used = label_width;
            if !item.description.is_empty() && used + 2 < max_row {
                let (desc, desc_width) = fit_width(&item.description, max_row - used - 2);
                if !*is_selected {
                    execute!(stdout, SetForegroundColor(cs.hint_fg))?;
                }
                write!(stdout, "  {}", desc)?;
                used += desc_width + 2;
            }

            let padding = max_row.saturating_sub(used);
            write!(stdout, "{:padding$}", "", padding = padding)?;
            execute!(stdout, SetBackgroundColor(cs.bg), SetForegroundColor(cs.fg))?;
            write!(stdout, "│")?;
        }

        // Fill empty rows
        for i in items.len()..picker.max_visible {
            let y = start_y + 3 + i;
            if y >= start_y + box_height - 1 {
                break;
            }
            execute!(stdout, MoveTo(start_x as u16, y as u16))?;
            write!(stdout, "│{:width$}│", "", width = box_width - 2)?;
        }

        // Bottom border with help
        let (help, help_width) = fit_width(
            "Enter:Start Tab:Edit 1-9:Pick Esc:Cancel",
            box_width.saturating_sub(4),
        );
        execute!(stdout, MoveTo(start_x as u16, (start_y + box_height - 1) as u16))?;
        write!(stdout, "└ {} ", help)?;
        write!(stdout, "{}┘", "─".repeat(box_width.saturating_sub(help_width + 4)))?;

        execute!(stdout, ResetColor)?;

        // Cursor at the end of the query
        let query_width = if picker.query.is_empty() { 0 } else { shown_width };
        let cursor_x = start_x + prefix_len + query_width;
        execute!(stdout, MoveTo(cursor_x as u16, (start_y + 1) as u16), Show)?;
        Ok(())
    }
}

impl Drop for PickerRenderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Interactive chooser on the controlling terminal
#[derive(Default)]
pub struct TerminalChooser;

impl TerminalChooser {
    fn run(renderer: &mut PickerRenderer, picker: &mut CommandPicker) -> io::Result<PickOutcome> {
        renderer.render(picker)?;
        loop {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if let Some(outcome) = picker.handle_key(key) {
                        return Ok(outcome);
                    }
                    renderer.render(picker)?;
                }
                Event::Resize(_, _) => renderer.render(picker)?,
                _ => {}
            }
        }
    }
}

impl CommandChooser for TerminalChooser {
    fn choose(&mut self, request: &ChoiceRequest) -> io::Result<PickOutcome> {
        let mut picker = CommandPicker::new(request);
        let mut renderer = PickerRenderer::new();
        renderer.init()?;
        let outcome = Self::run(&mut renderer, &mut picker);
        renderer.cleanup()?;
        debug!("Picker outcome: {:?}", outcome);
        outcome
    }
}
