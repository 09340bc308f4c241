use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Screen};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    /// Run the config flow for `app.address_input`
    SubmitAddress,
    /// Poll the selected address now
    RefreshSelected,
    /// Tear down the selected address
    RemoveSelected,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{Backspace, Char, Delete, Down, Enter, Esc, Up};

    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    let mut action = Action::None;

    match app.screen {
        Screen::Dashboard => match key.code {
            Char('q') | Esc => action = Action::Quit,
            Up | Char('k') => {
                app.list_index = app.list_index.saturating_sub(1);
            }
            Down | Char('j') => {
                if app.list_index + 1 < app.registry.len() {
                    app.list_index += 1;
                }
            }
            Char('a') => app.open_add_address(),
            Char('r') => action = Action::RefreshSelected,
            Char('d') | Delete => action = Action::RemoveSelected,
            _ => {}
        },

        // every printable key goes into the form, `q` included
        Screen::AddAddress => match key.code {
            Char(character) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT)
                {
                    app.address_input.push(character);
                }
            }
            Backspace => {
                app.address_input.pop();
            }
            Enter => action = Action::SubmitAddress,
            Esc => {
                app.form_error = None;
                app.screen = Screen::Dashboard;
            }
            _ => {}
        },
    }
    action
}
