use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirectionKey {
    Up,
    Down,
    Left,
    Right,
}

/// Whether printable keys are commands or text for the focused input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Msg {
    Quit,
    ToggleHelp,
    NextPane,
    PreviousPane,
    Submit,
    Escape,
    CancelQuery,
    RunQuery,
    ToggleReadOnly,
    Navigate(DirectionKey),
    InvokeActionSlot(usize),
    /// A printable key with no global meaning, interpreted by the focused pane.
    PaneKey(char),
    Input(char),
    Backspace,
    Tick,
}

pub(crate) fn map_key_event(key: KeyEvent, mode: InputMode) -> Option<Msg> {
    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    match (control, key.code) {
        (true, KeyCode::Char('c')) => return Some(Msg::CancelQuery),
        (true, KeyCode::Char('r')) | (_, KeyCode::F(5)) => return Some(Msg::RunQuery),
        (_, KeyCode::F(2)) => return Some(Msg::ToggleReadOnly),
        (_, KeyCode::Esc) => return Some(Msg::Escape),
        (_, KeyCode::Enter) => return Some(Msg::Submit),
        (true, _) => return None,
        _ => {}
    }

    match mode {
        InputMode::Normal => map_normal_key(key.code),
        InputMode::Editing => map_editing_key(key.code),
    }
}

fn map_normal_key(code: KeyCode) -> Option<Msg> {
    match code {
        KeyCode::Char('q') => Some(Msg::Quit),
        KeyCode::Char('?') => Some(Msg::ToggleHelp),
        KeyCode::Tab => Some(Msg::NextPane),
        KeyCode::BackTab => Some(Msg::PreviousPane),
        KeyCode::Up | KeyCode::Char('k') => Some(Msg::Navigate(DirectionKey::Up)),
        KeyCode::Down | KeyCode::Char('j') => Some(Msg::Navigate(DirectionKey::Down)),
        KeyCode::Left | KeyCode::Char('h') => Some(Msg::Navigate(DirectionKey::Left)),
        KeyCode::Right | KeyCode::Char('l') => Some(Msg::Navigate(DirectionKey::Right)),
        KeyCode::Char(digit @ '1'..='7') => {
            let slot = digit.to_digit(10).and_then(|value| usize::try_from(value).ok())?;
            Some(Msg::InvokeActionSlot(slot - 1))
        }
        KeyCode::Char(ch) => Some(Msg::PaneKey(ch)),
        _ => None,
    }
}

fn map_editing_key(code: KeyCode) -> Option<Msg> {
    match code {
        KeyCode::Char(ch) => Some(Msg::Input(ch)),
        KeyCode::Backspace => Some(Msg::Backspace),
        KeyCode::Up => Some(Msg::Navigate(DirectionKey::Up)),
        KeyCode::Down => Some(Msg::Navigate(DirectionKey::Down)),
        KeyCode::Left => Some(Msg::Navigate(DirectionKey::Left)),
        KeyCode::Right => Some(Msg::Navigate(DirectionKey::Right)),
        _ => None,
    }
}
