use std::fmt::Display;

use console::{style, StyledObject};

/// How a piece of terminal text should read at a glance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Good,
    Warning,
    Bad,
    Muted,
    Label,
}

pub fn toned(tone: Tone, text: impl Display) -> StyledObject<String> {
    let styled = style(text.to_string());
    match tone {
        Tone::Good => styled.bright().green(),
        Tone::Warning => styled.bright().yellow(),
        Tone::Bad => styled.bright().red(),
        Tone::Muted => styled.dim(),
        Tone::Label => styled.cyan(),
    }
}

pub fn heading(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().underlined()
}

pub fn title(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}
