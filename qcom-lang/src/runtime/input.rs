//! Controller buttons as seen through the input port
//!
//! The machine itself attaches no meaning to these bits, programs do.

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    Primary,
    Secondary,
    Confirm,
    Cancel,
}

impl Button {
    pub fn bit(self) -> u8 {
        match self {
            Button::Up => 1 << 7,
            Button::Down => 1 << 6,
            Button::Left => 1 << 5,
            Button::Right => 1 << 4,
            Button::Primary => 1 << 3,
            Button::Secondary => 1 << 2,
            Button::Confirm => 1 << 1,
            Button::Cancel => 1 << 0,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown button '{0}'")]
pub struct UnknownButton(pub String);

impl FromStr for Button {
    type Err = UnknownButton;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Button::Up),
            "down" => Ok(Button::Down),
            "left" => Ok(Button::Left),
            "right" => Ok(Button::Right),
            "primary" => Ok(Button::Primary),
            "secondary" => Ok(Button::Secondary),
            "confirm" => Ok(Button::Confirm),
            "cancel" => Ok(Button::Cancel),
            _ => Err(UnknownButton(s.to_string())),
        }
    }
}

/// Port byte for a set of held buttons
pub fn mask(buttons: &[Button]) -> u8 {
    buttons.iter().fold(0, |acc, b| acc | b.bit())
}
