use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKey {
    Up,
    Down,
    Left,
    Right,
    Char(char),
}

impl FromStr for InputKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ArrowUp" | "up" => Ok(InputKey::Up),
            "ArrowDown" | "down" => Ok(InputKey::Down),
            "ArrowLeft" | "left" => Ok(InputKey::Left),
            "ArrowRight" | "right" => Ok(InputKey::Right),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(InputKey::Char(c.to_ascii_lowercase())),
                    _ => Err(anyhow::anyhow!("unrecognised key '{}'", other)),
                }
            }
        }
    }
}

impl fmt::Display for InputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKey::Up => f.write_str("up"),
            InputKey::Down => f.write_str("down"),
            InputKey::Left => f.write_str("left"),
            InputKey::Right => f.write_str("right"),
            InputKey::Char(c) => write!(f, "{}", c),
        }
    }
}

pub const FOUNDER_SEQUENCE: [InputKey; 10] = [
    InputKey::Up,
    InputKey::Up,
    InputKey::Down,
    InputKey::Down,
    InputKey::Left,
    InputKey::Right,
    InputKey::Left,
    InputKey::Right,
    InputKey::Char('b'),
    InputKey::Char('a'),
];

/// Tracks progress through a fixed key sequence. Keeps only as many recent
/// keys as the sequence is long.
#[derive(Debug, Clone)]
pub struct SequenceDetector {
    sequence: Vec<InputKey>,
    recent: Vec<InputKey>,
}

impl SequenceDetector {
    pub fn new(sequence: &[InputKey]) -> Self {
        Self {
            sequence: sequence.to_vec(),
            recent: Vec::with_capacity(sequence.len()),
        }
    }

    pub fn founder() -> Self {
        Self::new(&FOUNDER_SEQUENCE)
    }

    /// Feeds one key. Returns `true` exactly when the sequence completes.
    pub fn push(&mut self, key: InputKey) -> bool {
        if self.sequence.is_empty() {
            return false;
        }
        self.recent.push(key);
        if self.recent.len() > self.sequence.len() {
            self.recent.remove(0);
        }
        if self.recent == self.sequence {
            self.recent.clear();
            return true;
        }
        false
    }

    /// Length of the longest tail of recent keys that starts the sequence.
    pub fn progress(&self) -> usize {
        let n = self.recent.len();
        (0..=n)
            .rev()
            .find(|&k| self.recent[n - k..] == self.sequence[..k])
            .unwrap_or(0)
    }
}
