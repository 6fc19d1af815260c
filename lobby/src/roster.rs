use std::fmt;

use crate::service::PeerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub peer: PeerId,
    pub name: String,
    pub is_local: bool,
}

impl fmt::Display for RosterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_local {
            write!(f, "{} (YOU)", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

pub fn render(entries: &[RosterEntry]) -> Vec<String> {
    entries.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_entry_is_marked() {
        let entries = vec![
            RosterEntry {
                peer: PeerId(1),
                name: "Player 1".into(),
                is_local: false,
            },
            RosterEntry {
                peer: PeerId(2),
                name: "Player 2".into(),
                is_local: true,
            },
        ];
        assert_eq!(render(&entries), vec!["Player 1", "Player 2 (YOU)"]);
    }
}
