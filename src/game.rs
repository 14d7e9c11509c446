//! Decoy Vault - Tic-Tac-Toe
//!
//! The game the app presents to everyone. It has no access to the vault.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

pub const BOARD_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Player {
    X,
    O,
}

impl Player {
    pub fn other(self) -> Self {
        match self {
            Player::X => Player::O,
            Player::O => Player::X,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::X => f.write_str("X"),
            Player::O => f.write_str("O"),
        }
    }
}

/// How a finished game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win(Player),
    Draw,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win(player) => write!(f, "{} Wins!", player),
            Outcome::Draw => f.write_str("It's a Draw!"),
        }
    }
}

/// 3x3 board, X moves first
#[derive(Debug, Clone)]
pub struct Board {
    cells: [[Option<Player>; BOARD_SIZE]; BOARD_SIZE],
    current: Player,
    outcome: Option<Outcome>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [[None; BOARD_SIZE]; BOARD_SIZE],
            current: Player::X,
            outcome: None,
        }
    }

    pub fn current_player(&self) -> Player {
        self.current
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Player> {
        self.cells.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    /// Mark a cell for the current player; returns the outcome once decided
    pub fn play(&mut self, row: usize, col: usize) -> VaultResult<Option<Outcome>> {
        if self.outcome.is_some() {
            return Err(VaultError::InvalidMove("game is over".into()));
        }
        if row >= BOARD_SIZE || col >= BOARD_SIZE {
            return Err(VaultError::InvalidMove(format!("({}, {}) is off the board", row, col)));
        }
        if self.cells[row][col].is_some() {
            return Err(VaultError::InvalidMove(format!("({}, {}) is taken", row, col)));
        }

        let player = self.current;
        self.cells[row][col] = Some(player);

        if self.has_won(player) {
            self.outcome = Some(Outcome::Win(player));
        } else if self.is_full() {
            self.outcome = Some(Outcome::Draw);
        } else {
            self.current = player.other();
        }

        Ok(self.outcome)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn has_won(&self, player: Player) -> bool {
        let owns = |r: usize, c: usize| self.cells[r][c] == Some(player);

        let line = (0..BOARD_SIZE).any(|i| {
            (0..BOARD_SIZE).all(|j| owns(i, j)) || (0..BOARD_SIZE).all(|j| owns(j, i))
        });

        line || (0..BOARD_SIZE).all(|i| owns(i, i))
            || (0..BOARD_SIZE).all(|i| owns(i, BOARD_SIZE - 1 - i))
    }

    fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(Option::is_some)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.cells.iter().enumerate() {
            let line: Vec<String> = row
                .iter()
                .map(|c| c.map(|p| p.to_string()).unwrap_or_else(|| " ".into()))
                .collect();
            writeln!(f, " {} ", line.join(" | "))?;
            if i + 1 < BOARD_SIZE {
                writeln!(f, "---+---+---")?;
            }
        }
        Ok(())
    }
}
