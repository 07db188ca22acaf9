//! Turn-based game engine for the 3x3 symbol-grid game.
//!
//! A pure state machine: functions here take and return state and never touch
//! the transport or the room directory. The session coordinator owns the
//! per-room session map; a room with no entry in that map is in the implicit
//! `Waiting` state.

use serde::{Deserialize, Serialize};

/// The two player symbols. The host always plays `X` and moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    /// The opposing symbol.
    pub fn other(self) -> Self {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

/// Lifecycle of an active session. `Waiting` has no session object at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Playing,
    Finished,
}

/// Terminal result of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win(Symbol),
    Draw,
}

/// Reasons a move can be rejected, in validation order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("Game is not active.")]
    GameNotActive,

    #[error("You are not a player in this game.")]
    NotAPlayer,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Invalid position")]
    InvalidPosition,

    #[error("Position already taken")]
    CellOccupied,
}

/// Rejection of a rematch request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RematchError {
    #[error("Game is not finished yet.")]
    NotFinished,
}

/// The result of a successfully applied move.
///
/// `outcome` is `Some` only for the terminal move; a terminal move never also
/// flips the turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveUpdate {
    pub board: [Option<Symbol>; 9],
    pub turn: Symbol,
    pub outcome: Option<Outcome>,
}

/// The eight winning index triples: three rows, three columns, two diagonals.
const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// A game in progress (or finished) in one room.
///
/// Symbols are assigned strictly positionally: the first-listed player (the
/// room host) is `X` and moves first. At most one session exists per room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    pub room_id: String,
    pub board: [Option<Symbol>; 9],
    pub turn: Symbol,

    /// The two players in assignment order: host first (`X`), then `O`
    pub players: [(String, Symbol); 2],

    pub lifecycle: Lifecycle,
    pub outcome: Option<Outcome>,
}

impl GameSession {
    /// Starts a fresh game for the given room.
    ///
    /// `players` must list the host first; it receives `X` and the opening
    /// turn. The caller is responsible for ensuring both are current room
    /// members and that no session already exists for the room.
    pub fn start(room_id: impl Into<String>, players: [String; 2]) -> Self {
        let [host, guest] = players;
        Self {
            room_id: room_id.into(),
            board: [None; 9],
            turn: Symbol::X,
            players: [(host, Symbol::X), (guest, Symbol::O)],
            lifecycle: Lifecycle::Playing,
            outcome: None,
        }
    }

    /// The symbol assigned to `identity_id`, if it is one of the two players.
    pub fn symbol_of(&self, identity_id: &str) -> Option<Symbol> {
        self.players
            .iter()
            .find(|(id, _)| id == identity_id)
            .map(|(_, symbol)| *symbol)
    }

    /// Validates and applies a move by `identity_id` into `cell`.
    ///
    /// Validation order: active lifecycle, player membership, turn, position
    /// range, cell vacancy. On success the symbol is written, the win
    /// condition is evaluated over the eight fixed triples, then board
    /// fullness. The win check precedes the fullness check, so a final move
    /// that both wins and fills the board is reported as a win, never a draw.
    pub fn apply_move(&mut self, identity_id: &str, cell: usize) -> Result<MoveUpdate, MoveError> {
        if self.lifecycle != Lifecycle::Playing {
            return Err(MoveError::GameNotActive);
        }
        let symbol = self.symbol_of(identity_id).ok_or(MoveError::NotAPlayer)?;
        if symbol != self.turn {
            return Err(MoveError::NotYourTurn);
        }
        if cell >= 9 {
            return Err(MoveError::InvalidPosition);
        }
        if self.board[cell].is_some() {
            return Err(MoveError::CellOccupied);
        }

        self.board[cell] = Some(symbol);

        if self.has_winning_line(symbol) {
            self.lifecycle = Lifecycle::Finished;
            self.outcome = Some(Outcome::Win(symbol));
        } else if self.board.iter().all(|c| c.is_some()) {
            self.lifecycle = Lifecycle::Finished;
            self.outcome = Some(Outcome::Draw);
        } else {
            self.turn = symbol.other();
        }

        Ok(MoveUpdate {
            board: self.board,
            turn: self.turn,
            outcome: self.outcome,
        })
    }

    /// Resets a finished game for the same two players.
    ///
    /// Symbols are re-assigned identically to [`GameSession::start`] and the
    /// opening turn returns to `X`.
    pub fn rematch(&mut self) -> Result<(), RematchError> {
        if self.lifecycle != Lifecycle::Finished {
            return Err(RematchError::NotFinished);
        }
        self.board = [None; 9];
        self.turn = Symbol::X;
        self.lifecycle = Lifecycle::Playing;
        self.outcome = None;
        Ok(())
    }

    /// Ends a playing game because `leaver_id` left: the opponent wins by
    /// forfeit. Returns the winning symbol, or `None` if the game was not in
    /// progress or the leaver was not a player.
    pub fn forfeit(&mut self, leaver_id: &str) -> Option<Symbol> {
        if self.lifecycle != Lifecycle::Playing {
            return None;
        }
        let winner = self.symbol_of(leaver_id)?.other();
        self.lifecycle = Lifecycle::Finished;
        self.outcome = Some(Outcome::Win(winner));
        Some(winner)
    }

    /// True if `symbol` occupies a complete winning triple.
    ///
    /// Only the mover's own symbol is ever checked: a move cannot create a
    /// win for the opponent.
    fn has_winning_line(&self, symbol: Symbol) -> bool {
        WIN_LINES
            .iter()
            .any(|line| line.iter().all(|&i| self.board[i] == Some(symbol)))
    }
}
