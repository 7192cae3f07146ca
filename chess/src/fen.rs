use cozy_chess::Board;

use crate::side::Side;

/// What the lamp needs to know about a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenSummary {
    pub side_to_move: Side,
    /// Plies since the start of move numbering, derived from the fullmove
    /// counter. `None` when the FEN omits its move counters.
    pub ply: Option<u32>,
    pub in_check: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FenError {
    #[error("Invalid FEN format: {0}")]
    InvalidFormat(String),
    #[error("Invalid board layout: {0}")]
    InvalidBoardLayout(String),
}

/// Parse a FEN string into a Board.
///
/// Lichess stream lines sometimes carry only the first four FEN fields, so
/// missing halfmove/fullmove counters are padded before parsing.
pub fn parse_fen(fen: &str) -> Result<(Board, bool), FenError> {
    let parts: Vec<&str> = fen.split_whitespace().collect();
    let (normalized, has_counters) = match parts.len() {
        6 => (parts.join(" "), true),
        2..=4 => {
            let mut padded = parts.clone();
            // side, castling, en passant
            let defaults = ["w", "-", "-"];
            for default in defaults.iter().skip(padded.len() - 1) {
                padded.push(default);
            }
            (format!("{} 0 1", padded.join(" ")), false)
        }
        _ => return Err(FenError::InvalidFormat(fen.to_string())),
    };

    let board = normalized
        .parse::<Board>()
        .map_err(|_| FenError::InvalidBoardLayout(fen.to_string()))?;
    Ok((board, has_counters))
}

/// Read side to move, ply and check status out of a FEN.
pub fn summarize_fen(fen: &str) -> Result<FenSummary, FenError> {
    let (board, has_counters) = parse_fen(fen)?;
    let side_to_move = Side::from(board.side_to_move());
    let ply = has_counters.then(|| {
        let fullmove = u32::from(board.fullmove_number()).max(1);
        (fullmove - 1) * 2 + u32::from(side_to_move == Side::Black)
    });

    Ok(FenSummary {
        side_to_move,
        ply,
        in_check: !board.checkers().is_empty(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_start_position() {
        let summary = summarize_fen(START).unwrap();
        assert_eq!(summary.side_to_move, Side::White);
        assert_eq!(summary.ply, Some(0));
        assert!(!summary.in_check);
    }

    #[test]
    fn test_ply_after_e4() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
        let summary = summarize_fen(fen).unwrap();
        assert_eq!(summary.side_to_move, Side::Black);
        assert_eq!(summary.ply, Some(1));
    }

    #[test]
    fn test_check_detected() {
        // 1. e4 f5 2. Qh5+
        let fen = "rnbqkbnr/ppppp1pp/8/5p1Q/4P3/8/PPPP1PPP/RNB1KBNR b KQkq - 1 2";
        let summary = summarize_fen(fen).unwrap();
        assert!(summary.in_check);
        assert_eq!(summary.side_to_move, Side::Black);
        assert_eq!(summary.ply, Some(3));
    }

    #[test]
    fn test_short_fen_has_no_ply() {
        let summary = summarize_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b").unwrap();
        assert_eq!(summary.side_to_move, Side::Black);
        assert_eq!(summary.ply, None);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(summarize_fen("").is_err());
        assert!(summarize_fen("not a fen at all").is_err());
    }
}
