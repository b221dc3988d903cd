use anyhow::{Context, Result, anyhow};

use crate::protocol::{Coord, Promotion};

pub const HELP: &str = "commands: MOVE/m <fx> <fy> <tx> <ty> [QUEEN|ROOK|KNIGHT|BISHOP], \
BOARD/b, STATUS/s, HELP/h, QUIT/q (the MOVE keyword may be omitted)";

#[derive(Debug, PartialEq)]
pub enum ConsoleCommand {
    Move {
        from: Coord,
        to: Coord,
        promotion: Option<Promotion>,
    },
    Board,
    Status,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parses one line of user input. Keywords are case-insensitive and
    /// accept single-letter aliases; a line starting with a number is a move.
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = parts.first() else {
            return Err(anyhow!("empty command"));
        };

        if first.parse::<u8>().is_ok() {
            return parse_move(&parts);
        }

        match first.to_uppercase().as_str() {
            "MOVE" | "M" => parse_move(&parts[1..]),
            "BOARD" | "B" => Ok(ConsoleCommand::Board),
            "STATUS" | "S" => Ok(ConsoleCommand::Status),
            "HELP" | "H" => Ok(ConsoleCommand::Help),
            "QUIT" | "Q" | "EXIT" => Ok(ConsoleCommand::Quit),
            _ => Err(anyhow!("invalid command. {HELP}")),
        }
    }
}

fn parse_move(args: &[&str]) -> Result<ConsoleCommand> {
    let (coords, promotion) = match args.len() {
        4 => (args, None),
        5 => (&args[..4], Some(args[4])),
        _ => return Err(anyhow!("MOVE requires four coordinates: <fx> <fy> <tx> <ty> [piece]")),
    };

    let mut values = [0u8; 4];
    for (slot, raw) in values.iter_mut().zip(coords) {
        *slot = raw
            .parse()
            .with_context(|| format!("invalid coordinate {raw:?}"))?;
    }
    let [fx, fy, tx, ty] = values;

    let promotion = promotion
        .map(|piece| piece.parse::<Promotion>())
        .transpose()?;

    Ok(ConsoleCommand::Move {
        from: Coord::new(fx, fy),
        to: Coord::new(tx, ty),
        promotion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_coordinates_are_a_move() {
        assert_eq!(
            ConsoleCommand::parse("4 6 4 4").expect("move"),
            ConsoleCommand::Move {
                from: Coord::new(4, 6),
                to: Coord::new(4, 4),
                promotion: None,
            }
        );
    }

    #[test]
    fn move_keyword_and_promotion() {
        assert_eq!(
            ConsoleCommand::parse("m 0 1 0 0 knight").expect("move"),
            ConsoleCommand::Move {
                from: Coord::new(0, 1),
                to: Coord::new(0, 0),
                promotion: Some(Promotion::Knight),
            }
        );
        assert!(matches!(
            ConsoleCommand::parse("MOVE 0 1 0 0"),
            Ok(ConsoleCommand::Move {
                promotion: None,
                ..
            })
        ));
    }

    #[test]
    fn keywords_and_aliases() {
        assert!(matches!(ConsoleCommand::parse("board"), Ok(ConsoleCommand::Board)));
        assert!(matches!(ConsoleCommand::parse("B"), Ok(ConsoleCommand::Board)));
        assert!(matches!(ConsoleCommand::parse("Status"), Ok(ConsoleCommand::Status)));
        assert!(matches!(ConsoleCommand::parse("h"), Ok(ConsoleCommand::Help)));
        assert!(matches!(ConsoleCommand::parse("QUIT"), Ok(ConsoleCommand::Quit)));
        assert!(matches!(ConsoleCommand::parse("exit"), Ok(ConsoleCommand::Quit)));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(ConsoleCommand::parse("").is_err());
        assert!(ConsoleCommand::parse("   ").is_err());
        assert!(ConsoleCommand::parse("castle").is_err());
        assert!(ConsoleCommand::parse("4 6 4").is_err());
        assert!(ConsoleCommand::parse("4 6 4 x").is_err());
        assert!(ConsoleCommand::parse("4 6 4 -1").is_err());
        assert!(ConsoleCommand::parse("0 1 0 0 king").is_err());
        assert!(ConsoleCommand::parse("m 0 1 0 0 queen extra").is_err());
    }
}
