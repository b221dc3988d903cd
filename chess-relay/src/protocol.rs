use std::{fmt, io, str::FromStr, time::Duration};

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, Lines};

use crate::error::{FieldError, ProtocolError};

pub type PlayerId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Color::White => "White",
            Color::Black => "Black",
        })
    }
}

impl FromStr for Color {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("white") {
            Ok(Color::White)
        } else if s.eq_ignore_ascii_case("black") {
            Ok(Color::Black)
        } else {
            Err(FieldError("color must be White or Black"))
        }
    }
}

/// Countdown allotted to one player.
///
/// `Untimed` is signalled on the wire by minute/second fields that contain a
/// letter (conventionally `M:S`) rather than by a separate message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeControl {
    Timed { minutes: u32, seconds: u32 },
    Untimed,
}

impl TimeControl {
    pub fn limit(&self) -> Option<Duration> {
        match *self {
            TimeControl::Timed { minutes, seconds } => Some(Duration::from_secs(
                u64::from(minutes) * 60 + u64::from(seconds),
            )),
            TimeControl::Untimed => None,
        }
    }
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeControl::Timed { minutes, seconds } => write!(f, "{minutes}:{seconds}"),
            TimeControl::Untimed => f.write_str("M:S"),
        }
    }
}

impl FromStr for TimeControl {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (minutes, seconds) = s
            .split_once(':')
            .ok_or(FieldError("time control must be MINUTES:SECONDS"))?;

        match (minutes.parse::<u32>(), seconds.parse::<u32>()) {
            (Ok(minutes), Ok(seconds)) => Ok(TimeControl::Timed { minutes, seconds }),
            _ if has_untimed_marker(minutes) || has_untimed_marker(seconds) => {
                Ok(TimeControl::Untimed)
            }
            _ => Err(FieldError(
                "time control fields must be numbers or an untimed marker",
            )),
        }
    }
}

fn has_untimed_marker(field: &str) -> bool {
    field.chars().any(|c| c.is_ascii_alphabetic())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    pub x: u8,
    pub y: u8,
}

impl Coord {
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    Queen,
    Rook,
    Knight,
    Bishop,
}

impl fmt::Display for Promotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Promotion::Queen => "QUEEN",
            Promotion::Rook => "ROOK",
            Promotion::Knight => "KNIGHT",
            Promotion::Bishop => "BISHOP",
        })
    }
}

impl FromStr for Promotion {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "QUEEN" => Ok(Promotion::Queen),
            "ROOK" => Ok(Promotion::Rook),
            "KNIGHT" => Ok(Promotion::Knight),
            "BISHOP" => Ok(Promotion::Bishop),
            _ => Err(FieldError("promotion must be QUEEN, ROOK, KNIGHT or BISHOP")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveMessage {
    pub from: Coord,
    pub to: Coord,
    pub promotion: Option<Promotion>,
}

impl MoveMessage {
    pub fn new(from: Coord, to: Coord) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, promotion: Promotion) -> Self {
        self.promotion = Some(promotion);
        self
    }
}

impl fmt::Display for MoveMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.from.x, self.from.y, self.to.x, self.to.y
        )?;
        if let Some(promotion) = self.promotion {
            write!(f, "-PROMOTION:{promotion}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub color: Color,
    pub name: String,
    pub time: TimeControl,
}

impl fmt::Display for PlayerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.id, self.color, self.name, self.time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub name: String,
    pub color: Color,
    pub time: TimeControl,
}

impl Handshake {
    /// Builds a handshake, refusing names that would collide with the
    /// protocol's `:` and `-` delimiters.
    pub fn new(
        name: impl Into<String>,
        color: Color,
        time: TimeControl,
    ) -> Result<Self, FieldError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { name, color, time })
    }
}

impl fmt::Display for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.color, self.time)
    }
}

impl FromStr for Handshake {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let malformed = |reason| ProtocolError::HandshakeMalformed {
            line: line.to_string(),
            reason,
        };
        let shape = FieldError("handshake must be NAME:COLOR:MINUTES:SECONDS");

        let (name, rest) = line.split_once(':').ok_or_else(|| malformed(shape))?;
        let (color, time) = rest.split_once(':').ok_or_else(|| malformed(shape))?;
        let color = color.parse::<Color>().map_err(malformed)?;
        let time = time.parse::<TimeControl>().map_err(malformed)?;
        Handshake::new(name, color, time).map_err(malformed)
    }
}

fn validate_name(name: &str) -> Result<(), FieldError> {
    if name.trim().is_empty() {
        return Err(FieldError("name must not be empty"));
    }
    if name.contains([':', '-']) {
        return Err(FieldError("name must not contain ':' or '-'"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Identity(PlayerInfo),
    PeerAnnounce(PlayerInfo),
    Move(MoveMessage),
    Rejected { reason: String },
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Identity(info) => write!(f, "ID:{info}"),
            Message::PeerAnnounce(info) => write!(f, "PLAYER:{info}"),
            Message::Move(mv) => write!(f, "MOVE:{mv}"),
            Message::Rejected { reason } => write!(f, "REJECTED:{reason}"),
        }
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let decode = |reason| ProtocolError::Decode {
            line: line.to_string(),
            reason,
        };

        let (tag, body) = line
            .split_once(':')
            .ok_or_else(|| decode(FieldError("message has no tag")))?;

        match tag {
            "ID" => parse_player(body).map(Message::Identity),
            "PLAYER" => parse_player(body).map(Message::PeerAnnounce),
            "MOVE" => parse_move(body).map(Message::Move),
            "REJECTED" => Ok(Message::Rejected {
                reason: body.to_string(),
            }),
            _ => Err(FieldError("unknown message tag")),
        }
        .map_err(decode)
    }
}

fn parse_player(body: &str) -> Result<PlayerInfo, FieldError> {
    let shape = FieldError("player must be ID-COLOR-NAME-MINUTES:SECONDS");
    let (id, rest) = body.split_once('-').ok_or(shape)?;
    let (color, rest) = rest.split_once('-').ok_or(shape)?;
    let (name, time) = rest.split_once('-').ok_or(shape)?;
    validate_name(name)?;

    Ok(PlayerInfo {
        id: id
            .parse()
            .map_err(|_| FieldError("player id must be a number"))?,
        color: color.parse()?,
        name: name.to_string(),
        time: time.parse()?,
    })
}

fn parse_move(body: &str) -> Result<MoveMessage, FieldError> {
    let (coords, promotion) = match body.split_once("-PROMOTION:") {
        Some((coords, piece)) => (coords, Some(piece.parse::<Promotion>()?)),
        None => (body, None),
    };

    let coords = coords
        .split('-')
        .map(|value| {
            value
                .parse::<u8>()
                .map_err(|_| FieldError("move coordinates must be small non-negative integers"))
        })
        .collect::<Result<Vec<u8>, _>>()?;
    let &[from_x, from_y, to_x, to_y] = coords.as_slice() else {
        return Err(FieldError("move needs exactly four coordinates"));
    };

    Ok(MoveMessage {
        from: Coord::new(from_x, from_y),
        to: Coord::new(to_x, to_y),
        promotion,
    })
}

/// Reads the next non-blank line. `Ok(None)` means the peer closed the stream.
///
/// Built on `Lines::next_line`, so it is safe to race inside `select!`.
pub async fn next_line<R>(lines: &mut Lines<R>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            return Ok(Some(line));
        }
    }
    Ok(None)
}

pub async fn read_message<R, T>(lines: &mut Lines<R>) -> io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: FromStr<Err = ProtocolError>,
{
    match next_line(lines).await? {
        Some(line) => line.parse().map(Some).map_err(to_io_error),
        None => Ok(None),
    }
}

pub async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    // One write per line so a peer never observes half a message.
    let mut encoded = Vec::with_capacity(line.len() + 1);
    encoded.extend_from_slice(line.as_bytes());
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: fmt::Display,
{
    write_line(writer, &message.to_string()).await
}

fn to_io_error(err: ProtocolError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}
