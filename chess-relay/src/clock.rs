use std::{fmt, time::Duration};

use crate::protocol::TimeControl;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    NotCreated,
    Running,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    owner: String,
    remaining: Duration,
    running: bool,
}

impl Timer {
    pub fn new(owner: impl Into<String>, limit: Duration) -> Self {
        Self {
            owner: owner.into(),
            remaining: limit,
            running: !limit.is_zero(),
        }
    }

    /// `None` for an untimed control: no clock exists at all.
    pub fn from_control(owner: impl Into<String>, time: &TimeControl) -> Option<Self> {
        time.limit().map(|limit| Self::new(owner, limit))
    }

    /// One elapsed second. Has no effect once expired.
    pub fn update(&mut self) {
        if !self.running {
            return;
        }
        self.remaining = self.remaining.saturating_sub(TICK);
        if self.remaining.is_zero() {
            self.running = false;
        }
    }

    pub fn is_expired(&self) -> bool {
        !self.running
    }

    pub fn state(&self) -> TimerState {
        if self.running {
            TimerState::Running
        } else {
            TimerState::Expired
        }
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.remaining.as_secs();
        write!(f, "{} {}:{:02}", self.owner, secs / 60, secs % 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Yours,
    Opponents,
}

#[derive(Debug, Clone, Default)]
pub struct Clocks {
    yours: Option<Timer>,
    opponents: Option<Timer>,
}

impl Clocks {
    pub fn new(name: &str, time: &TimeControl) -> Self {
        Self {
            yours: Timer::from_control(name, time),
            opponents: None,
        }
    }

    /// Creates the opponent's clock the first time their control is learned.
    /// Later announcements never reset a running clock.
    pub fn start_opponent(&mut self, name: &str, time: &TimeControl) {
        if self.opponents.is_none() {
            self.opponents = Timer::from_control(name, time);
        }
    }

    /// Advances only the clock of the side whose turn it is.
    pub fn tick(&mut self, your_turn: bool) -> Option<&Timer> {
        let running = if your_turn {
            self.yours.as_mut()
        } else {
            self.opponents.as_mut()
        }?;
        running.update();
        Some(running)
    }

    /// Checked regardless of whose turn it is. Your own clock wins ties.
    pub fn expired(&self) -> Option<Expiry> {
        if self.yours.as_ref().is_some_and(Timer::is_expired) {
            Some(Expiry::Yours)
        } else if self.opponents.as_ref().is_some_and(Timer::is_expired) {
            Some(Expiry::Opponents)
        } else {
            None
        }
    }

    pub fn yours(&self) -> Option<&Timer> {
        self.yours.as_ref()
    }

    pub fn opponents(&self) -> Option<&Timer> {
        self.opponents.as_ref()
    }

    pub fn state(&self, which: Expiry) -> TimerState {
        let timer = match which {
            Expiry::Yours => self.yours.as_ref(),
            Expiry::Opponents => self.opponents.as_ref(),
        };
        timer.map_or(TimerState::NotCreated, Timer::state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed(minutes: u32, seconds: u32) -> TimeControl {
        TimeControl::Timed { minutes, seconds }
    }

    #[test]
    fn ten_second_timer_expires_on_the_tenth_update() {
        let mut timer = Timer::from_control("alice", &timed(0, 10)).expect("timed control");
        for _ in 0..9 {
            timer.update();
            assert!(!timer.is_expired());
        }
        assert_eq!(timer.remaining(), Duration::from_secs(1));

        timer.update();
        assert!(timer.is_expired());
        assert_eq!(timer.state(), TimerState::Expired);

        timer.update();
        assert_eq!(timer.remaining(), Duration::ZERO);
    }

    #[test]
    fn untimed_control_creates_no_clock() {
        let clocks = Clocks::new("alice", &TimeControl::Untimed);
        assert!(clocks.yours().is_none());
        assert_eq!(clocks.state(Expiry::Yours), TimerState::NotCreated);
        assert_eq!(clocks.state(Expiry::Opponents), TimerState::NotCreated);
    }

    #[test]
    fn only_the_side_to_move_ticks() {
        let mut clocks = Clocks::new("alice", &timed(1, 0));
        clocks.start_opponent("bob", &timed(0, 30));

        clocks.tick(true);
        clocks.tick(true);
        clocks.tick(false);

        assert_eq!(clocks.yours().map(Timer::remaining), Some(Duration::from_secs(58)));
        assert_eq!(clocks.opponents().map(Timer::remaining), Some(Duration::from_secs(29)));
    }

    #[test]
    fn opponent_clock_is_created_once() {
        let mut clocks = Clocks::new("alice", &TimeControl::Untimed);
        clocks.tick(false);
        assert_eq!(clocks.state(Expiry::Opponents), TimerState::NotCreated);

        clocks.start_opponent("bob", &timed(0, 5));
        clocks.tick(false);
        clocks.start_opponent("bob", &timed(9, 0));
        assert_eq!(clocks.opponents().map(Timer::remaining), Some(Duration::from_secs(4)));
        assert_eq!(clocks.opponents().map(Timer::owner), Some("bob"));
    }

    #[test]
    fn expiry_is_reported_for_the_clock_that_ran_out() {
        let mut clocks = Clocks::new("alice", &timed(0, 2));
        clocks.start_opponent("bob", &timed(0, 1));
        assert_eq!(clocks.expired(), None);

        clocks.tick(false);
        assert_eq!(clocks.expired(), Some(Expiry::Opponents));

        clocks.tick(true);
        clocks.tick(true);
        assert_eq!(clocks.expired(), Some(Expiry::Yours));
    }

    #[test]
    fn displays_remaining_time() {
        let timer = Timer::new("alice", Duration::from_secs(185));
        assert_eq!(timer.to_string(), "alice 3:05");
    }
}
