//! Console mini-games played while the crew works.

use rand::Rng;
use std::ops::RangeInclusive;

/// A line-oriented game: it prints text and reacts to one line of input at a time.
///
/// Games never fail: bad input gets a reprompt.
pub trait FillerGame: Send {
    /// Text printed once when the filler starts.
    fn intro(&mut self) -> String;

    /// Reacts to one line of input (without the trailing newline).
    fn respond(&mut self, line: &str) -> String;
}

/// Guess-the-number: "Too low", "Too high", then a fresh round on success.
#[derive(Debug, Clone)]
pub struct GuessingGame {
    range: RangeInclusive<u32>,
    secret: u32,
    guesses: u32,
    rounds_won: u32,
    fixed_secret: bool,
}

impl GuessingGame {
    /// Creates a game with a random secret in `range`.
    #[must_use]
    pub fn new(range: RangeInclusive<u32>) -> Self {
        let secret = draw(&range);
        Self {
            range,
            secret,
            guesses: 0,
            rounds_won: 0,
            fixed_secret: false,
        }
    }

    /// Creates a game whose secret is always `secret`.
    #[must_use]
    pub fn with_secret(range: RangeInclusive<u32>, secret: u32) -> Self {
        Self {
            range,
            secret,
            guesses: 0,
            rounds_won: 0,
            fixed_secret: true,
        }
    }

    /// Rounds won so far.
    #[must_use]
    pub const fn rounds_won(&self) -> u32 {
        self.rounds_won
    }

    fn bounds(&self) -> (u32, u32) {
        (*self.range.start(), *self.range.end())
    }

    fn new_round(&mut self) {
        self.guesses = 0;
        if !self.fixed_secret {
            self.secret = draw(&self.range);
        }
    }
}

fn draw(range: &RangeInclusive<u32>) -> u32 {
    if range.is_empty() {
        *range.start()
    } else {
        rand::thread_rng().gen_range(range.clone())
    }
}

impl FillerGame for GuessingGame {
    fn intro(&mut self) -> String {
        let (lo, hi) = self.bounds();
        format!("While the crew works, guess my number between {lo} and {hi}!\nYour guess: ")
    }

    fn respond(&mut self, line: &str) -> String {
        let (lo, hi) = self.bounds();
        let input = line.trim();

        let Ok(guess) = input.parse::<u32>() else {
            return format!("'{input}' is not a number. Enter a number between {lo} and {hi}: ");
        };
        if !self.range.contains(&guess) {
            return format!("{guess} is out of range. Enter a number between {lo} and {hi}: ");
        }

        self.guesses += 1;
        match guess.cmp(&self.secret) {
            std::cmp::Ordering::Less => "Too low! Try again: ".to_string(),
            std::cmp::Ordering::Greater => "Too high! Try again: ".to_string(),
            std::cmp::Ordering::Equal => {
                let guesses = self.guesses;
                let plural = if guesses == 1 { "" } else { "es" };
                self.rounds_won += 1;
                self.new_round();
                format!(
                    "Correct! {guess} found in {guesses} guess{plural}.\n\
                     New round: guess my number between {lo} and {hi}: "
                )
            }
        }
    }
}
