use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::palette::{names_match, ColorToken, Palette, Rgb, DARKEN_FACTOR};

/// Separator used when revealing the whole sequence after a lost game.
pub const SOLUTION_SEPARATOR: &str = " → ";

/// Source of bounded random indices for sequence generation.
pub trait Draw {
    /// Uniform index in `0..len`. `len` is never zero.
    fn index(&mut self, len: usize) -> usize;
}

/// Production draw backed by a seedable rng.
#[derive(Debug)]
pub struct RandomDraw<R: Rng = StdRng> {
    rng: R,
}

impl RandomDraw<StdRng> {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> RandomDraw<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> Draw for RandomDraw<R> {
    fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Everything the shell needs to present a freshly started round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSpec {
    pub round: u32,
    pub token: ColorToken,
    pub text_color: Rgb,
    pub background: Rgb,
    /// Seconds available to reproduce the sequence.
    pub time_budget: f64,
}

/// Owns the growing sequence and the round counter.
pub struct SequenceEngine {
    palette: Palette,
    timer_factor: f64,
    sequence: Vec<ColorToken>,
    round: u32,
    draw: Box<dyn Draw>,
}

impl SequenceEngine {
    pub fn new(palette: Palette, timer_factor: f64, draw: Box<dyn Draw>) -> Self {
        Self {
            palette,
            timer_factor,
            sequence: Vec::new(),
            round: 0,
            draw,
        }
    }

    pub fn reset(&mut self) {
        self.sequence.clear();
        self.round = 0;
    }

    pub fn next_round(&mut self) -> RoundSpec {
        self.round += 1;

        let pool = self.palette.active();
        let token = pool[self.draw.index(pool.len())].clone();
        self.sequence.push(token.clone());

        let text_color = self.pick_text_color(token.color());
        let spec = RoundSpec {
            round: self.round,
            text_color,
            background: text_color.darken(DARKEN_FACTOR),
            time_budget: self.time_budget(self.round),
            token,
        };
        tracing::debug!(
            round = spec.round,
            token = %spec.token,
            text_color = %spec.text_color,
            budget = spec.time_budget,
            "next round"
        );
        spec
    }

    /// A color for the word that never equals the word's own color.
    fn pick_text_color(&mut self, own: Rgb) -> Rgb {
        let mut candidates: Vec<Rgb> = self
            .palette
            .active()
            .iter()
            .map(ColorToken::color)
            .filter(|c| *c != own)
            .collect();
        if candidates.is_empty() {
            candidates = self
                .palette
                .full()
                .iter()
                .map(ColorToken::color)
                .filter(|c| *c != own)
                .collect();
        }
        if candidates.is_empty() {
            // every color in the palette is identical
            return own;
        }
        candidates[self.draw.index(candidates.len())]
    }

    /// Seconds for `round`. Never negative; a NaN product reads as zero.
    pub fn time_budget(&self, round: u32) -> f64 {
        (round as f64 * self.timer_factor).max(0.0)
    }

    /// Whole-sequence comparison, ignoring case.
    pub fn matches<S: AsRef<str>>(&self, input: &[S]) -> bool {
        input.len() == self.sequence.len()
            && self
                .sequence
                .iter()
                .zip(input)
                .all(|(expected, given)| expected.is(given.as_ref()))
    }

    /// Whether `name` is the expected token at `index`.
    pub fn matches_at(&self, index: usize, name: &str) -> bool {
        self.sequence
            .get(index)
            .is_some_and(|expected| names_match(expected.name(), name))
    }

    pub fn expected(&self, index: usize) -> Option<&ColorToken> {
        self.sequence.get(index)
    }

    pub fn sequence(&self) -> &[ColorToken] {
        &self.sequence
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn timer_factor(&self) -> f64 {
        self.timer_factor
    }

    pub fn solution(&self) -> String {
        self.sequence.iter().map(ColorToken::name).join(SOLUTION_SEPARATOR)
    }
}

impl std::fmt::Debug for SequenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceEngine")
            .field("round", &self.round)
            .field("sequence", &self.sequence)
            .field("timer_factor", &self.timer_factor)
            .finish_non_exhaustive()
    }
}

/// Draw that replays fixed indices, wrapping around when exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedDraw {
    indices: Vec<usize>,
    pos: usize,
}

impl ScriptedDraw {
    pub fn new(indices: Vec<usize>) -> Self {
        Self { indices, pos: 0 }
    }
}

impl Draw for ScriptedDraw {
    fn index(&mut self, len: usize) -> usize {
        if self.indices.is_empty() {
            return 0;
        }
        let value = self.indices[self.pos % self.indices.len()];
        self.pos += 1;
        value % len
    }
}
