use rand::{seq::SliceRandom, Rng};

/// Passages a session can draw from
pub const SAMPLE_TEXTS: [&str; 6] = [
    "The quick brown fox jumps over the lazy dog. This pangram contains every letter of the alphabet at least once, making it perfect for typing practice and testing keyboard skills.",
    "In a hole in the ground there lived a hobbit. Not a nasty, dirty, wet hole, filled with the ends of worms and an oozy smell, nor yet a dry, bare, sandy hole with nothing in it to sit down on or to eat.",
    "It was the best of times, it was the worst of times, it was the age of wisdom, it was the age of foolishness, it was the epoch of belief, it was the epoch of incredulity, it was the season of light, it was the season of darkness.",
    "To be or not to be, that is the question. Whether 'tis nobler in the mind to suffer the slings and arrows of outrageous fortune, or to take arms against a sea of troubles and by opposing end them.",
    "All happy families are alike; each unhappy family is unhappy in its own way. Everything was in confusion in the Oblonskys' house. The wife had discovered that the husband was carrying on an intrigue with a French girl.",
    "Call me Ishmael. Some years ago\u{2014}never mind how long precisely\u{2014}having little or no money in my purse, and nothing particular to interest me on shore, I thought I would sail about a little and see the watery part of the world.",
];

/// Fixed set of sample texts with uniform random selection
#[derive(Debug, Clone)]
pub struct SampleCorpus {
    texts: Vec<String>,
}

impl Default for SampleCorpus {
    fn default() -> Self {
        Self {
            texts: SAMPLE_TEXTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SampleCorpus {
    /// Corpus built from caller supplied passages; blank ones are dropped.
    /// Falls back to the built-in passages when nothing usable is left.
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let texts: Vec<String> = texts
            .into_iter()
            .map(Into::into)
            .filter(|t| !t.trim().is_empty())
            .collect();

        if texts.is_empty() {
            Self::default()
        } else {
            Self { texts }
        }
    }

    /// Single passage corpus, used for `--prompt`
    pub fn custom(prompt: impl Into<String>) -> Self {
        Self::new([prompt.into()])
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn pick(&self) -> String {
        self.pick_with(&mut rand::thread_rng())
    }

    pub fn pick_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        // `texts` is never empty, see `new`
        self.texts.choose(rng).cloned().unwrap_or_default()
    }
}
