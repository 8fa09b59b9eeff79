use rand::{seq::IndexedRandom, Rng};

use crate::{ImageRef, MosError, Result};

pub const DEFAULT_MESSAGES: &[&str] = &[
    "Great job!",
    "Keep going!",
    "You're doing awesome!",
    "Excellent work!",
    "Well done!",
    "Fantastic!",
    "Amazing progress!",
    "You're crushing it!",
    "Outstanding!",
    "Keep up the great work!",
];

/// Non-empty set of encouragement messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePool(Vec<String>);

impl MessagePool {
    pub fn new(messages: Vec<String>) -> Result<Self> {
        if messages.is_empty() {
            return Err(MosError::Config(
                "encouragement message pool is empty".to_string(),
            ));
        }
        Ok(Self(messages))
    }

    pub fn contains(&self, message: &str) -> bool {
        self.0.iter().any(|m| m == message)
    }
}

impl Default for MessagePool {
    fn default() -> Self {
        Self(DEFAULT_MESSAGES.iter().map(|m| m.to_string()).collect())
    }
}

/// What the encouragement screen shows for one visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncouragementSelection {
    pub message: String,
    /// `None` when no images are available; the screen then draws its
    /// fallback decoration.
    pub image: Option<ImageRef>,
}

/// Draws one message and, when the pool is non-empty, one image, both
/// uniformly.
pub fn pick<R: Rng>(
    messages: &MessagePool,
    images: &[ImageRef],
    rng: &mut R,
) -> EncouragementSelection {
    let index = rng.random_range(0..messages.0.len());
    let message = messages.0[index].clone();
    let image = images.choose(rng).cloned();

    EncouragementSelection { message, image }
}
