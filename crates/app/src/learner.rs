use std::collections::HashMap;

use prep_core::model::{FlashcardRating, ObjectiveId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded stand-in for a person answering questions.
///
/// Each objective gets a fixed skill in `[0.45, 0.95)` the first time it is
/// seen; answers are correct with that probability.
pub struct SimulatedLearner {
    rng: StdRng,
    skills: HashMap<ObjectiveId, f64>,
}

impl SimulatedLearner {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            skills: HashMap::new(),
        }
    }

    pub fn skill(&mut self, objective_id: &ObjectiveId) -> f64 {
        if let Some(skill) = self.skills.get(objective_id) {
            return *skill;
        }
        let skill = self.rng.random_range(0.45..0.95);
        self.skills.insert(objective_id.clone(), skill);
        skill
    }

    /// Pick an option index for a question with `option_count` choices.
    pub fn choose(&mut self, objective_id: &ObjectiveId, correct_index: usize, option_count: usize) -> usize {
        let skill = self.skill(objective_id);
        if option_count < 2 || self.rng.random_bool(skill) {
            correct_index
        } else {
            let offset = self.rng.random_range(1..option_count);
            (correct_index + offset) % option_count
        }
    }

    pub fn rate_flashcard(&mut self, objective_id: &ObjectiveId) -> FlashcardRating {
        let skill = self.skill(objective_id);
        let roll: f64 = self.rng.random();
        match roll {
            r if r < skill * 0.5 => FlashcardRating::Easy,
            r if r < skill => FlashcardRating::Good,
            r if r < (skill + 1.0) / 2.0 => FlashcardRating::Hard,
            _ => FlashcardRating::Again,
        }
    }

    /// Seconds spent on one item.
    pub fn think_time(&mut self) -> u32 {
        self.rng.random_range(35..=130)
    }
}
