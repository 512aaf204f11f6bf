use std::sync::Arc;

use crate::application::warmer::Warmer;
use crate::application::words::{WordCache, WordService};

#[derive(Clone)]
pub struct ApiState {
    pub words: Arc<WordService>,
    pub cache: Arc<WordCache>,
    pub warmer: Arc<Warmer>,
}

impl ApiState {
    pub fn new(words: Arc<WordService>, warmer: Arc<Warmer>) -> Self {
        Self {
            cache: Arc::clone(words.cache()),
            words,
            warmer,
        }
    }
}
