//! Token prices used to turn usage into cost.

use serde::{Deserialize, Serialize};

use crate::llm::Usage;

/// USD per 1K prompt and completion tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

impl Pricing {
    /// Free of charge, as for local models.
    pub const FREE: Pricing = Pricing { prompt_per_1k: 0.0, completion_per_1k: 0.0 };

    /// Published prices of the OpenAI chat models; unknown models are free.
    pub fn for_model(model: &str) -> Self {
        let (prompt_per_1k, completion_per_1k) = match model {
            m if m.starts_with("gpt-4-32k") => (0.06, 0.12),
            m if m.starts_with("gpt-4") => (0.03, 0.06),
            m if m.starts_with("gpt-3.5-turbo-16k") => (0.003, 0.004),
            m if m.starts_with("gpt-3.5-turbo") => (0.0015, 0.002),
            _ => return Self::FREE,
        };
        Self { prompt_per_1k, completion_per_1k }
    }

    pub fn cost(&self, usage: &Usage) -> f64 {
        usage.prompt_tokens as f64 / 1000.0 * self.prompt_per_1k
            + usage.completion_tokens as f64 / 1000.0 * self.completion_per_1k
    }
}
