use serde::{Deserialize, Serialize};

/// Per-review aspect sentiment vector, the output contract of the upstream
/// NLP pipeline. Scores sit in [-1.0, +1.0]; confidence in [0.0, 1.0].
///
/// Polarity: for `overtreatment`, +1 means the patient perceived no
/// overtreatment (good). Every other dimension is +1-is-good as well; the
/// inversion into a risk figure happens once, in the score calculator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SentimentRecord {
    pub review_id: i64,
    pub price: Option<f64>,
    pub skill: Option<f64>,
    pub kindness: Option<f64>,
    pub waiting_time: Option<f64>,
    pub facility: Option<f64>,
    pub overtreatment: Option<f64>,
    pub confidence: f64,
    pub model_version: String,
}

impl SentimentRecord {
    /// Clamp every aspect score and the confidence into contract range.
    /// Upstream is trusted but stored rows predating validation exist.
    pub fn clamped(mut self) -> Self {
        let clamp = |value: Option<f64>| value.map(|v| v.clamp(-1.0, 1.0));
        self.price = clamp(self.price);
        self.skill = clamp(self.skill);
        self.kindness = clamp(self.kindness);
        self.waiting_time = clamp(self.waiting_time);
        self.facility = clamp(self.facility);
        self.overtreatment = clamp(self.overtreatment);
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self
    }
}
