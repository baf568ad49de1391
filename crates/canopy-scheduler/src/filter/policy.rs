//! Coherence policy: coherence >= threshold stays eligible

pub struct CoherencePolicy {
    threshold: f64,
}

impl CoherencePolicy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_coherent(&self, coherence: f64) -> bool {
        coherence >= self.threshold
    }
}
