#![forbid(unsafe_code)]

use accord_kernel_contracts::consent::ButtonChoice;
use accord_kernel_contracts::oracle::AiDecision;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MismatchConfig {
    /// Transcripts below this scaled confidence are not trusted enough to
    /// flag a human decision.
    pub min_trusted_confidence_pct: u8,
}

impl MismatchConfig {
    pub fn mvp_v1() -> Self {
        Self {
            min_trusted_confidence_pct: 70,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MismatchRuntime {
    config: MismatchConfig,
}

impl MismatchRuntime {
    pub fn new(config: MismatchConfig) -> Self {
        Self { config }
    }

    /// Advisory-only disagreement check. `Unclear` counts as not-granted,
    /// so an unclear analysis against a "granted" button is a mismatch once
    /// the transcript clears the confidence bar.
    pub fn determine_mismatch(
        &self,
        decision: AiDecision,
        choice: ButtonChoice,
        transcription_confidence_pct: u8,
    ) -> bool {
        if transcription_confidence_pct < self.config.min_trusted_confidence_pct {
            return false;
        }
        let ai_granted = decision == AiDecision::ConsentGranted;
        let human_granted = choice == ButtonChoice::Granted;
        ai_granted != human_granted
    }
}
