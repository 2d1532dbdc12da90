use crate::utils::time::parse_slot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextActor {
    Scheduler,
    Interviewer,
    Candidate,
    Human,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NextActionMetadata {
    pub email_content: Option<String>,
    pub message_for_human: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Decision {
    pub interviewer_slots: Vec<String>,
    pub candidate_slots: Vec<String>,
    pub matching_slots: Vec<String>,
    pub next_action_taker: NextActor,
    pub next_action_metadata: NextActionMetadata,
}

impl Decision {
    /// Drops any slot entry that is not an absolute RFC 3339 timestamp.
    pub fn sanitized(mut self) -> Self {
        self.interviewer_slots = keep_parseable(self.interviewer_slots, "interviewerSlots");
        self.candidate_slots = keep_parseable(self.candidate_slots, "candidateSlots");
        self.matching_slots = keep_parseable(self.matching_slots, "matchingSlots");
        self
    }
}

fn keep_parseable(slots: Vec<String>, field: &str) -> Vec<String> {
    slots
        .into_iter()
        .filter(|raw| {
            if parse_slot(raw).is_ok() {
                true
            } else {
                tracing::warn!("Dropping non-absolute {} entry: {}", field, raw);
                false
            }
        })
        .collect()
}
