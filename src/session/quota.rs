//! QuotaPolicy - per-credential generation ceiling.
//!
//! Pure decisions over `(counter, event)`; persistence and side effects live
//! in the session.

/// Generations permitted per credential before a new one is required.
pub const DEFAULT_GENERATION_CEILING: u32 = 10;

/// Something that happened to the active credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaEvent {
    /// A generation is about to be submitted.
    BeforeSubmit,
    /// A generation finished and produced a video.
    GenerationCompleted,
    /// A new credential was saved.
    CredentialSaved,
}

/// What the caller should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaSignal {
    /// Go ahead.
    Proceed,
    /// Go ahead, but this is the last permitted generation.
    LastGeneration,
    /// Ceiling already reached: do not submit, ask for a new credential.
    Exceeded,
    /// The completion just reached the ceiling: clear the credential.
    JustExhausted,
    /// Counter reset by a new credential; drop pending quota notices.
    Reset,
}

/// Result of applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    pub counter: u32,
    pub signal: QuotaSignal,
}

impl QuotaDecision {
    /// Whether a submission may go ahead.
    pub fn allows_submit(&self) -> bool {
        matches!(self.signal, QuotaSignal::Proceed | QuotaSignal::LastGeneration)
    }

    /// Whether the credential must be replaced before the next submission.
    pub fn requires_new_credential(&self) -> bool {
        matches!(self.signal, QuotaSignal::Exceeded | QuotaSignal::JustExhausted)
    }
}

/// Fixed-ceiling quota policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    ceiling: u32,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_GENERATION_CEILING)
    }
}

impl QuotaPolicy {
    /// Create a policy. A ceiling of zero is raised to one.
    pub fn new(ceiling: u32) -> Self {
        Self {
            ceiling: ceiling.max(1),
        }
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Generations left before the ceiling.
    pub fn remaining(&self, counter: u32) -> u32 {
        self.ceiling.saturating_sub(counter)
    }

    /// Apply `event` to `counter`.
    pub fn apply(&self, counter: u32, event: QuotaEvent) -> QuotaDecision {
        match event {
            QuotaEvent::BeforeSubmit => {
                let signal = if counter >= self.ceiling {
                    QuotaSignal::Exceeded
                } else if counter == self.ceiling - 1 {
                    QuotaSignal::LastGeneration
                } else {
                    QuotaSignal::Proceed
                };
                QuotaDecision { counter, signal }
            }
            QuotaEvent::GenerationCompleted => {
                let counter = counter.saturating_add(1);
                let signal = if counter == self.ceiling {
                    QuotaSignal::JustExhausted
                } else {
                    QuotaSignal::Proceed
                };
                QuotaDecision { counter, signal }
            }
            QuotaEvent::CredentialSaved => QuotaDecision {
                counter: 0,
                signal: QuotaSignal::Reset,
            },
        }
    }
}
