//! Session context: the active credential, its usage counter and the
//! current result, threaded explicitly through every generation.

mod quota;
mod store;

pub use quota::{QuotaDecision, QuotaEvent, QuotaPolicy, QuotaSignal, DEFAULT_GENERATION_CEILING};
pub use store::{
    default_state_path, CredentialStore, FileStore, MemoryStore, StoreError, StoredState,
    CREDENTIAL_KEY, USAGE_KEY,
};

use crate::veo::{
    Clock, Credential, GenerationRequest, JobClient, JobError, KeywordClassifier, PlayableResult,
    RejectionClassifier, RejectionKind, ResultSlot,
};

/// Non-blocking information for the user, emitted while a generation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The upcoming generation is the last one allowed for this credential.
    LastGeneration { ceiling: u32 },
    /// The ceiling was just reached; the credential has been cleared.
    QuotaExhausted { ceiling: u32 },
    /// The service rejected the credential; it has been cleared.
    CredentialRejected(RejectionKind),
    /// Settings that were chosen but not sent to the service.
    SettingsNotTransmitted(Vec<&'static str>),
}

/// Errors surfaced to the shell.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Please set your Google Gemini API key first.")]
    MissingCredential,

    #[error("Generation limit of {ceiling} reached for this API key ({used} used). Please enter a new API key.")]
    QuotaExceeded { used: u32, ceiling: u32 },

    #[error("Failed to generate video: {source}")]
    Generation {
        #[source]
        source: JobError,
        rejection: RejectionKind,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Whether the user has to provide a new credential before retrying.
    ///
    /// When false the failure is generic and the same request can be resent.
    pub fn requires_new_credential(&self) -> bool {
        match self {
            SessionError::QuotaExceeded { .. } | SessionError::MissingCredential => true,
            SessionError::Generation { rejection, .. } => rejection.is_credential_related(),
            SessionError::Store(_) => false,
        }
    }
}

/// Outcome of a successful generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSummary {
    /// Usage counter after the generation.
    pub usage: u32,
    /// Generations left for the current credential.
    pub remaining: u32,
    /// Whether the credential was cleared because the ceiling was reached.
    pub credential_cleared: bool,
}

/// One user's session.
///
/// Generation takes `&mut self`, so a second submission cannot start while
/// one is in flight.
pub struct Session<S, R = KeywordClassifier> {
    store: S,
    policy: QuotaPolicy,
    classifier: R,
    credential: Option<Credential>,
    usage: u32,
    results: ResultSlot,
}

impl<S: CredentialStore> Session<S, KeywordClassifier> {
    /// Open a session from persisted state with the default policy and classifier.
    pub fn open(store: S) -> Result<Self, SessionError> {
        Self::open_with(store, QuotaPolicy::default(), KeywordClassifier::default())
    }
}

impl<S: CredentialStore, R: RejectionClassifier> Session<S, R> {
    /// Open a session with an explicit policy and classifier.
    pub fn open_with(store: S, policy: QuotaPolicy, classifier: R) -> Result<Self, SessionError> {
        let state = store.load()?;
        if let Some(credential) = &state.credential {
            log::debug!(
                "Loaded key {} with {} generations used",
                credential.fingerprint(),
                state.usage
            );
        }
        Ok(Self {
            store,
            policy,
            classifier,
            credential: state.credential,
            usage: state.usage,
            results: ResultSlot::new(),
        })
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn usage(&self) -> u32 {
        self.usage
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Latest result, kept until superseded or taken.
    pub fn current_result(&self) -> Option<&PlayableResult> {
        self.results.current()
    }

    /// Take the latest result out of the session.
    pub fn take_result(&mut self) -> Option<PlayableResult> {
        self.results.take()
    }

    /// Save a new credential. The usage counter always restarts at 0.
    pub fn save_credential(&mut self, credential: Credential) -> Result<(), SessionError> {
        let decision = self.policy.apply(self.usage, QuotaEvent::CredentialSaved);
        self.store.save(&credential)?;
        log::info!("Saved API key {}", credential.fingerprint());
        self.credential = Some(credential);
        self.usage = decision.counter;
        Ok(())
    }

    /// Forget the stored credential.
    pub fn clear_credential(&mut self) -> Result<(), SessionError> {
        self.store.clear()?;
        self.credential = None;
        Ok(())
    }

    /// Run one generation with the active credential.
    ///
    /// `on_notice` receives warnings as they happen, the last-generation
    /// warning before the job is submitted.
    ///
    /// # Errors
    ///
    /// `SessionError::MissingCredential` when no credential is set,
    /// `SessionError::QuotaExceeded` when the ceiling was already reached
    /// (no network call in either case), `SessionError::Generation`
    /// when the job fails. Credential-related failures clear the stored
    /// credential; see [`SessionError::requires_new_credential`].
    pub async fn generate<C: Clock>(
        &mut self,
        client: &JobClient<C>,
        request: &GenerationRequest,
        mut on_notice: impl FnMut(Notice),
    ) -> Result<GenerationSummary, SessionError> {
        let credential = self
            .credential
            .clone()
            .ok_or(SessionError::MissingCredential)?;

        let decision = self.policy.apply(self.usage, QuotaEvent::BeforeSubmit);
        match decision.signal {
            QuotaSignal::Exceeded => {
                return Err(SessionError::QuotaExceeded {
                    used: self.usage,
                    ceiling: self.policy.ceiling(),
                })
            }
            QuotaSignal::LastGeneration => on_notice(Notice::LastGeneration {
                ceiling: self.policy.ceiling(),
            }),
            _ => {}
        }

        let dropped = request.untransmitted_settings();
        if !dropped.is_empty() {
            on_notice(Notice::SettingsNotTransmitted(dropped));
        }

        match client.generate(request, &credential).await {
            Ok(result) => {
                self.results.replace(result);
                self.record_completion(&mut on_notice)
            }
            Err(source) => Err(self.reject(source, &mut on_notice)),
        }
    }

    fn record_completion(
        &mut self,
        on_notice: &mut impl FnMut(Notice),
    ) -> Result<GenerationSummary, SessionError> {
        let decision = self.policy.apply(self.usage, QuotaEvent::GenerationCompleted);
        self.store.record_usage(decision.counter)?;
        self.usage = decision.counter;

        let credential_cleared = decision.signal == QuotaSignal::JustExhausted;
        if credential_cleared {
            log::warn!(
                "Generation limit of {} reached, clearing API key",
                self.policy.ceiling()
            );
            self.clear_credential()?;
            on_notice(Notice::QuotaExhausted {
                ceiling: self.policy.ceiling(),
            });
        }

        Ok(GenerationSummary {
            usage: self.usage,
            remaining: self.policy.remaining(self.usage),
            credential_cleared,
        })
    }

    /// Classify a job failure once and apply the credential side effect.
    ///
    /// Only text reported by the service is classified.
    fn reject(&mut self, source: JobError, on_notice: &mut impl FnMut(Notice)) -> SessionError {
        let rejection = match source.provider_message() {
            Some(message) => self.classifier.classify(&message),
            None => RejectionKind::Other,
        };

        if rejection.is_credential_related() {
            log::warn!("API key rejected ({:?}): {}", rejection, source);
            if let Err(e) = self.clear_credential() {
                log::error!("Failed to clear rejected API key: {}", e);
            }
            on_notice(Notice::CredentialRejected(rejection));
        } else {
            log::error!("Generation failed: {}", source);
        }

        SessionError::Generation { source, rejection }
    }
}
