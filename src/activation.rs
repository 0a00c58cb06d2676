// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Activation
//!
//! Startup sequence that brings the messaging transport to a usable state.
//!
//! ## Registration mode (`--register`)
//!
//! 1. Ask for the volume name, password disposal and password, then unlock
//!    the encrypted volume. Without a real volume (test mode) the password
//!    and unlock are skipped.
//! 2. Refuse to continue when keys were already provisioned.
//! 3. Capture and persist the number to register.
//! 4. Run the transport setup, which asks for the verification code.
//! 5. Mark the keys as provisioned. The caller locks the volume and exits.
//!
//! ## Steady state
//!
//! The volume is expected to be mounted already. The registered number is
//! read back and the transport set up without any operator input.
//!
//! Operator input goes through [`OperatorPrompts`] so the sequence runs
//! unchanged against scripted answers.

use tracing::{debug, error, info, warn};

use crate::error::GatewayError;
use crate::prompts::OperatorPrompts;
use crate::storage::repository::contacts::is_valid_number;
use crate::storage::{EncryptedStorage, RegistrationRepository};
use crate::transport::{
    SetupOutcome, Transport, TransportConfig, TransportError, TransportHooks, VerificationType,
};
use crate::volume::VolumeManager;

/// Which startup sequence to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationMode {
    Register,
    Steady,
}

/// Progress of the startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Idle,
    VolumeUnlocked,
    RegistrationChecked,
    AwaitingNumber,
    AwaitingVerification,
    Ready,
    ListenerRunning,
    Fatal,
}

/// Successful end of the startup sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// Registration finished; the process should lock the volume and exit.
    RegistrationComplete { number: String },
    /// Transport ready; the listener can start.
    Ready { number: String },
}

/// Transport settings that do not come from storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivationSettings {
    pub verification: VerificationType,
    pub verbose: bool,
}

/// Runs the startup sequence against injected collaborators.
pub struct Activator<'a> {
    storage: EncryptedStorage,
    volume: &'a dyn VolumeManager,
    prompts: &'a dyn OperatorPrompts,
    transport: &'a dyn Transport,
    settings: ActivationSettings,
    state: ActivationState,
}

impl<'a> Activator<'a> {
    pub fn new(
        storage: EncryptedStorage,
        volume: &'a dyn VolumeManager,
        prompts: &'a dyn OperatorPrompts,
        transport: &'a dyn Transport,
        settings: ActivationSettings,
    ) -> Self {
        Self {
            storage,
            volume,
            prompts,
            transport,
            settings,
            state: ActivationState::Idle,
        }
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    /// Record that the inbound listener was started.
    pub fn listener_started(&mut self) {
        if self.state == ActivationState::Ready {
            self.transition(ActivationState::ListenerRunning);
        }
    }

    /// Storage, initialized once activation got past the volume unlock.
    pub fn storage(&self) -> &EncryptedStorage {
        &self.storage
    }

    pub async fn run(&mut self, mode: ActivationMode) -> Result<Activation, GatewayError> {
        let result = match mode {
            ActivationMode::Register => self.register().await,
            ActivationMode::Steady => self.activate().await,
        };

        if let Err(e) = &result {
            error!(error = %e, state = ?self.state, "Activation failed");
            if mode == ActivationMode::Register && self.state != ActivationState::Idle {
                self.relock();
            }
            self.transition(ActivationState::Fatal);
        }

        result
    }

    async fn register(&mut self) -> Result<Activation, GatewayError> {
        let volume = self.prompts.volume_name()?;
        let dispose = self.prompts.dispose_password()?;

        if self.volume.needs_password() {
            let password = self.prompts.volume_password()?;
            if let Err(e) = self.volume.unlock(&volume, &password, dispose) {
                self.relock();
                return Err(e.into());
            }
        } else {
            info!(volume = %volume, "Volume managed externally, skipping unlock");
        }
        self.transition(ActivationState::VolumeUnlocked);

        self.storage.initialize()?;
        let state = RegistrationRepository::new(&self.storage).load()?;
        self.transition(ActivationState::RegistrationChecked);

        if !state.needs_registration() {
            return Err(GatewayError::AlreadyRegistered {
                number: state
                    .registered_number
                    .unwrap_or_else(|| "unknown".to_string()),
                storage: self.storage.paths().private_dir().display().to_string(),
            });
        }

        self.transition(ActivationState::AwaitingNumber);
        let number = self.prompts.phone_number()?;
        if !is_valid_number(&number) {
            return Err(GatewayError::InvalidNumber(number));
        }
        RegistrationRepository::new(&self.storage).save_number(&number)?;
        info!(number = %number, "Registration number saved");

        let number = self.setup().await?;
        Ok(Activation::RegistrationComplete { number })
    }

    async fn activate(&mut self) -> Result<Activation, GatewayError> {
        self.storage.initialize()?;
        self.transition(ActivationState::RegistrationChecked);

        let number = self.setup().await?;
        Ok(Activation::Ready { number })
    }

    /// Set up the transport for the registered number.
    async fn setup(&mut self) -> Result<String, GatewayError> {
        let number = RegistrationRepository::new(&self.storage)
            .load()?
            .registered_number
            .ok_or(GatewayError::NotRegistered)?;

        let config = TransportConfig {
            number: number.clone(),
            verification: self.settings.verification,
            storage_dir: self.storage.paths().private_dir(),
            verbose: self.settings.verbose,
        };
        let hooks = PromptHooks {
            prompts: self.prompts,
        };

        self.transition(ActivationState::AwaitingVerification);
        let outcome = self
            .transport
            .setup(&config, &hooks)
            .await
            .map_err(GatewayError::TransportSetup)?;

        if outcome == SetupOutcome::Registered {
            RegistrationRepository::new(&self.storage).mark_provisioned()?;
            info!(number = %number, "Keys provisioned");
        }

        self.transition(ActivationState::Ready);
        Ok(number)
    }

    fn relock(&self) {
        if let Err(e) = self.volume.lock() {
            warn!(error = %e, "Failed to lock encrypted volume");
        }
    }

    fn transition(&mut self, next: ActivationState) {
        debug!(from = ?self.state, to = ?next, "Activation state change");
        self.state = next;
    }
}

/// Transport hooks answered by the operator.
struct PromptHooks<'a> {
    prompts: &'a dyn OperatorPrompts,
}

impl TransportHooks for PromptHooks<'_> {
    fn verification_code(&self) -> Result<String, TransportError> {
        self.prompts
            .verification_code()
            .map_err(|e| TransportError::Registration(format!("verification code: {e}")))
    }

    fn registration_done(&self, number: &str) {
        info!(number = %number, "Registration done");
    }
}
