use std::marker::PhantomData;
use crate::engine::{Checker, Failure, Outcome};
use crate::enrich::HasPublicKey;
use crate::error::Result;
use crate::secret::{Revealed, SealedValue};
use super::records::{ClusterToken, DeployKey, DeployToken, GroupVariable, ProjectVariable, RunnerToken};

pub const UNRECOGNIZED_KEY_PREFIX: &str = "Unrecognized SSH key object type: ";

/// Record holding one sealed secret plus non-secret fields for labeling.
pub trait SecretBearing {
    fn describe(&self) -> String;

    fn sealed(&self) -> &SealedValue;

    /// Structural check on the plaintext. The error text must not echo it.
    fn validate(&self, _secret: &Revealed) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Reveals the secret and runs the record's structural check. Access
/// failures are reported as failures, never propagated.
pub struct SecretChecker<R> {
    _marker: PhantomData<fn(&R)>,
}

impl<R> SecretChecker<R> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<R> Default for SecretChecker<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SecretBearing> Checker<R> for SecretChecker<R> {
    fn context(&self, record: &R) -> String {
        record.describe()
    }

    fn check(&self, record: &R) -> Result<Outcome> {
        let context = record.describe();
        let secret = match record.sealed().reveal() {
            Ok(secret) => secret,
            Err(e) => return Ok(Outcome::failure(context, e.to_string())),
        };

        match record.validate(&secret) {
            Ok(()) => Ok(Outcome::success(context)),
            Err(reason) => Ok(Outcome::failure(context, reason)),
        }
    }
}

fn require_token(secret: &Revealed) -> std::result::Result<(), String> {
    if secret.is_empty() {
        Err("token is empty".to_string())
    } else {
        Ok(())
    }
}

impl SecretBearing for ProjectVariable {
    fn describe(&self) -> String {
        ProjectVariable::describe(self)
    }

    fn sealed(&self) -> &SealedValue {
        &self.value
    }
}

impl SecretBearing for GroupVariable {
    fn describe(&self) -> String {
        GroupVariable::describe(self)
    }

    fn sealed(&self) -> &SealedValue {
        &self.value
    }
}

impl SecretBearing for RunnerToken {
    fn describe(&self) -> String {
        RunnerToken::describe(self)
    }

    fn sealed(&self) -> &SealedValue {
        &self.token
    }

    fn validate(&self, secret: &Revealed) -> std::result::Result<(), String> {
        require_token(secret)
    }
}

impl SecretBearing for ClusterToken {
    fn describe(&self) -> String {
        ClusterToken::describe(self)
    }

    fn sealed(&self) -> &SealedValue {
        &self.token
    }

    fn validate(&self, secret: &Revealed) -> std::result::Result<(), String> {
        require_token(secret)
    }
}

impl SecretBearing for DeployToken {
    fn describe(&self) -> String {
        DeployToken::describe(self)
    }

    fn sealed(&self) -> &SealedValue {
        &self.token
    }

    fn validate(&self, secret: &Revealed) -> std::result::Result<(), String> {
        require_token(secret)
    }
}

/// Accepts only the key types the platform can actually use.
#[derive(Debug, Default)]
pub struct DeployKeyChecker;

impl Checker<DeployKey> for DeployKeyChecker {
    fn context(&self, record: &DeployKey) -> String {
        record.context().to_string()
    }

    fn check(&self, record: &DeployKey) -> Result<Outcome> {
        let context = record.context();
        let key = record.public_key();

        if key.is_recognized() {
            let label = match key.fingerprint() {
                Some(fingerprint) => format!("{context} ({fingerprint})"),
                None => context.to_string(),
            };
            return Ok(Outcome::success(label));
        }

        let failure = Failure::new(
            context.to_string(),
            format!("{UNRECOGNIZED_KEY_PREFIX}{}", key.type_name()),
        )
        .with_subject(context.into_subject());
        Ok(failure.into())
    }
}
