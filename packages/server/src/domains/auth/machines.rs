//! Client-side auth flow state machine.
//!
//! The server keeps no per-attempt state, so the client carries the stage,
//! the live verification handle and the resend cooldown. `AuthFlow` is that
//! client half: it refuses out-of-order steps and enforces that any failure
//! sends the attempt back to `Idle`, so a new code must be dispatched.
//!
//! ```text
//! Idle → AwaitingPrecheck → AwaitingCode → AwaitingAssertion → Resolving → SessionIssued
//!   ↑__________________________ fail() from any stage ___________________________|
//! ```

use std::time::{Duration, Instant};

use thiserror::Error;

use super::models::{PhoneNumber, RoleId};
use super::types::{FlowMode, VerificationHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Idle,
    AwaitingPrecheck,
    AwaitingCode,
    AwaitingAssertion,
    Resolving,
    SessionIssued,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("cannot {action} while {stage:?}")]
    InvalidTransition {
        stage: AuthStage,
        action: &'static str,
    },

    #[error("resend available in {}s", .remaining.as_secs().max(1))]
    CooldownActive { remaining: Duration },
}

#[derive(Debug, Clone)]
pub struct AuthFlow {
    stage: AuthStage,
    mode: Option<FlowMode>,
    phone: Option<PhoneNumber>,
    role_id: Option<RoleId>,
    handle: Option<VerificationHandle>,
    last_dispatch: Option<(PhoneNumber, Instant)>,
    cooldown: Duration,
}

impl AuthFlow {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            stage: AuthStage::Idle,
            mode: None,
            phone: None,
            role_id: None,
            handle: None,
            last_dispatch: None,
            cooldown,
        }
    }

    pub fn stage(&self) -> AuthStage {
        self.stage
    }

    pub fn mode(&self) -> Option<FlowMode> {
        self.mode
    }

    pub fn phone(&self) -> Option<&PhoneNumber> {
        self.phone.as_ref()
    }

    /// Role learned from the login precheck, for display only.
    pub fn role_id(&self) -> Option<RoleId> {
        self.role_id
    }

    pub fn handle(&self) -> Option<&VerificationHandle> {
        self.handle.as_ref()
    }

    fn require_stage(&self, allowed: &[AuthStage], action: &'static str) -> Result<(), FlowError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(FlowError::InvalidTransition {
                stage: self.stage,
                action,
            })
        }
    }

    /// Start an attempt for `phone` (already normalized).
    pub fn begin(&mut self, mode: FlowMode, phone: PhoneNumber) -> Result<(), FlowError> {
        self.require_stage(&[AuthStage::Idle, AuthStage::SessionIssued], "begin")?;
        self.stage = AuthStage::AwaitingPrecheck;
        self.mode = Some(mode);
        self.phone = Some(phone);
        self.role_id = None;
        self.handle = None;
        Ok(())
    }

    pub fn precheck_passed(&mut self, role_id: Option<RoleId>) -> Result<(), FlowError> {
        self.require_stage(&[AuthStage::AwaitingPrecheck], "pass precheck")?;
        self.stage = AuthStage::AwaitingCode;
        self.role_id = role_id;
        Ok(())
    }

    /// Login precheck found no account. Not a failure: the attempt ends and
    /// the flow is primed for signup with the same phone.
    pub fn route_to_signup(&mut self) -> Result<(), FlowError> {
        self.require_stage(&[AuthStage::AwaitingPrecheck, AuthStage::Resolving], "route to signup")?;
        self.stage = AuthStage::Idle;
        self.mode = Some(FlowMode::Signup);
        self.role_id = None;
        self.handle = None;
        Ok(())
    }

    /// Time left before another code may be sent to the current phone.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        let (phone, sent_at) = self.last_dispatch.as_ref()?;
        if Some(phone) != self.phone.as_ref() {
            return None;
        }
        let elapsed = now.saturating_duration_since(*sent_at);
        self.cooldown.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    pub fn ensure_can_dispatch(&self, now: Instant) -> Result<(), FlowError> {
        self.require_stage(&[AuthStage::AwaitingCode, AuthStage::AwaitingAssertion], "dispatch a code")?;
        match self.cooldown_remaining(now) {
            Some(remaining) => Err(FlowError::CooldownActive { remaining }),
            None => Ok(()),
        }
    }

    /// Record a dispatched code. A resend replaces the previous handle; only
    /// the latest one is ever submitted.
    pub fn code_dispatched(
        &mut self,
        handle: VerificationHandle,
        resend_after: Duration,
        now: Instant,
    ) -> Result<(), FlowError> {
        self.ensure_can_dispatch(now)?;
        if let Some(phone) = self.phone.clone() {
            self.last_dispatch = Some((phone, now));
        }
        // The server may ask for a longer wait than we assumed.
        self.cooldown = self.cooldown.max(resend_after);
        self.handle = Some(handle);
        self.stage = AuthStage::AwaitingAssertion;
        Ok(())
    }

    /// Hand out the live handle for the code exchange. The handle is consumed:
    /// whatever happens next, it is never submitted twice.
    pub fn assertion_submitted(&mut self) -> Result<VerificationHandle, FlowError> {
        self.require_stage(&[AuthStage::AwaitingAssertion], "submit an assertion")?;
        let handle = self.handle.take().ok_or(FlowError::InvalidTransition {
            stage: self.stage,
            action: "submit an assertion",
        })?;
        self.stage = AuthStage::Resolving;
        Ok(handle)
    }

    pub fn session_issued(&mut self) -> Result<(), FlowError> {
        self.require_stage(&[AuthStage::Resolving], "issue a session")?;
        self.stage = AuthStage::SessionIssued;
        self.handle = None;
        Ok(())
    }

    /// Terminal failure. Back to `Idle`; the cooldown survives.
    pub fn fail(&mut self) {
        self.stage = AuthStage::Idle;
        self.role_id = None;
        self.handle = None;
    }
}

impl Default for AuthFlow {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::auth::models::normalize_phone;

    fn phone() -> PhoneNumber {
        normalize_phone("9876543210").unwrap()
    }

    fn flow_awaiting_assertion(now: Instant) -> AuthFlow {
        let mut flow = AuthFlow::default();
        flow.begin(FlowMode::Login, phone()).unwrap();
        flow.precheck_passed(Some(RoleId::Developer)).unwrap();
        flow.code_dispatched(VerificationHandle::new("h1"), Duration::from_secs(30), now)
            .unwrap();
        flow
    }

    #[test]
    fn login_happy_path() {
        let now = Instant::now();
        let mut flow = flow_awaiting_assertion(now);
        assert_eq!(flow.stage(), AuthStage::AwaitingAssertion);
        assert_eq!(flow.role_id(), Some(RoleId::Developer));

        let handle = flow.assertion_submitted().unwrap();
        assert_eq!(handle.as_str(), "h1");
        assert_eq!(flow.stage(), AuthStage::Resolving);

        flow.session_issued().unwrap();
        assert_eq!(flow.stage(), AuthStage::SessionIssued);
    }

    #[test]
    fn steps_cannot_be_skipped() {
        let mut flow = AuthFlow::default();
        assert!(matches!(
            flow.assertion_submitted(),
            Err(FlowError::InvalidTransition {
                stage: AuthStage::Idle,
                ..
            })
        ));

        flow.begin(FlowMode::Signup, phone()).unwrap();
        let err = flow
            .code_dispatched(VerificationHandle::new("h"), Duration::ZERO, Instant::now())
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidTransition { .. }));
    }

    #[test]
    fn unknown_phone_routes_to_signup() {
        let mut flow = AuthFlow::default();
        flow.begin(FlowMode::Login, phone()).unwrap();
        flow.route_to_signup().unwrap();

        assert_eq!(flow.stage(), AuthStage::Idle);
        assert_eq!(flow.mode(), Some(FlowMode::Signup));
        assert_eq!(flow.phone(), Some(&phone()));
        assert!(flow.handle().is_none());
    }

    #[test]
    fn resend_waits_for_cooldown() {
        let now = Instant::now();
        let mut flow = flow_awaiting_assertion(now);

        let err = flow
            .code_dispatched(
                VerificationHandle::new("h2"),
                Duration::from_secs(30),
                now + Duration::from_secs(10),
            )
            .unwrap_err();
        assert!(matches!(err, FlowError::CooldownActive { remaining } if remaining == Duration::from_secs(20)));

        flow.code_dispatched(
            VerificationHandle::new("h2"),
            Duration::from_secs(30),
            now + Duration::from_secs(31),
        )
        .unwrap();
        assert_eq!(flow.handle().unwrap().as_str(), "h2");
    }

    #[test]
    fn failure_requires_fresh_dispatch() {
        let now = Instant::now();
        let mut flow = flow_awaiting_assertion(now);
        flow.assertion_submitted().unwrap();
        flow.fail();

        assert_eq!(flow.stage(), AuthStage::Idle);
        assert!(flow.handle().is_none());
        assert!(flow.assertion_submitted().is_err());

        // Restarting does not reset the cooldown clock.
        flow.begin(FlowMode::Login, phone()).unwrap();
        flow.precheck_passed(None).unwrap();
        assert!(matches!(
            flow.ensure_can_dispatch(now + Duration::from_secs(5)),
            Err(FlowError::CooldownActive { .. })
        ));
    }

    #[test]
    fn cooldown_is_per_phone() {
        let now = Instant::now();
        let mut flow = flow_awaiting_assertion(now);
        flow.fail();

        flow.begin(FlowMode::Login, normalize_phone("9876543211").unwrap())
            .unwrap();
        flow.precheck_passed(None).unwrap();
        assert!(flow.ensure_can_dispatch(now).is_ok());
    }
}
