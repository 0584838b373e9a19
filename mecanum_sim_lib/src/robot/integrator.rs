use eyre::Result;
use std::time::Duration;
use tracing::{debug, info};

use crate::types::{BodyTwist, IntegratorConfig, Pose2D, RobotState};

/// Whether the integrator is moving the robot or waiting out a reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegratorPhase {
    Running,
    /// Frozen until the settle delay has passed, then snaps to the initial pose
    Resetting,
}

/// Dead-reckoning pose integrator with command watchdog and delayed reset.
///
/// Time is passed in explicitly so the same integrator serves wall-clock
/// and simulated schedulers.
#[derive(Debug, Clone)]
pub struct PoseIntegrator {
    initial: Pose2D,
    state: RobotState,
    command_timeout: Duration,
    settle_delay: Duration,
    last_command: Duration,
    reset_requested_at: Option<Duration>,
}

impl PoseIntegrator {
    pub fn new(initial: Pose2D, config: &IntegratorConfig, now: Duration) -> Result<Self> {
        let command_timeout = Duration::try_from_secs_f64(config.command_timeout)
            .map_err(|e| eyre::eyre!("Invalid command timeout {}: {}", config.command_timeout, e))?;
        let settle_delay = Duration::try_from_secs_f64(config.reset_settle_delay).map_err(|e| {
            eyre::eyre!("Invalid reset delay {}: {}", config.reset_settle_delay, e)
        })?;

        Ok(Self {
            initial,
            state: RobotState::at(initial),
            command_timeout,
            settle_delay,
            last_command: now,
            reset_requested_at: None,
        })
    }

    pub fn state(&self) -> RobotState {
        self.state
    }

    pub fn initial_pose(&self) -> Pose2D {
        self.initial
    }

    pub fn phase(&self) -> IntegratorPhase {
        if self.reset_requested_at.is_some() {
            IntegratorPhase::Resetting
        } else {
            IntegratorPhase::Running
        }
    }

    pub fn is_resetting(&self) -> bool {
        self.phase() == IntegratorPhase::Resetting
    }

    /// Time since the last command
    pub fn command_age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.last_command)
    }

    /// Store a new body twist and restart the watchdog
    pub fn set_twist(&mut self, twist: BodyTwist, now: Duration) {
        self.state.twist = twist;
        self.last_command = now;
    }

    /// Ask for a return to the initial pose. Returns false when a reset is
    /// already pending; the pending one keeps its original deadline.
    pub fn request_reset(&mut self, now: Duration) -> bool {
        if self.reset_requested_at.is_some() {
            return false;
        }
        self.reset_requested_at = Some(now);
        true
    }

    /// Advance the pose by `dt` seconds.
    ///
    /// Order per step: watchdog, heading, then translation using the updated
    /// heading. Non-positive `dt` moves nothing.
    pub fn step(&mut self, dt: f64, now: Duration) -> IntegratorPhase {
        if let Some(requested_at) = self.reset_requested_at {
            if now.saturating_sub(requested_at) < self.settle_delay {
                return IntegratorPhase::Resetting;
            }
            self.state.pose = self.initial;
            self.reset_requested_at = None;
            info!(
                "Pose reset to ({:.3}, {:.3}, {:.3} rad)",
                self.initial.x, self.initial.y, self.initial.theta
            );
            return IntegratorPhase::Running;
        }

        if self.command_age(now) > self.command_timeout && !self.state.twist.is_zero() {
            debug!(
                "No command for {:.2} s, stopping",
                self.command_age(now).as_secs_f64()
            );
            self.state.twist = BodyTwist::zero();
        }

        if !(dt > 0.0) {
            return IntegratorPhase::Running;
        }

        self.state.pose.theta += self.state.twist.omega_z * dt;
        let v = self.state.twist.linear_in_world(self.state.pose.theta);
        self.state.pose.x += v.x * dt;
        self.state.pose.y += v.y * dt;

        IntegratorPhase::Running
    }
}
