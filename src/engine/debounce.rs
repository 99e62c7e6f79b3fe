// src/engine/debounce.rs

//! Pure per-binding state machine.
//!
//! ```text
//! Idle --change--> Debouncing --deadline--> Running --finished--> Idle
//!                  ^    |                    |   ^
//!                  +----+ change resets      |   | finished with a pending
//!                         the deadline       +---+ change: run once more
//! ```
//!
//! Changes that arrive while Running set a single pending flag, so any
//! number of them produce exactly one extra run. The machine performs no IO
//! and holds no timers; the async shell in [`super::binding`] feeds it
//! events and acts on the returned commands.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingPhase {
    Idle,
    Debouncing { deadline: Instant },
    Running { rerun_pending: bool },
}

/// What the shell should do after feeding an event into the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingCommand {
    /// (Re)arm the debounce timer for this deadline.
    ArmTimer(Instant),
    /// Start the binding's action now.
    StartRun,
    Nothing,
}

#[derive(Debug, Clone)]
pub struct BindingMachine {
    window: Duration,
    phase: BindingPhase,
    runs_started: u64,
}

impl BindingMachine {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            phase: BindingPhase::Idle,
            runs_started: 0,
        }
    }

    pub fn phase(&self) -> BindingPhase {
        self.phase
    }

    pub fn runs_started(&self) -> u64 {
        self.runs_started
    }

    pub fn on_change(&mut self, now: Instant) -> BindingCommand {
        match self.phase {
            BindingPhase::Idle | BindingPhase::Debouncing { .. } => {
                let deadline = now + self.window;
                self.phase = BindingPhase::Debouncing { deadline };
                BindingCommand::ArmTimer(deadline)
            }
            BindingPhase::Running { .. } => {
                self.phase = BindingPhase::Running {
                    rerun_pending: true,
                };
                BindingCommand::Nothing
            }
        }
    }

    /// The debounce timer fired. Stale timers (deadline since pushed back)
    /// are ignored.
    pub fn on_deadline(&mut self, now: Instant) -> BindingCommand {
        match self.phase {
            BindingPhase::Debouncing { deadline } if now >= deadline => self.start_run(),
            _ => BindingCommand::Nothing,
        }
    }

    pub fn on_run_finished(&mut self) -> BindingCommand {
        match self.phase {
            BindingPhase::Running {
                rerun_pending: true,
            } => self.start_run(),
            BindingPhase::Running {
                rerun_pending: false,
            } => {
                self.phase = BindingPhase::Idle;
                BindingCommand::Nothing
            }
            _ => BindingCommand::Nothing,
        }
    }

    /// Drop a pending re-run (used when the binding is shutting down).
    pub fn cancel_pending(&mut self) {
        self.phase = match self.phase {
            BindingPhase::Running { .. } => BindingPhase::Running {
                rerun_pending: false,
            },
            _ => BindingPhase::Idle,
        };
    }

    fn start_run(&mut self) -> BindingCommand {
        self.phase = BindingPhase::Running {
            rerun_pending: false,
        };
        self.runs_started += 1;
        BindingCommand::StartRun
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WINDOW: Duration = Duration::from_millis(100);

    #[test]
    fn change_while_debouncing_resets_deadline() {
        let t0 = Instant::now();
        let mut m = BindingMachine::new(WINDOW);

        assert_eq!(m.on_change(t0), BindingCommand::ArmTimer(t0 + WINDOW));
        let t1 = t0 + Duration::from_millis(60);
        assert_eq!(m.on_change(t1), BindingCommand::ArmTimer(t1 + WINDOW));

        // The first timer is now stale.
        assert_eq!(m.on_deadline(t0 + WINDOW), BindingCommand::Nothing);
        assert_eq!(m.on_deadline(t1 + WINDOW), BindingCommand::StartRun);
        assert_eq!(m.runs_started(), 1);
    }

    #[test]
    fn changes_while_running_coalesce_into_one_rerun() {
        let t0 = Instant::now();
        let mut m = BindingMachine::new(WINDOW);
        m.on_change(t0);
        m.on_deadline(t0 + WINDOW);

        for i in 0..5 {
            assert_eq!(m.on_change(t0 + Duration::from_millis(150 + i)), BindingCommand::Nothing);
        }
        assert_eq!(m.on_run_finished(), BindingCommand::StartRun);
        assert_eq!(m.on_run_finished(), BindingCommand::Nothing);
        assert_eq!(m.phase(), BindingPhase::Idle);
        assert_eq!(m.runs_started(), 2);
    }

    #[test]
    fn cancel_pending_drops_the_rerun() {
        let t0 = Instant::now();
        let mut m = BindingMachine::new(WINDOW);
        m.on_change(t0);
        m.on_deadline(t0 + WINDOW);
        m.on_change(t0 + WINDOW);

        m.cancel_pending();
        assert_eq!(m.on_run_finished(), BindingCommand::Nothing);
        assert_eq!(m.runs_started(), 1);
    }

    #[derive(Debug, Clone)]
    enum Input {
        Change(u64),
        Deadline,
        Finished,
    }

    fn input() -> impl Strategy<Value = Input> {
        prop_oneof![
            (0u64..300).prop_map(Input::Change),
            Just(Input::Deadline),
            Just(Input::Finished),
        ]
    }

    proptest! {
        /// Runs only start from a deadline or a finished run that had a
        /// pending change, and a run never starts while another is active.
        #[test]
        fn runs_never_overlap(inputs in proptest::collection::vec(input(), 0..64)) {
            let t0 = Instant::now();
            let mut now = t0;
            let mut m = BindingMachine::new(WINDOW);
            let mut active = false;
            let mut pending = false;

            for i in inputs {
                let cmd = match i {
                    Input::Change(dt) => {
                        now += Duration::from_millis(dt);
                        if active {
                            pending = true;
                        }
                        m.on_change(now)
                    }
                    Input::Deadline => {
                        if let BindingPhase::Debouncing { deadline } = m.phase() {
                            now = now.max(deadline);
                        }
                        m.on_deadline(now)
                    }
                    Input::Finished => {
                        if !active {
                            continue;
                        }
                        active = false;
                        let cmd = m.on_run_finished();
                        prop_assert_eq!(cmd == BindingCommand::StartRun, pending);
                        pending = false;
                        cmd
                    }
                };

                if cmd == BindingCommand::StartRun {
                    prop_assert!(!active);
                    active = true;
                }
                prop_assert_eq!(active, matches!(m.phase(), BindingPhase::Running { .. }));
            }
        }
    }
}
