//! Dwell-time activation for pointer/gaze menus, decoupled from gameplay.
//!
//! Each tick the caller reports what the ray (here: the mouse cursor)
//! currently hits; holding the same target for the dwell threshold fires a
//! single activation. Dwell progress never survives an exit.

/// Notifications emitted by [`GazeDwellController::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazeEvent<T> {
    Enter(T),
    Exit(T),
    Activate(T),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DwellState<T> {
    Idle,
    Hovering { target: T, elapsed_ms: u32 },
}

#[derive(Debug, Clone)]
pub struct GazeDwellController<T> {
    dwell_ms: u32,
    state: DwellState<T>,
    /// Target already activated this visit; suppresses re-fire until the
    /// ray leaves and re-enters.
    spent: Option<T>,
}

impl<T: Copy + PartialEq> GazeDwellController<T> {
    pub fn new(dwell_ms: u32) -> Self {
        Self {
            dwell_ms,
            state: DwellState::Idle,
            spent: None,
        }
    }

    /// Hovered target and dwell progress in 0..=1, for the progress ring.
    pub fn progress(&self) -> Option<(T, f32)> {
        match self.state {
            DwellState::Idle => None,
            DwellState::Hovering { target, elapsed_ms } => {
                let ratio = if self.dwell_ms == 0 {
                    1.0
                } else {
                    (elapsed_ms as f32 / self.dwell_ms as f32).min(1.0)
                };
                Some((target, ratio))
            }
        }
    }

    /// Advance one frame: `hit` is the interactive target under the ray, if
    /// any. Events are appended in the order they fire.
    pub fn tick(&mut self, hit: Option<T>, dt_ms: u32, events: &mut Vec<GazeEvent<T>>) {
        match hit {
            None => {
                if let DwellState::Hovering { target, .. } = self.state {
                    events.push(GazeEvent::Exit(target));
                }
                self.state = DwellState::Idle;
                self.spent = None;
            }
            Some(hit) => {
                if self.spent == Some(hit) {
                    // Activation consumed; wait for the ray to leave.
                    return;
                }
                self.spent = None;
                match self.state {
                    DwellState::Hovering { target, elapsed_ms } if target == hit => {
                        let elapsed_ms = elapsed_ms + dt_ms;
                        if elapsed_ms >= self.dwell_ms {
                            events.push(GazeEvent::Activate(target));
                            self.state = DwellState::Idle;
                            self.spent = Some(target);
                        } else {
                            self.state = DwellState::Hovering { target, elapsed_ms };
                        }
                    }
                    DwellState::Hovering { target, .. } => {
                        events.push(GazeEvent::Exit(target));
                        events.push(GazeEvent::Enter(hit));
                        self.state = DwellState::Hovering {
                            target: hit,
                            elapsed_ms: 0,
                        };
                    }
                    DwellState::Idle => {
                        events.push(GazeEvent::Enter(hit));
                        self.state = DwellState::Hovering {
                            target: hit,
                            elapsed_ms: 0,
                        };
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Btn {
        Start,
        Quit,
    }

    fn drain(ctrl: &mut GazeDwellController<Btn>, hit: Option<Btn>, dt_ms: u32) -> Vec<GazeEvent<Btn>> {
        let mut events = Vec::new();
        ctrl.tick(hit, dt_ms, &mut events);
        events
    }

    #[test]
    fn dwell_threshold_fires_exactly_one_activation() {
        let mut ctrl = GazeDwellController::new(1_500);
        assert_eq!(drain(&mut ctrl, Some(Btn::Start), 0), vec![GazeEvent::Enter(Btn::Start)]);
        for _ in 0..14 {
            assert!(drain(&mut ctrl, Some(Btn::Start), 100).is_empty());
        }
        // 1400 ms accumulated; this tick reaches the threshold.
        assert_eq!(
            drain(&mut ctrl, Some(Btn::Start), 100),
            vec![GazeEvent::Activate(Btn::Start)]
        );
        // Continuing to stare does not re-fire.
        for _ in 0..40 {
            assert!(drain(&mut ctrl, Some(Btn::Start), 100).is_empty());
        }
    }

    #[test]
    fn leaving_before_threshold_resets_progress() {
        let mut ctrl = GazeDwellController::new(1_500);
        drain(&mut ctrl, Some(Btn::Start), 0);
        drain(&mut ctrl, Some(Btn::Start), 1_400);
        assert_eq!(drain(&mut ctrl, None, 16), vec![GazeEvent::Exit(Btn::Start)]);
        assert!(ctrl.progress().is_none());
        // Re-entering starts from zero: 1400 ms again is not enough alone.
        drain(&mut ctrl, Some(Btn::Start), 0);
        assert!(drain(&mut ctrl, Some(Btn::Start), 1_400).is_empty());
        assert_eq!(
            drain(&mut ctrl, Some(Btn::Start), 100),
            vec![GazeEvent::Activate(Btn::Start)]
        );
    }

    #[test]
    fn switching_targets_fires_exit_then_enter_and_resets() {
        let mut ctrl = GazeDwellController::new(1_500);
        drain(&mut ctrl, Some(Btn::Start), 0);
        drain(&mut ctrl, Some(Btn::Start), 1_000);
        assert_eq!(
            drain(&mut ctrl, Some(Btn::Quit), 16),
            vec![GazeEvent::Exit(Btn::Start), GazeEvent::Enter(Btn::Quit)]
        );
        let (target, ratio) = ctrl.progress().unwrap();
        assert_eq!(target, Btn::Quit);
        assert!(ratio < 0.01);
    }

    #[test]
    fn reactivation_requires_leave_and_reenter() {
        let mut ctrl = GazeDwellController::new(500);
        drain(&mut ctrl, Some(Btn::Start), 0);
        assert_eq!(
            drain(&mut ctrl, Some(Btn::Start), 500),
            vec![GazeEvent::Activate(Btn::Start)]
        );
        assert!(drain(&mut ctrl, Some(Btn::Start), 5_000).is_empty());
        assert!(drain(&mut ctrl, None, 16).is_empty());
        drain(&mut ctrl, Some(Btn::Start), 0);
        assert_eq!(
            drain(&mut ctrl, Some(Btn::Start), 500),
            vec![GazeEvent::Activate(Btn::Start)]
        );
    }

    #[test]
    fn moving_straight_to_another_target_rearms() {
        let mut ctrl = GazeDwellController::new(500);
        drain(&mut ctrl, Some(Btn::Start), 0);
        drain(&mut ctrl, Some(Btn::Start), 500); // activates
        // Ray slides directly onto Quit: Start's latch clears, Quit dwells.
        assert_eq!(drain(&mut ctrl, Some(Btn::Quit), 0), vec![GazeEvent::Enter(Btn::Quit)]);
        assert_eq!(
            drain(&mut ctrl, Some(Btn::Quit), 500),
            vec![GazeEvent::Activate(Btn::Quit)]
        );
    }
}
