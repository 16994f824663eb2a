/// Minimum dwell time between accepted direction events.
///
/// # Example
/// ```
/// use dp_audio::cooldown::CooldownGate;
/// let mut gate = CooldownGate::new(10.0);
/// assert!(gate.permits(0.0));
/// gate.start(1.0);
/// assert!(!gate.permits(10.9));
/// assert!(gate.permits(11.0));
/// ```
#[derive(Clone, Debug)]
pub struct CooldownGate {
    cooldown_sec: f64,
    last_action_time: Option<f64>,
    /// Refreshed by `report`, diagnostics only.
    active: bool,
    last_notice: Option<f64>,
}

impl CooldownGate {
    /// Gate that has never fired.
    #[must_use]
    pub fn new(cooldown_sec: f64) -> Self {
        Self {
            cooldown_sec,
            last_action_time: None,
            active: false,
            last_notice: None,
        }
    }

    /// `true` if no event was accepted yet or the last one is at least `cooldown_sec` old.
    #[inline]
    #[must_use]
    pub fn permits(&self, now: f64) -> bool {
        self.last_action_time
            .is_none_or(|t| now - t >= self.cooldown_sec)
    }

    /// Open a new cooldown window at `now`.
    #[inline]
    pub fn start(&mut self, now: f64) {
        self.last_action_time = Some(now);
        self.active = true;
    }

    /// Seconds until the gate opens, 0 when open.
    #[must_use]
    pub fn remaining(&self, now: f64) -> f64 {
        self.last_action_time
            .map_or(0.0, |t| (self.cooldown_sec - (now - t)).max(0.0))
    }

    /// Diagnostics: while blocked, log the remaining whole seconds at most once
    /// per second. Returns the value logged, if any. Does not change what
    /// `permits` answers.
    pub fn report(&mut self, now: f64) -> Option<u64> {
        self.active = !self.permits(now);
        if !self.active {
            return None;
        }
        if self.last_notice.is_some_and(|n| now - n < 1.0) {
            return None;
        }
        let remaining = self.remaining(now) as u64;
        log::info!("Cooldown actif : {remaining} s restantes");
        self.last_notice = Some(now);
        Some(remaining)
    }

    /// Whether the last `report` or `start` saw the gate closed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Time of the last accepted event.
    #[must_use]
    pub fn last_action_time(&self) -> Option<f64> {
        self.last_action_time
    }

    /// Cooldown length in seconds.
    #[must_use]
    pub fn cooldown_sec(&self) -> f64 {
        self.cooldown_sec
    }

    /// Change the cooldown length; an open window is re-evaluated against it.
    pub fn set_cooldown(&mut self, cooldown_sec: f64) {
        self.cooldown_sec = cooldown_sec;
    }
}
