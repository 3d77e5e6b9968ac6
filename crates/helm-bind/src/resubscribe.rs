/// Paces re-installation of the autopilot hook while the relay keeps
/// reporting it dropped. Starts almost due so the first retry happens soon,
/// and falls back to almost due after each retry so a relay that keeps
/// failing is retried every few updates.
#[derive(Debug, Clone)]
pub struct ResubscribeGate {
    period: u32,
    counter: u32,
}

impl ResubscribeGate {
    pub fn new(period: u32) -> Self {
        let period = period.max(2);
        Self { period, counter: period - 2 }
    }

    /// Call once per update. Returns true when the hook should be re-installed now.
    pub fn tick(&mut self, needs_resubscribe: bool) -> bool {
        if !needs_resubscribe {
            self.counter = self.almost_due();
            return false;
        }
        self.counter += 1;
        if self.counter > self.period {
            self.counter = self.almost_due();
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.counter = self.almost_due();
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    fn almost_due(&self) -> u32 {
        self.period - 2
    }
}
