use std::time::Duration;

/// Backoff exponencial simple para reintentar contra el master.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
            attempts: 0,
        }
    }

    /// Demora antes del próximo intento; duplica la siguiente hasta `max`.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.max);
        self.current = (self.current * 2).min(self.max);
        self.attempts += 1;
        delay
    }

    /// Fallas consecutivas desde el último reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempts = 0;
    }
}
