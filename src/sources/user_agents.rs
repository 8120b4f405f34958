use std::sync::atomic::{AtomicUsize, Ordering};

use rand::seq::SliceRandom;

pub const DEFAULT_USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

/// Round-robin over a shuffled list of user agents.
pub struct UserAgentRotator {
    agents: Vec<String>,
    next: AtomicUsize,
}

impl UserAgentRotator {
    /// Falls back to [`DEFAULT_USER_AGENTS`] when `agents` is empty.
    pub fn new(agents: Vec<String>) -> Self {
        let mut agents = if agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect()
        } else {
            agents
        };
        agents.shuffle(&mut rand::rng());
        Self {
            agents,
            next: AtomicUsize::new(0),
        }
    }

    pub fn next(&self) -> &str {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.agents.len();
        &self.agents[index]
    }
}

impl Default for UserAgentRotator {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
