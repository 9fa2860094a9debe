use rand::Rng;
use std::sync::Arc;

/// Injectable source of randomness so delay jitter and identity selection
/// can be scripted in tests.
pub trait RandomSource: Send + Sync {
    /// Uniform index in `[0, upper)`.
    fn pick(&self, upper: usize) -> usize;

    /// Uniform duration in `[min_ms, max_ms]`.
    fn delay_ms(&self, min_ms: u64, max_ms: u64) -> u64;
}

/// Production source backed by the thread-local RNG.
pub struct ThreadRngSource;

impl RandomSource for ThreadRngSource {
    fn pick(&self, upper: usize) -> usize {
        rand::thread_rng().gen_range(0..upper)
    }

    fn delay_ms(&self, min_ms: u64, max_ms: u64) -> u64 {
        if min_ms >= max_ms {
            return min_ms;
        }
        rand::thread_rng().gen_range(min_ms..=max_ms)
    }
}

/// A coherent browser-like header set, generated fresh per fetch attempt
/// and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    pub user_agent: String,
    pub accept_language: String,
    pub accept: String,
    pub accept_encoding: String,
    pub connection: String,
    pub cache_control: String,
}

impl Fingerprint {
    /// Header order matters to some bot detectors, so this is a fixed list
    /// rather than a map.
    pub fn headers(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("User-Agent", self.user_agent.as_str()),
            ("Accept-Language", self.accept_language.as_str()),
            ("Accept", self.accept.as_str()),
            ("Accept-Encoding", self.accept_encoding.as_str()),
            ("Connection", self.connection.as_str()),
            ("Cache-Control", self.cache_control.as_str()),
        ]
    }
}

/// Desktop user agents only; mobile pages render a different markup tree.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:136.0) Gecko/20100101 Firefox/136.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:136.0) Gecko/20100101 Firefox/136.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36 Edg/136.0.0.0",
];

/// Korean-locale preference strings, matching the target site's audience.
const ACCEPT_LANGUAGES: &[&str] = &[
    "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7",
    "ko-KR,ko;q=0.9",
    "ko;q=0.9,en-US;q=0.8",
    "ko-KR,ko;q=0.8,en;q=0.6",
];

/// Produces an independent random fingerprint per call. No state is carried
/// between calls.
pub struct FingerprintRotator {
    rng: Arc<dyn RandomSource>,
}

impl FingerprintRotator {
    pub fn new(rng: Arc<dyn RandomSource>) -> Self {
        FingerprintRotator { rng }
    }

    pub fn generate(&self) -> Fingerprint {
        let user_agent = USER_AGENTS[self.rng.pick(USER_AGENTS.len())];
        let accept_language = ACCEPT_LANGUAGES[self.rng.pick(ACCEPT_LANGUAGES.len())];

        Fingerprint {
            user_agent: user_agent.to_string(),
            accept_language: accept_language.to_string(),
            accept: "application/json, text/plain, */*".to_string(),
            accept_encoding: "gzip, deflate, br".to_string(),
            connection: "keep-alive".to_string(),
            cache_control: "no-cache".to_string(),
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::RandomSource;
    use std::sync::Mutex;

    /// Replays a scripted sequence of picks; delays are always zero so tests
    /// never sleep for real.
    pub struct ScriptedRandom {
        picks: Mutex<Vec<usize>>,
    }

    impl ScriptedRandom {
        pub fn new(picks: Vec<usize>) -> Self {
            ScriptedRandom {
                picks: Mutex::new(picks),
            }
        }
    }

    impl RandomSource for ScriptedRandom {
        fn pick(&self, upper: usize) -> usize {
            let mut picks = self.picks.lock().unwrap();
            if picks.is_empty() {
                return 0;
            }
            picks.remove(0) % upper
        }

        fn delay_ms(&self, _min_ms: u64, _max_ms: u64) -> u64 {
            0
        }
    }
}
