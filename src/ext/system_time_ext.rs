use std::time::SystemTime;

pub trait SystemTimeExt {
    /// Whole seconds since the Unix epoch, zero for earlier times
    fn to_unix_seconds(self) -> u64;
}

impl SystemTimeExt for SystemTime {
    fn to_unix_seconds(self) -> u64 {
        self.duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
