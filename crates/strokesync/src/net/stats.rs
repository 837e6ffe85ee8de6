#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub payloads_received: u64,
    pub bytes_received: u64,
    pub strokes_decoded: u64,
    pub strokes_delivered: u64,
    pub duplicates_dropped: u64,
    pub short_strokes_dropped: u64,
    pub malformed_dropped: u64,
    pub strokes_sent: u64,
    pub bytes_sent: u64,
    pub sends_rejected: u64,
}

impl SessionStats {
    /// Fraction of decoded strokes that were suppressed as duplicates.
    pub fn duplicate_ratio(&self) -> f32 {
        if self.strokes_decoded == 0 {
            return 0.0;
        }
        self.duplicates_dropped as f32 / self.strokes_decoded as f32
    }
}
