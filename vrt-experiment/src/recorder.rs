use vrt_core::{Side, TrialOutcome};

/// Append-only log of captured reactions, in trial order.
#[derive(Debug, Clone, Default)]
pub struct TrialRecorder {
    overall: Vec<TrialOutcome>,
    side_a: Vec<u64>,
    side_b: Vec<u64>,
}

/// Borrowed view of the log; index in `overall` is the trial number.
#[derive(Debug, Clone, Copy)]
pub struct RecorderSnapshot<'a> {
    pub overall: &'a [TrialOutcome],
    pub side_a: &'a [u64],
    pub side_b: &'a [u64],
}

impl RecorderSnapshot<'_> {
    pub fn latencies(&self) -> Vec<u64> {
        self.overall.iter().map(|o| o.latency_ms).collect()
    }

    pub fn side(&self, side: Side) -> &[u64] {
        match side {
            Side::A => self.side_a,
            Side::B => self.side_b,
        }
    }
}

impl TrialRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, side: Side, latency_ms: u64) -> TrialOutcome {
        let outcome = TrialOutcome { side, latency_ms };
        self.overall.push(outcome);
        match side {
            Side::A => self.side_a.push(latency_ms),
            Side::B => self.side_b.push(latency_ms),
        }
        outcome
    }

    pub fn len(&self) -> usize {
        self.overall.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overall.is_empty()
    }

    pub fn last(&self) -> Option<&TrialOutcome> {
        self.overall.last()
    }

    pub fn snapshot(&self) -> RecorderSnapshot<'_> {
        RecorderSnapshot {
            overall: &self.overall,
            side_a: &self.side_a,
            side_b: &self.side_b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_by_side_and_keeps_order() {
        let mut rec = TrialRecorder::new();
        rec.append(Side::A, 250);
        rec.append(Side::B, 300);
        rec.append(Side::A, 275);

        let snap = rec.snapshot();
        assert_eq!(snap.latencies(), vec![250, 300, 275]);
        assert_eq!(snap.side_a, &[250, 275]);
        assert_eq!(snap.side(Side::B), &[300]);
        assert_eq!(snap.overall.len(), snap.side_a.len() + snap.side_b.len());
        assert_eq!(rec.last().map(|o| o.side), Some(Side::A));
    }
}
