use std::time::Duration;

use crate::PassTiming;

/// Sum of every pass's duration.
pub fn total(timings: &[PassTiming]) -> Duration {
    timings.iter().map(|timing| timing.duration).sum()
}

/// Dumps timings of the most recently completed frame into the debug log.
#[cfg(feature = "metrics")]
pub(crate) fn report(timings: &[PassTiming]) {
    use log::debug;

    if timings.is_empty() {
        return;
    }

    for timing in timings {
        debug!(
            "{}: {}",
            timing.name,
            humantime::format_duration(timing.duration),
        );
    }

    debug!(
        "Frame: {} ({} passes)",
        humantime::format_duration(total(timings)),
        timings.len(),
    );
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn report(_: &[PassTiming]) {
    //
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_passes() {
        let timings = [
            PassTiming {
                name: "wavefront_generate".into(),
                duration: Duration::from_micros(150),
            },
            PassTiming {
                name: "tonemap".into(),
                duration: Duration::from_micros(50),
            },
        ];

        assert_eq!(Duration::from_micros(200), total(&timings));

        report(&timings);
    }
}
