//! Latency statistics and hop health classification

use crate::traceroute::HopStatus;

/// Loss above which a hop is critical (percent)
pub const CRITICAL_LOSS_PCT: f64 = 50.0;
/// Loss above which a hop is a warning (percent)
pub const WARNING_LOSS_PCT: f64 = 10.0;
/// Average latency above which a hop is a warning (ms)
pub const WARNING_LATENCY_MS: f64 = 150.0;
/// Jitter above which a hop is a warning (ms)
pub const WARNING_JITTER_MS: f64 = 50.0;
/// Average latency above which a hop is slow (ms)
pub const SLOW_LATENCY_MS: f64 = 50.0;
/// Jitter above which a hop is slow (ms)
pub const SLOW_JITTER_MS: f64 = 20.0;
/// Latency increase over the previous hop that marks a bottleneck (ms)
pub const BOTTLENECK_INCREASE_MS: f64 = 20.0;

/// Summary of the latency samples of one hop
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencyStats {
    /// Mean latency
    pub avg: f64,
    /// Minimum latency
    pub min: f64,
    /// Maximum latency
    pub max: f64,
    /// Population standard deviation, or `max - min` with fewer than two samples
    pub jitter: f64,
}

impl LatencyStats {
    /// Compute statistics; all zero when there are no samples
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let count = samples.len() as f64;
        let sum: f64 = samples.iter().sum();
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = sum / count;

        let jitter = if samples.len() > 1 {
            let variance = samples.iter().map(|l| (l - avg) * (l - avg)).sum::<f64>() / count;
            variance.sqrt()
        } else {
            max - min
        };

        Self {
            // Rounding in the mean can land a hair outside [min, max]
            avg: avg.clamp(min, max),
            min,
            max,
            jitter,
        }
    }
}

/// Percentage of probes that went unanswered
pub fn packet_loss_pct(sent: u32, received: u32) -> f64 {
    if sent == 0 {
        return 0.0;
    }
    f64::from(sent.saturating_sub(received)) / f64::from(sent) * 100.0
}

/// Classify a hop, most severe condition first
pub fn classify(received: u32, loss_pct: f64, stats: &LatencyStats) -> HopStatus {
    if received == 0 {
        HopStatus::Timeout
    } else if loss_pct > CRITICAL_LOSS_PCT {
        HopStatus::Critical
    } else if loss_pct > WARNING_LOSS_PCT
        || stats.avg > WARNING_LATENCY_MS
        || stats.jitter > WARNING_JITTER_MS
    {
        HopStatus::Warning
    } else if stats.avg > SLOW_LATENCY_MS || stats.jitter > SLOW_JITTER_MS {
        HopStatus::Slow
    } else {
        HopStatus::Healthy
    }
}

/// Whether `current` is a bottleneck relative to the previous hop's average
pub fn is_bottleneck(previous_avg: f64, current_avg: f64) -> bool {
    previous_avg > 0.0 && current_avg > 0.0 && current_avg - previous_avg > BOTTLENECK_INCREASE_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_samples() {
        assert_eq!(LatencyStats::from_samples(&[]), LatencyStats::default());
    }

    #[test]
    fn test_single_sample_jitter_is_range() {
        let stats = LatencyStats::from_samples(&[12.0]);
        assert!(approx(stats.avg, 12.0));
        assert!(approx(stats.min, 12.0));
        assert!(approx(stats.max, 12.0));
        assert!(approx(stats.jitter, 0.0));
    }

    #[test]
    fn test_population_standard_deviation() {
        let stats = LatencyStats::from_samples(&[10.0, 20.0, 30.0]);
        assert!(approx(stats.avg, 20.0));
        assert!(approx(stats.min, 10.0));
        assert!(approx(stats.max, 30.0));
        // sqrt(((10)^2 + 0 + (10)^2) / 3)
        assert!(approx(stats.jitter, (200.0f64 / 3.0).sqrt()));
    }

    #[test]
    fn test_min_avg_max_ordering() {
        let stats = LatencyStats::from_samples(&[0.1, 0.1, 0.1]);
        assert!(stats.min <= stats.avg && stats.avg <= stats.max);
        assert!(stats.jitter >= 0.0);
    }

    #[test]
    fn test_packet_loss() {
        assert!(approx(packet_loss_pct(3, 3), 0.0));
        assert!(approx(packet_loss_pct(3, 0), 100.0));
        assert!(approx(packet_loss_pct(4, 3), 25.0));
        assert!(approx(packet_loss_pct(0, 0), 0.0));
    }

    #[test]
    fn test_classification_first_match_wins() {
        let calm = LatencyStats::from_samples(&[5.0, 5.0]);
        assert_eq!(classify(0, 100.0, &calm), HopStatus::Timeout);
        assert_eq!(classify(1, 66.7, &calm), HopStatus::Critical);
        assert_eq!(classify(2, 33.3, &calm), HopStatus::Warning);
        assert_eq!(classify(3, 0.0, &calm), HopStatus::Healthy);

        // Critical loss beats high latency
        let slow = LatencyStats::from_samples(&[200.0]);
        assert_eq!(classify(1, 66.7, &slow), HopStatus::Critical);
        assert_eq!(classify(3, 0.0, &slow), HopStatus::Warning);
    }

    #[test]
    fn test_classification_thresholds() {
        let stats = LatencyStats {
            avg: 60.0,
            min: 60.0,
            max: 60.0,
            jitter: 0.0,
        };
        assert_eq!(classify(3, 0.0, &stats), HopStatus::Slow);

        let jittery = LatencyStats {
            avg: 10.0,
            min: 1.0,
            max: 80.0,
            jitter: 25.0,
        };
        assert_eq!(classify(3, 0.0, &jittery), HopStatus::Slow);

        let very_jittery = LatencyStats {
            jitter: 51.0,
            ..jittery
        };
        assert_eq!(classify(3, 0.0, &very_jittery), HopStatus::Warning);

        // Exactly at a threshold is not over it
        let edge = LatencyStats {
            avg: 50.0,
            min: 50.0,
            max: 50.0,
            jitter: 20.0,
        };
        assert_eq!(classify(3, 0.0, &edge), HopStatus::Healthy);
        assert_eq!(classify(10, 10.0, &edge), HopStatus::Healthy);
    }

    #[test]
    fn test_bottleneck_detection() {
        assert!(is_bottleneck(10.0, 45.0));
        assert!(!is_bottleneck(10.0, 30.0));
        assert!(!is_bottleneck(0.0, 45.0));
        assert!(!is_bottleneck(10.0, 0.0));
    }
}
