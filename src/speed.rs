//! Equirectangular approximation, only valid for samples minutes apart.

use std::cmp::Ordering;
use thiserror::Error;

use crate::dto::IssSample;

/// Earth's equatorial circumference divided into degrees of arc.
pub const KM_PER_DEGREE: f64 = 40075.704 / 360.0;

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeedError {
    #[error("both samples were taken at {timestamp}, elapsed time is zero")]
    ZeroElapsed { timestamp: i64 },
    #[error("later sample ({later}) was taken before the earlier one ({earlier})")]
    OutOfOrder { earlier: i64, later: i64 },
    #[error("coordinate {0:?} is not a decimal number")]
    InvalidCoordinate(String),
}

/// Truncated km/h. `later` must be strictly after `earlier`.
pub fn estimate(earlier: &IssSample, later: &IssSample) -> Result<i64, SpeedError> {
    let elapsed = later.timestamp - earlier.timestamp;
    match elapsed.cmp(&0) {
        Ordering::Equal => {
            return Err(SpeedError::ZeroElapsed {
                timestamp: earlier.timestamp,
            })
        }
        Ordering::Less => {
            return Err(SpeedError::OutOfOrder {
                earlier: earlier.timestamp,
                later: later.timestamp,
            })
        }
        Ordering::Greater => {}
    }

    let distance_km = distance_km(earlier, later)?;
    let hours = elapsed as f64 / SECONDS_PER_HOUR;

    Ok((distance_km / hours) as i64)
}

pub fn distance_km(earlier: &IssSample, later: &IssSample) -> Result<f64, SpeedError> {
    let lat1 = parse_degrees(&earlier.latitude)?;
    let lon1 = parse_degrees(&earlier.longitude)?;
    let lat2 = parse_degrees(&later.latitude)?;
    let lon2 = parse_degrees(&later.longitude)?;

    let delta_lat = lat2 - lat1;
    let delta_lon = lat1.to_radians().cos() * (lon2 - lon1);

    Ok((delta_lat * delta_lat + delta_lon * delta_lon).sqrt() * KM_PER_DEGREE)
}

fn parse_degrees(value: &str) -> Result<f64, SpeedError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|degrees| degrees.is_finite())
        .ok_or_else(|| SpeedError::InvalidCoordinate(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(latitude: &str, longitude: &str, timestamp: i64) -> IssSample {
        IssSample {
            latitude: latitude.to_string(),
            longitude: longitude.to_string(),
            timestamp,
        }
    }

    #[test]
    fn equal_timestamps_are_rejected() {
        let earlier = sample("45.0000", "10.0000", 1000);
        let later = sample("45.0100", "10.0100", 1000);

        assert_eq!(
            estimate(&earlier, &later),
            Err(SpeedError::ZeroElapsed { timestamp: 1000 })
        );
        assert_eq!(
            estimate(&earlier, &earlier),
            Err(SpeedError::ZeroElapsed { timestamp: 1000 })
        );
    }

    #[test]
    fn reversed_samples_are_rejected() {
        let earlier = sample("45.0000", "10.0000", 1060);
        let later = sample("45.0100", "10.0100", 1000);

        assert_eq!(
            estimate(&earlier, &later),
            Err(SpeedError::OutOfOrder {
                earlier: 1060,
                later: 1000
            })
        );
    }

    #[test]
    fn one_minute_at_mid_latitude() {
        let earlier = sample("45.0000", "10.0000", 1000);
        let later = sample("45.0100", "10.0100", 1060);

        let distance = distance_km(&earlier, &later).unwrap();
        assert!((distance - 1.3634).abs() < 1e-3, "distance was {distance}");

        // 1.3634 km in 1/60 h = 81.8 km/h, truncated
        assert_eq!(estimate(&earlier, &later), Ok(81));
    }

    #[test]
    fn large_displacement_over_one_minute() {
        let earlier = sample("-12.3456", "170.0000", 1_700_000_000);
        let later = sample("-11.9000", "171.2000", 1_700_000_060);

        let speed = estimate(&earlier, &later).unwrap();
        assert!((8000..9000).contains(&speed), "speed was {speed}");
    }

    #[test]
    fn longitude_delta_shrinks_towards_the_poles() {
        let equator = estimate(&sample("0.0", "10.0", 0), &sample("0.0", "11.0", 3600)).unwrap();
        let north = estimate(&sample("60.0", "10.0", 0), &sample("60.0", "11.0", 3600)).unwrap();

        assert_eq!(equator, KM_PER_DEGREE as i64);
        assert!(north < equator);
        assert!((north - equator / 2).abs() <= 1);
    }

    #[test]
    fn speed_is_non_negative_and_deterministic() {
        let pairs = [
            (sample("51.6", "-0.1", 0), sample("51.5", "-0.3", 20)),
            (sample("-40.0", "120.0", 10), sample("-41.0", "119.0", 80)),
            (sample("0.0", "0.0", 5), sample("0.0", "0.0", 25)),
        ];

        for (earlier, later) in &pairs {
            let first = estimate(earlier, later).unwrap();
            let second = estimate(earlier, later).unwrap();
            assert!(first >= 0);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn stationary_samples_have_zero_speed() {
        let earlier = sample("12.5", "-3.25", 100);
        let later = sample("12.5", "-3.25", 160);

        assert_eq!(estimate(&earlier, &later), Ok(0));
    }

    #[test]
    fn unparseable_coordinates_are_reported() {
        let earlier = sample("north", "10.0", 0);
        let later = sample("45.0", "10.0", 60);

        assert_eq!(
            estimate(&earlier, &later),
            Err(SpeedError::InvalidCoordinate("north".to_string()))
        );
        assert!(matches!(
            estimate(&sample("45.0", "NaN", 0), &later),
            Err(SpeedError::InvalidCoordinate(_))
        ));
    }
}
