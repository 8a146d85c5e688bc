const EARTH_RADIUS_KM: f64 = 6371.0;

/// Median of the finite values; 0.0 when there are none.
pub fn median(values: &[f64]) -> f64 {
    let mut arr: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if arr.is_empty() {
        return 0.0;
    }
    arr.sort_by(f64::total_cmp);

    let mid = arr.len() / 2;
    if arr.len() % 2 == 0 {
        (arr[mid - 1] + arr[mid]) / 2.0
    } else {
        arr[mid]
    }
}

/// Population standard deviation; 0.0 for fewer than two finite values.
pub fn population_std_dev(values: &[f64]) -> f64 {
    let arr: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if arr.len() < 2 {
        return 0.0;
    }
    let n = arr.len() as f64;
    let mean = arr.iter().sum::<f64>() / n;
    let var = arr.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// Rounds to the nearest multiple of `step`, ties away from zero. A zero step is a no-op.
pub fn round_to_step(value: f64, step: u32) -> f64 {
    if step == 0 {
        return value;
    }
    let step = f64::from(step);
    step * (value / step).round()
}

/// Rounds to a fixed number of decimal places.
pub fn round_dp(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Great-circle distance in kilometres between two points given in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}
