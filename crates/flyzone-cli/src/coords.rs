use flyzone_core::Point;

/// Parse `LAT,LON` in decimal degrees.
pub fn parse_point(value: &str) -> Result<Point, String> {
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{value}'"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude '{}'", lat.trim()))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude '{}'", lon.trim()))?;
    Point::checked(lat, lon).ok_or_else(|| format!("({lat}, {lon}) is out of range"))
}
