//! Piecewise-linear lookup over sorted anchor points

/// Table of `(x, y)` anchors sorted by ascending `x`.
///
/// Inputs outside the anchor range clamp to the first/last `y`.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    points: Vec<(f64, f64)>,
}

impl LookupTable {
    /// Build a table. Anchors are sorted by `x`; an empty table is allowed
    /// and evaluates to `0.0`.
    pub fn new(mut points: Vec<(f64, f64)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn lookup(&self, x: f64) -> f64 {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return 0.0;
        };
        if x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }

        for w in self.points.windows(2) {
            let (x0, y0) = w[0];
            let (x1, y1) = w[1];
            if x >= x0 && x <= x1 {
                let span = x1 - x0;
                if span <= f64::EPSILON {
                    return y0;
                }
                return y0 + (x - x0) * (y1 - y0) / span;
            }
        }
        last.1
    }
}

/// Open-circuit pack voltage to SOC (%) for a 4S LiFePO4 pack
pub fn default_ocv_table() -> LookupTable {
    LookupTable::new(vec![
        (9.00, 0.0),
        (11.80, 10.0),
        (12.60, 20.0),
        (12.90, 30.0),
        (13.00, 40.0),
        (13.20, 50.0),
        (13.40, 60.0),
        (13.70, 70.0),
        (13.90, 80.0),
        (14.10, 90.0),
        (14.50, 100.0),
    ])
}

/// Temperature (°C) to usable-capacity factor
pub fn default_temperature_table() -> LookupTable {
    LookupTable::new(vec![
        (-20.0, 0.40),
        (-10.0, 0.60),
        (0.0, 0.85),
        (25.0, 1.00),
        (60.0, 0.98),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn interpolates_between_anchors() {
        let t = default_ocv_table();
        assert!(approx(t.lookup(13.20), 50.0));
        assert!(approx(t.lookup(13.10), 45.0));
        assert!(approx(t.lookup(14.30), 95.0));
    }

    #[test]
    fn clamps_outside_range() {
        let t = default_ocv_table();
        assert!(approx(t.lookup(8.0), 0.0));
        assert!(approx(t.lookup(15.0), 100.0));

        let temp = default_temperature_table();
        assert!(approx(temp.lookup(-40.0), 0.40));
        assert!(approx(temp.lookup(80.0), 0.98));
        assert!(approx(temp.lookup(25.0), 1.0));
    }

    #[test]
    fn unsorted_input_and_empty_table() {
        let t = LookupTable::new(vec![(10.0, 1.0), (0.0, 0.0)]);
        assert!(approx(t.lookup(5.0), 0.5));
        assert!(approx(LookupTable::new(Vec::new()).lookup(3.0), 0.0));
    }
}
