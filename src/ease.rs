#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ease {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    Bounce,
}

impl Ease {
    /// Maps a normalized phase to an eased phase. Input is clamped to [0,1]
    /// and every curve stays within [0,1]; `Bounce` touches 1.0 at each of
    /// its interior peaks, not only at the endpoint.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => t * (2.0 - t),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Self::Bounce => bounce(t),
        }
    }
}

// Classic four-segment bounce with breakpoints at 1/2.75, 2/2.75 and 2.5/2.75.
fn bounce(t: f64) -> f64 {
    const K: f64 = 7.5625;
    if t < 1.0 / 2.75 {
        K * t * t
    } else if t < 2.0 / 2.75 {
        let t = t - 1.5 / 2.75;
        K * t * t + 0.75
    } else if t < 2.5 / 2.75 {
        let t = t - 2.25 / 2.75;
        K * t * t + 0.9375
    } else {
        let t = t - 2.625 / 2.75;
        K * t * t + 0.984375
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Ease; 5] = [
        Ease::Linear,
        Ease::EaseIn,
        Ease::EaseOut,
        Ease::EaseInOut,
        Ease::Bounce,
    ];

    #[test]
    fn endpoints_are_stable() {
        for ease in ALL {
            assert_eq!(ease.apply(0.0), 0.0, "{ease:?}");
            let end = ease.apply(1.0);
            assert!((end - 1.0).abs() < 1e-9, "{ease:?} -> {end}");
        }
    }

    #[test]
    fn input_is_clamped() {
        for ease in ALL {
            assert_eq!(ease.apply(-3.0), ease.apply(0.0));
            assert_eq!(ease.apply(3.0), ease.apply(1.0));
        }
    }

    #[test]
    fn ease_in_out_is_continuous_at_midpoint() {
        let below = Ease::EaseInOut.apply(0.5 - 1e-9);
        let above = Ease::EaseInOut.apply(0.5 + 1e-9);
        assert!((below - above).abs() < 1e-6);
        assert!((Ease::EaseInOut.apply(0.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn bounce_peaks_touch_one_without_overshoot() {
        // The second peak sits exactly at the 2/2.75 breakpoint; just before
        // it the curve is still climbing and stays below 1.
        assert!((Ease::Bounce.apply(2.0 / 2.75) - 1.0).abs() < 1e-12);
        assert!(Ease::Bounce.apply(0.7275) < 1.0);
        for i in 0..=1000 {
            let t = f64::from(i) / 1000.0;
            let v = Ease::Bounce.apply(t);
            assert!((0.0..=1.0 + 1e-12).contains(&v), "t={t} -> {v}");
        }
    }

    #[test]
    fn monotonic_spot_check_for_smooth_curves() {
        for ease in [Ease::Linear, Ease::EaseIn, Ease::EaseOut, Ease::EaseInOut] {
            let a = ease.apply(0.25);
            let b = ease.apply(0.5);
            let c = ease.apply(0.75);
            assert!(a < b && b < c, "{ease:?}");
        }
    }
}
