/// Summary statistics over flattened thermal grids.
pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f32>() / samples.len() as f32
    }

    /// Population standard deviation.
    pub fn std_dev(samples: &[f32]) -> f32 {
        if samples.len() < 2 {
            return 0.0;
        }
        let mean = Self::mean(samples);
        let sum_sq: f32 = samples.iter().map(|&v| (v - mean) * (v - mean)).sum();
        let var = sum_sq / samples.len() as f32;
        var.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_grid_has_no_spread() {
        assert_eq!(StatsHelper::std_dev(&[]), 0.0);
        assert_eq!(StatsHelper::std_dev(&[18880.0, 18880.0]), 0.0);
    }

    #[test]
    fn mean_and_spread_of_simple_grid() {
        assert_eq!(StatsHelper::mean(&[]), 0.0);
        assert_eq!(StatsHelper::mean(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 5.0);
        assert_eq!(StatsHelper::std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0);
    }
}
