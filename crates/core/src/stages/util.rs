//! Shared numeric helpers for the stages.

/// Round a quantity to the nearest multiple of the pack size (half up).
///
/// Quantities are never negative; a zero pack size is treated as 1.
pub fn round_to_pack(quantity: f64, pack_size: u32) -> u32 {
    let pack = pack_size.max(1) as f64;
    let packs = (quantity.max(0.0) / pack).round();
    (packs * pack) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_to_nearest_multiple() {
        assert_eq!(round_to_pack(300.0, 30), 300);
        assert_eq!(round_to_pack(290.0, 30), 300);
        assert_eq!(round_to_pack(280.0, 30), 270);
        assert_eq!(round_to_pack(105.0, 30), 120); // half rounds up
    }

    #[test]
    fn test_zero_and_negative_quantities() {
        assert_eq!(round_to_pack(0.0, 30), 0);
        assert_eq!(round_to_pack(-5.0, 30), 0);
        assert_eq!(round_to_pack(10.0, 30), 0); // below half a pack
    }

    #[test]
    fn test_pack_size_one_passes_through() {
        assert_eq!(round_to_pack(17.4, 1), 17);
        assert_eq!(round_to_pack(17.5, 1), 18);
    }

    #[test]
    fn test_zero_pack_size_treated_as_one() {
        assert_eq!(round_to_pack(17.0, 0), 17);
    }
}
