use fesk_core::config::WireConstants;
use fesk_core::decoder::base3::{bytes_to_trits, trits_to_bytes};
use fesk_core::decoder::crc::crc16_ccitt;
use fesk_core::decoder::lfsr::Lfsr;
use fesk_core::decoder::pilot::remove_pilots;
use proptest::prelude::*;

proptest! {
    /// Base-3 accumulation and its inverse round-trip for any trit stream.
    #[test]
    fn base3_round_trips_for_any_trit_stream(trits in prop::collection::vec(0u8..3, 1..64)) {
        let bytes = trits_to_bytes(&trits);
        let recovered = bytes_to_trits(&bytes, trits.len());
        prop_assert_eq!(recovered, trits);
    }

    /// The LFSR keystream is its own inverse for any byte sequence.
    #[test]
    fn lfsr_is_an_involution_for_any_bytes(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut scrambler = Lfsr::new();
        let scrambled = scrambler.process(&data);

        let mut descrambler = Lfsr::new();
        let recovered = descrambler.process(&scrambled);

        prop_assert_eq!(recovered, data);
    }

    /// CRC-16/CCITT is deterministic and sensitive to any single bit flip.
    #[test]
    fn crc_is_deterministic_and_bit_sensitive(data in prop::collection::vec(any::<u8>(), 1..128), bit in 0usize..8) {
        let a = crc16_ccitt(&data);
        let b = crc16_ccitt(&data);
        prop_assert_eq!(a, b);

        let mut flipped = data.clone();
        flipped[0] ^= 1 << bit;
        prop_assert_ne!(crc16_ccitt(&flipped), a);
    }

    /// Pilot removal recovers exactly the original data trits whenever
    /// pilots are present at every expected boundary.
    #[test]
    fn pilot_removal_recovers_original_data_trits(
        data in prop::collection::vec(0u8..3, 0..200),
        interval in 8usize..40,
    ) {
        let mut with_pilots = Vec::new();
        let mut since_pilot = 0usize;
        for &trit in &data {
            with_pilots.push(trit);
            since_pilot += 1;
            if since_pilot == interval {
                with_pilots.extend_from_slice(&WireConstants::PILOT_PAIR);
                since_pilot = 0;
            }
        }

        let (recovered, observations) = remove_pilots(&with_pilots, interval, WireConstants::PILOT_PAIR);
        prop_assert_eq!(recovered, data);
        prop_assert!(observations.iter().all(|o| o.present));
    }

    /// Pilot removal never panics or drops unrelated trits when pilots are
    /// simply absent.
    #[test]
    fn pilot_removal_tolerates_missing_pilots(
        data in prop::collection::vec(0u8..3, 0..200),
        interval in 8usize..40,
    ) {
        let (recovered, _observations) = remove_pilots(&data, interval, WireConstants::PILOT_PAIR);
        prop_assert_eq!(recovered, data);
    }
}
