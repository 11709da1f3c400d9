use pyjs_compiler::output::vlq::{decode_vlqs, encode_vlq, to_base64_string};
use proptest::prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_encode_sign_in_the_low_bit() {
        assert_eq!(encode_vlq(0), "A");
        assert_eq!(encode_vlq(1), "C");
        assert_eq!(encode_vlq(-1), "D");
        assert_eq!(encode_vlq(15), "e");
        assert_eq!(encode_vlq(-15), "f");
    }

    #[test]
    fn should_continue_values_over_five_bits() {
        assert_eq!(encode_vlq(16), "gB");
        assert_eq!(encode_vlq(-16), "hB");
        assert_eq!(encode_vlq(123), "2H");
        assert_eq!(encode_vlq(1000), "w+B");
    }

    #[test]
    fn should_decode_packed_segments() {
        assert_eq!(decode_vlqs("AAAA").unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(decode_vlqs("SAAS").unwrap(), vec![9, 0, 0, 9]);
        assert_eq!(decode_vlqs("gBDw+B").unwrap(), vec![16, -1, 1000]);
    }

    #[test]
    fn should_decode_what_it_encodes() {
        let values = [0, 1, -1, 31, -32, 4096, -123_456, i32::MAX as i64];
        let segment: String = values.iter().map(|&v| encode_vlq(v)).collect();
        assert_eq!(decode_vlqs(&segment).unwrap(), values.to_vec());
    }

    #[test]
    fn should_reject_invalid_characters() {
        let err = decode_vlqs("AA!A").unwrap_err();
        assert!(err.to_string().contains("AA!A"));
    }

    #[test]
    fn should_reject_truncated_values() {
        assert!(decode_vlqs("g").is_err());
        assert!(decode_vlqs("Ag").is_err());
    }

    #[test]
    fn should_keep_the_sign_of_i64_min() {
        let encoded = encode_vlq(i64::MIN);
        assert_ne!(encoded, "B");
        assert_eq!(decode_vlqs(&encoded).unwrap(), vec![i64::MIN]);
    }

    #[test]
    fn should_reject_values_that_overflow_i64() {
        let err = decode_vlqs("ggggggggggggQ").unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(decode_vlqs("ggggggggggggggggggC").is_err());
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(values in proptest::collection::vec(any::<i64>(), 0..24)) {
            let segment: String = values.iter().map(|&v| encode_vlq(v)).collect();
            prop_assert_eq!(decode_vlqs(&segment).unwrap(), values);
        }

        #[test]
        fn prop_small_values_round_trip(value in -100_000i64..100_000) {
            prop_assert_eq!(decode_vlqs(&encode_vlq(value)).unwrap(), vec![value]);
        }
    }

    #[test]
    fn should_encode_base64() {
        assert_eq!(to_base64_string(""), "");
        assert_eq!(to_base64_string("f"), "Zg==");
        assert_eq!(to_base64_string("fo"), "Zm8=");
        assert_eq!(to_base64_string("foo"), "Zm9v");
        assert_eq!(to_base64_string("{\"version\":3}"), "eyJ2ZXJzaW9uIjozfQ==");
    }
}
