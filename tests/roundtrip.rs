mod common;

use proptest::prelude::*;

use buspirate_eeprom::eeprom::{BatchPolicy, Batches};
use buspirate_eeprom::sim::SimulatedBusPirate;
use buspirate_eeprom::{Eeprom, EepromConfig, Ending};

use common::{bus, eeprom_config};

/// Any bytes except the newline end marker.
fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>().prop_filter("no terminator", |b| *b != b'\n'), 0..48)
}

fn policy() -> impl Strategy<Value = BatchPolicy> {
    prop_oneof![Just(BatchPolicy::HalfPage), Just(BatchPolicy::FullPage)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn written_bytes_read_back(data in payload(), seed in any::<usize>(), batching in policy()) {
        let start = seed % (257 - data.len());
        let config = EepromConfig { batching, ..eeprom_config() };
        let mut eeprom = Eeprom::new(bus(SimulatedBusPirate::new()), config);

        eeprom.seek(start).unwrap();
        let outcome = eeprom.write(&data).unwrap();
        prop_assert_eq!(outcome.written, data.len());
        prop_assert_eq!(outcome.ending, Ending::Exhausted);
        prop_assert_eq!(eeprom.cursor().position(), start + data.len());

        eeprom.seek(start).unwrap();
        let outcome = eeprom.read(data.len()).unwrap();
        prop_assert_eq!(outcome.data, data);
    }

    #[test]
    fn half_page_batches_stay_within_eight(data in payload(), start in 0usize..256) {
        let batches: Vec<_> =
            Batches::new(&data, start, 16, BatchPolicy::HalfPage, Some(b'\n')).collect();

        prop_assert!(batches.iter().all(|b| (1..=8).contains(&b.data.len())));
        prop_assert_eq!(batches.iter().map(|b| b.data.len()).sum::<usize>(), data.len());
        // Page clamping only splits further when the start is not half-page aligned.
        if start % 8 == 0 {
            prop_assert_eq!(batches.len(), data.len().div_ceil(8));
        }
    }

    #[test]
    fn batches_never_cross_a_page(data in payload(), start in 0usize..256, batching in policy()) {
        for batch in Batches::new(&data, start, 16, batching, Some(b'\n')) {
            let last = batch.address + batch.data.len() - 1;
            prop_assert_eq!(batch.address / 16, last / 16);
        }
    }
}
