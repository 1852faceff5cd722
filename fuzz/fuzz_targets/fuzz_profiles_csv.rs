#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = soil_profile_loader::io::read_horizons_csv_from_bytes(data);
});
