#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Interpret the input as big-endian f64 voltages
    let table = lfp_bms::table::default_ocv_table();
    for chunk in data.chunks_exact(8) {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(chunk);
        let v = f64::from_be_bytes(buf);
        if v.is_nan() {
            continue;
        }
        let soc = table.lookup(v);
        assert!((0.0..=100.0).contains(&soc));
    }
});
