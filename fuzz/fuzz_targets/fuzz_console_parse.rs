#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);

    // Parsing must never panic, and accepted calibrations stay in range
    if let Ok(Some(lfp_bms::console::ConsoleCommand::Control(
        lfp_bms::bms::BmsCommand::CalibrateCapacity(ah),
    ))) = lfp_bms::console::parse(&line)
    {
        assert!(ah > 0.0 && ah <= lfp_bms::console::MAX_CALIBRATION_AH);
    }
});
