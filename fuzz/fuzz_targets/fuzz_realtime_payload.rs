#![no_main]

use cloudinbox::bus::{RealtimeEvent, RealtimePayload};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(payload) = serde_json::from_slice::<RealtimePayload>(data) {
        let _ = RealtimeEvent::from_payload(payload);
    }
});
