#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Recommendation responses come from a remote service; parsing must never panic
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(response) = serde_json::from_str::<yq_types::RecommendResponse>(s) {
            let _ = response.stories().count();
        }
    }
});
