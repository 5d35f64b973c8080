#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(response) = serde_json::from_str::<yq_types::SearchResponse>(s) {
            let _ = response.items().len();
            let _ = response.is_empty_result();
        }
    }
});
