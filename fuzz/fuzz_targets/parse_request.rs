#![no_main]
use libfuzzer_sys::fuzz_target;

use utxo_sign_request::SignedRequest;

fuzz_target!(|data: &[u8]| {
    if let Ok(req) = serde_json::from_slice::<SignedRequest>(data) {
        // We can sanity check it without crashing
        let _ = req.sanity_check();

        // We can serialize it back, and the PSBT is left untouched
        let json = serde_json::to_string(&req).expect("Serializing a parsed request");
        let back: SignedRequest = serde_json::from_str(&json).expect("Parsing a serialized request");
        assert_eq!(back, req);

        // We can compute the signed payload
        req.signing_payload("/api/v1/transactions")
            .expect("Serializing a parsed request");
    }
});
