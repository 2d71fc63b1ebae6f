use crate::core::{Payload, RelayError};

/// Decode a request body into a message payload. Anything other than a
/// JSON object is rejected.
pub fn decode_payload(body: &[u8]) -> Result<Payload, RelayError> {
    serde_json::from_slice::<Payload>(body).map_err(|e| {
        RelayError::PayloadDecode(format!(
            "could not unmarshal json ({e}): {}",
            String::from_utf8_lossy(body)
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_objects() {
        let payload = decode_payload(br#"{"user":"a","n":[1,2,{"deep":null}]}"#).unwrap();
        assert_eq!(payload["user"], json!("a"));
        assert_eq!(payload["n"][2]["deep"], json!(null));
    }

    #[test]
    fn rejects_non_objects() {
        for body in [&b"not json"[..], &b"[1,2,3]"[..], &b"42"[..], &b""[..], &b"{\"open\":"[..]] {
            let err = decode_payload(body).unwrap_err();
            assert!(matches!(err, RelayError::PayloadDecode(_)), "{body:?}");
        }
    }
}
