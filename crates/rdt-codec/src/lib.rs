//! Request/response codec for the chat collaborators.
//!
//! Application messages are UTF-8 JSON objects discriminated by a `command`
//! field; responses are plain JSON values (a bool, an array, or nothing for
//! fire-and-forget commands). The transport below never inspects these
//! bytes, so this crate is the single place where the wire strings live.

pub mod command;

pub use command::{ChatMessage, GroupSummary, OwnedGroupSummary, Request, Response};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid command payload: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn encode_request(request: &Request) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(request)?)
}

pub fn decode_request(bytes: &[u8]) -> Result<Request, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn encode_response(response: &Response) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(response)?)
}

pub fn decode_response(bytes: &[u8]) -> Result<Response, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_bytes_round_trip() {
        let request = Request::ChatFriend {
            user: "alice".into(),
            friend: "bob".into(),
            message: "hi there".into(),
        };
        let bytes = encode_request(&request).unwrap();
        assert_eq!(decode_request(&bytes).unwrap(), request);
    }

    #[test]
    fn response_bytes_round_trip() {
        let response = Response::Users(vec!["alice".into(), "bob".into()]);
        let bytes = encode_response(&response).unwrap();
        assert_eq!(decode_response(&bytes).unwrap(), response);
    }

    #[test]
    fn garbage_is_a_codec_error() {
        assert!(decode_request(b"not json").is_err());
        assert!(decode_request("{\"command\":\"warp\"}".as_bytes()).is_err());
    }
}
