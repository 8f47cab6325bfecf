//! Backend HTTP status to RPC status code.

use reqwest::StatusCode;
use tonic::Code;

/// Map the backend's HTTP status to the RPC code returned to the caller.
///
/// | HTTP            | RPC             |
/// |-----------------|-----------------|
/// | 200             | `Ok`            |
/// | 404             | `Unimplemented` |
/// | 400..=500       | `Internal`      |
/// | anything else   | `Unknown`       |
pub fn code_for(status: StatusCode) -> Code {
    match status.as_u16() {
        200 => Code::Ok,
        404 => Code::Unimplemented,
        400..=500 => Code::Internal,
        _ => Code::Unknown,
    }
}
